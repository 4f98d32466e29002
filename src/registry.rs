//! Schema registry client
//!
//! Speaks the Confluent Schema Registry REST API. Calls are blocking, with no
//! retry; a failure is returned to the caller, which aborts the run.

use std::cell::RefCell;
use std::num::NonZeroUsize;

use lru::LruCache;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::checksum::Fingerprint;
use crate::error::RemoteError;

/// Content type expected by the registry
pub const SCHEMA_REGISTRY_CONTENT_TYPE: &str = "application/vnd.schemaregistry.v1+json";

/// Default number of cached compatibility answers
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Operations the compatibility gate needs from a registry
pub trait RegistryClient {
    /// All subject names currently registered
    fn list_all_subjects(&self) -> Result<Vec<String>, RemoteError>;

    /// Whether `schema_json` could replace the latest version of `subject`
    fn test_compatibility(&self, subject: &str, schema_json: &str) -> Result<bool, RemoteError>;
}

impl<C: RegistryClient + ?Sized> RegistryClient for &C {
    fn list_all_subjects(&self) -> Result<Vec<String>, RemoteError> {
        (**self).list_all_subjects()
    }

    fn test_compatibility(&self, subject: &str, schema_json: &str) -> Result<bool, RemoteError> {
        (**self).test_compatibility(subject, schema_json)
    }
}

impl<C: RegistryClient + ?Sized> RegistryClient for Box<C> {
    fn list_all_subjects(&self) -> Result<Vec<String>, RemoteError> {
        (**self).list_all_subjects()
    }

    fn test_compatibility(&self, subject: &str, schema_json: &str) -> Result<bool, RemoteError> {
        (**self).test_compatibility(subject, schema_json)
    }
}

/// Basic auth credentials parsed from `user:password`
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl BasicAuth {
    /// Parse `user:password`; the password may itself contain `:`
    pub fn parse(user_info: &str) -> Result<Self, RemoteError> {
        let (username, password) = user_info
            .split_once(':')
            .ok_or(RemoteError::InvalidUserInfo)?;
        Ok(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// HTTP client for one or more registry base URLs
pub struct HttpRegistryClient {
    base_urls: Vec<Url>,
    auth: Option<BasicAuth>,
    http: Client,
    cache: RefCell<CompatibilityCache>,
}

impl HttpRegistryClient {
    /// Build a client. URLs are tried in order when a connection fails.
    ///
    /// A `cache_capacity` of zero disables answer caching.
    pub fn new(
        urls: &[String],
        user_info: Option<&str>,
        cache_capacity: usize,
    ) -> Result<Self, RemoteError> {
        if urls.is_empty() {
            return Err(RemoteError::NoUrls);
        }

        let base_urls = urls
            .iter()
            .map(|url| parse_base_url(url))
            .collect::<Result<Vec<_>, _>>()?;
        let auth = user_info.map(BasicAuth::parse).transpose()?;
        let http = Client::builder().build()?;

        Ok(Self {
            base_urls,
            auth,
            http,
            cache: RefCell::new(CompatibilityCache::new(cache_capacity)),
        })
    }

    /// Send a request to each base URL in turn until one answers.
    ///
    /// Only transport failures fail over; an HTTP error status is final.
    fn execute<F>(&self, segments: &[&str], build: F) -> Result<Response, RemoteError>
    where
        F: Fn(&Client, Url) -> RequestBuilder,
    {
        let mut last_error = None;
        for base in &self.base_urls {
            let url = endpoint(base, segments);
            let mut request = build(&self.http, url.clone())
                .header(reqwest::header::ACCEPT, SCHEMA_REGISTRY_CONTENT_TYPE);
            if let Some(auth) = &self.auth {
                request = request.basic_auth(&auth.username, Some(&auth.password));
            }

            match request.send() {
                Ok(response) => return check_status(response),
                Err(e) if e.is_connect() || e.is_timeout() => {
                    warn!("Schema registry at {} unreachable: {}", base, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(RemoteError::Transport(e)),
            }
        }
        Err(last_error.map(RemoteError::Transport).unwrap_or(RemoteError::NoUrls))
    }
}

impl RegistryClient for HttpRegistryClient {
    fn list_all_subjects(&self) -> Result<Vec<String>, RemoteError> {
        let response = self.execute(&["subjects"], |http, url| http.get(url))?;
        let subjects: Vec<String> = response.json()?;
        debug!("Fetched {} subjects from schema registry", subjects.len());
        Ok(subjects)
    }

    fn test_compatibility(&self, subject: &str, schema_json: &str) -> Result<bool, RemoteError> {
        let fingerprint = Fingerprint::of_schema(schema_json);
        let cached = self.cache.borrow_mut().get(subject, &fingerprint);
        if let Some(cached) = cached {
            debug!("Using cached compatibility answer for subject {}", subject);
            return Ok(cached);
        }

        let body = serde_json::json!({ "schema": schema_json });
        let response = self.execute(
            &["compatibility", "subjects", subject, "versions", "latest"],
            |http, url| {
                http.post(url)
                    .header(reqwest::header::CONTENT_TYPE, SCHEMA_REGISTRY_CONTENT_TYPE)
                    .body(body.to_string())
            },
        )?;
        let answer: CompatibilityResponse = response.json()?;

        self.cache
            .borrow_mut()
            .insert(subject, fingerprint, answer.is_compatible);
        Ok(answer.is_compatible)
    }
}

#[derive(Debug, Deserialize)]
struct CompatibilityResponse {
    is_compatible: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error_code: Option<i64>,
    message: Option<String>,
}

fn parse_base_url(url: &str) -> Result<Url, RemoteError> {
    let parsed = Url::parse(url.trim_end_matches('/')).map_err(|e| RemoteError::InvalidUrl {
        url: url.to_string(),
        message: e.to_string(),
    })?;
    if parsed.cannot_be_a_base() {
        return Err(RemoteError::InvalidUrl {
            url: url.to_string(),
            message: "URL cannot be used as a base".to_string(),
        });
    }
    Ok(parsed)
}

/// Append percent-encoded path segments to a base URL
fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    let (error_code, message) = match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(ErrorResponse { error_code, message }) => {
            (error_code, message.unwrap_or_else(|| reason(status)))
        }
        Err(_) if body.is_empty() => (None, reason(status)),
        Err(_) => (None, body),
    };
    Err(RemoteError::Status {
        status: status.as_u16(),
        error_code,
        message,
    })
}

fn reason(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or("unknown status").to_string()
}

/// Compatibility answers keyed by subject and schema fingerprint
struct CompatibilityCache {
    entries: Option<LruCache<(String, Fingerprint), bool>>,
}

impl CompatibilityCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(LruCache::new),
        }
    }

    fn get(&mut self, subject: &str, fingerprint: &Fingerprint) -> Option<bool> {
        self.entries
            .as_mut()?
            .get(&(subject.to_string(), fingerprint.clone()))
            .copied()
    }

    fn insert(&mut self, subject: &str, fingerprint: Fingerprint, compatible: bool) {
        if let Some(entries) = self.entries.as_mut() {
            entries.put((subject.to_string(), fingerprint), compatible);
        }
    }
}
