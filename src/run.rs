//! Run coordination
//!
//! Drives every discovered schema file through resolution, subject matching
//! and evaluation, then hands the contexts to a [`RunReport`]. Resolution and
//! registry failures abort immediately; incompatibilities are only collected.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::compatibility::CompatibilityEvaluator;
use crate::config::GateConfig;
use crate::context::CheckingContext;
use crate::discovery::{discover, resolve_imports};
use crate::error::{RemoteError, Result};
use crate::lazy::Memoized;
use crate::registry::{HttpRegistryClient, RegistryClient};
use crate::report::RunReport;
use crate::schema::{ParsingNamespace, SchemaFile, TypeResolver};
use crate::subjects::{SubjectIndex, SubjectMatcher};

/// The files, imports and naming convention of one compatibility run
#[derive(Debug, Clone)]
pub struct CompatibilityRun {
    files: Vec<SchemaFile>,
    imports: Vec<PathBuf>,
    matcher: SubjectMatcher,
}

impl CompatibilityRun {
    pub fn new(files: Vec<SchemaFile>, matcher: SubjectMatcher) -> Self {
        Self {
            files,
            imports: Vec::new(),
            matcher,
        }
    }

    /// Files parsed before any checked file, in this order
    pub fn with_imports(mut self, imports: Vec<PathBuf>) -> Self {
        self.imports = imports;
        self
    }

    /// Discover files and compile the naming convention from configuration.
    ///
    /// Relative import paths are taken relative to `base_dir`, the directory
    /// of the configuration file.
    pub fn from_config(config: &GateConfig, base_dir: &Path) -> Result<Self> {
        config.validate()?;
        let matcher = SubjectMatcher::new(&config.subjects.name_pattern)?;
        let files = discover(&config.schemas.file_sets)?;
        let imports = resolve_imports(base_dir, &config.schemas.imports);
        Ok(Self::new(files, matcher).with_imports(imports))
    }

    pub fn files(&self) -> &[SchemaFile] {
        &self.files
    }

    /// Run against the HTTP registry described by `config`
    pub fn execute_with_config(&self, config: &GateConfig) -> Result<RunReport> {
        let registry = &config.registry;
        self.execute(|| {
            HttpRegistryClient::new(
                &registry.urls,
                registry.user_info.as_deref(),
                registry.cache_capacity,
            )
        })
    }

    /// Run the pipeline. `connect` is called at most once, and only if some
    /// file needs the registry.
    pub fn execute<C, F>(&self, connect: F) -> Result<RunReport>
    where
        C: RegistryClient,
        F: Fn() -> std::result::Result<C, RemoteError>,
    {
        if self.files.is_empty() {
            warn!("No schema files found to be checked for compatibility.");
            return Ok(RunReport::new(Vec::new(), Vec::new()));
        }

        let client = Memoized::new(connect);
        let subject_index: Memoized<'_, SubjectIndex, RemoteError> = Memoized::new(|| {
            let subjects = client.get()?.list_all_subjects()?;
            let index = self.matcher.index(&subjects);
            debug!(
                "Grouped {} registry subject(s) into {} type(s), {} unresolved",
                subjects.len(),
                index.groups().len(),
                index.unresolved().len()
            );
            Ok(index)
        });

        let mut namespace = ParsingNamespace::with_imports(&self.imports)?;
        let evaluator = CompatibilityEvaluator::new(&client);
        let mut contexts = Vec::with_capacity(self.files.len());

        for file in &self.files {
            let resolved = TypeResolver::new(&mut namespace).resolve(file)?;
            let mut context = CheckingContext::new(file.clone(), resolved);

            let matching = subject_index.get()?.matching(context.full_type_name()).to_vec();
            context.add_matching_subjects(matching);
            debug!(
                "{} matched {} registry subject(s)",
                context.full_type_name(),
                context.matching_subjects().len()
            );

            evaluator.evaluate(&mut context, &namespace)?;
            contexts.push(context);
        }

        let unresolved = subject_index
            .get()
            .map(|index| index.unresolved().to_vec())
            .unwrap_or_default();
        let report = RunReport::new(contexts, unresolved);
        log_report(&report);
        Ok(report)
    }
}

fn log_report(report: &RunReport) {
    if report.is_compatible() {
        info!(" Schema checks complete. Following files were checked:");
        for summary in report.file_summaries() {
            info!(
                " - '{}' (compatible_subjects={}, incompatible_subjects={})",
                summary.file, summary.compatible_subjects, summary.incompatible_subjects
            );
        }
    }

    let unchecked = report.unchecked_files();
    if !unchecked.is_empty() {
        let listing: Vec<String> = unchecked
            .iter()
            .map(|context| format!(" - {}", context.file().display_name()))
            .collect();
        warn!(
            "{} local schema(s) were NOT CHECKED against any subject in remote schema registry: \n{}",
            unchecked.len(),
            listing.join("\n")
        );
    }
}
