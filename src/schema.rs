//! Local schema files and type resolution
//!
//! Every schema file under test is resolved to its fully-qualified type name
//! and a parsed Avro [`Schema`]. Resolution shares one [`ParsingNamespace`] per
//! run, so a type defined in one file (or in an import) is visible to every
//! file resolved after it and is never parsed twice.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use apache_avro::schema::RecordSchema;
use apache_avro::Schema;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{GateError, ResolutionCause, Result};

const PRIMITIVE_TYPES: &[&str] = &[
    "null", "boolean", "int", "long", "float", "double", "bytes", "string",
];

/// A schema file found by discovery
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaFile {
    path: PathBuf,
}

impl SchemaFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name used in reports (falls back to the full path)
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    fn read(&self) -> Result<String> {
        fs::read_to_string(&self.path).map_err(|e| GateError::resolution(&self.path, e))
    }
}

/// A schema file's type name together with its parsed schema
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    pub full_type_name: String,
    pub schema: Rc<Schema>,
}

/// Type definitions accumulated while resolving the files of one run
#[derive(Debug, Default)]
pub struct ParsingNamespace {
    /// Raw definitions in the order they were accepted
    sources: Vec<String>,
    /// Every named type seen so far, nested ones included
    types: BTreeMap<String, Rc<Schema>>,
    /// The JSON each named type was written as, keyed like `types`
    definitions: BTreeMap<String, Value>,
}

impl ParsingNamespace {
    /// Create an empty namespace
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a namespace pre-seeded with import files
    ///
    /// Imports are parsed together, so they may reference each other.
    pub fn with_imports<P: AsRef<Path>>(imports: &[P]) -> Result<Self> {
        let mut namespace = Self::new();
        if imports.is_empty() {
            return Ok(namespace);
        }

        let mut sources = Vec::with_capacity(imports.len());
        let mut documents = Vec::with_capacity(imports.len());
        for import in imports {
            let path = import.as_ref();
            debug!("Parsing import {}", path.display());
            let content = fs::read_to_string(path).map_err(|e| GateError::resolution(path, e))?;
            let document: Value =
                serde_json::from_str(&content).map_err(|e| GateError::resolution(path, e))?;
            sources.push(content);
            documents.push(document);
        }

        let refs: Vec<&str> = sources.iter().map(String::as_str).collect();
        let parsed = Schema::parse_list(&refs).map_err(|source| GateError::Imports {
            paths: imports.iter().map(|p| p.as_ref().to_path_buf()).collect(),
            source,
        })?;

        for schema in &parsed {
            namespace.register(schema);
        }
        for document in &documents {
            namespace.collect_definitions(document, None);
        }
        namespace.sources = sources;
        Ok(namespace)
    }

    /// Look up an already-defined type
    pub fn lookup(&self, full_type_name: &str) -> Option<Rc<Schema>> {
        self.types.get(full_type_name).cloned()
    }

    /// Whether a type is already defined
    pub fn contains(&self, full_type_name: &str) -> bool {
        self.types.contains_key(full_type_name)
    }

    /// Number of named types defined so far
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Parse a new definition against everything accepted so far.
    ///
    /// On success the definition and all of its named types become visible to
    /// later parses.
    fn parse(&mut self, content: &str) -> std::result::Result<(), ResolutionCause> {
        let document: Value = serde_json::from_str(content)?;

        let mut inputs: Vec<&str> = self.sources.iter().map(String::as_str).collect();
        inputs.push(content);
        let parsed = Schema::parse_list(&inputs)?;

        for schema in &parsed {
            self.register(schema);
        }
        self.collect_definitions(&document, None);
        self.sources.push(content.to_string());
        Ok(())
    }

    fn register(&mut self, schema: &Schema) {
        match schema {
            Schema::Record(RecordSchema { name, fields, .. }) => {
                self.types
                    .entry(name.fullname(None))
                    .or_insert_with(|| Rc::new(schema.clone()));
                for field in fields {
                    self.register(&field.schema);
                }
            }
            Schema::Enum(_) | Schema::Fixed(_) => {
                if let Some(name) = schema.name() {
                    self.types
                        .entry(name.fullname(None))
                        .or_insert_with(|| Rc::new(schema.clone()));
                }
            }
            Schema::Array(inner) | Schema::Map(inner) => self.register(inner),
            Schema::Union(union) => {
                for variant in union.variants() {
                    self.register(variant);
                }
            }
            _ => {}
        }
    }

    /// Record the written form of every named type in a document.
    ///
    /// A nested definition that inherits its namespace gets it spelled out,
    /// so it keeps its name wherever it is inlined later.
    fn collect_definitions(&mut self, value: &Value, enclosing_namespace: Option<&str>) {
        match value {
            Value::Array(variants) => {
                for variant in variants {
                    self.collect_definitions(variant, enclosing_namespace);
                }
            }
            Value::Object(object) => {
                let kind = object.get("type");
                match kind.and_then(Value::as_str) {
                    Some("record") | Some("error") | Some("enum") | Some("fixed") => {
                        let Some(name) = object.get("name").and_then(Value::as_str) else {
                            return;
                        };
                        let own_namespace = object.get("namespace").and_then(Value::as_str);
                        let full_name = qualify(name, own_namespace.or(enclosing_namespace));

                        let mut definition = object.clone();
                        if own_namespace.is_none() && !name.contains('.') {
                            if let Some(ns) = enclosing_namespace.filter(|ns| !ns.is_empty()) {
                                definition.insert("namespace".to_string(), Value::from(ns));
                            }
                        }
                        self.definitions
                            .entry(full_name.clone())
                            .or_insert(Value::Object(definition));

                        if let Some(Value::Array(fields)) = object.get("fields") {
                            let record_namespace = full_name.rsplit_once('.').map(|(ns, _)| ns);
                            for field in fields {
                                if let Some(field_type) = field.get("type") {
                                    self.collect_definitions(field_type, record_namespace);
                                }
                            }
                        }
                    }
                    Some("array") => {
                        if let Some(items) = object.get("items") {
                            self.collect_definitions(items, enclosing_namespace);
                        }
                    }
                    Some("map") => {
                        if let Some(values) = object.get("values") {
                            self.collect_definitions(values, enclosing_namespace);
                        }
                    }
                    Some(_) => {}
                    None => {
                        if let Some(inner) = kind {
                            self.collect_definitions(inner, enclosing_namespace);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// Render a type as self-contained JSON for the registry.
    ///
    /// The type is rendered as written, every attribute included. References
    /// to types defined in other files are replaced by their definition at
    /// first use; later uses stay as name references.
    pub fn to_registry_json(
        &self,
        full_type_name: &str,
    ) -> std::result::Result<String, ResolutionCause> {
        let definition = self
            .definitions
            .get(full_type_name)
            .cloned()
            .ok_or_else(|| ResolutionCause::TypeNotDefined(full_type_name.to_string()))?;
        let mut defined = HashSet::new();
        let inlined = self.inline(definition, None, &mut defined);
        Ok(serde_json::to_string(&inlined)?)
    }

    fn inline(
        &self,
        value: Value,
        enclosing_namespace: Option<&str>,
        defined: &mut HashSet<String>,
    ) -> Value {
        match value {
            Value::String(name) => {
                if PRIMITIVE_TYPES.contains(&name.as_str()) {
                    return Value::String(name);
                }
                let full_name = qualify(&name, enclosing_namespace);
                if defined.contains(&full_name) {
                    return Value::String(name);
                }
                match self.definitions.get(&full_name) {
                    Some(definition) => self.inline(definition.clone(), enclosing_namespace, defined),
                    None => Value::String(name),
                }
            }
            Value::Array(variants) => Value::Array(
                variants
                    .into_iter()
                    .map(|variant| self.inline(variant, enclosing_namespace, defined))
                    .collect(),
            ),
            Value::Object(object) => self.inline_object(object, enclosing_namespace, defined),
            other => other,
        }
    }

    fn inline_object(
        &self,
        mut object: Map<String, Value>,
        enclosing_namespace: Option<&str>,
        defined: &mut HashSet<String>,
    ) -> Value {
        let kind = object.get("type").and_then(Value::as_str).map(str::to_string);
        match kind.as_deref() {
            Some("record") | Some("error") | Some("enum") | Some("fixed") => {
                let Some(name) = object.get("name").and_then(Value::as_str) else {
                    return Value::Object(object);
                };
                let namespace = object
                    .get("namespace")
                    .and_then(Value::as_str)
                    .or(enclosing_namespace);
                let full_name = qualify(name, namespace);
                defined.insert(full_name.clone());

                if let Some(Value::Array(fields)) = object.remove("fields") {
                    let record_namespace = full_name.rsplit_once('.').map(|(ns, _)| ns);
                    let fields = fields
                        .into_iter()
                        .map(|field| self.inline_field(field, record_namespace, defined))
                        .collect();
                    object.insert("fields".to_string(), Value::Array(fields));
                }
                Value::Object(object)
            }
            Some("array") => {
                if let Some(items) = object.remove("items") {
                    let items = self.inline(items, enclosing_namespace, defined);
                    object.insert("items".to_string(), items);
                }
                Value::Object(object)
            }
            Some("map") => {
                if let Some(values) = object.remove("values") {
                    let values = self.inline(values, enclosing_namespace, defined);
                    object.insert("values".to_string(), values);
                }
                Value::Object(object)
            }
            _ => {
                if let Some(inner) = object.remove("type") {
                    let inner = self.inline(inner, enclosing_namespace, defined);
                    object.insert("type".to_string(), inner);
                }
                Value::Object(object)
            }
        }
    }

    fn inline_field(
        &self,
        field: Value,
        namespace: Option<&str>,
        defined: &mut HashSet<String>,
    ) -> Value {
        match field {
            Value::Object(mut field) => {
                if let Some(field_type) = field.remove("type") {
                    let field_type = self.inline(field_type, namespace, defined);
                    field.insert("type".to_string(), field_type);
                }
                Value::Object(field)
            }
            other => other,
        }
    }
}

fn qualify(name: &str, namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) if !name.contains('.') && !ns.is_empty() => format!("{ns}.{name}"),
        _ => name.to_string(),
    }
}

/// Read the fully-qualified type name declared by a schema document.
///
/// Only the top-level `namespace` and `name` fields are read; the grammar is
/// not validated here.
pub fn declared_type_name(content: &str) -> std::result::Result<String, ResolutionCause> {
    let document: Value = serde_json::from_str(content)?;
    let name = document
        .get("name")
        .and_then(Value::as_str)
        .ok_or(ResolutionCause::MissingMetadata("name"))?;
    if name.contains('.') {
        return Ok(name.to_string());
    }
    let namespace = document
        .get("namespace")
        .and_then(Value::as_str)
        .ok_or(ResolutionCause::MissingMetadata("namespace"))?;
    Ok(format!("{namespace}.{name}"))
}

/// Resolves schema files against a shared namespace
pub struct TypeResolver<'n> {
    namespace: &'n mut ParsingNamespace,
}

impl<'n> TypeResolver<'n> {
    pub fn new(namespace: &'n mut ParsingNamespace) -> Self {
        Self { namespace }
    }

    /// Resolve a file to its type name and schema.
    ///
    /// A type already present in the namespace is reused instead of parsed.
    pub fn resolve(&mut self, file: &SchemaFile) -> Result<ResolvedSchema> {
        let content = file.read()?;
        let full_type_name =
            declared_type_name(&content).map_err(|e| GateError::resolution(file.path(), e))?;

        debug!(
            "Loading schema for type {} from {}",
            full_type_name,
            file.path().display()
        );

        if let Some(schema) = self.namespace.lookup(&full_type_name) {
            debug!("Reusing already defined type {}", full_type_name);
            return Ok(ResolvedSchema {
                full_type_name,
                schema,
            });
        }

        self.namespace
            .parse(&content)
            .map_err(|e| GateError::resolution(file.path(), e))?;
        let schema = self.namespace.lookup(&full_type_name).ok_or_else(|| {
            GateError::resolution(
                file.path(),
                ResolutionCause::TypeNotDefined(full_type_name.clone()),
            )
        })?;

        Ok(ResolvedSchema {
            full_type_name,
            schema,
        })
    }
}
