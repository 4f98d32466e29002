//! Per-file checking state

use std::rc::Rc;

use apache_avro::Schema;

use crate::error::Incompatibility;
use crate::schema::{ResolvedSchema, SchemaFile};

/// Outcome of checking one local schema against one registry subject
#[derive(Debug, Clone)]
pub struct CompatibilityResult {
    subject: String,
    type_name: String,
    schema: Rc<Schema>,
    compatible: bool,
}

impl CompatibilityResult {
    pub fn new(
        subject: impl Into<String>,
        type_name: impl Into<String>,
        schema: Rc<Schema>,
        compatible: bool,
    ) -> Self {
        Self {
            subject: subject.into(),
            type_name: type_name.into(),
            schema,
            compatible,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn is_compatible(&self) -> bool {
        self.compatible
    }

    pub fn to_incompatibility(&self) -> Option<Incompatibility> {
        (!self.compatible).then(|| Incompatibility {
            type_name: self.type_name.clone(),
            subject: self.subject.clone(),
        })
    }
}

/// Everything learned about a single schema file during a run
#[derive(Debug, Clone)]
pub struct CheckingContext {
    file: SchemaFile,
    resolved: ResolvedSchema,
    matching_subjects: Vec<String>,
    results: Vec<CompatibilityResult>,
}

impl CheckingContext {
    pub fn new(file: SchemaFile, resolved: ResolvedSchema) -> Self {
        Self {
            file,
            resolved,
            matching_subjects: Vec::new(),
            results: Vec::new(),
        }
    }

    pub fn file(&self) -> &SchemaFile {
        &self.file
    }

    pub fn full_type_name(&self) -> &str {
        &self.resolved.full_type_name
    }

    pub fn schema(&self) -> &Rc<Schema> {
        &self.resolved.schema
    }

    pub fn matching_subjects(&self) -> &[String] {
        &self.matching_subjects
    }

    /// Record the registry subjects for this file. Called once per context.
    pub fn add_matching_subjects<I>(&mut self, subjects: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        debug_assert!(self.matching_subjects.is_empty());
        self.matching_subjects
            .extend(subjects.into_iter().map(Into::into));
    }

    pub fn push_result(&mut self, result: CompatibilityResult) {
        self.results.push(result);
    }

    pub fn results(&self) -> &[CompatibilityResult] {
        &self.results
    }

    /// Results with the given outcome
    pub fn results_where(&self, compatible: bool) -> impl Iterator<Item = &CompatibilityResult> {
        self.results
            .iter()
            .filter(move |result| result.is_compatible() == compatible)
    }

    pub fn compatible_count(&self) -> usize {
        self.results_where(true).count()
    }

    pub fn incompatible_count(&self) -> usize {
        self.results_where(false).count()
    }

    /// A file that never reached any registry subject
    pub fn is_unchecked(&self) -> bool {
        self.results.is_empty()
    }
}
