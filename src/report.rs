//! Run reports
//!
//! The report is the only place incompatibilities turn into a failure: every
//! file is evaluated first, then [`RunReport::ensure_compatible`] decides.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::context::CheckingContext;
use crate::error::{GateError, Incompatibility, Result};

/// Per-file counts for the summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    pub file: String,
    pub type_name: String,
    pub matched_subjects: Vec<String>,
    pub compatible_subjects: usize,
    pub incompatible_subjects: usize,
}

/// Serializable form of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct JsonReport {
    pub generated_at: DateTime<Utc>,
    pub compatible: bool,
    pub files: Vec<FileSummary>,
    pub incompatibilities: Vec<JsonIncompatibility>,
    pub unchecked_files: Vec<String>,
    pub unresolved_subjects: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonIncompatibility {
    pub type_name: String,
    pub subject: String,
}

/// Outcome of a run that was not aborted
#[derive(Debug, Clone)]
pub struct RunReport {
    contexts: Vec<CheckingContext>,
    unresolved_subjects: Vec<String>,
}

impl RunReport {
    pub fn new(contexts: Vec<CheckingContext>, unresolved_subjects: Vec<String>) -> Self {
        Self {
            contexts,
            unresolved_subjects,
        }
    }

    pub fn contexts(&self) -> &[CheckingContext] {
        &self.contexts
    }

    /// No files were discovered at all
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Registry subjects the naming convention could not parse
    pub fn unresolved_subjects(&self) -> &[String] {
        &self.unresolved_subjects
    }

    /// Every failed (type, subject) pair across all files
    pub fn incompatibilities(&self) -> Vec<Incompatibility> {
        self.contexts
            .iter()
            .flat_map(|context| context.results())
            .filter_map(|result| result.to_incompatibility())
            .collect()
    }

    pub fn is_compatible(&self) -> bool {
        self.contexts
            .iter()
            .all(|context| context.incompatible_count() == 0)
    }

    /// Files that were parsed but never checked against a subject
    pub fn unchecked_files(&self) -> Vec<&CheckingContext> {
        self.contexts
            .iter()
            .filter(|context| context.is_unchecked())
            .collect()
    }

    pub fn file_summaries(&self) -> Vec<FileSummary> {
        self.contexts
            .iter()
            .map(|context| FileSummary {
                file: context.file().display_name(),
                type_name: context.full_type_name().to_string(),
                matched_subjects: context.matching_subjects().to_vec(),
                compatible_subjects: context.compatible_count(),
                incompatible_subjects: context.incompatible_count(),
            })
            .collect()
    }

    /// Turn collected incompatibilities into the run's failure
    pub fn ensure_compatible(&self) -> Result<()> {
        let incompatibilities = self.incompatibilities();
        if incompatibilities.is_empty() {
            Ok(())
        } else {
            Err(GateError::Incompatible { incompatibilities })
        }
    }

    pub fn to_json(&self) -> JsonReport {
        JsonReport {
            generated_at: Utc::now(),
            compatible: self.is_compatible(),
            files: self.file_summaries(),
            incompatibilities: self
                .incompatibilities()
                .into_iter()
                .map(|i| JsonIncompatibility {
                    type_name: i.type_name,
                    subject: i.subject,
                })
                .collect(),
            unchecked_files: self
                .unchecked_files()
                .iter()
                .map(|context| context.file().display_name())
                .collect(),
            unresolved_subjects: self.unresolved_subjects.clone(),
        }
    }

    /// Human-readable report
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        if self.is_empty() {
            let _ = writeln!(out, "⚠️  No schema files found to be checked for compatibility.");
            return out;
        }

        let _ = writeln!(out, "🔍 Checked {} schema file(s):", self.contexts.len());
        for summary in self.file_summaries() {
            let marker = if summary.incompatible_subjects > 0 {
                "❌"
            } else if summary.compatible_subjects == 0 {
                "⚠️ "
            } else {
                "✅"
            };
            let _ = writeln!(
                out,
                "  {} {} ({}) - compatible_subjects={}, incompatible_subjects={}",
                marker,
                summary.file,
                summary.type_name,
                summary.compatible_subjects,
                summary.incompatible_subjects
            );
        }

        let incompatibilities = self.incompatibilities();
        if !incompatibilities.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "❌ {} incompatibility(ies):", incompatibilities.len());
            for incompatibility in &incompatibilities {
                let _ = writeln!(out, "   └─ {}", incompatibility);
            }
        }

        let unchecked = self.unchecked_files();
        if !unchecked.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "⚠️  {} schema(s) were NOT CHECKED against any registry subject:",
                unchecked.len()
            );
            for context in unchecked {
                let _ = writeln!(out, "   - {}", context.file().display_name());
            }
        }

        if !self.unresolved_subjects.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "ℹ️  {} registry subject(s) did not match the naming pattern",
                self.unresolved_subjects.len()
            );
        }

        out
    }
}
