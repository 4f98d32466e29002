//! Schema Compatibility Gate
//!
//! Verifies that locally authored Avro schemas stay compatible with the
//! versions already registered in a remote schema registry, so a build can be
//! refused before a breaking change ships.
//!
//! ## Pipeline
//!
//! ```text
//! file sets ──► TypeResolver ──► SubjectMatcher ──► CompatibilityEvaluator ──► RunReport
//!                   │                  │                     │
//!            ParsingNamespace   subject list (lazy)   registry client (lazy)
//! ```
//!
//! - **Type resolution**: each file yields its fully-qualified type name and a
//!   parsed schema; one namespace per run makes earlier definitions and imports
//!   visible to later files.
//! - **Subject matching**: a regex with a `schematypefullname` group maps
//!   registry subjects onto type names.
//! - **Evaluation**: the registry decides compatibility per matched subject.
//! - **Reporting**: incompatibilities are collected across all files and only
//!   then turned into a failure.
//!
//! The compatibility decision itself is the registry's; this crate only decides
//! what is checked against what.

pub mod checksum;
pub mod compatibility;
pub mod config;
pub mod context;
pub mod discovery;
pub mod error;
pub mod lazy;
pub mod registry;
pub mod report;
pub mod run;
pub mod schema;
pub mod subjects;

pub use compatibility::CompatibilityEvaluator;
pub use config::{GateConfig, ReportFormat};
pub use context::{CheckingContext, CompatibilityResult};
pub use discovery::FileSet;
pub use error::{GateError, Incompatibility, RemoteError, ResolutionCause, Result};
pub use lazy::Memoized;
pub use registry::{HttpRegistryClient, RegistryClient};
pub use report::RunReport;
pub use run::CompatibilityRun;
pub use schema::{ParsingNamespace, ResolvedSchema, SchemaFile, TypeResolver};
pub use subjects::{SubjectIndex, SubjectMatcher};
