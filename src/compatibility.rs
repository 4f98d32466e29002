//! Compatibility evaluation
//!
//! Asks the registry, subject by subject, whether a local schema may replace
//! the latest registered version. A negative answer is recorded as a result;
//! a failed call aborts the run.

use tracing::{debug, error};

use crate::context::{CheckingContext, CompatibilityResult};
use crate::error::{GateError, RemoteError, Result};
use crate::lazy::Memoized;
use crate::registry::RegistryClient;
use crate::schema::ParsingNamespace;

/// Runs the remote compatibility check for each matched subject of a file
pub struct CompatibilityEvaluator<'c, 'p, C> {
    client: &'c Memoized<'p, C, RemoteError>,
}

impl<'c, 'p, C: RegistryClient> CompatibilityEvaluator<'c, 'p, C> {
    pub fn new(client: &'c Memoized<'p, C, RemoteError>) -> Self {
        Self { client }
    }

    /// Evaluate every matching subject in order, appending one result each.
    ///
    /// A context with no matching subjects yields no results and never
    /// touches the client.
    pub fn evaluate(
        &self,
        context: &mut CheckingContext,
        namespace: &ParsingNamespace,
    ) -> Result<()> {
        if context.matching_subjects().is_empty() {
            return Ok(());
        }

        let schema_json = namespace
            .to_registry_json(context.full_type_name())
            .map_err(|e| GateError::resolution(context.file().path(), e))?;

        let subjects = context.matching_subjects().to_vec();
        for subject in subjects {
            debug!(
                "Testing compatibility of {} against subject {}: {}",
                context.full_type_name(),
                subject,
                schema_json
            );

            let compatible = self
                .client
                .get()
                .and_then(|client| client.test_compatibility(&subject, &schema_json))
                .map_err(|e| {
                    error!(
                        "Compatibility check of {} against subject {} failed",
                        context.file().path().display(),
                        subject
                    );
                    GateError::Remote(e)
                })?;

            if !compatible {
                error!(
                    "Incompatibility found between schema type {} and registry subject {}",
                    context.full_type_name(),
                    subject
                );
            }

            let result = CompatibilityResult::new(
                subject,
                context.full_type_name(),
                context.schema().clone(),
                compatible,
            );
            context.push_result(result);
        }
        Ok(())
    }
}
