//! Closure error types and diagnostics.

use std::collections::BTreeMap;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::core::{ManifestRecord, PackagePath};
use crate::sources::LookupError;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Records and errors gathered before a walk was cancelled.
#[derive(Debug, Clone, Default)]
pub struct PartialClosure {
    pub records: BTreeMap<PackagePath, ManifestRecord>,
    pub errors: Vec<(PackagePath, LookupError)>,
}

/// A closure walk that produced no result.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum ClosureError {
    #[error("root package `{package}` could not be resolved")]
    #[diagnostic(code(pkgmeta::closure::root_unresolvable))]
    RootUnresolvable {
        package: PackagePath,
        #[source]
        source: LookupError,
    },

    #[error("closure walk cancelled after {} packages", .partial.records.len())]
    #[diagnostic(code(pkgmeta::closure::cancelled))]
    Cancelled { partial: Box<PartialClosure> },
}

impl ClosureError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ClosureError::RootUnresolvable { .. } => 1,
            ClosureError::Cancelled { .. } => 2,
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ClosureError::RootUnresolvable { package, source } => {
                let mut diag = Diagnostic::error(format!("could not describe `{}`", package))
                    .with_context(source.to_string());

                diag = match source {
                    LookupError::NotFound { .. } => diag.with_suggestion(suggestions::ROOT_NOT_FOUND),
                    LookupError::Malformed { .. } => {
                        diag.with_suggestion(suggestions::MALFORMED_FACT)
                    }
                    _ => diag.with_suggestion(suggestions::LOOKUP_FAILED),
                };

                diag
            }

            ClosureError::Cancelled { partial } => {
                Diagnostic::error("closure walk was cancelled")
                    .with_context(format!(
                        "{} packages fetched, {} failed",
                        partial.records.len(),
                        partial.errors.len()
                    ))
                    .with_suggestion(suggestions::CANCELLED)
            }
        }
    }
}

/// Summarise non-fatal lookup failures as one warning.
pub fn lookup_summary(errors: &[(PackagePath, LookupError)]) -> Option<Diagnostic> {
    if errors.is_empty() {
        return None;
    }

    let noun = if errors.len() == 1 { "package" } else { "packages" };
    let mut diag = Diagnostic::warning(format!(
        "{} {} could not be fetched and are marked incomplete",
        errors.len(),
        noun
    ));
    for (_, error) in errors {
        diag = diag.with_context(error.to_string());
    }
    Some(diag.with_suggestion(suggestions::LOOKUP_FAILED))
}
