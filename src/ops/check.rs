//! Check a manifest against the closure invariants.

use std::path::Path;

use anyhow::{Context, Result};

use crate::resolver::{encode, ClosureResult, ImportGraph};
use crate::util::diagnostic::{suggestions, Diagnostic, Severity};

/// Outcome of checking one manifest.
#[derive(Debug)]
pub struct CheckReport {
    pub closure: ClosureResult,
    pub findings: Vec<Diagnostic>,
}

impl CheckReport {
    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn is_ok(&self) -> bool {
        self.error_count() == 0
    }

    fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Parse the manifest at `path` and check it.
pub fn check(path: &Path) -> Result<CheckReport> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest: {}", path.display()))?;
    let closure = encode::deserialize(&text)
        .with_context(|| format!("failed to load manifest: {}", path.display()))?;

    let findings = check_closure(&closure);
    Ok(CheckReport { closure, findings })
}

/// Every invariant violation of a decoded closure.
///
/// Missing test imports are warnings only, since test imports may not have
/// been followed.
pub fn check_closure(closure: &ClosureResult) -> Vec<Diagnostic> {
    let mut findings = Vec::new();
    let records = closure.records();

    if closure.record(&closure.root()).is_none() {
        findings.push(
            Diagnostic::error(format!("root package `{}` has no record", closure.root()))
                .with_suggestion(suggestions::REGENERATE),
        );
    }

    let graph = ImportGraph::from_records(records);

    for (package, record) in records {
        if !record.incomplete {
            for import in record.imports.iter() {
                if !records.contains_key(import) {
                    findings.push(
                        Diagnostic::error(format!(
                            "`{}` imports `{}`, which has no record",
                            package, import
                        ))
                        .with_context("complete records must have every import in the closure")
                        .with_suggestion(suggestions::REGENERATE),
                    );
                }
            }
            for import in record
                .test_imports
                .iter()
                .chain(record.external_test_imports.iter())
            {
                if !records.contains_key(import) {
                    findings.push(Diagnostic::warning(format!(
                        "test import `{}` of `{}` has no record",
                        import, package
                    )));
                }
            }
        }

        let deps = record.deps();
        if deps.contains(package) {
            findings.push(
                Diagnostic::error(format!("`{}` lists itself in its deps", package))
                    .with_suggestion(suggestions::REGENERATE),
            );
        }
        if deps.windows(2).any(|pair| pair[0] >= pair[1]) {
            findings.push(
                Diagnostic::error(format!("deps of `{}` are not sorted and unique", package))
                    .with_suggestion(suggestions::REGENERATE),
            );
        }

        let expected = graph.deps(*package);
        if deps != expected.as_slice() {
            let mut diag = Diagnostic::error(format!(
                "deps of `{}` do not match its imports",
                package
            ));
            for missing in expected.iter().filter(|p| !deps.contains(p)) {
                diag = diag.with_context(format!("missing `{}`", missing));
            }
            for extra in deps.iter().filter(|p| !expected.contains(p)) {
                diag = diag.with_context(format!("unexpected `{}`", extra));
            }
            findings.push(diag.with_suggestion(suggestions::REGENERATE));
        }
    }

    let root_record_deps = closure
        .record(&closure.root())
        .map(|record| record.deps())
        .unwrap_or_default();
    if closure.root_deps() != root_record_deps {
        findings.push(
            Diagnostic::error("root-deps differ from the deps of the root record")
                .with_suggestion(suggestions::REGENERATE),
        );
    }

    for (package, error) in closure.errors() {
        match closure.record(package) {
            Some(record) if record.incomplete => {}
            Some(_) => findings.push(Diagnostic::error(format!(
                "`{}` failed to fetch ({}) but is not marked incomplete",
                package,
                error.kind()
            ))),
            None => findings.push(Diagnostic::error(format!(
                "`{}` failed to fetch ({}) but has no record",
                package,
                error.kind()
            ))),
        }
    }

    findings
}
