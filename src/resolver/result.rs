//! ClosureResult - the frozen record set of one root package.

use std::collections::BTreeMap;

use crate::core::{ManifestRecord, PackagePath, RecordWarning};
use crate::sources::LookupError;

/// Every package reachable from a root, with merged facts.
///
/// Records are keyed and iterated by package path. A result is read-only
/// once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosureResult {
    root: PackagePath,
    records: BTreeMap<PackagePath, ManifestRecord>,
    root_deps: Vec<PackagePath>,
    errors: Vec<(PackagePath, LookupError)>,
    warnings: Vec<RecordWarning>,
}

impl ClosureResult {
    pub(crate) fn new(
        root: PackagePath,
        records: BTreeMap<PackagePath, ManifestRecord>,
        errors: Vec<(PackagePath, LookupError)>,
        warnings: Vec<RecordWarning>,
    ) -> Self {
        let root_deps = records
            .get(&root)
            .map(|record| record.deps().to_vec())
            .unwrap_or_default();

        ClosureResult {
            root,
            records,
            root_deps,
            errors,
            warnings,
        }
    }

    pub(crate) fn with_root_deps(mut self, root_deps: Vec<PackagePath>) -> Self {
        self.root_deps = root_deps;
        self
    }

    /// The root package, after alias resolution.
    pub fn root(&self) -> PackagePath {
        self.root
    }

    pub fn records(&self) -> &BTreeMap<PackagePath, ManifestRecord> {
        &self.records
    }

    pub fn record(&self, path: &PackagePath) -> Option<&ManifestRecord> {
        self.records.get(path)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Transitive dependencies of the root, sorted by path.
    pub fn root_deps(&self) -> &[PackagePath] {
        &self.root_deps
    }

    /// Lookup failures in the order they happened.
    pub fn errors(&self) -> &[(PackagePath, LookupError)] {
        &self.errors
    }

    pub fn error_for(&self, path: &PackagePath) -> Option<&LookupError> {
        self.errors
            .iter()
            .find(|(failed, _)| failed == path)
            .map(|(_, error)| error)
    }

    /// Merge conflicts and dropped input, in the order they were noticed.
    pub fn warnings(&self) -> &[RecordWarning] {
        &self.warnings
    }

    /// Whether `path` was fetched successfully into this closure.
    pub fn resolves(&self, path: &PackagePath) -> bool {
        self.records.contains_key(path) && self.error_for(path).is_none()
    }

    /// Whether the record of `path` is complete within this closure.
    ///
    /// Unknown paths are not complete.
    pub fn is_complete(&self, path: &PackagePath) -> bool {
        self.records
            .get(path)
            .is_some_and(|record| record.is_complete(|import| self.resolves(import)))
    }

    /// The part of this result that a manifest carries.
    ///
    /// Ignored files and warnings are diagnostic only.
    pub fn for_manifest(&self) -> ClosureResult {
        let records = self
            .records
            .iter()
            .map(|(path, record)| {
                let mut record = record.clone();
                record.files = record.files.without_ignored();
                (*path, record)
            })
            .collect();

        ClosureResult {
            root: self.root,
            records,
            root_deps: self.root_deps.clone(),
            errors: self.errors.clone(),
            warnings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FileCategory;

    fn path(p: &str) -> PackagePath {
        PackagePath::parse(p).unwrap()
    }

    fn sample() -> ClosureResult {
        let mut app = ManifestRecord::new(path("app"));
        app.imports.insert(path("lib/a"));
        app.imports.insert(path("lib/missing"));
        app.files.add(FileCategory::Buildable, "main.x");
        app.files.add_ignored(FileCategory::Buildable, "main_windows.x");
        app.set_deps(vec![path("lib/a"), path("lib/missing")]);

        let lib = ManifestRecord::new(path("lib/a"));
        let missing = ManifestRecord::unresolved(path("lib/missing"));

        let records = BTreeMap::from([
            (path("app"), app),
            (path("lib/a"), lib),
            (path("lib/missing"), missing),
        ]);
        let errors = vec![(path("lib/missing"), LookupError::not_found(path("lib/missing")))];

        ClosureResult::new(path("app"), records, errors, Vec::new())
    }

    #[test]
    fn test_root_deps_come_from_root_record() {
        let result = sample();
        assert_eq!(result.root_deps(), &[path("lib/a"), path("lib/missing")]);
    }

    #[test]
    fn test_resolves_and_completeness() {
        let result = sample();

        assert!(result.resolves(&path("lib/a")));
        assert!(!result.resolves(&path("lib/missing")));
        assert!(!result.resolves(&path("elsewhere")));

        assert!(result.is_complete(&path("lib/a")));
        assert!(!result.is_complete(&path("app")));
        assert!(!result.is_complete(&path("lib/missing")));
        assert!(!result.is_complete(&path("elsewhere")));
    }

    #[test]
    fn test_for_manifest_drops_ignored_files() {
        let result = sample().for_manifest();
        let app = result.record(&path("app")).unwrap();

        assert_eq!(app.files.included(FileCategory::Buildable), &["main.x"]);
        assert!(app.files.ignored(FileCategory::Buildable).is_empty());
    }
}
