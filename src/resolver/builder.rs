//! Dependency closure builder.
//!
//! Walks imports breadth-first from a root package, fetching each package
//! once and merging every sighting of the same canonical package into one
//! record. Lookup failures degrade a single record; only a failing root or
//! cancellation aborts the walk.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use rayon::prelude::*;
use rayon::ThreadPool;

use crate::core::{ManifestRecord, PackagePath, RecordWarning};
use crate::resolver::deps::ImportGraph;
use crate::resolver::errors::{ClosureError, PartialClosure};
use crate::resolver::result::ClosureResult;
use crate::sources::{FactSource, LookupError, RawFact};
use crate::util::cancel::CancelToken;

/// Builds the closure of a root package over a fact source.
pub struct ClosureBuilder<'a> {
    source: &'a dyn FactSource,
    cancel: CancelToken,
    jobs: usize,
    follow_test_imports: bool,
    observer: Option<&'a dyn Fn(&PackagePath)>,
}

impl<'a> ClosureBuilder<'a> {
    pub fn new(source: &'a dyn FactSource) -> Self {
        ClosureBuilder {
            source,
            cancel: CancelToken::new(),
            jobs: 1,
            follow_test_imports: true,
            observer: None,
        }
    }

    /// Use `cancel` to stop the walk from elsewhere.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fetch up to `jobs` packages at once.
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Whether test and external test imports are walked too.
    pub fn follow_test_imports(mut self, follow: bool) -> Self {
        self.follow_test_imports = follow;
        self
    }

    /// Call `observer` with every path just before it is fetched.
    pub fn observer(mut self, observer: &'a dyn Fn(&PackagePath)) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Build the closure of `root`.
    pub fn build(&self, root: &PackagePath) -> Result<ClosureResult, ClosureError> {
        tracing::debug!(
            "building closure of `{}` from {} source ({} jobs)",
            root,
            self.source.name(),
            self.jobs
        );

        let pool = self.thread_pool();
        let mut walk = Walk::new(*root, self.follow_test_imports);

        loop {
            if self.cancel.is_cancelled() {
                return Err(walk.cancelled());
            }

            let limit = if pool.is_some() { usize::MAX } else { 1 };
            let batch = walk.next_batch(limit);
            if batch.is_empty() {
                break;
            }

            if let Some(observer) = self.observer {
                for path in &batch {
                    observer(path);
                }
            }

            let fetched = self.fetch_batch(&batch, pool.as_ref());

            if self.cancel.is_cancelled() {
                return Err(walk.cancelled());
            }

            for (path, result) in batch.into_iter().zip(fetched) {
                walk.absorb(path, result)?;
            }
        }

        let result = walk.finish();
        tracing::info!(
            "described `{}`: {} packages, {} lookup errors, {} warnings",
            result.root(),
            result.len(),
            result.errors().len(),
            result.warnings().len()
        );
        Ok(result)
    }

    fn thread_pool(&self) -> Option<ThreadPool> {
        if self.jobs <= 1 {
            return None;
        }

        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .thread_name(|i| format!("pkgmeta-fetch-{}", i))
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                tracing::warn!("falling back to serial fetching: {}", e);
                None
            }
        }
    }

    /// Fetch a batch, returning results in batch order.
    fn fetch_batch(
        &self,
        batch: &[PackagePath],
        pool: Option<&ThreadPool>,
    ) -> Vec<Result<RawFact, LookupError>> {
        let source = self.source;
        let cancel = &self.cancel;
        let fetch = |path: &PackagePath| {
            tracing::debug!("fetching `{}`", path);
            source.fetch(path, cancel)
        };

        match pool {
            Some(pool) if batch.len() > 1 => {
                pool.install(|| batch.par_iter().map(fetch).collect())
            }
            _ => batch.iter().map(fetch).collect(),
        }
    }
}

/// Mutable state of one walk. Only the builder thread touches it.
struct Walk {
    root: PackagePath,
    follow_test_imports: bool,
    queue: VecDeque<PackagePath>,
    visited: HashSet<PackagePath>,
    records: BTreeMap<PackagePath, ManifestRecord>,
    /// Requested path to canonical path, for facts that named another.
    aliases: HashMap<PackagePath, PackagePath>,
    errors: Vec<(PackagePath, LookupError)>,
    warnings: Vec<RecordWarning>,
}

impl Walk {
    fn new(root: PackagePath, follow_test_imports: bool) -> Self {
        Walk {
            root,
            follow_test_imports,
            queue: VecDeque::from([root]),
            visited: HashSet::new(),
            records: BTreeMap::new(),
            aliases: HashMap::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Pop up to `limit` unvisited paths, marking them visited.
    fn next_batch(&mut self, limit: usize) -> Vec<PackagePath> {
        let mut batch = Vec::new();
        while batch.len() < limit {
            let Some(path) = self.queue.pop_front() else {
                break;
            };
            if self.visited.insert(path) {
                batch.push(path);
            }
        }
        batch
    }

    fn absorb(
        &mut self,
        path: PackagePath,
        result: Result<RawFact, LookupError>,
    ) -> Result<(), ClosureError> {
        let converted = result.and_then(|fact| fact.into_record(path));

        let (record, warnings) = match converted {
            Ok(converted) => converted,
            Err(error) => {
                if path == self.root {
                    return Err(ClosureError::RootUnresolvable {
                        package: path,
                        source: error,
                    });
                }
                self.fail(path, error);
                return Ok(());
            }
        };

        let canonical = record.package();
        if canonical != path {
            tracing::debug!("`{}` resolves to `{}`", path, canonical);
            self.aliases.insert(path, canonical);
            if !self.visited.contains(&canonical) {
                self.queue.push_back(canonical);
            }
        }

        self.warnings.extend(warnings);
        self.enqueue_imports(&record);

        match self.records.entry(canonical) {
            Entry::Vacant(entry) => {
                entry.insert(record);
            }
            Entry::Occupied(mut entry) => {
                tracing::debug!("merging another sighting of `{}`", canonical);
                for conflict in entry.get_mut().merge(&record) {
                    tracing::warn!("{}", conflict);
                    self.warnings.push(conflict.into());
                }
            }
        }

        Ok(())
    }

    fn fail(&mut self, path: PackagePath, error: LookupError) {
        tracing::warn!("{}", error);
        self.records
            .entry(path)
            .or_insert_with(|| ManifestRecord::unresolved(path))
            .incomplete = true;
        self.errors.push((path, error));
    }

    fn enqueue_imports(&mut self, record: &ManifestRecord) {
        let mut enqueue = |imports: &[PackagePath]| {
            for import in imports {
                if !self.visited.contains(import) {
                    self.queue.push_back(*import);
                }
            }
        };

        enqueue(record.imports.as_slice());
        if self.follow_test_imports {
            enqueue(record.test_imports.as_slice());
            enqueue(record.external_test_imports.as_slice());
        }
    }

    fn cancelled(self) -> ClosureError {
        tracing::warn!("closure walk cancelled with {} packages fetched", self.records.len());
        ClosureError::Cancelled {
            partial: Box::new(PartialClosure {
                records: self.records,
                errors: self.errors,
            }),
        }
    }

    fn finish(mut self) -> ClosureResult {
        if !self.aliases.is_empty() {
            let aliases = &self.aliases;
            for record in self.records.values_mut() {
                record.canonicalize_imports(|path| *aliases.get(path).unwrap_or(path));
            }
        }

        ImportGraph::from_records(&self.records).assign_deps(&mut self.records);

        let root = self.aliases.get(&self.root).copied().unwrap_or(self.root);
        ClosureResult::new(root, self.records, self.errors, self.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FileCategory;
    use crate::sources::StaticFactSource;
    use crate::test_support::{fact, path, InstrumentedSource};
    use std::cell::RefCell;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn build(source: &StaticFactSource, root: &str) -> ClosureResult {
        ClosureBuilder::new(source).build(&path(root)).unwrap()
    }

    fn deps(result: &ClosureResult, p: &str) -> Vec<PackagePath> {
        result.record(&path(p)).unwrap().deps().to_vec()
    }

    #[test]
    fn test_diamond() {
        let source = StaticFactSource::new()
            .with_fact(path("app"), fact().imports(&["lib/a", "lib/b"]).build())
            .with_fact(path("lib/a"), fact().imports(&["lib/b"]).build())
            .with_fact(path("lib/b"), fact().build());

        let result = build(&source, "app");

        assert_eq!(result.len(), 3);
        assert_eq!(deps(&result, "app"), vec![path("lib/a"), path("lib/b")]);
        assert_eq!(deps(&result, "lib/a"), vec![path("lib/b")]);
        assert!(deps(&result, "lib/b").is_empty());
        assert_eq!(result.root_deps(), &[path("lib/a"), path("lib/b")]);
        assert!(result.errors().is_empty());
    }

    #[test]
    fn test_cycle_terminates() {
        let source = StaticFactSource::new()
            .with_fact(path("app"), fact().imports(&["lib/c"]).build())
            .with_fact(path("lib/c"), fact().imports(&["lib/d"]).build())
            .with_fact(path("lib/d"), fact().imports(&["lib/c"]).build());

        let result = build(&source, "app");

        assert_eq!(result.len(), 3);
        assert_eq!(deps(&result, "lib/c"), vec![path("lib/d")]);
        assert_eq!(deps(&result, "lib/d"), vec![path("lib/c")]);
    }

    #[test]
    fn test_missing_dependency_is_not_fatal() {
        let source = StaticFactSource::new()
            .with_fact(path("app"), fact().imports(&["lib/missing"]).build());

        let result = build(&source, "app");

        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].0, path("lib/missing"));
        assert_eq!(result.errors()[0].1.kind(), "not-found");

        let missing = result.record(&path("lib/missing")).unwrap();
        assert!(missing.incomplete);
        assert!(missing.imports.is_empty());
        assert!(!result.is_complete(&path("app")));
        assert!(!result.resolves(&path("lib/missing")));
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let source = StaticFactSource::new();

        let err = ClosureBuilder::new(&source).build(&path("app")).unwrap_err();

        match err {
            ClosureError::RootUnresolvable { package, source } => {
                assert_eq!(package, path("app"));
                assert_eq!(source, LookupError::not_found(path("app")));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_each_package_fetched_once() {
        let counter = AtomicUsize::new(0);
        let inner = StaticFactSource::new()
            .with_fact(path("app"), fact().imports(&["lib/a", "lib/b"]).build())
            .with_fact(path("lib/a"), fact().imports(&["lib/b", "app"]).build())
            .with_fact(path("lib/b"), fact().imports(&["lib/a"]).test_imports(&["app"]).build());
        let source = InstrumentedSource::new(&inner).counting(&counter);

        let result = ClosureBuilder::new(&source).build(&path("app")).unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_alias_merges_into_canonical_record() {
        let source = StaticFactSource::new()
            .with_fact(path("app"), fact().imports(&["real/a", "vanity/a"]).build())
            .with_fact(
                path("real/a"),
                fact().files(FileCategory::Buildable, &["a.x", "b.x"]).build(),
            )
            .with_fact(
                path("vanity/a"),
                fact()
                    .package("real/a")
                    .files(FileCategory::Buildable, &["b.x", "c.x"])
                    .imports(&["lib/z"])
                    .build(),
            )
            .with_fact(path("lib/z"), fact().build());

        let result = build(&source, "app");

        assert!(result.record(&path("vanity/a")).is_none());
        let real = result.record(&path("real/a")).unwrap();
        assert_eq!(
            real.files.included(FileCategory::Buildable),
            &["a.x", "b.x", "c.x"]
        );
        assert_eq!(real.imports.as_slice(), &[path("lib/z")]);

        let app = result.record(&path("app")).unwrap();
        assert_eq!(app.imports.as_slice(), &[path("real/a")]);
        assert_eq!(deps(&result, "app"), vec![path("lib/z"), path("real/a")]);
    }

    #[test]
    fn test_alias_seen_first_still_fetches_canonical() {
        let source = StaticFactSource::new()
            .with_fact(path("app"), fact().imports(&["vanity/a", "real/a"]).build())
            .with_fact(
                path("vanity/a"),
                fact()
                    .package("real/a")
                    .files(FileCategory::Buildable, &["v.x"])
                    .build(),
            )
            .with_fact(
                path("real/a"),
                fact().files(FileCategory::Buildable, &["a.x"]).build(),
            );

        let serial = build(&source, "app");
        let real = serial.record(&path("real/a")).unwrap();
        assert_eq!(real.files.included(FileCategory::Buildable), &["v.x", "a.x"]);
        assert!(serial.errors().is_empty());

        let parallel = ClosureBuilder::new(&source)
            .jobs(4)
            .build(&path("app"))
            .unwrap();
        assert_eq!(parallel, serial);
    }

    #[test]
    fn test_alias_only_import_fetches_canonical() {
        let inner = StaticFactSource::new()
            .with_fact(path("app"), fact().imports(&["vanity/a"]).build())
            .with_fact(
                path("vanity/a"),
                fact().package("real/a").files(FileCategory::Buildable, &["v.x"]).build(),
            )
            .with_fact(
                path("real/a"),
                fact().files(FileCategory::Buildable, &["a.x"]).build(),
            );
        let counter = AtomicUsize::new(0);
        let source = InstrumentedSource::new(&inner).counting(&counter);

        let result = ClosureBuilder::new(&source).build(&path("app")).unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 3);
        let real = result.record(&path("real/a")).unwrap();
        assert_eq!(real.files.included(FileCategory::Buildable), &["v.x", "a.x"]);
        assert_eq!(deps(&result, "app"), vec![path("real/a")]);
    }

    #[test]
    fn test_merge_conflicts_become_warnings() {
        let source = StaticFactSource::new()
            .with_fact(path("app"), fact().imports(&["a", "b"]).build())
            .with_fact(
                path("a"),
                fact().package("lib").provenance("https://example.com/one.git").build(),
            )
            .with_fact(
                path("b"),
                fact().package("lib").provenance("https://example.com/two.git").build(),
            )
            .with_fact(path("lib"), fact().build());

        let result = build(&source, "app");

        let lib = result.record(&path("lib")).unwrap();
        assert_eq!(
            lib.provenance.as_ref().unwrap().repo_url().as_str(),
            "https://example.com/one.git"
        );
        assert_eq!(result.warnings().len(), 1);
        assert!(matches!(
            &result.warnings()[0],
            RecordWarning::MergeConflict(c) if c.field == "provenance.repo-url"
        ));
    }

    #[test]
    fn test_test_imports_can_be_skipped() {
        let source = StaticFactSource::new()
            .with_fact(
                path("app"),
                fact().imports(&["lib/a"]).test_imports(&["lib/t"]).build(),
            )
            .with_fact(path("lib/a"), fact().external_test_imports(&["lib/x"]).build())
            .with_fact(path("lib/t"), fact().build())
            .with_fact(path("lib/x"), fact().build());

        let followed = build(&source, "app");
        assert_eq!(followed.len(), 4);
        assert!(followed.is_complete(&path("app")));

        let skipped = ClosureBuilder::new(&source)
            .follow_test_imports(false)
            .build(&path("app"))
            .unwrap();
        assert_eq!(skipped.len(), 2);
        assert!(skipped.record(&path("lib/t")).is_none());
    }

    #[test]
    fn test_parallel_matches_serial() {
        let source = StaticFactSource::new()
            .with_fact(path("app"), fact().imports(&["l/1", "l/2", "l/3", "l/4"]).build())
            .with_fact(path("l/1"), fact().imports(&["l/5", "l/6"]).build())
            .with_fact(path("l/2"), fact().imports(&["l/6", "l/missing"]).build())
            .with_fact(path("l/3"), fact().imports(&["l/6"]).tags(&["x"]).build())
            .with_fact(path("l/4"), fact().imports(&["app"]).build())
            .with_fact(path("l/5"), fact().imports(&["l/1"]).build())
            .with_fact(path("l/6"), fact().tags(&["y"]).build());

        let serial = build(&source, "app");
        for jobs in [2, 4, 8] {
            let parallel = ClosureBuilder::new(&source)
                .jobs(jobs)
                .build(&path("app"))
                .unwrap();
            assert_eq!(parallel, serial, "jobs = {}", jobs);
        }
    }

    #[test]
    fn test_observer_sees_fetch_order() {
        let source = StaticFactSource::new()
            .with_fact(path("app"), fact().imports(&["lib/b", "lib/a"]).build())
            .with_fact(path("lib/b"), fact().imports(&["lib/c"]).build())
            .with_fact(path("lib/a"), fact().build())
            .with_fact(path("lib/c"), fact().build());

        let seen = RefCell::new(Vec::new());
        let observer = |p: &PackagePath| seen.borrow_mut().push(p.to_string());
        ClosureBuilder::new(&source)
            .observer(&observer)
            .build(&path("app"))
            .unwrap();

        assert_eq!(*seen.borrow(), vec!["app", "lib/b", "lib/a", "lib/c"]);
    }

    #[test]
    fn test_cancelled_before_start() {
        let source = StaticFactSource::new().with_fact(path("app"), fact().build());
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = ClosureBuilder::new(&source)
            .with_cancel(cancel)
            .build(&path("app"))
            .unwrap_err();

        match err {
            ClosureError::Cancelled { partial } => assert!(partial.records.is_empty()),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_cancelled_mid_walk_keeps_partial_records() {
        let inner = StaticFactSource::new()
            .with_fact(path("app"), fact().imports(&["lib/a"]).build())
            .with_fact(path("lib/a"), fact().imports(&["lib/b"]).build())
            .with_fact(path("lib/b"), fact().build());
        let cancel = CancelToken::new();
        let source = InstrumentedSource::new(&inner).cancel_on(path("lib/a"), cancel.clone());

        let err = ClosureBuilder::new(&source)
            .with_cancel(cancel)
            .build(&path("app"))
            .unwrap_err();

        match err {
            ClosureError::Cancelled { partial } => {
                assert_eq!(partial.records.len(), 1);
                assert!(partial.records.contains_key(&path("app")));
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
