//! Transitive dependency lists over the import graph.

use std::collections::BTreeMap;

use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Dfs;

use crate::core::{ManifestRecord, PackagePath};

/// Directed graph of `imports` edges between records.
///
/// Test imports do not contribute to dependency lists.
#[derive(Debug, Clone)]
pub struct ImportGraph {
    graph: DiGraphMap<PackagePath, ()>,
}

impl ImportGraph {
    pub fn from_records(records: &BTreeMap<PackagePath, ManifestRecord>) -> Self {
        let mut graph = DiGraphMap::new();

        for (path, record) in records {
            graph.add_node(*path);
            for import in record.imports.iter() {
                graph.add_edge(*path, *import, ());
            }
        }

        ImportGraph { graph }
    }

    /// Every package reachable from `from`, excluding `from` itself, sorted.
    ///
    /// The walk is iterative and visits each node once, so cycles terminate.
    pub fn deps(&self, from: PackagePath) -> Vec<PackagePath> {
        if !self.graph.contains_node(from) {
            return Vec::new();
        }

        let mut deps = Vec::new();
        let mut dfs = Dfs::new(&self.graph, from);
        while let Some(node) = dfs.next(&self.graph) {
            if node != from {
                deps.push(node);
            }
        }

        deps.sort();
        deps
    }

    /// Fill in `deps` on every record.
    pub fn assign_deps(&self, records: &mut BTreeMap<PackagePath, ManifestRecord>) {
        for (path, record) in records.iter_mut() {
            record.set_deps(self.deps(*path));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &str) -> PackagePath {
        PackagePath::parse(p).unwrap()
    }

    fn records(edges: &[(&str, &[&str])]) -> BTreeMap<PackagePath, ManifestRecord> {
        edges
            .iter()
            .map(|(from, imports)| {
                let mut record = ManifestRecord::new(path(from));
                for import in *imports {
                    record.imports.insert(path(import));
                }
                (path(from), record)
            })
            .collect()
    }

    #[test]
    fn test_diamond() {
        let records = records(&[
            ("app", &["lib/b", "lib/a"]),
            ("lib/a", &["lib/b"]),
            ("lib/b", &[]),
        ]);
        let graph = ImportGraph::from_records(&records);

        assert_eq!(graph.deps(path("app")), vec![path("lib/a"), path("lib/b")]);
        assert_eq!(graph.deps(path("lib/a")), vec![path("lib/b")]);
        assert!(graph.deps(path("lib/b")).is_empty());
    }

    #[test]
    fn test_cycle_excludes_self() {
        let records = records(&[
            ("app", &["lib/c"]),
            ("lib/c", &["lib/d"]),
            ("lib/d", &["lib/c"]),
        ]);
        let graph = ImportGraph::from_records(&records);

        assert_eq!(graph.deps(path("lib/c")), vec![path("lib/d")]);
        assert_eq!(graph.deps(path("lib/d")), vec![path("lib/c")]);
        assert_eq!(graph.deps(path("app")), vec![path("lib/c"), path("lib/d")]);
    }

    #[test]
    fn test_self_import() {
        let records = records(&[("lib/a", &["lib/a"])]);
        let graph = ImportGraph::from_records(&records);

        assert!(graph.deps(path("lib/a")).is_empty());
    }

    #[test]
    fn test_test_imports_do_not_count() {
        let mut records = records(&[("app", &[]), ("lib/t", &[])]);
        if let Some(app) = records.get_mut(&path("app")) {
            app.test_imports.insert(path("lib/t"));
        }

        let graph = ImportGraph::from_records(&records);
        graph.assign_deps(&mut records);

        assert!(records[&path("app")].deps().is_empty());
    }
}
