//! Test fixtures for common closure scenarios.

use std::collections::BTreeMap;

use crate::core::coverage::RawCoverage;
use crate::core::provenance::RawProvenance;
use crate::core::{FileCategory, PackagePath};
use crate::sources::{RawFact, StaticFactSource};

/// Parse a package path that is known to be valid.
pub fn path(p: &str) -> PackagePath {
    PackagePath::parse(p).unwrap()
}

/// Start building a fact.
pub fn fact() -> FactBuilder {
    FactBuilder::default()
}

/// Builder for [`RawFact`] values in tests.
#[derive(Debug, Clone, Default)]
pub struct FactBuilder {
    fact: RawFact,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl FactBuilder {
    /// Report a canonical path other than the requested one.
    pub fn package(mut self, package: &str) -> Self {
        self.fact.package = Some(package.to_string());
        self
    }

    pub fn imports(mut self, imports: &[&str]) -> Self {
        self.fact.imports = strings(imports);
        self
    }

    pub fn test_imports(mut self, imports: &[&str]) -> Self {
        self.fact.test_imports = strings(imports);
        self
    }

    pub fn external_test_imports(mut self, imports: &[&str]) -> Self {
        self.fact.external_test_imports = strings(imports);
        self
    }

    pub fn files(mut self, category: FileCategory, files: &[&str]) -> Self {
        self.fact.files.insert(category, strings(files));
        self
    }

    pub fn ignored(mut self, category: FileCategory, files: &[&str]) -> Self {
        self.fact.ignored_files.insert(category, strings(files));
        self
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.fact.build_tags = strings(tags);
        self
    }

    pub fn incomplete(mut self) -> Self {
        self.fact.incomplete = true;
        self
    }

    /// Set provenance with only a repository URL; the rest defaults.
    pub fn provenance(mut self, repo_url: &str) -> Self {
        self.fact.provenance = Some(RawProvenance {
            repo_url: Some(repo_url.to_string()),
            ..Default::default()
        });
        self
    }

    pub fn coverage(mut self, coverage: RawCoverage) -> Self {
        self.fact.coverage = Some(coverage);
        self
    }

    pub fn cgo_ldflags(mut self, flags: &[&str]) -> Self {
        self.fact.cgo_ldflags = strings(flags);
        self
    }

    pub fn cgo_pkg_config(mut self, names: &[&str]) -> Self {
        self.fact.cgo_pkg_config = strings(names);
        self
    }

    pub fn build_commands(mut self, commands: &[&str]) -> Self {
        self.fact.build_commands = strings(commands);
        self
    }

    pub fn build(self) -> RawFact {
        self.fact
    }
}

/// A small closure with a diamond, a cycle and one missing package.
///
/// ```text
/// app -> lib/a -> lib/b
///     -> lib/b
///     -> lib/c <-> lib/d
///     -> lib/missing
/// ```
pub fn sample_source() -> StaticFactSource {
    StaticFactSource::new()
        .with_fact(
            path("app"),
            fact()
                .imports(&["lib/a", "lib/b", "lib/c", "lib/missing"])
                .files(FileCategory::Buildable, &["main.x"])
                .ignored(FileCategory::Buildable, &["main_windows.x"])
                .tags(&["linux"])
                .build(),
        )
        .with_fact(
            path("lib/a"),
            fact()
                .imports(&["lib/b"])
                .test_imports(&["lib/t"])
                .files(FileCategory::Buildable, &["a.x"])
                .files(FileCategory::Test, &["a_test.x"])
                .provenance("https://example.com/lib/a.git")
                .build(),
        )
        .with_fact(
            path("lib/b"),
            fact()
                .files(FileCategory::C, &["b.c"])
                .files(FileCategory::Header, &["b.h"])
                .build_commands(&["make"])
                .cgo_ldflags(&["-lz"])
                .cgo_pkg_config(&["zlib"])
                .coverage(RawCoverage {
                    mode: Some("set,count".into()),
                    exclude: vec!["_gen\\.c$".into()],
                    file_name: Some("b\\..*".into()),
                    parallel: true,
                    exclude_all: true,
                    labels: BTreeMap::from([("hot".to_string(), 2), ("io".to_string(), 1)]),
                })
                .build(),
        )
        .with_fact(path("lib/c"), fact().imports(&["lib/d"]).build())
        .with_fact(path("lib/d"), fact().imports(&["lib/c"]).build())
        .with_fact(path("lib/t"), fact().build())
}
