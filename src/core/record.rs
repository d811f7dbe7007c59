//! Manifest records - the build facts of one package.
//!
//! A record is created the first time the closure builder sees a package,
//! merged with every later sighting of the same package, and frozen once the
//! closure completes. Merging never overwrites: lists are unioned in
//! first-seen order and scalars that cannot be combined keep their first
//! value and raise a [`MergeConflict`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::coverage::Coverage;
use crate::core::ordered::OrderedSet;
use crate::core::provenance::Provenance;
use crate::core::PackagePath;

/// Role of a source file within its package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileCategory {
    /// Regular buildable source
    Buildable,
    /// Buildable source that binds to C
    Cgo,
    /// Tests compiled into the package
    Test,
    /// Tests compiled as a separate package
    ExternalTest,
    /// Plain C sources
    C,
    /// Headers
    Header,
    /// Assembly sources
    Assembly,
    /// Interface binding definitions
    Binding,
    /// Prebuilt object files added to the archive
    Object,
}

impl FileCategory {
    /// All categories in manifest order.
    pub const ALL: [FileCategory; 9] = [
        FileCategory::Buildable,
        FileCategory::Cgo,
        FileCategory::Test,
        FileCategory::ExternalTest,
        FileCategory::C,
        FileCategory::Header,
        FileCategory::Assembly,
        FileCategory::Binding,
        FileCategory::Object,
    ];

    /// Manifest key for this category's file list.
    pub fn manifest_key(&self) -> &'static str {
        match self {
            FileCategory::Buildable => "buildable-files",
            FileCategory::Cgo => "cgo-files",
            FileCategory::Test => "test-files",
            FileCategory::ExternalTest => "external-test-files",
            FileCategory::C => "c-files",
            FileCategory::Header => "header-files",
            FileCategory::Assembly => "assembly-files",
            FileCategory::Binding => "binding-files",
            FileCategory::Object => "object-files",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.manifest_key().trim_end_matches("-files"))
    }
}

/// Files of one category, split by whether build constraints selected them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryFiles {
    pub included: OrderedSet<String>,
    /// Present on disk but excluded by build constraints. Kept for
    /// diagnostics only, never written to the manifest.
    pub ignored: OrderedSet<String>,
}

/// Source files of a package by category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFiles {
    categories: [CategoryFiles; 9],
}

impl SourceFiles {
    pub fn new() -> Self {
        SourceFiles::default()
    }

    pub fn get(&self, category: FileCategory) -> &CategoryFiles {
        &self.categories[category.index()]
    }

    pub fn get_mut(&mut self, category: FileCategory) -> &mut CategoryFiles {
        &mut self.categories[category.index()]
    }

    /// Files selected for the build in a category.
    pub fn included(&self, category: FileCategory) -> &[String] {
        self.get(category).included.as_slice()
    }

    /// Files excluded by build constraints in a category.
    pub fn ignored(&self, category: FileCategory) -> &[String] {
        self.get(category).ignored.as_slice()
    }

    pub fn add(&mut self, category: FileCategory, file: impl Into<String>) -> bool {
        self.get_mut(category).included.insert(file.into())
    }

    pub fn add_ignored(&mut self, category: FileCategory, file: impl Into<String>) -> bool {
        self.get_mut(category).ignored.insert(file.into())
    }

    /// Union every category with `other`'s, first-seen order.
    pub fn merge(&mut self, other: &SourceFiles) {
        for category in FileCategory::ALL {
            let theirs = other.get(category);
            let ours = self.get_mut(category);
            ours.included.union(&theirs.included);
            ours.ignored.union(&theirs.ignored);
        }
    }

    /// Number of included files across all categories.
    pub fn included_count(&self) -> usize {
        self.categories.iter().map(|c| c.included.len()).sum()
    }

    /// Number of ignored files across all categories.
    pub fn ignored_count(&self) -> usize {
        self.categories.iter().map(|c| c.ignored.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.included_count() == 0 && self.ignored_count() == 0
    }

    /// Drop the ignored lists, keeping only what is written to a manifest.
    pub fn without_ignored(&self) -> SourceFiles {
        let mut files = self.clone();
        for category in &mut files.categories {
            category.ignored = OrderedSet::new();
        }
        files
    }
}

/// Free-form command and environment lists, passed through verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scripts {
    pub environment: Vec<String>,
    pub build_flags: Vec<String>,
    pub build_commands: Vec<String>,
    pub run_commands: Vec<String>,
    pub test_commands: Vec<String>,
}

impl Scripts {
    pub fn is_empty(&self) -> bool {
        self.environment.is_empty()
            && self.build_flags.is_empty()
            && self.build_commands.is_empty()
            && self.run_commands.is_empty()
            && self.test_commands.is_empty()
    }

    /// Append entries of `other` not already present.
    ///
    /// Each list as reported by one fact is kept as-is, repeats included.
    pub fn merge(&mut self, other: &Scripts) {
        append_missing(&mut self.environment, &other.environment);
        append_missing(&mut self.build_flags, &other.build_flags);
        append_missing(&mut self.build_commands, &other.build_commands);
        append_missing(&mut self.run_commands, &other.run_commands);
        append_missing(&mut self.test_commands, &other.test_commands);
    }
}

/// Flags and pkg-config names for compiling and linking C bindings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CgoFlags {
    pub cflags: Vec<String>,
    pub cppflags: Vec<String>,
    pub cxxflags: Vec<String>,
    pub fflags: Vec<String>,
    pub ldflags: Vec<String>,
    pub pkg_config: Vec<String>,
}

impl CgoFlags {
    pub fn is_empty(&self) -> bool {
        self.cflags.is_empty()
            && self.cppflags.is_empty()
            && self.cxxflags.is_empty()
            && self.fflags.is_empty()
            && self.ldflags.is_empty()
            && self.pkg_config.is_empty()
    }

    /// Append flags of `other` not already present, like [`Scripts::merge`].
    pub fn merge(&mut self, other: &CgoFlags) {
        append_missing(&mut self.cflags, &other.cflags);
        append_missing(&mut self.cppflags, &other.cppflags);
        append_missing(&mut self.cxxflags, &other.cxxflags);
        append_missing(&mut self.fflags, &other.fflags);
        append_missing(&mut self.ldflags, &other.ldflags);
        append_missing(&mut self.pkg_config, &other.pkg_config);
    }
}

/// Append the items of `theirs` that `ours` did not hold before the call.
///
/// Repeats within `theirs` survive, so a list reported by one fact is never
/// collapsed.
fn append_missing(ours: &mut Vec<String>, theirs: &[String]) {
    let before = ours.len();
    for item in theirs {
        if !ours[..before].contains(item) {
            ours.push(item.clone());
        }
    }
}

/// Merge an optional scalar: adopt it when absent, report a conflict when
/// both sides differ.
fn merge_scalar(
    ours: &mut Option<String>,
    theirs: &Option<String>,
    package: PackagePath,
    field: &str,
    conflicts: &mut Vec<MergeConflict>,
) {
    let Some(value) = theirs else {
        return;
    };
    match ours.as_deref() {
        None => *ours = Some(value.clone()),
        Some(kept) if kept != value.as_str() => {
            conflicts.push(MergeConflict::new(package, field, kept, value.as_str()));
        }
        Some(_) => {}
    }
}

/// An optional group that failed validation and was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {group} group: {reason}")]
pub struct GroupError {
    pub group: &'static str,
    pub reason: String,
}

impl GroupError {
    pub fn new(group: &'static str, reason: impl Into<String>) -> Self {
        GroupError {
            group,
            reason: reason.into(),
        }
    }
}

/// Two sightings of one package disagreed on a value that cannot be combined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConflict {
    pub package: PackagePath,
    pub field: String,
    pub kept: String,
    pub discarded: String,
}

impl MergeConflict {
    pub fn new(
        package: PackagePath,
        field: impl Into<String>,
        kept: impl Into<String>,
        discarded: impl Into<String>,
    ) -> Self {
        MergeConflict {
            package,
            field: field.into(),
            kept: kept.into(),
            discarded: discarded.into(),
        }
    }
}

impl fmt::Display for MergeConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "conflicting `{}` for `{}`: kept `{}`, discarded `{}`",
            self.field, self.package, self.kept, self.discarded
        )
    }
}

/// A recoverable problem noticed while assembling records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordWarning {
    MergeConflict(MergeConflict),
    InvalidGroup {
        package: PackagePath,
        error: GroupError,
    },
    InvalidImport {
        package: PackagePath,
        import: String,
        reason: String,
    },
}

impl RecordWarning {
    /// The package the warning is about.
    pub fn package(&self) -> PackagePath {
        match self {
            RecordWarning::MergeConflict(conflict) => conflict.package,
            RecordWarning::InvalidGroup { package, .. } => *package,
            RecordWarning::InvalidImport { package, .. } => *package,
        }
    }
}

impl fmt::Display for RecordWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordWarning::MergeConflict(conflict) => conflict.fmt(f),
            RecordWarning::InvalidGroup { package, error } => {
                write!(f, "dropped {} group of `{}`: {}", error.group, package, error.reason)
            }
            RecordWarning::InvalidImport {
                package,
                import,
                reason,
            } => write!(f, "skipped import `{}` of `{}`: {}", import, package, reason),
        }
    }
}

impl From<MergeConflict> for RecordWarning {
    fn from(conflict: MergeConflict) -> Self {
        RecordWarning::MergeConflict(conflict)
    }
}

/// The build facts of one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRecord {
    package: PackagePath,
    pub files: SourceFiles,
    pub imports: OrderedSet<PackagePath>,
    pub test_imports: OrderedSet<PackagePath>,
    pub external_test_imports: OrderedSet<PackagePath>,
    deps: Vec<PackagePath>,
    pub build_tags: OrderedSet<String>,
    pub incomplete: bool,
    pub coverage: Option<Coverage>,
    pub provenance: Option<Provenance>,
    pub scripts: Scripts,
    pub cgo: CgoFlags,
    /// Generated test entry point, when the package has one.
    pub test_main_file: Option<String>,
    /// Toolchain version the package asks to be built with.
    pub toolchain_version: Option<String>,
}

impl ManifestRecord {
    /// Create an empty record.
    pub fn new(package: PackagePath) -> Self {
        ManifestRecord {
            package,
            files: SourceFiles::new(),
            imports: OrderedSet::new(),
            test_imports: OrderedSet::new(),
            external_test_imports: OrderedSet::new(),
            deps: Vec::new(),
            build_tags: OrderedSet::new(),
            incomplete: false,
            coverage: None,
            provenance: None,
            scripts: Scripts::default(),
            cgo: CgoFlags::default(),
            test_main_file: None,
            toolchain_version: None,
        }
    }

    /// Create the record of a package that could not be fetched.
    pub fn unresolved(package: PackagePath) -> Self {
        let mut record = ManifestRecord::new(package);
        record.incomplete = true;
        record
    }

    pub fn package(&self) -> PackagePath {
        self.package
    }

    /// Transitive dependencies, sorted by path. Empty until the closure
    /// completes.
    pub fn deps(&self) -> &[PackagePath] {
        &self.deps
    }

    pub(crate) fn set_deps(&mut self, deps: Vec<PackagePath>) {
        self.deps = deps;
    }

    /// Every directly referenced path: imports, then test imports, then
    /// external test imports.
    pub fn all_imports(&self) -> impl Iterator<Item = &PackagePath> {
        self.imports
            .iter()
            .chain(self.test_imports.iter())
            .chain(self.external_test_imports.iter())
    }

    /// Rewrite every import list through `canonical`, collapsing paths that
    /// end up identical.
    pub(crate) fn canonicalize_imports<F>(&mut self, canonical: F)
    where
        F: Fn(&PackagePath) -> PackagePath,
    {
        self.imports = self.imports.map(&canonical);
        self.test_imports = self.test_imports.map(&canonical);
        self.external_test_imports = self.external_test_imports.map(&canonical);
    }

    /// Whether this record is complete within its closure.
    ///
    /// `resolves` answers whether a path was successfully fetched into the
    /// same closure.
    pub fn is_complete<F>(&self, resolves: F) -> bool
    where
        F: Fn(&PackagePath) -> bool,
    {
        !self.incomplete && self.all_imports().all(|path| resolves(path))
    }

    /// Merge another sighting of the same package into this record.
    ///
    /// Returns the conflicts that could not be reconciled; the first value
    /// is kept for each of them. A record of another package is not merged
    /// at all and comes back as a conflict on `package`.
    pub fn merge(&mut self, other: &ManifestRecord) -> Vec<MergeConflict> {
        if self.package != other.package {
            return vec![MergeConflict::new(
                self.package,
                "package",
                self.package.as_str(),
                other.package.as_str(),
            )];
        }

        let mut conflicts = Vec::new();

        self.files.merge(&other.files);
        self.imports.union(&other.imports);
        self.test_imports.union(&other.test_imports);
        self.external_test_imports.union(&other.external_test_imports);
        self.build_tags.union(&other.build_tags);
        self.incomplete |= other.incomplete;
        self.scripts.merge(&other.scripts);
        self.cgo.merge(&other.cgo);
        merge_scalar(
            &mut self.test_main_file,
            &other.test_main_file,
            self.package,
            "test-main-file",
            &mut conflicts,
        );
        merge_scalar(
            &mut self.toolchain_version,
            &other.toolchain_version,
            self.package,
            "toolchain-version",
            &mut conflicts,
        );

        match (&mut self.coverage, &other.coverage) {
            (Some(ours), Some(theirs)) => conflicts.extend(ours.merge(theirs, self.package)),
            (None, Some(theirs)) => self.coverage = Some(theirs.clone()),
            _ => {}
        }

        match (&mut self.provenance, &other.provenance) {
            (Some(ours), Some(theirs)) => conflicts.extend(ours.merge(theirs, self.package)),
            (None, Some(theirs)) => self.provenance = Some(theirs.clone()),
            _ => {}
        }

        conflicts
    }
}
