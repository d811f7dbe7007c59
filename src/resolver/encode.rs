//! Manifest encoding and decoding.
//!
//! A manifest is the TOML rendering of one [`ClosureResult`]. Records are
//! emitted sorted by package path with fields in a fixed order, and every
//! empty field is omitted, so the same closure always produces the same
//! bytes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::coverage::RawCoverage;
use crate::core::provenance::RawProvenance;
use crate::core::{
    CgoFlags, Coverage, FileCategory, GroupError, InvalidPackagePath, ManifestRecord,
    PackagePath, Provenance, Scripts,
};
use crate::resolver::result::ClosureResult;
use crate::sources::LookupError;
use crate::util::hash;

/// Current manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// Comment written above every generated manifest.
pub const HEADER: &str = "# This file is automatically generated by pkgmeta.\n\
                          # It is not intended for manual editing.\n\n";

/// Errors reading or writing a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to parse manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render manifest: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("unsupported manifest version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error(transparent)]
    InvalidPath(#[from] InvalidPackagePath),

    #[error("package `{package}` has an {source}")]
    InvalidGroup {
        package: PackagePath,
        #[source]
        source: GroupError,
    },

    #[error("package `{0}` appears more than once")]
    DuplicatePackage(PackagePath),

    #[error("error entry for `{package}` has unknown kind `{kind}`")]
    UnknownErrorKind { package: PackagePath, kind: String },
}

/// On-disk layout of a manifest.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ManifestFile {
    version: u32,

    root: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    root_deps: Vec<String>,

    #[serde(rename = "package", default, skip_serializing_if = "Vec::is_empty")]
    packages: Vec<ManifestEntry>,

    #[serde(rename = "error", default, skip_serializing_if = "Vec::is_empty")]
    errors: Vec<ErrorEntry>,
}

/// One record. Field order here is the emitted key order.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ManifestEntry {
    package: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    imports: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    test_imports: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    external_test_imports: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    deps: Vec<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    incomplete: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    buildable_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    cgo_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    test_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    external_test_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    c_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    header_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    assembly_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    binding_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    object_files: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    build_tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    test_main_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    toolchain_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    coverage: Option<CoverageEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    provenance: Option<ProvenanceEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    scripts: Option<ScriptsEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    cgo: Option<CgoEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CoverageEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mode: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    exclude: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_name: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    parallel: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    exclude_all: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    labels: BTreeMap<String, u32>,
}

/// Depth is always written: its default differs from zero.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ProvenanceEntry {
    repo_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resolved_version: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ScriptsEntry {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    env: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    build_flags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    build: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    run: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    test: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CgoEntry {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    cflags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    cppflags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    cxxflags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    fflags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    ldflags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pkg_config: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorEntry {
    package: String,
    kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    message: String,
}

fn paths<'a>(items: impl IntoIterator<Item = &'a PackagePath>) -> Vec<String> {
    items.into_iter().map(|p| p.to_string()).collect()
}

impl ManifestEntry {
    fn from_record(record: &ManifestRecord) -> Self {
        let files = |category: FileCategory| record.files.included(category).to_vec();

        ManifestEntry {
            package: record.package().to_string(),
            imports: paths(record.imports.iter()),
            test_imports: paths(record.test_imports.iter()),
            external_test_imports: paths(record.external_test_imports.iter()),
            deps: paths(record.deps()),
            incomplete: record.incomplete,
            buildable_files: files(FileCategory::Buildable),
            cgo_files: files(FileCategory::Cgo),
            test_files: files(FileCategory::Test),
            external_test_files: files(FileCategory::ExternalTest),
            c_files: files(FileCategory::C),
            header_files: files(FileCategory::Header),
            assembly_files: files(FileCategory::Assembly),
            binding_files: files(FileCategory::Binding),
            object_files: files(FileCategory::Object),
            build_tags: record.build_tags.as_slice().to_vec(),
            test_main_file: record.test_main_file.clone(),
            toolchain_version: record.toolchain_version.clone(),
            coverage: record.coverage.as_ref().map(CoverageEntry::from_coverage),
            provenance: record.provenance.as_ref().map(ProvenanceEntry::from_provenance),
            scripts: ScriptsEntry::from_scripts(&record.scripts),
            cgo: CgoEntry::from_flags(&record.cgo),
        }
    }

    fn files_mut(&mut self, category: FileCategory) -> &mut Vec<String> {
        match category {
            FileCategory::Buildable => &mut self.buildable_files,
            FileCategory::Cgo => &mut self.cgo_files,
            FileCategory::Test => &mut self.test_files,
            FileCategory::ExternalTest => &mut self.external_test_files,
            FileCategory::C => &mut self.c_files,
            FileCategory::Header => &mut self.header_files,
            FileCategory::Assembly => &mut self.assembly_files,
            FileCategory::Binding => &mut self.binding_files,
            FileCategory::Object => &mut self.object_files,
        }
    }

    fn into_record(mut self) -> Result<ManifestRecord, ManifestError> {
        let package = PackagePath::parse(&self.package)?;
        let mut record = ManifestRecord::new(package);

        for category in FileCategory::ALL {
            for file in std::mem::take(self.files_mut(category)) {
                record.files.add(category, file);
            }
        }

        record.imports = parse_paths(&self.imports)?.into_iter().collect();
        record.test_imports = parse_paths(&self.test_imports)?.into_iter().collect();
        record.external_test_imports =
            parse_paths(&self.external_test_imports)?.into_iter().collect();
        record.set_deps(parse_paths(&self.deps)?);
        record.incomplete = self.incomplete;
        record.build_tags = self.build_tags.into_iter().collect();
        record.test_main_file = self.test_main_file;
        record.toolchain_version = self.toolchain_version;

        let invalid = |source| ManifestError::InvalidGroup { package, source };
        if let Some(entry) = self.coverage {
            record.coverage = Some(Coverage::from_raw(entry.into_raw()).map_err(invalid)?);
        }
        if let Some(entry) = self.provenance {
            record.provenance = Some(Provenance::from_raw(entry.into_raw()).map_err(invalid)?);
        }
        if let Some(entry) = self.scripts {
            record.scripts = entry.into_scripts();
        }
        if let Some(entry) = self.cgo {
            record.cgo = entry.into_flags();
        }

        Ok(record)
    }
}

impl CoverageEntry {
    fn from_coverage(coverage: &Coverage) -> Self {
        CoverageEntry {
            mode: Some(coverage.mode()),
            exclude: coverage.exclude_patterns().to_vec(),
            file_name: Some(coverage.file_name_pattern().to_string()),
            parallel: coverage.parallel(),
            exclude_all: coverage.exclude_all(),
            labels: coverage.labels().clone(),
        }
    }

    fn into_raw(self) -> RawCoverage {
        RawCoverage {
            mode: self.mode,
            exclude: self.exclude,
            file_name: self.file_name,
            parallel: self.parallel,
            exclude_all: self.exclude_all,
            labels: self
                .labels
                .into_iter()
                .map(|(label, weight)| (label, i64::from(weight)))
                .collect(),
        }
    }
}

impl ProvenanceEntry {
    fn from_provenance(provenance: &Provenance) -> Self {
        ProvenanceEntry {
            repo_url: provenance.repo_url().to_string(),
            branch: Some(provenance.branch().to_string()),
            sub_path: Some(provenance.sub_path().to_string()),
            depth: Some(provenance.depth()),
            resolved_version: Some(provenance.resolved_version().to_string()),
        }
    }

    fn into_raw(self) -> RawProvenance {
        RawProvenance {
            repo_url: Some(self.repo_url),
            branch: self.branch,
            sub_path: self.sub_path,
            depth: self.depth.map(i64::from),
            resolved_version: self.resolved_version,
        }
    }
}

impl ScriptsEntry {
    fn from_scripts(scripts: &Scripts) -> Option<Self> {
        if scripts.is_empty() {
            return None;
        }
        Some(ScriptsEntry {
            env: scripts.environment.clone(),
            build_flags: scripts.build_flags.clone(),
            build: scripts.build_commands.clone(),
            run: scripts.run_commands.clone(),
            test: scripts.test_commands.clone(),
        })
    }

    fn into_scripts(self) -> Scripts {
        Scripts {
            environment: self.env,
            build_flags: self.build_flags,
            build_commands: self.build,
            run_commands: self.run,
            test_commands: self.test,
        }
    }
}

impl CgoEntry {
    fn from_flags(flags: &CgoFlags) -> Option<Self> {
        if flags.is_empty() {
            return None;
        }
        Some(CgoEntry {
            cflags: flags.cflags.clone(),
            cppflags: flags.cppflags.clone(),
            cxxflags: flags.cxxflags.clone(),
            fflags: flags.fflags.clone(),
            ldflags: flags.ldflags.clone(),
            pkg_config: flags.pkg_config.clone(),
        })
    }

    fn into_flags(self) -> CgoFlags {
        CgoFlags {
            cflags: self.cflags,
            cppflags: self.cppflags,
            cxxflags: self.cxxflags,
            fflags: self.fflags,
            ldflags: self.ldflags,
            pkg_config: self.pkg_config,
        }
    }
}

fn parse_paths(raw: &[String]) -> Result<Vec<PackagePath>, ManifestError> {
    raw.iter()
        .map(|p| PackagePath::parse(p).map_err(ManifestError::from))
        .collect()
}

/// Render a closure as a manifest, with the generated-file header.
pub fn serialize(result: &ClosureResult) -> Result<String, ManifestError> {
    serialize_with_header(result, true)
}

/// Render a closure as a manifest.
pub fn serialize_with_header(
    result: &ClosureResult,
    header: bool,
) -> Result<String, ManifestError> {
    let file = ManifestFile {
        version: MANIFEST_VERSION,
        root: result.root().to_string(),
        root_deps: paths(result.root_deps()),
        packages: result
            .records()
            .values()
            .map(ManifestEntry::from_record)
            .collect(),
        errors: result
            .errors()
            .iter()
            .map(|(package, error)| ErrorEntry {
                package: package.to_string(),
                kind: error.kind().to_string(),
                message: error.message().to_string(),
            })
            .collect(),
    };

    let body = toml::to_string(&file)?;
    if header {
        Ok(format!("{}{}", HEADER, body))
    } else {
        Ok(body)
    }
}

/// Parse a manifest back into a closure.
///
/// Ignored files and warnings are never written, so the result carries
/// none.
pub fn deserialize(text: &str) -> Result<ClosureResult, ManifestError> {
    let file: ManifestFile = toml::from_str(text)?;

    if file.version != MANIFEST_VERSION {
        return Err(ManifestError::UnsupportedVersion {
            found: file.version,
            expected: MANIFEST_VERSION,
        });
    }

    let root = PackagePath::parse(&file.root)?;
    let root_deps = parse_paths(&file.root_deps)?;

    let mut records = BTreeMap::new();
    for entry in file.packages {
        let record = entry.into_record()?;
        let package = record.package();
        if records.insert(package, record).is_some() {
            return Err(ManifestError::DuplicatePackage(package));
        }
    }

    let mut errors = Vec::with_capacity(file.errors.len());
    for entry in file.errors {
        let package = PackagePath::parse(&entry.package)?;
        let error = LookupError::from_parts(package, &entry.kind, &entry.message).ok_or(
            ManifestError::UnknownErrorKind {
                package,
                kind: entry.kind.clone(),
            },
        )?;
        errors.push((package, error));
    }

    Ok(ClosureResult::new(root, records, errors, Vec::new()).with_root_deps(root_deps))
}

/// Content digest of manifest text, for freshness checks.
pub fn digest(text: &str) -> String {
    hash::sha256_str(text)
}
