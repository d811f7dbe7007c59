//! Raw per-package facts, exactly as a fact source reports them.
//!
//! Nothing here is validated until [`RawFact::into_record`] turns it into a
//! [`ManifestRecord`].

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::coverage::RawCoverage;
use crate::core::provenance::RawProvenance;
use crate::core::{
    CgoFlags, Coverage, FileCategory, ManifestRecord, OrderedSet, PackagePath, Provenance,
    RecordWarning, Scripts,
};
use crate::sources::source::LookupError;

/// Unmerged facts for a single package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RawFact {
    /// Canonical path, when it differs from the requested one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,

    /// Package directory on disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub files: BTreeMap<FileCategory, Vec<String>>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub ignored_files: BTreeMap<FileCategory, Vec<String>>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub test_imports: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub external_test_imports: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub build_tags: Vec<String>,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub incomplete: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<RawCoverage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<RawProvenance>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub environment: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub build_flags: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub build_commands: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub run_commands: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub test_commands: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cgo_cflags: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cgo_cppflags: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cgo_cxxflags: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cgo_fflags: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cgo_ldflags: Vec<String>,

    /// pkg-config package names for the C bindings.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cgo_pkg_config: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_main_file: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub toolchain_version: Option<String>,
}

impl RawFact {
    /// The path these facts belong to.
    ///
    /// That is the reported `package` if present, else `requested`.
    pub fn canonical_package(&self, requested: PackagePath) -> Result<PackagePath, LookupError> {
        match self.package.as_deref() {
            None => Ok(requested),
            Some(reported) => PackagePath::parse(reported)
                .map_err(|e| LookupError::malformed(requested, e.to_string())),
        }
    }

    /// Validate these facts into a record.
    ///
    /// Invalid imports and optional groups are dropped with a warning. Only
    /// an invalid reported package path fails the whole fact.
    pub fn into_record(
        self,
        requested: PackagePath,
    ) -> Result<(ManifestRecord, Vec<RecordWarning>), LookupError> {
        let package = self.canonical_package(requested)?;
        let mut record = ManifestRecord::new(package);
        let mut warnings = Vec::new();

        for (category, files) in self.files {
            for file in files {
                record.files.add(category, file);
            }
        }
        for (category, files) in self.ignored_files {
            for file in files {
                record.files.add_ignored(category, file);
            }
        }

        record.imports = parse_imports(package, self.imports, &mut warnings);
        record.test_imports = parse_imports(package, self.test_imports, &mut warnings);
        record.external_test_imports =
            parse_imports(package, self.external_test_imports, &mut warnings);

        record.build_tags = self.build_tags.into_iter().collect();
        record.incomplete = self.incomplete;

        if let Some(raw) = self.coverage {
            match Coverage::from_raw(raw) {
                Ok(coverage) => record.coverage = Some(coverage),
                Err(error) => warnings.push(RecordWarning::InvalidGroup { package, error }),
            }
        }
        if let Some(raw) = self.provenance {
            match Provenance::from_raw(raw) {
                Ok(provenance) => record.provenance = Some(provenance),
                Err(error) => warnings.push(RecordWarning::InvalidGroup { package, error }),
            }
        }

        record.scripts = Scripts {
            environment: self.environment,
            build_flags: self.build_flags,
            build_commands: self.build_commands,
            run_commands: self.run_commands,
            test_commands: self.test_commands,
        };
        record.cgo = CgoFlags {
            cflags: self.cgo_cflags,
            cppflags: self.cgo_cppflags,
            cxxflags: self.cgo_cxxflags,
            fflags: self.cgo_fflags,
            ldflags: self.cgo_ldflags,
            pkg_config: self.cgo_pkg_config,
        };
        record.test_main_file = non_blank(self.test_main_file);
        record.toolchain_version = non_blank(self.toolchain_version);

        Ok((record, warnings))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_imports(
    package: PackagePath,
    raw: Vec<String>,
    warnings: &mut Vec<RecordWarning>,
) -> OrderedSet<PackagePath> {
    let mut imports = OrderedSet::new();
    for import in raw {
        match PackagePath::parse(&import) {
            Ok(path) => {
                imports.insert(path);
            }
            Err(e) => warnings.push(RecordWarning::InvalidImport {
                package,
                import,
                reason: e.reason.to_string(),
            }),
        }
    }
    imports
}
