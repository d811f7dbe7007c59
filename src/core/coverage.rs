//! Coverage instrumentation settings.
//!
//! A record either carries a fully validated [`Coverage`] group or none at
//! all. Raw settings from a fact source are completed with defaults and
//! checked here before they can reach a record.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::ordered::OrderedSet;
use crate::core::record::{GroupError, MergeConflict};
use crate::core::PackagePath;

/// Coverage mode used when the fact source does not name one.
pub const DEFAULT_COVER_MODE: &str = "set";

/// File name pattern used when the fact source does not name one.
pub const DEFAULT_FILE_NAME_PATTERN: &str = ".*";

/// Coverage settings as reported by a fact source, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RawCoverage {
    /// Comma separated list of mode words.
    pub mode: Option<String>,
    /// Regular expressions matching files excluded from coverage.
    pub exclude: Vec<String>,
    /// Regular expression matching files to collect coverage for.
    pub file_name: Option<String>,
    pub parallel: bool,
    pub exclude_all: bool,
    /// Label weights. Signed here so that negative input is reported as a
    /// validation problem rather than a parse failure of the whole fact.
    pub labels: BTreeMap<String, i64>,
}

/// Validated coverage settings for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coverage {
    mode: OrderedSet<String>,
    exclude_patterns: OrderedSet<String>,
    file_name_pattern: String,
    parallel: bool,
    exclude_all: bool,
    labels: BTreeMap<String, u32>,
}

impl Coverage {
    /// Validate raw settings and fill in defaults.
    pub fn from_raw(raw: RawCoverage) -> Result<Self, GroupError> {
        let mode = parse_mode(raw.mode.as_deref().unwrap_or(DEFAULT_COVER_MODE))?;

        let mut exclude_patterns = OrderedSet::new();
        for pattern in raw.exclude {
            check_pattern(&pattern, "exclude pattern")?;
            exclude_patterns.insert(pattern);
        }

        let file_name_pattern = match raw.file_name {
            Some(pattern) if !pattern.trim().is_empty() => pattern,
            _ => DEFAULT_FILE_NAME_PATTERN.to_string(),
        };
        check_pattern(&file_name_pattern, "file name pattern")?;

        let mut labels = BTreeMap::new();
        for (label, weight) in raw.labels {
            if label.is_empty() {
                return Err(coverage_error("label names must not be empty"));
            }
            if label.contains('.') || label.contains('*') {
                return Err(coverage_error(format!(
                    "label `{}` must not contain '.' or '*'",
                    label
                )));
            }
            let weight = u32::try_from(weight).map_err(|_| {
                coverage_error(format!(
                    "label `{}` has weight {}, expected a non-negative integer",
                    label, weight
                ))
            })?;
            labels.insert(label, weight);
        }

        Ok(Coverage {
            mode,
            exclude_patterns,
            file_name_pattern,
            parallel: raw.parallel,
            exclude_all: raw.exclude_all,
            labels,
        })
    }

    /// The mode as a comma separated list.
    pub fn mode(&self) -> String {
        self.mode
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn mode_words(&self) -> &[String] {
        self.mode.as_slice()
    }

    pub fn exclude_patterns(&self) -> &[String] {
        self.exclude_patterns.as_slice()
    }

    pub fn file_name_pattern(&self) -> &str {
        &self.file_name_pattern
    }

    pub fn parallel(&self) -> bool {
        self.parallel
    }

    pub fn exclude_all(&self) -> bool {
        self.exclude_all
    }

    pub fn labels(&self) -> &BTreeMap<String, u32> {
        &self.labels
    }

    /// Merge settings reported by a second sighting of the same package.
    ///
    /// Lists and flags are combined. A differing file name pattern or label
    /// weight cannot be combined, so the existing value stays and a conflict
    /// is returned.
    pub fn merge(&mut self, other: &Coverage, package: PackagePath) -> Vec<MergeConflict> {
        let mut conflicts = Vec::new();

        self.mode.union(&other.mode);
        self.exclude_patterns.union(&other.exclude_patterns);
        self.parallel |= other.parallel;
        self.exclude_all |= other.exclude_all;

        if self.file_name_pattern != other.file_name_pattern {
            conflicts.push(MergeConflict::new(
                package,
                "coverage.file-name",
                &self.file_name_pattern,
                &other.file_name_pattern,
            ));
        }

        for (label, weight) in &other.labels {
            match self.labels.get(label) {
                None => {
                    self.labels.insert(label.clone(), *weight);
                }
                Some(existing) if existing != weight => {
                    conflicts.push(MergeConflict::new(
                        package,
                        format!("coverage.labels.{}", label),
                        existing.to_string(),
                        weight.to_string(),
                    ));
                }
                Some(_) => {}
            }
        }

        conflicts
    }
}

fn coverage_error(reason: impl Into<String>) -> GroupError {
    GroupError::new("coverage", reason)
}

fn parse_mode(mode: &str) -> Result<OrderedSet<String>, GroupError> {
    let mut words = OrderedSet::new();

    for word in mode.split(',').map(str::trim).filter(|w| !w.is_empty()) {
        let valid = word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(coverage_error(format!("invalid mode word `{}`", word)));
        }
        words.insert(word.to_string());
    }

    if words.is_empty() {
        words.insert(DEFAULT_COVER_MODE.to_string());
    }

    Ok(words)
}

fn check_pattern(pattern: &str, what: &str) -> Result<(), GroupError> {
    Regex::new(pattern)
        .map(|_| ())
        .map_err(|e| coverage_error(format!("invalid {} `{}`: {}", what, pattern, e)))
}
