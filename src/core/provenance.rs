//! Remote source location of a package.
//!
//! Provenance tells the build orchestrator where to clone a package from.
//! Local packages carry none. A present group always has every field set;
//! missing values are filled from the defaults below.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::record::{GroupError, MergeConflict};
use crate::core::PackagePath;

pub const DEFAULT_BRANCH: &str = "master";
pub const DEFAULT_SUB_PATH: &str = ".";
pub const DEFAULT_DEPTH: u32 = 1;
pub const DEFAULT_RESOLVED_VERSION: &str = "HEAD";

/// Provenance as reported by a fact source, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RawProvenance {
    pub repo_url: Option<String>,
    pub branch: Option<String>,
    pub sub_path: Option<String>,
    pub depth: Option<i64>,
    pub resolved_version: Option<String>,
}

/// Validated remote location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    repo_url: Url,
    branch: String,
    sub_path: String,
    depth: u32,
    resolved_version: String,
}

impl Provenance {
    /// Validate raw provenance and fill in defaults.
    ///
    /// The repository URL is the one field without a default.
    pub fn from_raw(raw: RawProvenance) -> Result<Self, GroupError> {
        let repo_url = match raw.repo_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => parse_repo_url(url)?,
            _ => return Err(provenance_error("repository URL is missing")),
        };

        let depth = match raw.depth {
            None => DEFAULT_DEPTH,
            Some(depth) => u32::try_from(depth).map_err(|_| {
                provenance_error(format!("depth {} is not a non-negative integer", depth))
            })?,
        };

        Ok(Provenance {
            repo_url,
            branch: non_empty_or(raw.branch, DEFAULT_BRANCH),
            sub_path: normalize_sub_path(raw.sub_path.as_deref())?,
            depth,
            resolved_version: non_empty_or(raw.resolved_version, DEFAULT_RESOLVED_VERSION),
        })
    }

    pub fn repo_url(&self) -> &Url {
        &self.repo_url
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn sub_path(&self) -> &str {
        &self.sub_path
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn resolved_version(&self) -> &str {
        &self.resolved_version
    }

    /// Merge provenance from a second sighting of the same package.
    ///
    /// The deeper clone depth satisfies both sightings. Any other difference
    /// names a different location, so the first one is kept and reported.
    pub fn merge(&mut self, other: &Provenance, package: PackagePath) -> Vec<MergeConflict> {
        let mut conflicts = Vec::new();

        if self.repo_url != other.repo_url {
            conflicts.push(MergeConflict::new(
                package,
                "provenance.repo-url",
                self.repo_url.as_str(),
                other.repo_url.as_str(),
            ));
        }
        if self.branch != other.branch {
            conflicts.push(MergeConflict::new(
                package,
                "provenance.branch",
                &self.branch,
                &other.branch,
            ));
        }
        if self.sub_path != other.sub_path {
            conflicts.push(MergeConflict::new(
                package,
                "provenance.sub-path",
                &self.sub_path,
                &other.sub_path,
            ));
        }
        if self.resolved_version != other.resolved_version {
            conflicts.push(MergeConflict::new(
                package,
                "provenance.resolved-version",
                &self.resolved_version,
                &other.resolved_version,
            ));
        }

        self.depth = self.depth.max(other.depth);

        conflicts
    }
}

fn provenance_error(reason: impl Into<String>) -> GroupError {
    GroupError::new("provenance", reason)
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => default.to_string(),
    }
}

/// Parse a repository URL, accepting scp-style `user@host:path` locations.
fn parse_repo_url(raw: &str) -> Result<Url, GroupError> {
    if let Ok(url) = Url::parse(raw) {
        if !url.cannot_be_a_base() {
            return Ok(url);
        }
    }

    // scp-style: [user@]host:path
    if let Some((host, path)) = raw.split_once(':') {
        if !host.is_empty() && !host.contains('/') && !path.is_empty() {
            let ssh = format!("ssh://{}/{}", host, path.trim_start_matches('/'));
            if let Ok(url) = Url::parse(&ssh) {
                return Ok(url);
            }
        }
    }

    Err(provenance_error(format!(
        "`{}` is not a valid repository URL",
        raw
    )))
}

fn normalize_sub_path(raw: Option<&str>) -> Result<String, GroupError> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.starts_with('/') {
        return Err(provenance_error(format!(
            "sub-path `{}` must be relative to the repository root",
            raw
        )));
    }

    let segments: Vec<&str> = raw
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    if segments.contains(&"..") {
        return Err(provenance_error(format!(
            "sub-path `{}` escapes the repository root",
            raw
        )));
    }

    if segments.is_empty() {
        Ok(DEFAULT_SUB_PATH.to_string())
    } else {
        Ok(segments.join("/"))
    }
}
