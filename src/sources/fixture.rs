//! Fact source backed by a fixed table of facts.
//!
//! Used for tests and for `--facts FILE`, which describes a closure from a
//! previously captured set of inspector answers instead of running one.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::core::PackagePath;
use crate::sources::fact::RawFact;
use crate::sources::source::{FactSource, LookupError};
use crate::util::cancel::CancelToken;

/// A fact source that answers from memory.
#[derive(Debug, Clone, Default)]
pub struct StaticFactSource {
    facts: HashMap<PackagePath, Result<RawFact, LookupError>>,
}

/// On-disk layout of a facts file.
#[derive(Debug, Deserialize)]
struct FactsFile {
    #[serde(default)]
    fact: Vec<FactEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct FactEntry {
    /// Extra import paths answered with this same fact.
    #[serde(default)]
    aliases: Vec<String>,

    #[serde(flatten)]
    fact: RawFact,
}

impl StaticFactSource {
    pub fn new() -> Self {
        StaticFactSource::default()
    }

    /// Answer `path` with `fact`.
    pub fn with_fact(mut self, path: PackagePath, fact: RawFact) -> Self {
        self.insert(path, fact);
        self
    }

    /// Answer `path` with an error.
    pub fn with_error(mut self, path: PackagePath, error: LookupError) -> Self {
        self.facts.insert(path, Err(error));
        self
    }

    pub fn insert(&mut self, path: PackagePath, fact: RawFact) {
        self.facts.insert(path, Ok(fact));
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Load facts from a JSON or TOML file, chosen by extension.
    ///
    /// Each entry must name its `package`; `aliases` map further paths to
    /// the same entry.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read facts file: {}", path.display()))?;

        let file: FactsFile = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse facts file: {}", path.display()))?,
            Some("toml") => toml::from_str(&contents)
                .with_context(|| format!("failed to parse facts file: {}", path.display()))?,
            _ => bail!(
                "unsupported facts file `{}`: expected a .json or .toml extension",
                path.display()
            ),
        };

        let mut source = StaticFactSource::new();
        for (index, entry) in file.fact.into_iter().enumerate() {
            let Some(package) = entry.fact.package.as_deref() else {
                bail!("fact #{} in {} has no `package`", index + 1, path.display());
            };
            let package = PackagePath::parse(package)
                .with_context(|| format!("fact #{} in {}", index + 1, path.display()))?;

            for alias in &entry.aliases {
                let alias = PackagePath::parse(alias)
                    .with_context(|| format!("alias of `{}` in {}", package, path.display()))?;
                source.insert(alias, entry.fact.clone());
            }
            source.insert(package, entry.fact);
        }

        tracing::debug!("loaded {} facts from {}", source.len(), path.display());
        Ok(source)
    }
}

impl FactSource for StaticFactSource {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch(&self, path: &PackagePath, _cancel: &CancelToken) -> Result<RawFact, LookupError> {
        match self.facts.get(path) {
            Some(answer) => answer.clone(),
            None => Err(LookupError::not_found(*path)),
        }
    }
}
