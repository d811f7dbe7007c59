//! Configuration file support for pkgmeta.
//!
//! Configuration is layered, later layers winning:
//! - Defaults
//! - Global: `<config dir>/pkgmeta/config.toml`
//! - Project: `.pkgmeta/config.toml` in the working directory or any parent
//! - An explicit `--config` file
//!
//! Command line flags are applied on top by the caller.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Name of the per-project configuration directory.
pub const PROJECT_CONFIG_DIR: &str = ".pkgmeta";

/// File name of every configuration layer.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// pkgmeta configuration.
///
/// Every value is optional so that layers can be merged; the accessors
/// below apply the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// External inspector settings
    pub inspector: InspectorConfig,

    /// Closure walk settings
    pub closure: ClosureConfig,

    /// Manifest output settings
    pub output: OutputConfig,
}

/// How to run the external inspector that reports package facts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct InspectorConfig {
    /// Program name or path
    pub program: Option<String>,

    /// Arguments placed before the package path
    pub args: Option<Vec<String>>,

    /// Extra environment variables
    pub env: BTreeMap<String, String>,

    /// Per-package timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Discover provenance from the enclosing git checkout
    pub discover_provenance: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ClosureConfig {
    /// Number of concurrent fetches
    pub jobs: Option<usize>,

    /// Follow test and external test imports
    pub follow_test_imports: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Emit the generated-file header comment
    pub header: Option<bool>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration, falling back to defaults if the file is missing
    /// or broken.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("skipping config {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.inspector.program.is_some() {
            self.inspector.program = other.inspector.program;
        }
        if other.inspector.args.is_some() {
            self.inspector.args = other.inspector.args;
        }
        self.inspector.env.extend(other.inspector.env);
        if other.inspector.timeout_secs.is_some() {
            self.inspector.timeout_secs = other.inspector.timeout_secs;
        }
        if other.inspector.discover_provenance.is_some() {
            self.inspector.discover_provenance = other.inspector.discover_provenance;
        }

        if other.closure.jobs.is_some() {
            self.closure.jobs = other.closure.jobs;
        }
        if other.closure.follow_test_imports.is_some() {
            self.closure.follow_test_imports = other.closure.follow_test_imports;
        }

        if other.output.header.is_some() {
            self.output.header = other.output.header;
        }
    }

    /// Number of concurrent fetches, at least one.
    pub fn jobs(&self) -> usize {
        self.closure.jobs.unwrap_or(1).max(1)
    }

    pub fn follow_test_imports(&self) -> bool {
        self.closure.follow_test_imports.unwrap_or(true)
    }

    pub fn header(&self) -> bool {
        self.output.header.unwrap_or(true)
    }

    pub fn discover_provenance(&self) -> bool {
        self.inspector.discover_provenance.unwrap_or(false)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.inspector.timeout_secs.map(Duration::from_secs)
    }

    pub fn inspector_args(&self) -> &[String] {
        self.inspector.args.as_deref().unwrap_or_default()
    }
}

/// Find the nearest project config, searching `start` and its parents.
pub fn find_project_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(PROJECT_CONFIG_DIR).join(CONFIG_FILE_NAME))
        .find(|path| path.is_file())
}

/// Load merged configuration.
///
/// Missing or broken global and project layers are skipped. An explicit
/// file was asked for by name, so failing to load it is an error.
pub fn load_config(
    global_path: Option<&Path>,
    project_path: Option<&Path>,
    explicit_path: Option<&Path>,
) -> Result<Config> {
    let mut config = Config::default();

    for path in [global_path, project_path].into_iter().flatten() {
        tracing::debug!("loading config layer {}", path.display());
        config.merge(Config::load_or_default(path));
    }

    if let Some(path) = explicit_path {
        config.merge(Config::load(path)?);
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.jobs(), 1);
        assert!(config.follow_test_imports());
        assert!(config.header());
        assert!(!config.discover_provenance());
        assert!(config.timeout().is_none());
        assert!(config.inspector_args().is_empty());
    }

    #[test]
    fn test_config_load() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");

        std::fs::write(
            &config_path,
            r#"
[inspector]
program = "inspect-tool"
args = ["list", "-json"]
env = { MODE = "strict" }
timeout-secs = 30
discover-provenance = true

[closure]
jobs = 4
follow-test-imports = false

[output]
header = false
"#,
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.inspector.program.as_deref(), Some("inspect-tool"));
        assert_eq!(config.inspector_args(), &["list", "-json"]);
        assert_eq!(config.inspector.env["MODE"], "strict");
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
        assert!(config.discover_provenance());
        assert_eq!(config.jobs(), 4);
        assert!(!config.follow_test_imports());
        assert!(!config.header());
    }

    #[test]
    fn test_config_merge() {
        let mut base = Config::default();
        base.inspector.program = Some("a".into());
        base.closure.jobs = Some(4);
        base.inspector.env.insert("A".into(), "1".into());

        let mut layer = Config::default();
        layer.inspector.program = Some("b".into());
        layer.closure.follow_test_imports = Some(false);
        layer.inspector.env.insert("B".into(), "2".into());

        base.merge(layer);

        assert_eq!(base.inspector.program.as_deref(), Some("b"));
        assert_eq!(base.jobs(), 4);
        assert!(!base.follow_test_imports());
        assert_eq!(base.inspector.env.len(), 2);
    }

    #[test]
    fn test_zero_jobs_means_one() {
        let mut config = Config::default();
        config.closure.jobs = Some(0);
        assert_eq!(config.jobs(), 1);
    }

    #[test]
    fn test_broken_layer_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let global = tmp.path().join("global.toml");
        let project = tmp.path().join("project.toml");
        std::fs::write(&global, "[closure]\njobs = 3\n").unwrap();
        std::fs::write(&project, "this is not toml [").unwrap();

        let config = load_config(Some(&global), Some(&project), None).unwrap();
        assert_eq!(config.jobs(), 3);
    }

    #[test]
    fn test_explicit_layer_must_load() {
        let tmp = TempDir::new().unwrap();
        let explicit = tmp.path().join("missing.toml");

        assert!(load_config(None, None, Some(&explicit)).is_err());
    }

    #[test]
    fn test_find_project_config_walks_up() {
        let tmp = TempDir::new().unwrap();
        let config_dir = tmp.path().join(PROJECT_CONFIG_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join(CONFIG_FILE_NAME), "").unwrap();

        let nested = tmp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(
            find_project_config(&nested),
            Some(config_dir.join(CONFIG_FILE_NAME))
        );
    }
}
