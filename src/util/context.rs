//! Global context for pkgmeta operations.
//!
//! Provides centralized access to the working directory, configuration
//! locations and the merged configuration.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use directories::ProjectDirs;

use crate::util::config::{self, Config, CONFIG_FILE_NAME};

/// Project directories for pkgmeta
static PROJECT_DIRS: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("dev", "pkgmeta", "pkgmeta"));

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Global configuration file, if the platform has a config directory
    global_config_path: Option<PathBuf>,

    /// Merged configuration
    config: Config,
}

impl GlobalContext {
    /// Create a GlobalContext for the process working directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_cwd(cwd))
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Self {
        let global_config_path = PROJECT_DIRS
            .as_ref()
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME));

        GlobalContext {
            cwd,
            global_config_path,
            config: Config::default(),
        }
    }

    /// Replace the global configuration location.
    pub fn with_global_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.global_config_path = path;
        self
    }

    /// Load every configuration layer, plus `explicit` if given.
    pub fn load_config(&mut self, explicit: Option<&Path>) -> Result<()> {
        let project = self.project_config_path();
        self.config = config::load_config(
            self.global_config_path.as_deref(),
            project.as_deref(),
            explicit,
        )?;
        Ok(())
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the global configuration file path.
    pub fn global_config_path(&self) -> Option<&Path> {
        self.global_config_path.as_deref()
    }

    /// The nearest project configuration file, if any.
    pub fn project_config_path(&self) -> Option<PathBuf> {
        config::find_project_config(&self.cwd)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Resolve a possibly relative path against the working directory.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_context_paths() {
        let ctx = GlobalContext::new().unwrap();
        assert!(ctx.cwd().is_absolute());
        assert_eq!(ctx.resolve_path(Path::new("x")), ctx.cwd().join("x"));
    }

    #[test]
    fn test_layers_apply_in_order() {
        let tmp = TempDir::new().unwrap();

        let global = tmp.path().join("global.toml");
        std::fs::write(&global, "[closure]\njobs = 2\n[output]\nheader = false\n").unwrap();

        let project_dir = tmp.path().join("proj");
        std::fs::create_dir_all(project_dir.join(".pkgmeta")).unwrap();
        std::fs::write(
            project_dir.join(".pkgmeta").join("config.toml"),
            "[closure]\njobs = 6\n",
        )
        .unwrap();

        let explicit = tmp.path().join("explicit.toml");
        std::fs::write(&explicit, "[output]\nheader = true\n").unwrap();

        let mut ctx = GlobalContext::with_cwd(project_dir).with_global_config_path(Some(global));
        ctx.load_config(Some(&explicit)).unwrap();

        assert_eq!(ctx.config().jobs(), 6);
        assert!(ctx.config().header());
    }
}
