//! Fact source that runs an external inspector per package.
//!
//! The inspector is invoked as `<program> <args...> <package-path>` and must
//! print one JSON fact on stdout.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::PackagePath;
use crate::sources::fact::RawFact;
use crate::sources::git;
use crate::sources::source::{FactSource, LookupError};
use crate::util::cancel::CancelToken;
use crate::util::process::{ProcessBuilder, ProcessError};

/// A source of facts backed by an external process.
#[derive(Debug, Clone)]
pub struct CommandFactSource {
    program: PathBuf,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    cwd: Option<PathBuf>,
    timeout: Option<Duration>,
    discover_provenance: bool,
}

impl CommandFactSource {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandFactSource {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
            timeout: None,
            discover_provenance: false,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env.extend(env);
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Give up on a single package after `timeout`.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fill in missing provenance from the package's git checkout.
    pub fn discover_provenance(mut self, enabled: bool) -> Self {
        self.discover_provenance = enabled;
        self
    }

    fn process(&self, path: &PackagePath) -> ProcessBuilder {
        let mut process = ProcessBuilder::new(&self.program)
            .args(&self.args)
            .arg(path.as_str())
            .timeout(self.timeout);
        for (key, value) in &self.env {
            process = process.env(key, value);
        }
        if let Some(cwd) = &self.cwd {
            process = process.cwd(cwd);
        }
        process
    }
}

impl FactSource for CommandFactSource {
    fn name(&self) -> &str {
        "command"
    }

    fn fetch(&self, path: &PackagePath, cancel: &CancelToken) -> Result<RawFact, LookupError> {
        let process = self.process(path);
        tracing::debug!("running `{}`", process.display_command());

        let output = process.exec(cancel).map_err(|e| match e {
            ProcessError::Cancelled { .. } => LookupError::fetch(*path, "cancelled"),
            other => LookupError::fetch(*path, other.to_string()),
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(classify_failure(*path, output.status.code(), &stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Err(LookupError::not_found(*path));
        }

        let mut fact: RawFact = serde_json::from_str(&stdout)
            .map_err(|e| LookupError::malformed(*path, e.to_string()))?;

        if self.discover_provenance && fact.provenance.is_none() {
            if let Some(dir) = &fact.dir {
                fact.provenance = git::discover_provenance(dir);
            }
        }

        Ok(fact)
    }
}

/// Stderr phrases an inspector uses for a package that does not exist.
const NOT_FOUND_PHRASES: &[&str] = &[
    "cannot find package",
    "no such package",
    "package not found",
];

/// Map a failed inspector run to a lookup error by what it printed.
///
/// Only package-specific phrasing means `NotFound`; a shell reporting a
/// missing command inside the inspector is a fetch failure.
fn classify_failure(path: PackagePath, code: Option<i32>, stderr: &str) -> LookupError {
    let lower = stderr.to_lowercase();
    let detail = stderr.trim();

    if NOT_FOUND_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        LookupError::not_found(path)
    } else if lower.contains("build constraints") {
        LookupError::constraint(path, detail)
    } else {
        let status = code.map_or_else(|| "a signal".to_string(), |c| format!("status {}", c));
        if detail.is_empty() {
            LookupError::fetch(path, format!("inspector exited with {}", status))
        } else {
            LookupError::fetch(path, format!("inspector exited with {}: {}", status, detail))
        }
    }
}
