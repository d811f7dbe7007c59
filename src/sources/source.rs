//! FactSource trait - common interface for all providers of package facts.

use thiserror::Error;

use crate::core::PackagePath;
use crate::sources::fact::RawFact;
use crate::util::cancel::CancelToken;

/// A provider of single-package build facts.
///
/// A source answers for one package at a time. It does not follow imports
/// and caches nothing across calls; the closure builder owns both.
pub trait FactSource: Send + Sync {
    /// Get the source name for display.
    fn name(&self) -> &str;

    /// Fetch the raw facts for `path`.
    ///
    /// Long-running sources should poll `cancel` and give up early.
    fn fetch(&self, path: &PackagePath, cancel: &CancelToken) -> Result<RawFact, LookupError>;
}

impl<S: FactSource + ?Sized> FactSource for &S {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(&self, path: &PackagePath, cancel: &CancelToken) -> Result<RawFact, LookupError> {
        (**self).fetch(path, cancel)
    }
}

impl<S: FactSource + ?Sized> FactSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(&self, path: &PackagePath, cancel: &CancelToken) -> Result<RawFact, LookupError> {
        (**self).fetch(path, cancel)
    }
}

/// A package path that does not resolve to a loadable package.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("package `{package}` not found")]
    NotFound { package: PackagePath },

    #[error("failed to fetch `{package}`: {message}")]
    Fetch {
        package: PackagePath,
        message: String,
    },

    #[error("build constraints exclude every file of `{package}`: {message}")]
    Constraint {
        package: PackagePath,
        message: String,
    },

    #[error("malformed facts for `{package}`: {message}")]
    Malformed {
        package: PackagePath,
        message: String,
    },
}

impl LookupError {
    pub fn not_found(package: PackagePath) -> Self {
        LookupError::NotFound { package }
    }

    pub fn fetch(package: PackagePath, message: impl Into<String>) -> Self {
        LookupError::Fetch {
            package,
            message: message.into(),
        }
    }

    pub fn constraint(package: PackagePath, message: impl Into<String>) -> Self {
        LookupError::Constraint {
            package,
            message: message.into(),
        }
    }

    pub fn malformed(package: PackagePath, message: impl Into<String>) -> Self {
        LookupError::Malformed {
            package,
            message: message.into(),
        }
    }

    /// Rebuild an error from its manifest form.
    ///
    /// Returns `None` for an unknown kind.
    pub fn from_parts(package: PackagePath, kind: &str, message: &str) -> Option<Self> {
        match kind {
            "not-found" => Some(LookupError::not_found(package)),
            "fetch" => Some(LookupError::fetch(package, message)),
            "constraint" => Some(LookupError::constraint(package, message)),
            "malformed" => Some(LookupError::malformed(package, message)),
            _ => None,
        }
    }

    /// The package that failed.
    pub fn package(&self) -> PackagePath {
        match self {
            LookupError::NotFound { package }
            | LookupError::Fetch { package, .. }
            | LookupError::Constraint { package, .. }
            | LookupError::Malformed { package, .. } => *package,
        }
    }

    /// Stable kind name used in manifests.
    pub fn kind(&self) -> &'static str {
        match self {
            LookupError::NotFound { .. } => "not-found",
            LookupError::Fetch { .. } => "fetch",
            LookupError::Constraint { .. } => "constraint",
            LookupError::Malformed { .. } => "malformed",
        }
    }

    /// Detail message without the package prefix.
    pub fn message(&self) -> &str {
        match self {
            LookupError::NotFound { .. } => "",
            LookupError::Fetch { message, .. }
            | LookupError::Constraint { message, .. }
            | LookupError::Malformed { message, .. } => message,
        }
    }
}
