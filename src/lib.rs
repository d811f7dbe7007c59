//! pkgmeta - build metadata manifests for package dependency closures
//!
//! This crate asks a fact source about one package at a time, walks the
//! imports of a root package into a closure of merged records, and writes
//! the closure as a byte-stable TOML manifest.

pub mod core;
pub mod ops;
pub mod resolver;
pub mod sources;
pub mod util;

/// Fact builders and mock sources for unit tests.
#[cfg(test)]
pub mod test_support;

pub use crate::core::{ManifestRecord, PackagePath};
pub use crate::resolver::{ClosureBuilder, ClosureError, ClosureResult};
pub use crate::sources::{FactSource, LookupError};
pub use crate::util::context::GlobalContext;
