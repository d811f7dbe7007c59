//! Core data structures for pkgmeta.
//!
//! This module contains the foundational types used throughout pkgmeta:
//! - Interned package paths
//! - Manifest records and their optional groups
//! - Insertion-ordered sets used by every manifest list

pub mod coverage;
pub mod ordered;
pub mod package_path;
pub mod provenance;
pub mod record;

pub use coverage::Coverage;
pub use ordered::OrderedSet;
pub use package_path::{InvalidPackagePath, PackagePath};
pub use provenance::Provenance;
pub use record::{
    CategoryFiles, CgoFlags, FileCategory, GroupError, ManifestRecord, MergeConflict,
    RecordWarning, Scripts, SourceFiles,
};
