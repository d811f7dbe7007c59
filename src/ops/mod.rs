//! High-level operations.
//!
//! This module contains the implementation of pkgmeta commands.

pub mod check;
pub mod describe;

pub use check::{check, check_closure, CheckReport};
pub use describe::{
    build_closure, describe, fact_source, write_manifest, DescribeOptions, DescribeOutcome,
    SourceError, WriteOutcome,
};
