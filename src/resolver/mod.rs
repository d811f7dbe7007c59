//! Dependency closure resolution.
//!
//! The builder walks imports from a root package over a [`FactSource`],
//! merging every sighting of a package into one record, then flattens the
//! import graph into per-record `deps`. The encoder renders the result as a
//! byte-stable TOML manifest and reads it back.
//!
//! [`FactSource`]: crate::sources::FactSource

pub mod builder;
pub mod deps;
pub mod encode;
pub mod errors;
pub mod result;

pub use builder::ClosureBuilder;
pub use deps::ImportGraph;
pub use encode::{deserialize, serialize, ManifestError};
pub use errors::{ClosureError, PartialClosure};
pub use result::ClosureResult;
