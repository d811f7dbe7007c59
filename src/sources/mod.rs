//! Fact sources.
//!
//! Sources answer "what are the build facts of this one package" by asking
//! an external inspector, a fixture table, or the local git checkout.

pub mod command;
pub mod fact;
pub mod fixture;
pub mod git;
pub mod source;

pub use command::CommandFactSource;
pub use fact::RawFact;
pub use fixture::StaticFactSource;
pub use source::{FactSource, LookupError};
