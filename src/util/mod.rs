//! Shared utilities

pub mod cancel;
pub mod config;
pub mod context;
pub mod diagnostic;
pub mod hash;
pub mod process;
pub mod shell;

pub use cancel::CancelToken;
pub use config::Config;
pub use context::GlobalContext;
pub use diagnostic::Diagnostic;
pub use process::ProcessBuilder;
pub use shell::{ColorChoice, Shell, Status, Verbosity};
