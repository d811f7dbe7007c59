//! Command implementations

pub mod check;
pub mod completions;
pub mod deps;
pub mod describe;

use std::time::Duration;

use anyhow::{Context, Result};

use crate::cli::WalkArgs;
use pkgmeta::core::PackagePath;
use pkgmeta::ops::DescribeOptions;
use pkgmeta::resolver::errors::lookup_summary;
use pkgmeta::resolver::ClosureResult;
use pkgmeta::util::diagnostic::emit;
use pkgmeta::util::shell::Spinner;
use pkgmeta::util::{CancelToken, Shell, Status};

impl WalkArgs {
    /// Describe options from the walk flags; unset flags defer to config.
    pub fn options(&self) -> Result<DescribeOptions> {
        let root = PackagePath::parse(&self.root)
            .with_context(|| format!("invalid root package `{}`", self.root))?;

        let mut opts = DescribeOptions::new(root);
        opts.facts = self.facts.clone();
        opts.jobs = self.jobs;
        opts.follow_test_imports = self.no_test_imports.then_some(false);
        opts.timeout = self.timeout.map(Duration::from_secs);
        Ok(opts)
    }

    pub fn cancel_token(&self) -> CancelToken {
        let cancel = CancelToken::new();
        if let Some(secs) = self.time_limit {
            cancel.cancel_after(Duration::from_secs(secs));
        }
        cancel
    }
}

/// Show per-package progress while walking.
pub fn observe<'a>(shell: &'a Shell, spinner: &'a Spinner) -> Box<dyn Fn(&PackagePath) + 'a> {
    Box::new(move |path: &PackagePath| {
        spinner.tick(path);
        if shell.is_verbose() {
            shell.status(Status::Fetching, path);
        }
    })
}

/// Print the non-fatal problems of a finished walk.
pub fn report_problems(shell: &Shell, closure: &ClosureResult) {
    if shell.is_quiet() {
        return;
    }
    for warning in closure.warnings() {
        shell.warn(warning);
    }
    if let Some(diag) = lookup_summary(closure.errors()) {
        emit(&diag, shell.use_color());
    }
}
