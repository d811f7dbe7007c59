//! `pkgmeta check` command

use anyhow::{bail, Result};

use crate::cli::CheckArgs;
use crate::GlobalOptions;
use pkgmeta::ops::check;
use pkgmeta::util::diagnostic::emit;
use pkgmeta::util::Status;

pub fn execute(args: CheckArgs, global_opts: &GlobalOptions) -> Result<()> {
    let shell = &global_opts.shell;

    shell.status(Status::Checking, args.manifest.display());
    let report = check(&args.manifest)?;

    for finding in &report.findings {
        emit(
            &finding.clone().with_location(&args.manifest),
            shell.use_color(),
        );
    }

    if !report.is_ok() {
        bail!(
            "{} problems found in {}",
            report.error_count(),
            args.manifest.display()
        );
    }

    shell.status(
        Status::Finished,
        format!(
            "{}: {} packages, {} warnings",
            args.manifest.display(),
            report.closure.len(),
            report.warning_count()
        ),
    );
    Ok(())
}
