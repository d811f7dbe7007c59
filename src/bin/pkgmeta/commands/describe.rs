//! `pkgmeta describe` command

use std::io::Write;

use anyhow::{Context, Result};

use crate::cli::DescribeArgs;
use crate::commands::{observe, report_problems};
use crate::GlobalOptions;
use pkgmeta::ops::{describe, WriteOutcome};
use pkgmeta::util::Status;

pub fn execute(args: DescribeArgs, global_opts: &GlobalOptions) -> Result<()> {
    let shell = &global_opts.shell;
    let ctx = global_opts.context()?;

    let mut opts = args.walk.options()?;
    opts.output = args.output;
    opts.header = args.no_header.then_some(false);
    let cancel = args.walk.cancel_token();

    shell.status(Status::Describing, opts.root);
    let spinner = shell.spinner(format!("describing {}", opts.root));
    let observer = observe(shell, &spinner);
    let outcome = describe(&ctx, &opts, &cancel, Some(observer.as_ref()));
    spinner.finish();
    let outcome = outcome?;

    report_problems(shell, &outcome.closure);

    match &outcome.output {
        WriteOutcome::Stdout(text) => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(text.as_bytes())
                .and_then(|()| stdout.flush())
                .context("failed to write manifest to stdout")?;
        }
        WriteOutcome::Written { path, .. } => shell.status(Status::Wrote, path.display()),
        WriteOutcome::Fresh { path, .. } => {
            shell.status(Status::Fresh, format!("{} is up to date", path.display()))
        }
    }

    let closure = &outcome.closure;
    shell.status(
        Status::Finished,
        format!(
            "`{}`: {} packages, {} incomplete",
            closure.root(),
            closure.len(),
            closure.errors().len()
        ),
    );

    Ok(())
}
