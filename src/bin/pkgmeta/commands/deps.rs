//! `pkgmeta deps` command

use anyhow::Result;

use crate::cli::DepsArgs;
use crate::commands::{observe, report_problems};
use crate::GlobalOptions;
use pkgmeta::ops::build_closure;

pub fn execute(args: DepsArgs, global_opts: &GlobalOptions) -> Result<()> {
    let shell = &global_opts.shell;
    let ctx = global_opts.context()?;

    let opts = args.walk.options()?;
    let cancel = args.walk.cancel_token();

    let spinner = shell.spinner(format!("walking {}", opts.root));
    let observer = observe(shell, &spinner);
    let closure = build_closure(&ctx, &opts, &cancel, Some(observer.as_ref()));
    spinner.finish();
    let closure = closure?;

    report_problems(shell, &closure);

    if args.all {
        for (package, record) in closure.records() {
            let marker = if closure.resolves(package) { "" } else { " (incomplete)" };
            println!("{}{}", package, marker);
            for dep in record.deps() {
                println!("    {}", dep);
            }
        }
    } else {
        for dep in closure.root_deps() {
            println!("{}", dep);
        }
    }

    Ok(())
}
