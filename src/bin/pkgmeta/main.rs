//! pkgmeta CLI - describe package dependency closures as manifests

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pkgmeta::ops::SourceError;
use pkgmeta::resolver::ClosureError;
use pkgmeta::util::diagnostic::emit;
use pkgmeta::util::{GlobalContext, Shell};

mod cli;
mod commands;

use cli::{Cli, Commands};

/// Options every command receives.
pub struct GlobalOptions {
    pub shell: Shell,
    pub config: Option<PathBuf>,
    pub inspector: Option<String>,
}

impl GlobalOptions {
    /// Working context with every configuration layer applied.
    pub fn context(&self) -> Result<GlobalContext> {
        let mut ctx = GlobalContext::new()?;
        ctx.load_config(self.config.as_deref())?;
        if let Some(inspector) = &self.inspector {
            ctx.config_mut().inspector.program = Some(inspector.clone());
        }
        Ok(ctx)
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("pkgmeta=debug")
    } else if cli.quiet {
        EnvFilter::new("pkgmeta=error")
    } else {
        EnvFilter::new("pkgmeta=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let global_opts = GlobalOptions {
        shell: Shell::from_flags(cli.quiet, cli.verbose, cli.color),
        config: cli.config,
        inspector: cli.inspector,
    };

    if let Err(e) = run(cli.command, &global_opts) {
        std::process::exit(report(&e, &global_opts.shell));
    }
}

fn run(command: Commands, global_opts: &GlobalOptions) -> Result<()> {
    match command {
        Commands::Describe(args) => commands::describe::execute(args, global_opts),
        Commands::Deps(args) => commands::deps::execute(args, global_opts),
        Commands::Check(args) => commands::check::execute(args, global_opts),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}

/// Print a fatal error and pick the exit code.
fn report(e: &anyhow::Error, shell: &Shell) -> i32 {
    if let Some(err) = e.downcast_ref::<ClosureError>() {
        emit(&err.to_diagnostic(), shell.use_color());
        return err.exit_code();
    }
    if let Some(err) = e.downcast_ref::<SourceError>() {
        emit(&err.to_diagnostic(), shell.use_color());
        return 1;
    }
    shell.error(format!("{:#}", e));
    1
}
