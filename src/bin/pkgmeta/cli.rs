//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use pkgmeta::util::ColorChoice;

/// pkgmeta - build metadata manifests for package dependency closures
#[derive(Parser)]
#[command(name = "pkgmeta")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    pub color: ColorChoice,

    /// Extra configuration file, applied after the global and project ones
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Inspector program answering per-package fact lookups
    #[arg(long, global = true, value_name = "PROGRAM", env = "PKGMETA_INSPECTOR")]
    pub inspector: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Describe the closure of a root package as a manifest
    Describe(DescribeArgs),

    /// Print the flattened dependencies of a root package
    Deps(DepsArgs),

    /// Check a manifest against the closure invariants
    Check(CheckArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Options shared by commands that walk a closure.
#[derive(Args)]
pub struct WalkArgs {
    /// Root package path
    pub root: String,

    /// Answer lookups from a JSON or TOML facts file instead of the inspector
    #[arg(long, value_name = "FILE")]
    pub facts: Option<PathBuf>,

    /// Number of concurrent fetches
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Do not follow test and external test imports
    #[arg(long)]
    pub no_test_imports: bool,

    /// Per-package inspector timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Cancel the whole walk after this many seconds
    #[arg(long, value_name = "SECS")]
    pub time_limit: Option<u64>,
}

#[derive(Args)]
pub struct DescribeArgs {
    #[command(flatten)]
    pub walk: WalkArgs,

    /// Write the manifest to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Omit the generated-file header comment
    #[arg(long)]
    pub no_header: bool,
}

#[derive(Args)]
pub struct DepsArgs {
    #[command(flatten)]
    pub walk: WalkArgs,

    /// Print the deps of every package, not only the root
    #[arg(long)]
    pub all: bool,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Manifest to check
    pub manifest: PathBuf,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_describe() {
        let cli = Cli::try_parse_from([
            "pkgmeta", "describe", "app", "--facts", "f.json", "-o", "out.toml", "-j", "4",
            "--no-test-imports",
        ])
        .unwrap();

        match cli.command {
            Commands::Describe(args) => {
                assert_eq!(args.walk.root, "app");
                assert_eq!(args.walk.jobs, Some(4));
                assert!(args.walk.no_test_imports);
                assert_eq!(args.output, Some(PathBuf::from("out.toml")));
            }
            _ => panic!("expected describe"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["pkgmeta", "-q", "-v", "check", "m.toml"]).is_err());
    }
}
