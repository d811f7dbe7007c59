//! Describe a package closure and write its manifest.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use thiserror::Error;

use crate::core::PackagePath;
use crate::resolver::{encode, ClosureBuilder, ClosureResult};
use crate::sources::{CommandFactSource, FactSource, StaticFactSource};
use crate::util::diagnostic::{suggestions, Diagnostic};
use crate::util::hash::existing_file_digest;
use crate::util::process::find_executable;
use crate::util::{CancelToken, GlobalContext};

/// Options for describing a closure.
///
/// Unset values fall back to configuration.
#[derive(Debug, Clone)]
pub struct DescribeOptions {
    /// Root package path
    pub root: PackagePath,

    /// Answer lookups from a facts file instead of running the inspector
    pub facts: Option<PathBuf>,

    /// Manifest destination; stdout when unset
    pub output: Option<PathBuf>,

    /// Concurrent fetches
    pub jobs: Option<usize>,

    /// Follow test and external test imports
    pub follow_test_imports: Option<bool>,

    /// Per-package inspector timeout
    pub timeout: Option<Duration>,

    /// Emit the generated-file header
    pub header: Option<bool>,
}

impl DescribeOptions {
    pub fn new(root: PackagePath) -> Self {
        DescribeOptions {
            root,
            facts: None,
            output: None,
            jobs: None,
            follow_test_imports: None,
            timeout: None,
            header: None,
        }
    }
}

/// Where the manifest went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Manifest text for the caller to print
    Stdout(String),
    /// File was (re)written
    Written { path: PathBuf, digest: String },
    /// File already had identical content
    Fresh { path: PathBuf, digest: String },
}

/// Result of [`describe`].
#[derive(Debug)]
pub struct DescribeOutcome {
    pub closure: ClosureResult,
    pub output: WriteOutcome,
}

/// No usable fact source could be set up.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no inspector program is configured")]
    NoInspector,

    #[error("inspector program `{program}` was not found")]
    InspectorNotFound { program: String },
}

impl SourceError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());
        match self {
            SourceError::NoInspector => diag
                .with_context("pass `--facts FILE` to describe from captured facts instead")
                .with_suggestion(suggestions::NO_INSPECTOR),
            SourceError::InspectorNotFound { program } => diag
                .with_context(format!("`{}` is not on PATH and is not a file", program))
                .with_suggestion(suggestions::NO_INSPECTOR),
        }
    }
}

/// Pick the fact source: a facts file when given, else the inspector.
pub fn fact_source(
    ctx: &GlobalContext,
    facts: Option<&Path>,
    timeout: Option<Duration>,
) -> Result<Box<dyn FactSource>> {
    if let Some(facts) = facts {
        let source = StaticFactSource::load(&ctx.resolve_path(facts))?;
        return Ok(Box::new(source));
    }

    let config = ctx.config();
    let program = config
        .inspector
        .program
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or(SourceError::NoInspector)?;

    let resolved = resolve_program(ctx, program).ok_or_else(|| {
        SourceError::InspectorNotFound {
            program: program.to_string(),
        }
    })?;
    tracing::debug!("using inspector {}", resolved.display());

    let source = CommandFactSource::new(resolved)
        .args(config.inspector_args())
        .env(config.inspector.env.clone())
        .cwd(ctx.cwd())
        .timeout(timeout.or_else(|| config.timeout()))
        .discover_provenance(config.discover_provenance());

    Ok(Box::new(source))
}

fn resolve_program(ctx: &GlobalContext, program: &str) -> Option<PathBuf> {
    let as_path = Path::new(program);
    if as_path.components().count() > 1 {
        let path = ctx.resolve_path(as_path);
        return path.is_file().then_some(path);
    }
    find_executable(program)
}

/// Build the closure of `opts.root`.
///
/// A [`ClosureError`](crate::resolver::ClosureError) is returned unwrapped
/// inside the `anyhow::Error` so callers can downcast it.
pub fn build_closure(
    ctx: &GlobalContext,
    opts: &DescribeOptions,
    cancel: &CancelToken,
    observer: Option<&dyn Fn(&PackagePath)>,
) -> Result<ClosureResult> {
    let config = ctx.config();
    let source = fact_source(ctx, opts.facts.as_deref(), opts.timeout)?;

    let mut builder = ClosureBuilder::new(source.as_ref())
        .with_cancel(cancel.clone())
        .jobs(opts.jobs.unwrap_or_else(|| config.jobs()))
        .follow_test_imports(
            opts.follow_test_imports
                .unwrap_or_else(|| config.follow_test_imports()),
        );
    if let Some(observer) = observer {
        builder = builder.observer(observer);
    }

    Ok(builder.build(&opts.root)?)
}

/// Build the closure and write its manifest.
pub fn describe(
    ctx: &GlobalContext,
    opts: &DescribeOptions,
    cancel: &CancelToken,
    observer: Option<&dyn Fn(&PackagePath)>,
) -> Result<DescribeOutcome> {
    let closure = build_closure(ctx, opts, cancel, observer)?;

    let header = opts.header.unwrap_or_else(|| ctx.config().header());
    let text = encode::serialize_with_header(&closure, header)
        .with_context(|| format!("failed to render manifest of `{}`", closure.root()))?;

    let output = match &opts.output {
        None => WriteOutcome::Stdout(text),
        Some(path) => write_manifest(&ctx.resolve_path(path), &text)?,
    };

    Ok(DescribeOutcome { closure, output })
}

/// Write manifest text to `path` atomically.
///
/// Nothing is written when the file already holds the same content.
pub fn write_manifest(path: &Path, text: &str) -> Result<WriteOutcome> {
    let digest = encode::digest(text);

    if existing_file_digest(path)?.as_deref() == Some(digest.as_str()) {
        tracing::debug!("{} is up to date", path.display());
        return Ok(WriteOutcome::Fresh {
            path: path.to_path_buf(),
            digest,
        });
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create directory: {}", dir.display()))?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;
    temp.write_all(text.as_bytes())
        .with_context(|| format!("failed to write manifest for {}", path.display()))?;
    temp.as_file()
        .sync_all()
        .with_context(|| format!("failed to sync manifest for {}", path.display()))?;
    temp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("failed to write manifest: {}", path.display()))?;

    tracing::debug!("wrote {}", path.display());
    Ok(WriteOutcome::Written {
        path: path.to_path_buf(),
        digest,
    })
}
