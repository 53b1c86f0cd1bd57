use std::num::NonZeroUsize;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Parser;

use dirsum::{Executor, Filter, FolderHasher};

/// Print a content fingerprint tree for a folder.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Folder to hash.
    path: Utf8PathBuf,

    /// Name for the root node, defaults to the folder's name.
    #[arg(long)]
    label: Option<String>,

    /// Maximum number of files read at the same time.
    #[arg(short, long)]
    jobs: Option<NonZeroUsize>,

    /// Glob of entries to leave out, matched against the full path.
    #[arg(short, long = "exclude", value_name = "GLOB")]
    excludes: Vec<String>,

    /// Glob of entries to keep, matched against the full path. Everything is
    /// kept when none is given.
    #[arg(short, long = "include", value_name = "GLOB")]
    includes: Vec<String>,

    /// Print only the root hash.
    #[arg(long)]
    root_only: bool,

    /// Pretty-print the JSON tree.
    #[arg(long)]
    pretty: bool,
}

fn main() -> anyhow::Result<()> {
    dirsum::init_logging()?;

    let args = Args::parse();

    let jobs = args
        .jobs
        .or_else(|| std::thread::available_parallelism().ok())
        .map_or(1, NonZeroUsize::get);

    let mut hasher = FolderHasher::new().executor(Executor::new(jobs)?);

    if let Some(label) = &args.label {
        hasher = hasher.label(label);
    }

    if !args.includes.is_empty() || !args.excludes.is_empty() {
        hasher = hasher.filter(Filter::globs(&args.includes, &args.excludes)?);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;

    let tree = runtime
        .block_on(hasher.hash(&args.path))
        .with_context(|| format!("Couldn't hash '{}'", args.path))?;

    if args.root_only {
        println!("{}", tree.hash);
    } else if args.pretty {
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else {
        println!("{}", serde_json::to_string(&tree)?);
    }

    Ok(())
}
