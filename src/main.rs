use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use quarry_core::Config;
use quarry_core::bootstrap::{build_pipeline, build_storage, build_tracker};
use quarry_core::config::resolve_config_path;
use quarry_index::progress::{IndexingProgress, RunOutcome};

#[derive(Parser, Debug)]
#[command(
    name = "quarry",
    version,
    about = "Incremental multi-vector semantic indexing of source workspaces"
)]
struct Cli {
    /// Path to the TOML config (default: $QUARRY_CONFIG or quarry.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index every matching file of the workspace
    Index {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Re-index only files that changed since the last run
    Update {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Show pending changes without indexing them
    Status {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Show the workspace collections
    Info {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Delete the workspace collections and snapshot
    Reset {
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = resolve_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)
        .with_context(|| format!("cannot load {}", config_path.display()))?;

    match cli.command {
        Command::Index { path } => index(&config, &path).await,
        Command::Update { path } => update(&config, &path).await,
        Command::Status { path } => status(&config, &path),
        Command::Info { path } => info(&config, &path).await,
        Command::Reset { path, yes } => reset(&config, &path, yes).await,
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn progress_line() -> Box<dyn FnMut(&IndexingProgress) + Send> {
    Box::new(|p: &IndexingProgress| tracing::debug!(phase = ?p.phase, "{p}"))
}

async fn index(config: &Config, root: &Path) -> anyhow::Result<()> {
    config.validate()?;
    let storage = build_storage(config)?;
    let mut pipeline = build_pipeline(config, root, storage)?.with_progress(progress_line());

    let progress = pipeline.index_workspace().await?;
    println!("{progress}");
    println!("embeddings: {}", pipeline.embedder().ledger());
    report(&progress)
}

async fn update(config: &Config, root: &Path) -> anyhow::Result<()> {
    config.validate()?;
    let storage = build_storage(config)?;
    let mut pipeline = build_pipeline(config, root, storage)?.with_progress(progress_line());

    let (changes, progress) = pipeline.index_changes().await?;
    println!("{changes}");
    if changes.is_empty() {
        return Ok(());
    }
    println!("{progress}");
    println!("embeddings: {}", pipeline.embedder().ledger());
    report(&progress)
}

fn status(config: &Config, root: &Path) -> anyhow::Result<()> {
    let tracker = build_tracker(config, root)?;
    let changes = tracker.pending_changes();
    println!("workspace {} ({})", tracker.root().display(), tracker.workspace_hash());
    println!("{changes}");
    for (mark, paths) in [
        ('+', &changes.added),
        ('~', &changes.modified),
        ('-', &changes.removed),
    ] {
        for path in paths {
            println!("  {mark} {path}");
        }
    }
    Ok(())
}

async fn info(config: &Config, root: &Path) -> anyhow::Result<()> {
    config.validate()?;
    let pipeline = build_pipeline(config, root, build_storage(config)?)?;
    let infos = pipeline.collection_info().await?;
    if infos.is_empty() {
        println!("workspace not indexed yet");
    }
    for info in infos {
        println!("{}: {} vectors, {}", info.name, info.vectors_count, info.status);
    }
    Ok(())
}

async fn reset(config: &Config, root: &Path, yes: bool) -> anyhow::Result<()> {
    config.validate()?;
    let mut pipeline = build_pipeline(config, root, build_storage(config)?)?;
    let confirmed = yes
        || Confirm::new()
            .with_prompt(format!(
                "Delete collections {} and {}?",
                pipeline.collections().code,
                pipeline.collections().docs
            ))
            .default(false)
            .interact()?;
    if !confirmed {
        println!("aborted");
        return Ok(());
    }
    pipeline.reset().await?;
    println!("index reset");
    Ok(())
}

fn report(progress: &IndexingProgress) -> anyhow::Result<()> {
    match progress.outcome() {
        RunOutcome::Succeeded => Ok(()),
        RunOutcome::Partial => {
            tracing::warn!(errors = progress.errors, "some files failed, rerun to retry them");
            Ok(())
        }
        RunOutcome::NothingIndexed => bail!("nothing was indexed ({} errors)", progress.errors),
    }
}
