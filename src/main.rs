use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use env_logger::Env;
use log::{debug, error, warn};

mod cache;
mod env;
mod install;
mod integrity;
mod manifest;
mod networking;
mod storage;
mod util;

use crate::cache::CacheJanitor;
use crate::env::AppPaths;
use crate::install::InstallPipeline;
use crate::manifest::{Manifest, ManifestLoader};
use crate::networking::{Downloader, RetryPolicy};
use crate::storage::MetadataStore;

const DEFAULT_MANIFEST: &str = "webui_dependencies.json";

#[derive(Parser, Debug)]
#[command(
    name = "gen7-deps",
    author,
    version,
    about = "Fetches, verifies and installs the web UI dependencies of the Gen7 shell"
)]
struct Cli {
    /// Print version and exit.
    #[arg(long)]
    version_only: bool,

    /// Config directory holding the manifest and the download cache.
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Directory assets are installed into.
    #[arg(long, global = true)]
    target_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Install client-side dependencies.
    Install {
        /// Re-fetch every asset even when it looks up-to-date.
        #[arg(short, long)]
        update: bool,
        /// Manifest copied into the config directory before installing.
        #[arg(long)]
        manifest: Option<PathBuf>,
        /// Attempts per request when the server times out.
        #[arg(long, default_value_t = 3)]
        retries: u32,
        /// Base wait between attempts; attempt N waits N times this.
        #[arg(long, default_value_t = 2)]
        backoff_secs: u64,
        /// Connect and per-read timeout.
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
        /// Hide per-download progress bars.
        #[arg(long)]
        no_progress: bool,
    },
    /// Remove downloaded files from the cache.
    ClearCache,
    /// Show recorded state of manifest entries without touching the network.
    Status {
        /// Only show this entry.
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if cli.version_only {
        println!("gen7-deps {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let paths = AppPaths::resolve(cli.config_dir, cli.target_dir);
    debug!("paths: {paths:?}");

    let result = match cli.command {
        Some(Command::Install {
            update,
            manifest,
            retries,
            backoff_secs,
            timeout_secs,
            no_progress,
        }) => {
            let retry = RetryPolicy::new(retries, Duration::from_secs(backoff_secs));
            let downloader = Downloader::new(Duration::from_secs(timeout_secs), retry);
            let pipeline = InstallPipeline::new(downloader, paths.clone()).with_progress(!no_progress);
            run_install(&paths, pipeline, manifest.as_deref(), update).await
        }
        Some(Command::ClearCache) => run_clear_cache(&paths),
        Some(Command::Status { name }) => run_status(&paths, name.as_deref()),
        None => Cli::command().print_help().map_err(|e| e.to_string()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run_install(
    paths: &AppPaths,
    pipeline: InstallPipeline<Downloader>,
    manifest_source: Option<&Path>,
    force: bool,
) -> Result<(), String> {
    let loader = ManifestLoader::new(&paths.manifest_path);
    match manifest_source {
        Some(source) => loader.seed_from(source)?,
        None if Path::new(DEFAULT_MANIFEST).exists() => loader.seed_from(Path::new(DEFAULT_MANIFEST))?,
        None => debug!(
            "install: no {DEFAULT_MANIFEST} in working directory; using {}",
            loader.path().display()
        ),
    }
    let manifest = loader.load();

    let report = pipeline.synchronize(&manifest, force).await?;

    println!();
    for line in report.summary_lines() {
        println!("{line}");
    }
    debug!("install: {} entries already up-to-date", report.skipped.len());
    for (name, reason) in &report.failed {
        debug!("{name}: {reason}");
    }
    Ok(())
}

fn run_clear_cache(paths: &AppPaths) -> Result<(), String> {
    let report = CacheJanitor::new(&paths.staging_dir).clear(&CacheJanitor::default_exclusions())?;
    for notice in report.notices() {
        println!("{notice}");
    }
    if !report.failed.is_empty() {
        warn!("-> Could not remove: {}", report.failed.join(", "));
    }
    if report.removed.is_empty() {
        println!("-> Cache already empty");
    } else {
        println!(
            "-> Removed {} entries ({})",
            report.removed.len(),
            util::format_size(report.reclaimed_bytes)
        );
    }
    Ok(())
}

fn run_status(paths: &AppPaths, name: Option<&str>) -> Result<(), String> {
    let mut manifest = ManifestLoader::new(&paths.manifest_path).load();
    if let Some(name) = name {
        let spec = manifest
            .get(name)
            .cloned()
            .ok_or_else(|| format!("{name} is not in the manifest"))?;
        manifest = Manifest::new(vec![spec]);
    }
    let metadata = MetadataStore::new(&paths.metadata_path).load()?;
    let lines = install::status::collect(&manifest, &metadata, &paths.staging_dir)?;
    for (index, line) in lines.iter().enumerate() {
        println!(
            "{:0>2} {:<24} {:<6} {:<8} {}",
            index + 1,
            line.spec.name,
            line.spec.kind.label(),
            line.state,
            line.last_modified.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}
