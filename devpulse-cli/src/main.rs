// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Devpulse CLI
//!
//! Hosts a tracking session fed by JSON-lines save events on stdin, and
//! offers a few maintenance commands against the activity repository.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use devpulse_core::TrackerConfig;
use devpulse_storage::{read_log, FsStore, GitHubStore, RemoteStore};
use devpulse_tracker::{project_name_for, CaptureOutcome, LogNotifier, SaveEvent, Tracker};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_FILE: &str = "devpulse.toml";

#[derive(Parser)]
#[command(name = "devpulse")]
#[command(about = "Devpulse - edit activity tracker", long_about = None)]
struct Cli {
    /// Config file (defaults to ./devpulse.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Store activity in this directory instead of on GitHub
    #[arg(long)]
    local_dir: Option<PathBuf>,

    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track save events read from stdin, one JSON object per line
    Run,

    /// Write summary snapshots now
    Snapshot {
        /// Project to summarize (repeatable)
        #[arg(long = "project", required = true)]
        projects: Vec<String>,
    },

    /// Print a project's remote activity log
    Log {
        #[arg(long)]
        project: String,
    },

    /// Validate the configuration and reach the repository
    Check,
}

/// One line of `run` input. `project` defaults to the file's repository name.
#[derive(Debug, Deserialize)]
struct SaveLine {
    file: String,
    content: String,
    #[serde(default)]
    project: Option<String>,
}

impl From<SaveLine> for SaveEvent {
    fn from(line: SaveLine) -> Self {
        match line.project {
            Some(project) => SaveEvent::new(line.file, line.content, project),
            None => {
                let project = project_name_for(Path::new(&line.file));
                SaveEvent::new(line.file, line.content, project)
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase())),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;
    let store = open_store(&config, cli.local_dir.as_deref()).await?;

    match cli.command {
        Commands::Run => run(config, store).await,
        Commands::Snapshot { projects } => snapshot(config, store, &projects).await,
        Commands::Log { project } => {
            let log = read_log(store.as_ref(), &config.remote.repository, &project)
                .await
                .with_context(|| format!("Failed to read activity log for {project}"))?;
            println!("{}", log.to_json()?);
            Ok(())
        }
        Commands::Check => {
            Tracker::activate(config.clone(), store, Arc::new(LogNotifier))
                .await
                .context("Activation failed")?;
            println!("✓ Configuration valid");
            println!("✓ Repository {} reachable", config.remote.repository);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<TrackerConfig> {
    match path {
        Some(path) => TrackerConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => TrackerConfig::load(DEFAULT_CONFIG_FILE)
            .with_context(|| format!("Failed to load {DEFAULT_CONFIG_FILE}")),
        None => TrackerConfig::from_env().context("Invalid configuration"),
    }
}

async fn open_store(config: &TrackerConfig, local_dir: Option<&Path>) -> Result<Arc<dyn RemoteStore>> {
    if let Some(dir) = local_dir {
        let store = FsStore::new(dir);
        // A local repository is just a directory, so create it on demand
        store
            .create_repository(&config.remote.repository)
            .await
            .with_context(|| format!("Failed to prepare {}", dir.display()))?;
        debug!(root = %dir.display(), "Using local store");
        return Ok(Arc::new(store));
    }

    if config.remote.owner.trim().is_empty() {
        bail!("remote.owner must be set (or pass --local-dir)");
    }
    let token = config.remote.token()?;
    let store = GitHubStore::new(&config.remote, token).context("Failed to build HTTP client")?;
    Ok(Arc::new(store))
}

async fn run(config: TrackerConfig, store: Arc<dyn RemoteStore>) -> Result<()> {
    let tracker = Tracker::activate(config, store, Arc::new(LogNotifier))
        .await
        .context("Activation failed")?;
    tracker.start();
    info!("Reading save events from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut captured = 0usize;
    let mut dropped = 0usize;

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                None
            }
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let event: SaveEvent = match serde_json::from_str::<SaveLine>(&line) {
            Ok(parsed) => parsed.into(),
            Err(e) => {
                warn!(error = %e, "Skipping malformed save event");
                continue;
            }
        };
        match tracker.on_save_event(event).await {
            CaptureOutcome::Submitted { .. } => captured += 1,
            CaptureOutcome::Dropped { .. } => dropped += 1,
            CaptureOutcome::Disabled => {}
        }
    }

    let report = tracker.shutdown().await;
    println!(
        "✓ Captured {} edits ({} dropped), wrote {} records to {} projects",
        captured, dropped, report.records_written, report.projects_written
    );
    if report.records_discarded > 0 {
        println!("✗ {} records could not be written", report.records_discarded);
    }
    Ok(())
}

async fn snapshot(config: TrackerConfig, store: Arc<dyn RemoteStore>, projects: &[String]) -> Result<()> {
    let tracker = Tracker::activate(config, store, Arc::new(LogNotifier))
        .await
        .context("Activation failed")?;
    for project in projects {
        tracker.queue().track_project(project);
    }
    tracker.snapshot_now().await.context("Snapshot failed")?;
    println!("✓ Wrote summaries for {} projects", projects.len());
    Ok(())
}
