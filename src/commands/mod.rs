//! Command implementations and dispatch

mod apply;
mod file;
mod setup;
mod watch;

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use titlesync_core::clock::SystemClock;
use titlesync_core::config::EngineConfig;
use titlesync_core::engine::RenameEngine;
use titlesync_core::error::{Result, SyncError};
use titlesync_core::host::{DocumentStore, Notifier, NullNotifier};
use titlesync_core::outcome::Outcome;

use crate::cli::{Cli, Commands, OutputFormat};
use crate::host_fs::{ConsoleNotifier, FsHost};

pub const CONFIG_FILE: &str = "titlesync.toml";

pub fn run(cli: &Cli) -> Result<()> {
    let root = resolve_root(cli)?;

    match &cli.command {
        Commands::Init { force } => setup::init(cli, &root, *force),
        Commands::Config => setup::show(cli, &root),
        Commands::File { path } => file::run(&Context::new(cli, root)?, path),
        Commands::Apply {
            ignore_scope,
            dry_run,
        } => apply::run(&Context::new(cli, root)?, *ignore_scope, *dry_run),
        Commands::Watch { debounce_ms } => watch::run(&Context::new(cli, root)?, *debounce_ms),
    }
}

fn resolve_root(cli: &Cli) -> Result<PathBuf> {
    let root = match &cli.root {
        Some(root) => root.clone(),
        None => env::current_dir()?,
    };
    if !root.is_dir() {
        return Err(SyncError::UsageError(format!(
            "root is not a directory: {}",
            root.display()
        )));
    }
    Ok(root)
}

fn load_config(cli: &Cli, root: &Path) -> Result<EngineConfig> {
    match &cli.config {
        Some(path) => EngineConfig::load(path),
        None => {
            let default_path = root.join(CONFIG_FILE);
            if default_path.is_file() {
                EngineConfig::load(&default_path)
            } else {
                Ok(EngineConfig::default())
            }
        }
    }
}

/// Shared state for commands that run the engine
pub struct Context {
    pub format: OutputFormat,
    pub quiet: bool,
    pub host: Arc<FsHost>,
    pub engine: RenameEngine,
    pub config: EngineConfig,
}

impl Context {
    fn new(cli: &Cli, root: PathBuf) -> Result<Self> {
        let config = load_config(cli, &root)?;
        let host = Arc::new(FsHost::new(root));
        let notifier: Arc<dyn Notifier> = if cli.quiet {
            Arc::new(NullNotifier)
        } else {
            Arc::new(ConsoleNotifier)
        };
        let engine = RenameEngine::new(
            Arc::clone(&host) as Arc<dyn DocumentStore>,
            notifier,
            Arc::new(SystemClock::new()),
            config.clone(),
        );
        Ok(Context {
            format: cli.format,
            quiet: cli.quiet,
            host,
            engine,
            config,
        })
    }

    /// One line per processed document. Quiet mode keeps renames and alias
    /// updates visible; no-ops and skips stay silent in human output.
    pub fn report(&self, path: &str, outcome: &Outcome) {
        match self.format {
            OutputFormat::Json => println!("{}", outcome_json(path, outcome)),
            OutputFormat::Human => match outcome {
                Outcome::Renamed { from, to } => println!("renamed {from} -> {to}"),
                Outcome::AliasOnly => println!("alias updated {path}"),
                Outcome::Unchanged => {
                    if !self.quiet {
                        println!("unchanged {path}");
                    }
                }
                Outcome::Skipped(reason) => {
                    if !self.quiet {
                        println!("skipped {path} ({reason})");
                    }
                }
                Outcome::Failed(error) => eprintln!("failed {path}: {error}"),
            },
        }
    }
}

pub fn outcome_json(path: &str, outcome: &Outcome) -> serde_json::Value {
    match outcome {
        Outcome::Renamed { from, to } => serde_json::json!({
            "path": path, "outcome": "renamed", "from": from, "to": to,
        }),
        Outcome::AliasOnly => serde_json::json!({
            "path": path, "outcome": "alias-only",
        }),
        Outcome::Unchanged => serde_json::json!({
            "path": path, "outcome": "unchanged",
        }),
        Outcome::Skipped(reason) => serde_json::json!({
            "path": path, "outcome": "skipped", "reason": reason.as_str(),
        }),
        Outcome::Failed(error) => serde_json::json!({
            "path": path, "outcome": "failed", "error": error.to_string(),
        }),
    }
}
