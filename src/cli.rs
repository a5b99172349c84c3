//! CLI argument parsing for titlesync
//!
//! Supports global flags: --root, --config, --format, --quiet, --verbose

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Titlesync - keep markdown filenames and aliases in sync with their titles
#[derive(Parser, Debug)]
#[command(name = "titlesync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Vault root directory (defaults to the current directory)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Config file path (defaults to <root>/titlesync.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "human")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Debug-level logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Explicit log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synchronize one document with its title
    File {
        /// Document path, relative to the root
        path: String,
    },

    /// Synchronize every markdown document under the root
    Apply {
        /// Process documents the scope rules would exclude
        #[arg(long)]
        ignore_scope: bool,

        /// Report what would change without touching any files
        #[arg(long)]
        dry_run: bool,
    },

    /// Watch the root and synchronize on changes until interrupted
    Watch {
        /// Debounce interval for filesystem events, in milliseconds
        #[arg(long, default_value_t = 500)]
        debounce_ms: u64,
    },

    /// Write a default config file to <root>/titlesync.toml
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Config,
}
