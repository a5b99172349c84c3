//! Config bootstrap and inspection

use std::path::Path;

use titlesync_core::config::EngineConfig;
use titlesync_core::error::{Result, SyncError};

use crate::cli::{Cli, OutputFormat};

use super::{load_config, CONFIG_FILE};

pub fn init(cli: &Cli, root: &Path, force: bool) -> Result<()> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => root.join(CONFIG_FILE),
    };
    if path.exists() && !force {
        return Err(SyncError::UsageError(format!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        )));
    }

    EngineConfig::default().save(&path)?;
    if !cli.quiet {
        println!("wrote {}", path.display());
    }
    Ok(())
}

pub fn show(cli: &Cli, root: &Path) -> Result<()> {
    let config = load_config(cli, root)?;
    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Human => {
            let rendered = toml::to_string_pretty(&config)
                .map_err(|e| SyncError::Other(format!("failed to render config: {e}")))?;
            print!("{rendered}");
        }
    }
    Ok(())
}
