//! Static site generator invocation.

use crate::config::Config;
use crate::error::{Result, SpeedError};
use crate::harness::runner::run_command;
use std::fs;
use tracing::{debug, info};

/// Remove the generator cache so pages are rendered from scratch.
pub fn clear_cache(config: &Config) -> Result<()> {
    let cache = config.general.site_dir.join(&config.site.cache_dir);
    if cache.is_dir() {
        debug!("Removing site cache {}", cache.display());
        fs::remove_dir_all(&cache).map_err(|e| SpeedError::io(&cache, e))?;
    }
    Ok(())
}

/// Build the site, then drop the configured generated files.
pub fn build(config: &Config) -> Result<()> {
    run_generator(config, "build")?;

    for relative in &config.site.prune_after_build {
        let path = config.general.site_dir.join(relative);
        if path.exists() {
            debug!("Pruning {}", path.display());
            fs::remove_file(&path).map_err(|e| SpeedError::io(&path, e))?;
        }
    }
    Ok(())
}

pub fn deploy(config: &Config) -> Result<()> {
    run_generator(config, "deploy")
}

fn run_generator(config: &Config, action: &str) -> Result<()> {
    info!("Starting {} {}", config.site.command, action);
    let command = vec![config.site.command.clone(), action.to_string()];
    run_command(&command, Some(&config.general.site_dir))?;
    info!("Succeeded {} {}", config.site.command, action);
    Ok(())
}
