//! Config command handlers

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use callscope::Config;

use super::load_config;

/// Print the effective configuration as TOML.
#[cfg(not(tarpaulin_include))]
pub fn handle_show(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    print!("{}", config.to_toml()?);
    Ok(())
}

/// Write the default configuration.
#[cfg(not(tarpaulin_include))]
pub fn handle_init(config_path: Option<&Path>, force: bool) -> Result<()> {
    let path = init_config(config_path, force)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

/// Write defaults to `path` (or the default location) unless a file exists.
pub fn init_config(path: Option<&Path>, force: bool) -> Result<PathBuf> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => Config::config_path()?,
    };
    if path.exists() && !force {
        bail!(
            "Config file {} already exists. Use --force to overwrite.",
            path.display()
        );
    }
    Config::default().save_to(&path)?;
    Ok(path)
}
