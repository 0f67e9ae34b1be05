//! Configuration loading.

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use mapas_core::config::AppConfig;
use std::path::Path;

/// Load the configuration file merged with `MAPAS_` environment variables.
///
/// Nested keys use a double underscore: `MAPAS_BACKEND__ANON_KEY`. A
/// missing file is not an error; the result must still pass validation.
pub fn load(path: &Path) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if path.exists() {
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
    }
    figment = figment.merge(Env::prefixed("MAPAS_").ignore(&["config"]).split("__"));

    let config: AppConfig = figment
        .extract()
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    validate(&config)?;
    Ok(config)
}

/// Local configuration rooted at `dir`.
pub fn local(dir: &Path) -> Result<AppConfig> {
    let config = AppConfig::local(dir);
    validate(&config)?;
    Ok(config)
}

fn validate(config: &AppConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))
}
