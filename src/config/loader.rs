// Configuration loader
// Loads client settings from ~/Oadin/client.toml, then applies environment overrides

use std::fs;
use std::path::Path;

use super::settings::{default_product_dir, ClientConfig, CONFIG_FILE_NAME};
use crate::errors::{ErrorKind, OadinError, Result};

/// Load configuration from the product directory and environment
///
/// A missing config file is not an error: defaults apply.
pub fn load_config() -> Result<ClientConfig> {
    let path = default_product_dir()?.join(CONFIG_FILE_NAME);
    let config = if path.exists() {
        load_config_from(&path)?
    } else {
        ClientConfig::default()
    };
    Ok(apply_env_overrides(config, |name| std::env::var(name).ok()))
}

/// Load configuration from an explicit TOML file (no environment overrides)
pub fn load_config_from(path: &Path) -> Result<ClientConfig> {
    let contents = fs::read_to_string(path)
        .map_err(|e| OadinError::io(format!("Failed to read {}", path.display()), e))?;

    let config = parse_config(&contents)
        .map_err(|e| e.context(format!("Invalid config file {}", path.display())))?;

    tracing::debug!(path = %path.display(), "Loaded client config");
    Ok(config)
}

/// Parse TOML text into a config, filling unset fields with defaults
pub fn parse_config(contents: &str) -> Result<ClientConfig> {
    toml::from_str(contents).map_err(|e| OadinError::new(ErrorKind::Config, e.to_string()))
}

/// Apply `OADIN_*` overrides read through `lookup`; empty values are ignored
fn apply_env_overrides<L>(mut config: ClientConfig, lookup: L) -> ClientConfig
where
    L: Fn(&str) -> Option<String>,
{
    let non_empty = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(version) = non_empty("OADIN_API_VERSION") {
        config.api_version = version;
    }
    if let Some(endpoint) = non_empty("OADIN_ENDPOINT") {
        config.endpoint = endpoint;
    }
    if let Some(url) = non_empty("OADIN_DOWNLOAD_URL") {
        config.download_url = Some(url);
    }
    config
}
