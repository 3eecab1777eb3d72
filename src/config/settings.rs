// Configuration structs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::{ErrorKind, OadinError, Result};

/// API version prefix served by current daemon builds
pub const DEFAULT_API_VERSION: &str = "oadin/v0.2";

/// Loopback endpoint the daemon binds to
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:16688";

/// Per-user directory holding the daemon binary and exported config
pub const PRODUCT_DIR_NAME: &str = "Oadin";

/// File name of the exported daemon configuration
pub const EXPORT_FILE_NAME: &str = ".oadin";

/// File name of the optional client configuration
pub const CONFIG_FILE_NAME: &str = "client.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Versioned path prefix, e.g. "oadin/v0.2"
    pub api_version: String,

    /// Scheme, host and port of the daemon
    pub endpoint: String,

    /// Override for `<home>/Oadin`
    pub product_dir: Option<PathBuf>,

    /// Override for the per-platform daemon download URL
    pub download_url: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            product_dir: None,
            download_url: None,
        }
    }
}

impl ClientConfig {
    /// Config with a custom API version and everything else default
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            api_version: version.into(),
            ..Self::default()
        }
    }

    /// Daemon origin without a trailing slash
    pub fn origin(&self) -> String {
        self.endpoint.trim_end_matches('/').to_string()
    }

    /// `<endpoint>/<api_version>/`, always ending in exactly one slash
    pub fn base_url(&self) -> String {
        let version = self.api_version.trim_matches('/');
        if version.is_empty() {
            format!("{}/", self.origin())
        } else {
            format!("{}/{}/", self.origin(), version)
        }
    }

    /// Resolve the product directory, defaulting to `<home>/Oadin`
    pub fn product_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.product_dir {
            return Ok(dir.clone());
        }
        default_product_dir()
    }
}

/// `<home>/Oadin`
pub fn default_product_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(PRODUCT_DIR_NAME))
        .ok_or_else(|| OadinError::new(ErrorKind::Config, "Could not determine home directory"))
}
