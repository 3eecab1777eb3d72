// Configuration module
// Public interface for configuration loading

mod loader;
mod settings;

pub use loader::{load_config, load_config_from, parse_config};
pub use settings::{
    default_product_dir, ClientConfig, CONFIG_FILE_NAME, DEFAULT_API_VERSION, DEFAULT_ENDPOINT,
    EXPORT_FILE_NAME, PRODUCT_DIR_NAME,
};
