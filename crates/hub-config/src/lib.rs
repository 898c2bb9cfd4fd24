//! Configuration for the hub server
//!
//! The configuration is a small YAML file. A missing file is not an error,
//! every field has a default and can be overridden from the environment:
//!
//! - `HUB_STORAGE_DIR` - directory holding the persisted JSON files
//! - `HUB_LOG_LEVEL` - default tracing level (`RUST_LOG` still wins)
//!
//! # Example
//!
//! ```ignore
//! use hub_config::HubConfig;
//!
//! let config = HubConfig::load("hub.yaml")?.with_env_overrides()?;
//! println!("storing state in {}", config.storage_dir.display());
//! ```

mod config;
mod error;

pub use config::{HubConfig, LOG_LEVELS};
pub use error::{ConfigError, ConfigResult};
