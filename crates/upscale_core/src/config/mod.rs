//! Configuration for the upscaler.
//!
//! This module provides:
//! - TOML-based settings with one table per concern
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates that leave the rest of the file alone
//! - Environment overrides read once at startup
//!
//! # Example
//!
//! ```no_run
//! use upscale_core::config::{ConfigManager, EnvOverrides};
//!
//! let mut config = ConfigManager::new(".config/upscaler.toml");
//! config.load_or_create().unwrap();
//!
//! let mut settings = config.settings().clone();
//! EnvOverrides::from_env().unwrap().apply(&mut settings).unwrap();
//! println!("Work root: {}", settings.paths.temp_root);
//! ```

mod env;
mod manager;
mod settings;

pub use env::EnvOverrides;
pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    split_args, ConfigSection, EncodeSettings, InterpolationSettings, LoggingSettings,
    PathSettings, Settings, ToolSettings, UpscaleSettings,
};
