//! Configuration system for the Atoll terrain core.
//!
//! World dimensions, noise parameters, rasterizer thresholds, cache timings and
//! parallelism limits persist to disk as a RON file. Supports CLI overrides via
//! clap, hot-reload detection, and forward/backward compatible serialization.

mod cli;
mod config;
mod error;

pub use cli::{CliArgs, Command};
pub use config::{
    CONFIG_FILE, CacheConfig, Config, DebugConfig, LayerNoiseConfig, NoiseSettings,
    ParallelismConfig, RasterConfig, UpscaleConfig, WorldConfig,
};
pub use error::ConfigError;

/// Returns the default directory holding `config.ron`.
///
/// Falls back to the working directory when the platform has no config dir.
pub fn default_config_dir() -> std::path::PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("atoll"))
        .unwrap_or_else(|| std::path::PathBuf::from("."))
}
