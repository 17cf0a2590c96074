//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name of the config inside the config directory.
pub const CONFIG_FILE: &str = "config.ron";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// World size, chunking and seed.
    pub world: WorldConfig,
    /// Noise parameters for each terrain layer.
    pub terrain: LayerNoiseConfig,
    /// Terrain-to-color rasterizer settings.
    pub raster: RasterConfig,
    /// Pixel-art upscaler settings.
    pub upscale: UpscaleConfig,
    /// Chunk texture cache and background worker settings.
    pub cache: CacheConfig,
    /// Thread limits for parallel load/save.
    pub parallelism: ParallelismConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// World geometry and identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    /// World seed. Every persisted artifact lives under a directory named after it.
    pub seed: u32,
    /// World width in full-resolution pixels.
    pub width: u32,
    /// World height in full-resolution pixels.
    pub height: u32,
    /// Side length of a square chunk in full-resolution pixels.
    pub chunk_size: u32,
    /// Factor by which the stored scalar grids are coarser than full resolution.
    pub resolution_divider: u32,
    /// Root directory for per-seed world data.
    pub data_dir: PathBuf,
}

/// Fractal noise parameters for a single terrain layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NoiseSettings {
    /// Base frequency in cycles per full-resolution pixel.
    pub frequency: f64,
    /// Number of FBm octaves.
    pub octaves: u32,
    /// Weighted strength (0 = classic FBm, 1 = octaves damped by the previous octave).
    pub weighted_strength: f64,
    /// Frequency multiplier between octaves.
    pub lacunarity: f64,
    /// Amplitude multiplier between octaves.
    pub gain: f64,
    /// Subtract an island-shaped falloff near the world edges.
    pub border_gradient: bool,
}

/// Noise settings for all terrain layers plus incremental computation pacing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayerNoiseConfig {
    /// Height layer.
    pub height: NoiseSettings,
    /// Humidity layer.
    pub humidity: NoiseSettings,
    /// Biome layer (also drives the danger overlay).
    pub biome: NoiseSettings,
    /// Grid rows computed per incremental step.
    pub rows_per_step: u32,
}

/// Rasterizer settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RasterConfig {
    /// Danger values at or below this are not tinted.
    pub danger_safe_threshold: u8,
    /// Danger overlay alpha is quantized to multiples of this.
    pub danger_alpha_step: u8,
    /// Upper bound for the danger overlay alpha.
    pub danger_alpha_max: u8,
    /// Downscale multiplier for the whole-map preview texture.
    pub preview_multiplier: u32,
}

/// Upscaler settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UpscaleConfig {
    /// Folder holding template source and replacement images.
    pub template_dir: PathBuf,
    /// Seed for choosing between equivalent replacement variants.
    pub rng_seed: u64,
    /// Replacement tiles are this many times larger than their 2x2 source.
    pub template_scale: u32,
}

/// Background worker timings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Requests older than this are dropped by the sweep.
    pub stale_after_secs: u64,
    /// Interval between stale-request sweeps.
    pub sweep_interval_secs: u64,
    /// How long the worker waits for new work when the queue is empty.
    pub idle_sleep_ms: u64,
}

/// Thread limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ParallelismConfig {
    /// Maximum worker threads for parallel work. 0 means one per CPU.
    pub max_threads: usize,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Also write a JSON log file under `logs/` in the config directory.
    pub log_to_file: bool,
}

// --- Default implementations ---

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 1337,
            width: 4096,
            height: 4096,
            chunk_size: 512,
            resolution_divider: 4,
            data_dir: PathBuf::from("worlds"),
        }
    }
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            frequency: 0.002,
            octaves: 5,
            weighted_strength: 0.0,
            lacunarity: 2.0,
            gain: 0.5,
            border_gradient: false,
        }
    }
}

impl Default for LayerNoiseConfig {
    fn default() -> Self {
        Self {
            height: NoiseSettings {
                frequency: 0.0015,
                octaves: 6,
                border_gradient: true,
                ..Default::default()
            },
            humidity: NoiseSettings {
                frequency: 0.003,
                octaves: 4,
                weighted_strength: 0.3,
                ..Default::default()
            },
            biome: NoiseSettings {
                frequency: 0.001,
                octaves: 3,
                ..Default::default()
            },
            rows_per_step: 64,
        }
    }
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            danger_safe_threshold: 150,
            danger_alpha_step: 15,
            danger_alpha_max: 165,
            preview_multiplier: 16,
        }
    }
}

impl Default for UpscaleConfig {
    fn default() -> Self {
        Self {
            template_dir: PathBuf::from("assets/templates"),
            rng_seed: 0x5eed,
            template_scale: 4,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: 30,
            sweep_interval_secs: 10,
            idle_sleep_ms: 50,
        }
    }
}

impl Default for ParallelismConfig {
    fn default() -> Self {
        Self { max_threads: 0 }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_to_file: false,
        }
    }
}

impl ParallelismConfig {
    /// Resolved thread count: the configured maximum, or the CPU count when unset.
    pub fn effective_threads(&self) -> usize {
        if self.max_threads == 0 {
            num_cpus::get().max(1)
        } else {
            self.max_threads
        }
    }
}

impl WorldConfig {
    /// Directory holding every persisted artifact for this seed.
    pub fn seed_dir(&self) -> PathBuf {
        self.data_dir.join(format!("seed_{}", self.seed))
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Load `config.ron` from `config_dir`, writing the defaults there first
    /// if it does not exist yet.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);
        if !config_path.exists() {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            return Ok(config);
        }

        let config = Self::read_file(&config_path)?;
        log::info!("Loaded config from {}", config_path.display());
        Ok(config)
    }

    /// Write `config.ron` into `config_dir`, creating the directory.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::write(config_dir, e))?;

        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);
        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Serialize)?;

        let config_path = config_dir.join(CONFIG_FILE);
        std::fs::write(&config_path, serialized).map_err(|e| ConfigError::write(&config_path, e))
    }

    /// Re-read `config.ron`. Returns `Some` only if it differs from `self`.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let new_config = Self::read_file(&config_dir.join(CONFIG_FILE))?;
        if &new_config == self {
            return Ok(None);
        }
        log::info!("Config reloaded with changes");
        Ok(Some(new_config))
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;
        ron::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
