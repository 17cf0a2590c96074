//! Command-line argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::Config;

/// Atoll command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "atoll", about = "Terrain field generation and chunk texture cache")]
pub struct CliArgs {
    /// What to do. Defaults to `generate`.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// World seed.
    #[arg(long, global = true)]
    pub seed: Option<u32>,

    /// World width in pixels.
    #[arg(long, global = true)]
    pub width: Option<u32>,

    /// World height in pixels.
    #[arg(long, global = true)]
    pub height: Option<u32>,

    /// Root directory for world data.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Maximum worker threads (0 = one per CPU).
    #[arg(long, global = true)]
    pub threads: Option<usize>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Load or generate the terrain and render every chunk texture.
    Generate,
    /// Write a downscaled whole-map preview image.
    Preview {
        /// Output PNG path.
        #[arg(long, default_value = "preview.png")]
        output: PathBuf,
        /// Downscale multiplier (overrides the config value).
        #[arg(long)]
        multiplier: Option<u32>,
    },
    /// Upscale a piece of tile art with the template upscaler.
    UpscaleArt {
        /// Source image.
        input: PathBuf,
        /// Destination image.
        output: PathBuf,
    },
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(seed) = args.seed {
            self.world.seed = seed;
        }
        if let Some(w) = args.width {
            self.world.width = w;
        }
        if let Some(h) = args.height {
            self.world.height = h;
        }
        if let Some(ref dir) = args.data_dir {
            self.world.data_dir = dir.clone();
        }
        if let Some(threads) = args.threads {
            self.parallelism.max_threads = threads;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
