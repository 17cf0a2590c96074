//! Atoll command-line tool.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p atoll-app` to generate the configured world and its
//! chunk textures, or `cargo run -p atoll-app -- preview --output map.png`.

mod commands;

use std::process::ExitCode;

use atoll_config::{CliArgs, Command, Config};
use clap::Parser;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_dir = args
        .config
        .clone()
        .unwrap_or_else(atoll_config::default_config_dir);

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    atoll_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    let threads = config.parallelism.effective_threads();
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("atoll-raster-{i}"))
        .build_global()
    {
        tracing::warn!(error = %e, "could not size the global thread pool");
    }

    tracing::info!(
        seed = config.world.seed,
        width = config.world.width,
        height = config.world.height,
        threads,
        "atoll starting"
    );

    let result = match args.command.clone().unwrap_or(Command::Generate) {
        Command::Generate => commands::generate(&config),
        Command::Preview { output, multiplier } => commands::preview(&config, &output, multiplier),
        Command::UpscaleArt { input, output } => commands::upscale_art(&config, &input, &output),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "atoll failed");
            ExitCode::FAILURE
        }
    }
}
