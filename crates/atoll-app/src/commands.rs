//! Subcommand implementations and the config-to-library glue they share.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use atoll_config::{CacheConfig, Config, NoiseSettings};
use atoll_terrain::{
    ChunkGeometry, NoiseParams, PixelRasterizer, TerrainError, TerrainSettings, WorldTerrain,
    build_preview_texture,
};
use atoll_texcache::{CacheError, CacheSettings, Chunk, ChunkTextureCache, TerrainChunkRenderer};
use atoll_upscale::{TemplateDictionary, UpscaleEngine, UpscaleError};
use thiserror::Error;

/// Anything that can end a subcommand early.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad world geometry or a terrain persistence failure.
    #[error(transparent)]
    Terrain(#[from] TerrainError),

    /// Template art failed to load or validate.
    #[error("template art is broken: {0}")]
    Templates(#[from] UpscaleError),

    /// The chunk texture cache failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Reading or writing an image failed.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

fn noise_template(settings: &NoiseSettings) -> NoiseParams {
    NoiseParams {
        seed: 0,
        frequency: settings.frequency,
        octaves: settings.octaves,
        weighted_strength: settings.weighted_strength,
        lacunarity: settings.lacunarity,
        gain: settings.gain,
        border_gradient: settings.border_gradient,
    }
}

/// Per-layer generation settings derived from the config.
pub fn terrain_settings(config: &Config) -> TerrainSettings {
    let mut settings = TerrainSettings::from_world_seed(
        config.world.seed,
        &noise_template(&config.terrain.height),
        &noise_template(&config.terrain.humidity),
        &noise_template(&config.terrain.biome),
    );
    settings.rows_per_step = config.terrain.rows_per_step.max(1);
    settings.max_threads = config.parallelism.effective_threads();
    settings
}

/// Chunk layout from the config.
pub fn geometry(config: &Config) -> Result<ChunkGeometry, TerrainError> {
    ChunkGeometry::new(
        config.world.width,
        config.world.height,
        config.world.chunk_size,
        config.world.resolution_divider,
    )
}

/// Rasterizer thresholds from the config.
pub fn rasterizer(config: &Config) -> PixelRasterizer {
    PixelRasterizer {
        danger_safe_threshold: config.raster.danger_safe_threshold,
        danger_alpha_step: config.raster.danger_alpha_step.max(1),
        danger_alpha_max: config.raster.danger_alpha_max,
    }
}

/// Worker timings from the config.
pub fn cache_settings(cache: &CacheConfig) -> CacheSettings {
    CacheSettings {
        stale_after: Duration::from_secs(cache.stale_after_secs),
        sweep_interval: Duration::from_secs(cache.sweep_interval_secs),
        idle_sleep: Duration::from_millis(cache.idle_sleep_ms.max(1)),
    }
}

/// Load the world for the configured seed, generating what is missing.
pub fn load_world(config: &Config) -> Result<WorldTerrain, AppError> {
    let geometry = geometry(config)?;
    let dir = config.world.seed_dir();
    Ok(WorldTerrain::load_or_generate(
        &dir,
        geometry,
        &terrain_settings(config),
    ))
}

/// Load or generate the terrain, then cache every chunk texture.
pub fn generate(config: &Config) -> Result<(), AppError> {
    let world = Arc::new(load_world(config)?);
    let chunks = Chunk::all(world.geometry());
    let engine = UpscaleEngine::new(TemplateDictionary::empty(1), config.upscale.rng_seed);
    let renderer = Arc::new(TerrainChunkRenderer::new(
        Arc::clone(&world),
        rasterizer(config),
        engine,
    ));
    let cache = ChunkTextureCache::new(
        config.world.seed_dir(),
        renderer,
        cache_settings(&config.cache),
    );

    let start = Instant::now();
    drain(&cache, &chunks);
    let saved = chunks.iter().filter(|c| c.is_saved_to_disk()).count();
    cache.shutdown();

    tracing::info!(
        chunks = chunks.len(),
        saved,
        written = cache.disk_writes(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "chunk textures ready"
    );
    Ok(())
}

/// Keep requesting unsaved chunks until all are saved or a whole round
/// makes no progress.
fn drain(cache: &ChunkTextureCache, chunks: &[Arc<Chunk>]) {
    let unsaved = || chunks.iter().filter(|c| !c.is_saved_to_disk()).count();
    let mut remaining = unsaved();

    while remaining > 0 {
        for chunk in chunks.iter().filter(|c| !c.is_saved_to_disk()) {
            cache.request(Arc::clone(chunk));
        }
        while !cache.is_idle() {
            std::thread::sleep(Duration::from_millis(20));
        }

        let now = unsaved();
        if now == remaining {
            tracing::warn!(unsaved = now, "some chunk textures could not be generated");
            return;
        }
        tracing::debug!(unsaved = now, "texture round finished");
        remaining = now;
    }
}

/// Write a downscaled whole-map preview.
pub fn preview(config: &Config, output: &Path, multiplier: Option<u32>) -> Result<(), AppError> {
    let world = load_world(config)?;
    let multiplier = multiplier.unwrap_or(config.raster.preview_multiplier);
    let image = build_preview_texture(&world, &rasterizer(config), multiplier);
    image.save(output)?;
    tracing::info!(
        path = %output.display(),
        width = image.width(),
        height = image.height(),
        "preview written"
    );
    Ok(())
}

/// Upscale tile art with the template upscaler.
///
/// Template authoring errors are returned and end the program.
pub fn upscale_art(config: &Config, input: &Path, output: &Path) -> Result<(), AppError> {
    let dictionary =
        TemplateDictionary::load_dir(&config.upscale.template_dir, config.upscale.template_scale)?;
    let mut engine = UpscaleEngine::new(dictionary, config.upscale.rng_seed);

    let source = image::open(input)?.to_rgba8();
    let upscaled = engine.upscale_templates(&source);
    tracing::debug!(cases = engine.solved_case_count(), "template upscale done");
    engine.clean_up_after_upscaling_all();

    upscaled.save(output)?;
    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        "tile art upscaled"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use atoll_terrain::{ExtProperty, ExtPropertyLayers, TerrainLayer};

    use super::*;

    fn small_config(data_dir: &Path) -> Config {
        let mut config = Config::default();
        config.world.seed = 21;
        config.world.width = 256;
        config.world.height = 128;
        config.world.chunk_size = 64;
        config.world.resolution_divider = 4;
        config.world.data_dir = data_dir.to_path_buf();
        config.parallelism.max_threads = 2;
        config.cache.idle_sleep_ms = 5;
        config
    }

    #[test]
    fn test_terrain_settings_follow_config() {
        let config = Config::default();
        let settings = terrain_settings(&config);
        assert_eq!(settings.height.octaves, config.terrain.height.octaves);
        assert!(settings.height.border_gradient);
        assert_ne!(settings.height.seed, settings.biome.seed);
        assert_eq!(settings.rows_per_step, config.terrain.rows_per_step);
    }

    #[test]
    fn test_invalid_geometry_is_reported() {
        let mut config = Config::default();
        config.world.chunk_size = 510;
        assert!(geometry(&config).is_err());
    }

    #[test]
    fn test_generate_fills_seed_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path());
        generate(&config).unwrap();

        let seed_dir = config.world.seed_dir();
        for layer in TerrainLayer::ALL {
            assert!(seed_dir.join(format!("terrain_{}.png", layer.file_stem())).exists());
        }
        assert!(ExtPropertyLayers::bitmap_path(&seed_dir, ExtProperty::Sea).exists());
        for y in 0..2 {
            for x in 0..4 {
                assert!(seed_dir.join(format!("background_{x}_{y}.png")).exists());
            }
        }
    }

    #[test]
    fn test_preview_writes_image() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path());
        let output = dir.path().join("preview.png");
        preview(&config, &output, Some(8)).unwrap();

        let image = image::open(&output).unwrap();
        assert_eq!((image.width(), image.height()), (32, 16));
    }

    #[test]
    fn test_upscale_art_with_bundled_templates() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = small_config(dir.path());
        config.upscale.template_dir =
            Path::new(env!("CARGO_MANIFEST_DIR")).join("../../assets/templates");
        let land = image::Rgba([200, 180, 90, 255]);
        let sea = image::Rgba([20, 40, 160, 255]);
        let input = dir.path().join("in.png");
        image::RgbaImage::from_fn(4, 4, |x, y| if x == y { land } else { sea })
            .save(&input)
            .unwrap();

        let output = dir.path().join("out.png");
        upscale_art(&config, &input, &output).unwrap();

        let upscaled = image::open(&output).unwrap().to_rgba8();
        assert_eq!(upscaled.dimensions(), (16, 16));
        // Corners of every replaced block keep the source colors.
        assert_eq!(*upscaled.get_pixel(0, 0), land);
        assert_eq!(*upscaled.get_pixel(7, 0), sea);
        assert_eq!(*upscaled.get_pixel(15, 15), land);
    }

    #[test]
    fn test_upscale_art_needs_templates() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = small_config(dir.path());
        config.upscale.template_dir = dir.path().join("missing");
        let input = dir.path().join("in.png");
        image::RgbaImage::new(4, 4).save(&input).unwrap();

        let result = upscale_art(&config, &input, &dir.path().join("out.png"));
        assert!(matches!(
            result,
            Err(AppError::Templates(UpscaleError::MissingAsset { .. }))
        ));
    }
}
