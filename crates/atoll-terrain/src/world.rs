//! The assembled terrain: three scalar layers plus the boolean property layers.
//!
//! This is the query surface collaborators use: scalar and property lookups by
//! raw or scaled coordinate, and cheap chunk-level min/max and containment
//! checks.

use std::path::Path;

use image::Rgba;

use crate::error::TerrainError;
use crate::ext_props::{ExtProperty, ExtPropertyLayers};
use crate::geometry::{ChunkCoord, ChunkGeometry};
use crate::noise_field::{NoiseField, NoiseParams, TerrainLayer};
use crate::raster::PixelRasterizer;

/// Everything needed to generate a world's terrain.
#[derive(Clone, Debug)]
pub struct TerrainSettings {
    /// Parameters of the height layer (seed included).
    pub height: NoiseParams,
    /// Parameters of the humidity layer.
    pub humidity: NoiseParams,
    /// Parameters of the biome layer.
    pub biome: NoiseParams,
    /// Grid rows per incremental step.
    pub rows_per_step: u32,
    /// Upper bound on threads for property load/save.
    pub max_threads: usize,
}

impl TerrainSettings {
    /// Derive per-layer seeds from one world seed.
    pub fn from_world_seed(
        world_seed: u32,
        height: &NoiseParams,
        humidity: &NoiseParams,
        biome: &NoiseParams,
    ) -> Self {
        Self {
            height: NoiseParams::for_layer(TerrainLayer::Height, world_seed, height),
            humidity: NoiseParams::for_layer(TerrainLayer::Humidity, world_seed, humidity),
            biome: NoiseParams::for_layer(TerrainLayer::Biome, world_seed, biome),
            rows_per_step: 64,
            max_threads: 1,
        }
    }

    fn params(&self, layer: TerrainLayer) -> &NoiseParams {
        match layer {
            TerrainLayer::Height => &self.height,
            TerrainLayer::Humidity => &self.humidity,
            TerrainLayer::Biome => &self.biome,
        }
    }
}

/// Fully computed terrain for one world.
pub struct WorldTerrain {
    geometry: ChunkGeometry,
    height: NoiseField,
    humidity: NoiseField,
    biome: NoiseField,
    props: ExtPropertyLayers,
}

impl WorldTerrain {
    /// Compute every layer in memory.
    pub fn generate(geometry: ChunkGeometry, settings: &TerrainSettings) -> Self {
        let [height, humidity, biome] = TerrainLayer::ALL.map(|layer| {
            let mut field = NoiseField::new(layer, settings.params(layer).clone(), geometry);
            while !field.calculate_rows(settings.rows_per_step) {}
            field
        });
        let mut props = ExtPropertyLayers::new(geometry);
        props.derive_from_terrain(&height, &biome);
        props.create_contains_properties_grid();

        Self {
            geometry,
            height,
            humidity,
            biome,
            props,
        }
    }

    /// Load every layer from `dir`, regenerating (and re-persisting) whatever
    /// is missing or stale.
    ///
    /// Property layers are rebuilt whenever any scalar layer was regenerated.
    pub fn load_or_generate(dir: &Path, geometry: ChunkGeometry, settings: &TerrainSettings) -> Self {
        let mut regenerated = false;
        let [height, humidity, biome] = TerrainLayer::ALL.map(|layer| {
            let params = settings.params(layer).clone();
            match NoiseField::load(dir, layer, params.clone(), geometry) {
                Some(field) => field,
                None => {
                    regenerated = true;
                    NoiseField::load_or_generate(dir, layer, params, geometry, settings.rows_per_step)
                }
            }
        });

        let cached_props = if regenerated {
            None
        } else {
            ExtPropertyLayers::load(dir, geometry, settings.max_threads)
        };
        let props = cached_props.unwrap_or_else(|| {
            let mut props = ExtPropertyLayers::new(geometry);
            props.derive_from_terrain(&height, &biome);
            if let Err(e) = props.end_creation_and_save(dir, settings.max_threads) {
                tracing::warn!(error = %e, "failed to cache ext property layers");
            }
            props
        });

        tracing::info!(
            chunks = geometry.chunk_count(),
            regenerated,
            dir = %dir.display(),
            "terrain ready"
        );
        Self {
            geometry,
            height,
            humidity,
            biome,
            props,
        }
    }

    /// Persist every layer.
    pub fn save(&self, dir: &Path, max_threads: usize) -> Result<(), TerrainError> {
        for layer in TerrainLayer::ALL {
            self.field(layer).save(dir)?;
        }
        self.props.save(dir, max_threads)
    }

    /// The chunk layout.
    pub fn geometry(&self) -> &ChunkGeometry {
        &self.geometry
    }

    /// Borrow a scalar layer.
    pub fn field(&self, layer: TerrainLayer) -> &NoiseField {
        match layer {
            TerrainLayer::Height => &self.height,
            TerrainLayer::Humidity => &self.humidity,
            TerrainLayer::Biome => &self.biome,
        }
    }

    /// Mutably borrow a scalar layer.
    pub fn field_mut(&mut self, layer: TerrainLayer) -> &mut NoiseField {
        match layer {
            TerrainLayer::Height => &mut self.height,
            TerrainLayer::Humidity => &mut self.humidity,
            TerrainLayer::Biome => &mut self.biome,
        }
    }

    /// Borrow the property layers.
    pub fn props(&self) -> &ExtPropertyLayers {
        &self.props
    }

    /// Mutably borrow the property layers.
    pub fn props_mut(&mut self) -> &mut ExtPropertyLayers {
        &mut self.props
    }

    /// Scalar value at a full-resolution coordinate.
    pub fn value_raw(&self, layer: TerrainLayer, x: u32, y: u32) -> Option<u8> {
        self.field(layer).value_raw(x, y)
    }

    /// Scalar value at a grid coordinate.
    pub fn value_scaled(&self, layer: TerrainLayer, x: u32, y: u32) -> Option<u8> {
        self.field(layer).value_scaled(x, y)
    }

    /// Property at a full-resolution coordinate.
    pub fn property_raw(&self, prop: ExtProperty, x: u32, y: u32) -> bool {
        self.props.get_raw(prop, x, y)
    }

    /// Property at a grid coordinate.
    pub fn property_scaled(&self, prop: ExtProperty, x: u32, y: u32) -> bool {
        self.props.get_scaled(prop, x, y)
    }

    /// Smallest value of `layer` inside the chunk.
    pub fn chunk_min(&self, layer: TerrainLayer, coord: ChunkCoord) -> u8 {
        self.field(layer).chunk_min(coord)
    }

    /// Largest value of `layer` inside the chunk.
    pub fn chunk_max(&self, layer: TerrainLayer, coord: ChunkCoord) -> u8 {
        self.field(layer).chunk_max(coord)
    }

    /// Whether the chunk may hold a cell where `prop == value`.
    pub fn chunk_may_contain(&self, prop: ExtProperty, coord: ChunkCoord, value: bool) -> bool {
        if value {
            self.props.chunk_contains_true(prop, coord)
        } else {
            self.props.chunk_contains_false(prop, coord)
        }
    }

    /// `(height, humidity, danger)` at a grid coordinate clamped to the world.
    ///
    /// Danger is the biome layer value.
    pub fn sample_scaled_clamped(&self, x: i64, y: i64) -> (u8, u8, u8) {
        (
            self.height.value_scaled_clamped(x, y),
            self.humidity.value_scaled_clamped(x, y),
            self.biome.value_scaled_clamped(x, y),
        )
    }

    /// Color of the cell under a full-resolution coordinate, clamped to the world.
    pub fn pixel_color(&self, rasterizer: &PixelRasterizer, x: u32, y: u32) -> Rgba<u8> {
        let divider = self.geometry.divider();
        rasterizer.color_at_scaled(self, i64::from(x / divider), i64::from(y / divider))
    }
}
