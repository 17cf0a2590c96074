//! Secondary boolean terrain properties with a per-chunk containment index.
//!
//! Each [`ExtProperty`] is a [`BitGrid`] over the reduced-resolution grid.
//! After every cell is known, [`ExtPropertyLayers::create_contains_properties_grid`]
//! derives for each chunk whether it holds at least one set and at least one
//! clear cell, so callers can skip chunks before any per-pixel work.
//!
//! Loading is all-or-nothing: a single missing or unreadable artifact
//! invalidates the whole set.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::bit_grid::BitGrid;
use crate::error::TerrainError;
use crate::geometry::{ChunkCoord, ChunkGeometry};
use crate::noise_field::NoiseField;
use crate::raster::{BEACH_MAX, HILLS_MAX, HIGH_MOUNTAIN_MAX, SHALLOW_WATER_MAX};

/// Biome field values below this are dry.
pub const BIOME_DRY_MAX: u8 = 84;
/// Biome field values above this are lush.
pub const BIOME_TEMPERATE_MAX: u8 = 169;

/// Named boolean properties.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExtProperty {
    /// Any water, deep or shallow.
    Sea,
    /// Sand band between water and ground.
    Beach,
    /// Beach cells touching the sea.
    OuterBeach,
    /// Mountain bands above the hills.
    Mountain,
    /// Volcano edge and lava.
    Lava,
    /// Dry biome.
    BiomeDry,
    /// Temperate biome.
    BiomeTemperate,
    /// Lush biome.
    BiomeLush,
}

impl ExtProperty {
    /// Every property, in storage order.
    pub const ALL: [ExtProperty; 8] = [
        Self::Sea,
        Self::Beach,
        Self::OuterBeach,
        Self::Mountain,
        Self::Lava,
        Self::BiomeDry,
        Self::BiomeTemperate,
        Self::BiomeLush,
    ];

    /// Name used in file names.
    pub fn name(self) -> &'static str {
        match self {
            Self::Sea => "sea",
            Self::Beach => "beach",
            Self::OuterBeach => "outer_beach",
            Self::Mountain => "mountain",
            Self::Lava => "lava",
            Self::BiomeDry => "biome_dry",
            Self::BiomeTemperate => "biome_temperate",
            Self::BiomeLush => "biome_lush",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// All property layers plus their containment index.
pub struct ExtPropertyLayers {
    geometry: ChunkGeometry,
    layers: Vec<BitGrid>,
    contains_true: Vec<BitGrid>,
    contains_false: Vec<BitGrid>,
    index_built: bool,
}

impl ExtPropertyLayers {
    /// Create layers with every cell cleared and no containment index.
    pub fn new(geometry: ChunkGeometry) -> Self {
        let (dw, dh) = (geometry.divided_width(), geometry.divided_height());
        let (cx, cy) = (geometry.chunks_x(), geometry.chunks_y());
        let count = ExtProperty::ALL.len();
        Self {
            geometry,
            layers: vec![BitGrid::new(dw, dh); count],
            contains_true: vec![BitGrid::new(cx, cy); count],
            contains_false: vec![BitGrid::new(cx, cy); count],
            index_built: false,
        }
    }

    /// The chunk layout.
    pub fn geometry(&self) -> &ChunkGeometry {
        &self.geometry
    }

    /// Whether [`create_contains_properties_grid`](Self::create_contains_properties_grid) has run
    /// since the last edit.
    pub fn is_index_built(&self) -> bool {
        self.index_built
    }

    /// Borrow a property's grid.
    pub fn layer(&self, prop: ExtProperty) -> &BitGrid {
        &self.layers[prop.index()]
    }

    /// Set a property at a full-resolution coordinate.
    pub fn set_raw(&mut self, prop: ExtProperty, x: u32, y: u32, value: bool) -> bool {
        let divider = self.geometry.divider();
        self.set_scaled(prop, x / divider, y / divider, value)
    }

    /// Set a property at a grid coordinate. Invalidates the containment index.
    pub fn set_scaled(&mut self, prop: ExtProperty, x: u32, y: u32, value: bool) -> bool {
        if self.geometry.scaled_to_index(x, y).is_none() {
            return false;
        }
        self.layers[prop.index()].set(x, y, value);
        self.index_built = false;
        true
    }

    /// Read a property at a full-resolution coordinate. Outside the world reads as `false`.
    pub fn get_raw(&self, prop: ExtProperty, x: u32, y: u32) -> bool {
        let divider = self.geometry.divider();
        self.get_scaled(prop, x / divider, y / divider)
    }

    /// Read a property at a grid coordinate. Outside the grid reads as `false`.
    pub fn get_scaled(&self, prop: ExtProperty, x: u32, y: u32) -> bool {
        self.geometry.scaled_to_index(x, y).is_some() && self.layers[prop.index()].get(x, y)
    }

    /// Fill every property from the terrain fields.
    pub fn derive_from_terrain(&mut self, height: &NoiseField, biome: &NoiseField) {
        let (dw, dh) = (self.geometry.divided_width(), self.geometry.divided_height());
        for y in 0..dh {
            for x in 0..dw {
                let h = height.value_scaled_clamped(x.into(), y.into());
                let b = biome.value_scaled_clamped(x.into(), y.into());
                let beach = h > SHALLOW_WATER_MAX && h <= BEACH_MAX;

                let layers = &mut self.layers;
                layers[ExtProperty::Sea.index()].set(x, y, h <= SHALLOW_WATER_MAX);
                layers[ExtProperty::Beach.index()].set(x, y, beach);
                layers[ExtProperty::Mountain.index()]
                    .set(x, y, h > HILLS_MAX && h <= HIGH_MOUNTAIN_MAX);
                layers[ExtProperty::Lava.index()].set(x, y, h > HIGH_MOUNTAIN_MAX);
                layers[ExtProperty::BiomeDry.index()].set(x, y, b <= BIOME_DRY_MAX);
                layers[ExtProperty::BiomeTemperate.index()]
                    .set(x, y, b > BIOME_DRY_MAX && b <= BIOME_TEMPERATE_MAX);
                layers[ExtProperty::BiomeLush.index()].set(x, y, b > BIOME_TEMPERATE_MAX);
            }
        }

        // Outer beach needs the finished sea layer.
        for y in 0..dh {
            for x in 0..dw {
                let outer = self.layers[ExtProperty::Beach.index()].get(x, y)
                    && self.touches_sea(x, y);
                self.layers[ExtProperty::OuterBeach.index()].set(x, y, outer);
            }
        }
        self.index_built = false;
    }

    fn touches_sea(&self, x: u32, y: u32) -> bool {
        let sea = &self.layers[ExtProperty::Sea.index()];
        let (w, h) = (i64::from(sea.width()), i64::from(sea.height()));
        (-1i64..=1).any(|dy| {
            (-1i64..=1).any(|dx| {
                let nx = i64::from(x) + dx;
                let ny = i64::from(y) + dy;
                (dx, dy) != (0, 0)
                    && (0..w).contains(&nx)
                    && (0..h).contains(&ny)
                    && sea.get(nx as u32, ny as u32)
            })
        })
    }

    /// Derive the per-chunk containment grids for every property.
    pub fn create_contains_properties_grid(&mut self) {
        let geometry = self.geometry;
        let grids: Vec<(BitGrid, BitGrid)> = self
            .layers
            .par_iter()
            .map(|layer| chunk_containment(&geometry, layer))
            .collect();
        let (contains_true, contains_false) = grids.into_iter().unzip();
        self.contains_true = contains_true;
        self.contains_false = contains_false;
        self.index_built = true;
    }

    /// Whether the chunk may contain a cell where `prop` is `true`.
    ///
    /// Before the index is built this answers `true`, the conservative choice.
    pub fn chunk_contains_true(&self, prop: ExtProperty, coord: ChunkCoord) -> bool {
        !self.index_built || self.contains_true[prop.index()].get(coord.x, coord.y)
    }

    /// Whether the chunk may contain a cell where `prop` is `false`.
    pub fn chunk_contains_false(&self, prop: ExtProperty, coord: ChunkCoord) -> bool {
        !self.index_built || self.contains_false[prop.index()].get(coord.x, coord.y)
    }

    /// Build the containment index, then persist everything.
    pub fn end_creation_and_save(&mut self, dir: &Path, max_threads: usize) -> Result<(), TerrainError> {
        self.create_contains_properties_grid();
        self.save(dir, max_threads)
    }

    /// Path of a property's bitmap.
    pub fn bitmap_path(dir: &Path, prop: ExtProperty) -> PathBuf {
        dir.join(format!("ext_bitmap_{}.png", prop.name()))
    }

    /// Path of a property's containment grid.
    pub fn contains_path(dir: &Path, prop: ExtProperty, value: bool) -> PathBuf {
        dir.join(format!("ext_contains_{}_{}.png", prop.name(), value))
    }

    /// Persist every layer and containment grid, one property per task.
    pub fn save(&self, dir: &Path, max_threads: usize) -> Result<(), TerrainError> {
        std::fs::create_dir_all(dir).map_err(|e| TerrainError::io(dir, e))?;
        let pool = bounded_pool(max_threads)?;

        pool.install(|| {
            ExtProperty::ALL.par_iter().try_for_each(|&prop| {
                let i = prop.index();
                self.layers[i].save_png(&Self::bitmap_path(dir, prop))?;
                self.contains_true[i].save_png(&Self::contains_path(dir, prop, true))?;
                self.contains_false[i].save_png(&Self::contains_path(dir, prop, false))
            })
        })?;

        tracing::debug!(dir = %dir.display(), "saved ext property layers");
        Ok(())
    }

    /// Load every layer and containment grid.
    ///
    /// Returns `None` if any artifact is missing, unreadable or mis-sized.
    pub fn load(dir: &Path, geometry: ChunkGeometry, max_threads: usize) -> Option<Self> {
        let pool = match bounded_pool(max_threads) {
            Ok(pool) => pool,
            Err(e) => {
                tracing::warn!(error = %e, "cannot build load pool");
                return None;
            }
        };

        let (dw, dh) = (geometry.divided_width(), geometry.divided_height());
        let (cx, cy) = (geometry.chunks_x(), geometry.chunks_y());

        let loaded: Result<Vec<(BitGrid, BitGrid, BitGrid)>, TerrainError> = pool.install(|| {
            ExtProperty::ALL
                .par_iter()
                .map(|&prop| {
                    let layer = load_sized(&Self::bitmap_path(dir, prop), dw, dh)?;
                    let t = load_sized(&Self::contains_path(dir, prop, true), cx, cy)?;
                    let f = load_sized(&Self::contains_path(dir, prop, false), cx, cy)?;
                    Ok((layer, t, f))
                })
                .collect()
        });

        match loaded {
            Ok(parts) => {
                let mut layers = Vec::with_capacity(parts.len());
                let mut contains_true = Vec::with_capacity(parts.len());
                let mut contains_false = Vec::with_capacity(parts.len());
                for (layer, t, f) in parts {
                    layers.push(layer);
                    contains_true.push(t);
                    contains_false.push(f);
                }
                Some(Self {
                    geometry,
                    layers,
                    contains_true,
                    contains_false,
                    index_built: true,
                })
            }
            Err(e) => {
                tracing::info!(error = %e, "ext property cache incomplete, regenerating");
                None
            }
        }
    }
}

fn bounded_pool(max_threads: usize) -> Result<rayon::ThreadPool, TerrainError> {
    Ok(rayon::ThreadPoolBuilder::new()
        .num_threads(max_threads.max(1))
        .thread_name(|i| format!("ext-props-{i}"))
        .build()?)
}

fn load_sized(path: &Path, width: u32, height: u32) -> Result<BitGrid, TerrainError> {
    let grid = BitGrid::load_png(path)?;
    if grid.width() != width || grid.height() != height {
        return Err(TerrainError::DimensionMismatch {
            expected_width: width,
            expected_height: height,
            width: grid.width(),
            height: grid.height(),
        });
    }
    Ok(grid)
}

/// Scan each chunk footprint of `layer` for set and clear cells.
fn chunk_containment(geometry: &ChunkGeometry, layer: &BitGrid) -> (BitGrid, BitGrid) {
    let mut any_true = BitGrid::new(geometry.chunks_x(), geometry.chunks_y());
    let mut any_false = BitGrid::new(geometry.chunks_x(), geometry.chunks_y());

    for coord in geometry.iter_chunks() {
        let b = geometry.scaled_bounds(coord);
        let mut seen_true = false;
        let mut seen_false = false;
        'scan: for y in b.y_min..b.y_max {
            for x in b.x_min..b.x_max {
                if layer.get(x, y) {
                    seen_true = true;
                } else {
                    seen_false = true;
                }
                if seen_true && seen_false {
                    break 'scan;
                }
            }
        }
        any_true.set(coord.x, coord.y, seen_true);
        any_false.set(coord.x, coord.y, seen_false);
    }

    (any_true, any_false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise_field::{NoiseParams, TerrainLayer};

    fn geometry() -> ChunkGeometry {
        ChunkGeometry::new(128, 96, 32, 4).unwrap()
    }

    #[test]
    fn test_raw_and_scaled_addressing() {
        let mut props = ExtPropertyLayers::new(geometry());
        assert!(props.set_raw(ExtProperty::Sea, 9, 13, true));
        assert!(props.get_scaled(ExtProperty::Sea, 2, 3));
        assert!(props.get_raw(ExtProperty::Sea, 8, 12));
        assert!(!props.get_raw(ExtProperty::Beach, 8, 12));
        assert!(!props.set_scaled(ExtProperty::Sea, 32, 0, true));
        assert!(!props.get_raw(ExtProperty::Sea, 1000, 0));
    }

    #[test]
    fn test_containment_index_correctness() {
        let g = geometry();
        let mut props = ExtPropertyLayers::new(g);
        // Chunk (1, 0): a single true cell. Chunk (2, 2): entirely true.
        props.set_scaled(ExtProperty::Lava, 9, 2, true);
        let full = g.scaled_bounds(ChunkCoord::new(2, 2));
        for y in full.y_min..full.y_max {
            for x in full.x_min..full.x_max {
                props.set_scaled(ExtProperty::Lava, x, y, true);
            }
        }
        props.create_contains_properties_grid();

        for coord in g.iter_chunks() {
            let b = g.scaled_bounds(coord);
            let cells: Vec<bool> = (b.y_min..b.y_max)
                .flat_map(|y| (b.x_min..b.x_max).map(move |x| (x, y)))
                .map(|(x, y)| props.get_scaled(ExtProperty::Lava, x, y))
                .collect();
            assert_eq!(
                props.chunk_contains_true(ExtProperty::Lava, coord),
                cells.iter().any(|&c| c),
                "containsTrue wrong for {coord}"
            );
            assert_eq!(
                props.chunk_contains_false(ExtProperty::Lava, coord),
                cells.iter().any(|&c| !c),
                "containsFalse wrong for {coord}"
            );
        }
        assert!(props.chunk_contains_true(ExtProperty::Lava, ChunkCoord::new(1, 0)));
        assert!(!props.chunk_contains_false(ExtProperty::Lava, ChunkCoord::new(2, 2)));
        assert!(!props.chunk_contains_true(ExtProperty::Lava, ChunkCoord::new(0, 0)));
    }

    #[test]
    fn test_edit_invalidates_index() {
        let mut props = ExtPropertyLayers::new(geometry());
        props.create_contains_properties_grid();
        assert!(!props.chunk_contains_true(ExtProperty::Sea, ChunkCoord::new(0, 0)));

        props.set_scaled(ExtProperty::Sea, 0, 0, true);
        assert!(!props.is_index_built());
        assert!(props.chunk_contains_true(ExtProperty::Sea, ChunkCoord::new(0, 0)));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let g = geometry();
        let mut props = ExtPropertyLayers::new(g);
        props.set_raw(ExtProperty::OuterBeach, 10, 10, true);
        props.set_scaled(ExtProperty::BiomeLush, 31, 23, true);
        props.end_creation_and_save(dir.path(), 2).unwrap();

        let loaded = ExtPropertyLayers::load(dir.path(), g, 3).unwrap();
        assert!(loaded.get_raw(ExtProperty::OuterBeach, 10, 10));
        assert!(loaded.get_scaled(ExtProperty::BiomeLush, 31, 23));
        for prop in ExtProperty::ALL {
            assert_eq!(loaded.layer(prop), props.layer(prop));
            for coord in g.iter_chunks() {
                assert_eq!(
                    loaded.chunk_contains_true(prop, coord),
                    props.chunk_contains_true(prop, coord)
                );
            }
        }
    }

    #[test]
    fn test_single_missing_grid_invalidates_load() {
        let dir = tempfile::tempdir().unwrap();
        let g = geometry();
        let mut props = ExtPropertyLayers::new(g);
        props.end_creation_and_save(dir.path(), 2).unwrap();
        std::fs::remove_file(ExtPropertyLayers::contains_path(
            dir.path(),
            ExtProperty::Mountain,
            false,
        ))
        .unwrap();

        assert!(ExtPropertyLayers::load(dir.path(), g, 2).is_none());
    }

    #[test]
    fn test_mis_sized_layer_invalidates_load() {
        let dir = tempfile::tempdir().unwrap();
        let g = geometry();
        let mut props = ExtPropertyLayers::new(g);
        props.end_creation_and_save(dir.path(), 1).unwrap();
        BitGrid::new(3, 3)
            .save_png(&ExtPropertyLayers::bitmap_path(dir.path(), ExtProperty::Sea))
            .unwrap();

        assert!(ExtPropertyLayers::load(dir.path(), g, 1).is_none());
    }

    #[test]
    fn test_derive_from_terrain_is_consistent() {
        let g = geometry();
        let template = NoiseParams {
            frequency: 0.03,
            ..Default::default()
        };
        let mut height = NoiseField::new(
            TerrainLayer::Height,
            NoiseParams::for_layer(TerrainLayer::Height, 4, &template),
            g,
        );
        let mut biome = NoiseField::new(
            TerrainLayer::Biome,
            NoiseParams::for_layer(TerrainLayer::Biome, 4, &template),
            g,
        );
        height.calculate_all();
        biome.calculate_all();

        let mut props = ExtPropertyLayers::new(g);
        props.derive_from_terrain(&height, &biome);

        for y in 0..g.divided_height() {
            for x in 0..g.divided_width() {
                let h = height.value_scaled(x, y).unwrap();
                assert_eq!(props.get_scaled(ExtProperty::Sea, x, y), h <= SHALLOW_WATER_MAX);
                if props.get_scaled(ExtProperty::OuterBeach, x, y) {
                    assert!(props.get_scaled(ExtProperty::Beach, x, y));
                }
                let biome_flags = [
                    ExtProperty::BiomeDry,
                    ExtProperty::BiomeTemperate,
                    ExtProperty::BiomeLush,
                ]
                .iter()
                .filter(|&&p| props.get_scaled(p, x, y))
                .count();
                assert_eq!(biome_flags, 1, "exactly one biome per cell");
            }
        }
    }
}
