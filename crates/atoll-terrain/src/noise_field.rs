//! Fractal-noise scalar fields stored at reduced resolution.
//!
//! A [`NoiseField`] is filled incrementally, a band of rows per call, so the
//! owner can spread generation across frames. Rows inside a band are computed
//! in parallel; each worker owns its output row. Once the last band finishes
//! the per-chunk min/max tables are built. Persisted as a lossless 8-bit
//! grayscale PNG plus a JSON side table.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, ImageFormat};
use noise::{NoiseFn, OpenSimplex};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::TerrainError;
use crate::geometry::{ChunkCoord, ChunkGeometry};

/// Fraction of the world width/height over which the border gradient ramps.
pub const BORDER_GRADIENT_FRACTION: f64 = 0.1;

/// How strongly the border gradient pulls raw noise down at the very edge.
const BORDER_GRADIENT_STRENGTH: f64 = 2.0;

/// The scalar terrain layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainLayer {
    /// Elevation: water, beach, ground, mountains, lava.
    Height,
    /// Moisture: sand through lush grass.
    Humidity,
    /// Biome field; also the source of the danger overlay.
    Biome,
}

impl TerrainLayer {
    /// Every layer, in persistence order.
    pub const ALL: [TerrainLayer; 3] = [Self::Height, Self::Humidity, Self::Biome];

    /// Lowercase name used in file names.
    pub fn file_stem(self) -> &'static str {
        match self {
            Self::Height => "height",
            Self::Humidity => "humidity",
            Self::Biome => "biome",
        }
    }

    /// Offset mixed into the world seed so layers are decorrelated.
    fn seed_offset(self) -> u32 {
        match self {
            Self::Height => 0,
            Self::Humidity => 7919,
            Self::Biome => 15_887,
        }
    }
}

/// Generation parameters for one layer.
///
/// Written verbatim into the side table so a cached field is only reused for
/// the exact parameters it was generated with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoiseParams {
    /// Noise seed.
    pub seed: u32,
    /// Base frequency in cycles per full-resolution pixel.
    pub frequency: f64,
    /// Number of octaves.
    pub octaves: u32,
    /// Weighted strength ("persistence"): damps an octave by the previous octave's value.
    pub weighted_strength: f64,
    /// Frequency multiplier between octaves.
    pub lacunarity: f64,
    /// Amplitude multiplier between octaves.
    pub gain: f64,
    /// Subtract an island falloff near the world edges.
    pub border_gradient: bool,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            seed: 0,
            frequency: 0.002,
            octaves: 5,
            weighted_strength: 0.0,
            lacunarity: 2.0,
            gain: 0.5,
            border_gradient: false,
        }
    }
}

impl NoiseParams {
    /// Derive per-layer params from a world seed.
    pub fn for_layer(layer: TerrainLayer, world_seed: u32, template: &NoiseParams) -> Self {
        Self {
            seed: world_seed.wrapping_add(layer.seed_offset()),
            ..template.clone()
        }
    }
}

/// Fractal Brownian motion over OpenSimplex noise.
///
/// Output is roughly in `[-1, 1]`: octave amplitudes are normalised by their
/// geometric sum.
pub struct FractalSampler {
    octaves: Vec<OpenSimplex>,
    params: NoiseParams,
    bounding: f64,
}

impl FractalSampler {
    /// Create a sampler. Each octave uses its own seed.
    pub fn new(params: NoiseParams) -> Self {
        let octave_count = params.octaves.max(1);
        let octaves = (0..octave_count)
            .map(|i| OpenSimplex::new(params.seed.wrapping_add(i)))
            .collect();

        let mut amp = 1.0;
        let mut amp_sum = 0.0;
        for _ in 0..octave_count {
            amp_sum += amp;
            amp *= params.gain;
        }
        let bounding = if amp_sum > 0.0 { 1.0 / amp_sum } else { 1.0 };

        Self {
            octaves,
            params,
            bounding,
        }
    }

    /// Sample raw fractal noise at a full-resolution coordinate.
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let mut sum = 0.0;
        let mut amplitude = self.bounding;
        let mut nx = x * self.params.frequency;
        let mut ny = y * self.params.frequency;

        for octave in &self.octaves {
            let n = octave.get([nx, ny]);
            sum += n * amplitude;
            let damp = ((n + 1.0).min(2.0)) * 0.5;
            amplitude *= 1.0 + (damp - 1.0) * self.params.weighted_strength;

            nx *= self.params.lacunarity;
            ny *= self.params.lacunarity;
            amplitude *= self.params.gain;
        }

        sum
    }

    /// Return a reference to the parameters.
    pub fn params(&self) -> &NoiseParams {
        &self.params
    }
}

/// Edge falloff in `[0, 1]`: 1 at the world border, 0 beyond the ramp.
pub fn border_gradient(x: f64, y: f64, width: f64, height: f64) -> f64 {
    let axis = |v: f64, extent: f64| {
        let ramp = extent * BORDER_GRADIENT_FRACTION;
        if ramp <= 0.0 {
            return 0.0;
        }
        let dist = v.min(extent - 1.0 - v).max(0.0);
        (1.0 - dist / ramp).clamp(0.0, 1.0)
    };
    axis(x, width).max(axis(y, height))
}

/// Map raw noise in `[-1, 1]` to a byte.
#[inline]
pub fn noise_to_byte(raw: f64) -> u8 {
    ((raw + 1.0) * 0.5 * 255.0).round().clamp(0.0, 255.0) as u8
}

/// JSON side table persisted next to the field image.
#[derive(Serialize, Deserialize)]
struct ExtremaTable {
    width: u32,
    height: u32,
    chunks_x: u32,
    chunks_y: u32,
    params: NoiseParams,
    min: Vec<u8>,
    max: Vec<u8>,
}

/// A byte scalar field over the reduced-resolution grid.
pub struct NoiseField {
    layer: TerrainLayer,
    geometry: ChunkGeometry,
    sampler: FractalSampler,
    data: Vec<u8>,
    next_row: u32,
    creation_in_progress: bool,
    min_val: Vec<u8>,
    max_val: Vec<u8>,
}

impl NoiseField {
    /// Create an empty field awaiting computation.
    pub fn new(layer: TerrainLayer, params: NoiseParams, geometry: ChunkGeometry) -> Self {
        let cells = geometry.divided_width() as usize * geometry.divided_height() as usize;
        Self {
            layer,
            geometry,
            sampler: FractalSampler::new(params),
            data: vec![0; cells],
            next_row: 0,
            creation_in_progress: true,
            min_val: vec![0; geometry.chunk_count()],
            max_val: vec![0; geometry.chunk_count()],
        }
    }

    /// Which layer this is.
    pub fn layer(&self) -> TerrainLayer {
        self.layer
    }

    /// Generation parameters.
    pub fn params(&self) -> &NoiseParams {
        self.sampler.params()
    }

    /// The chunk layout this field is stored against.
    pub fn geometry(&self) -> &ChunkGeometry {
        &self.geometry
    }

    /// `true` until the final row band has been computed.
    pub fn is_creation_in_progress(&self) -> bool {
        self.creation_in_progress
    }

    /// First grid row that has not been computed yet.
    pub fn next_row(&self) -> u32 {
        self.next_row
    }

    /// Raw grid bytes, row-major.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Compute up to `rows` more grid rows.
    ///
    /// Returns `true` once the field is complete. Calling again after
    /// completion does nothing.
    pub fn calculate_rows(&mut self, rows: u32) -> bool {
        if !self.creation_in_progress {
            return true;
        }

        let dw = self.geometry.divided_width() as usize;
        let dh = self.geometry.divided_height();
        let start = self.next_row;
        let end = start.saturating_add(rows.max(1)).min(dh);

        let divider = f64::from(self.geometry.divider());
        let world_w = f64::from(self.geometry.width());
        let world_h = f64::from(self.geometry.height());
        let border = self.sampler.params().border_gradient;
        let sampler = &self.sampler;

        self.data[start as usize * dw..end as usize * dw]
            .par_chunks_mut(dw)
            .enumerate()
            .for_each(|(offset, row)| {
                let ry = f64::from(start + offset as u32) * divider;
                for (gx, cell) in row.iter_mut().enumerate() {
                    let rx = gx as f64 * divider;
                    let mut raw = sampler.sample(rx, ry);
                    if border {
                        raw -= BORDER_GRADIENT_STRENGTH * border_gradient(rx, ry, world_w, world_h);
                    }
                    *cell = noise_to_byte(raw);
                }
            });

        self.next_row = end;
        if end == dh {
            self.recompute_chunk_extrema();
            self.creation_in_progress = false;
            tracing::debug!(layer = self.layer.file_stem(), "noise field complete");
        }
        !self.creation_in_progress
    }

    /// Compute every remaining row at once.
    pub fn calculate_all(&mut self) {
        let remaining = self.geometry.divided_height() - self.next_row;
        self.calculate_rows(remaining);
    }

    /// Value at a full-resolution coordinate.
    pub fn value_raw(&self, x: u32, y: u32) -> Option<u8> {
        self.geometry.raw_to_index(x, y).map(|i| self.data[i])
    }

    /// Value at a grid coordinate.
    pub fn value_scaled(&self, x: u32, y: u32) -> Option<u8> {
        self.geometry.scaled_to_index(x, y).map(|i| self.data[i])
    }

    /// Value at a grid coordinate, clamping out-of-range coordinates to the edge.
    pub fn value_scaled_clamped(&self, x: i64, y: i64) -> u8 {
        let max_x = i64::from(self.geometry.divided_width()) - 1;
        let max_y = i64::from(self.geometry.divided_height()) - 1;
        let cx = x.clamp(0, max_x) as usize;
        let cy = y.clamp(0, max_y) as usize;
        self.data[cy * self.geometry.divided_width() as usize + cx]
    }

    /// Overwrite the value at a full-resolution coordinate.
    ///
    /// The owning chunk's min/max are widened to include `value`; they stay a
    /// conservative bound until [`recompute_chunk_extrema`](Self::recompute_chunk_extrema).
    pub fn set_value_raw(&mut self, x: u32, y: u32, value: u8) -> bool {
        let divider = self.geometry.divider();
        self.set_value_scaled(x / divider, y / divider, value)
    }

    /// Overwrite the value at a grid coordinate.
    pub fn set_value_scaled(&mut self, x: u32, y: u32, value: u8) -> bool {
        let Some(index) = self.geometry.scaled_to_index(x, y) else {
            return false;
        };
        self.data[index] = value;

        let divider = self.geometry.divider();
        if let Some(chunk) = self.geometry.chunk_of_raw(x * divider, y * divider) {
            let ci = self.geometry.chunk_index(chunk);
            self.min_val[ci] = self.min_val[ci].min(value);
            self.max_val[ci] = self.max_val[ci].max(value);
        }
        true
    }

    /// Smallest value inside a chunk.
    pub fn chunk_min(&self, coord: ChunkCoord) -> u8 {
        self.min_val[self.geometry.chunk_index(coord)]
    }

    /// Largest value inside a chunk.
    pub fn chunk_max(&self, coord: ChunkCoord) -> u8 {
        self.max_val[self.geometry.chunk_index(coord)]
    }

    /// Rebuild the per-chunk min/max tables by scanning every chunk.
    pub fn recompute_chunk_extrema(&mut self) {
        let dw = self.geometry.divided_width() as usize;
        for coord in self.geometry.iter_chunks() {
            let b = self.geometry.scaled_bounds(coord);
            let mut lo = u8::MAX;
            let mut hi = u8::MIN;
            for y in b.y_min..b.y_max {
                let row = &self.data[y as usize * dw..][b.x_min as usize..b.x_max as usize];
                for &v in row {
                    lo = lo.min(v);
                    hi = hi.max(v);
                }
            }
            let ci = self.geometry.chunk_index(coord);
            self.min_val[ci] = lo;
            self.max_val[ci] = hi;
        }
    }

    /// Path of the field image for `layer` under `dir`.
    pub fn image_path(dir: &Path, layer: TerrainLayer) -> PathBuf {
        dir.join(format!("terrain_{}.png", layer.file_stem()))
    }

    /// Path of the min/max side table for `layer` under `dir`.
    pub fn side_table_path(dir: &Path, layer: TerrainLayer) -> PathBuf {
        dir.join(format!("terrain_{}.json", layer.file_stem()))
    }

    /// Persist the field image and side table.
    pub fn save(&self, dir: &Path) -> Result<(), TerrainError> {
        if self.creation_in_progress {
            return Err(TerrainError::Incomplete(self.layer.file_stem()));
        }
        std::fs::create_dir_all(dir).map_err(|e| TerrainError::io(dir, e))?;

        let image = GrayImage::from_raw(
            self.geometry.divided_width(),
            self.geometry.divided_height(),
            self.data.clone(),
        )
        .ok_or(TerrainError::DimensionMismatch {
            expected_width: self.geometry.divided_width(),
            expected_height: self.geometry.divided_height(),
            width: 0,
            height: 0,
        })?;
        image.save_with_format(Self::image_path(dir, self.layer), ImageFormat::Png)?;

        let table = ExtremaTable {
            width: self.geometry.divided_width(),
            height: self.geometry.divided_height(),
            chunks_x: self.geometry.chunks_x(),
            chunks_y: self.geometry.chunks_y(),
            params: self.params().clone(),
            min: self.min_val.clone(),
            max: self.max_val.clone(),
        };
        let side_path = Self::side_table_path(dir, self.layer);
        let file = File::create(&side_path).map_err(|e| TerrainError::io(&side_path, e))?;
        serde_json::to_writer(BufWriter::new(file), &table)?;

        tracing::debug!(layer = self.layer.file_stem(), dir = %dir.display(), "saved noise field");
        Ok(())
    }

    /// Load a persisted field.
    ///
    /// Returns `None` when either artifact is missing, unreadable, or was
    /// produced for different dimensions or parameters; the caller is expected
    /// to regenerate.
    pub fn load(
        dir: &Path,
        layer: TerrainLayer,
        params: NoiseParams,
        geometry: ChunkGeometry,
    ) -> Option<Self> {
        let image_path = Self::image_path(dir, layer);
        let side_path = Self::side_table_path(dir, layer);
        if !image_path.exists() || !side_path.exists() {
            return None;
        }

        match Self::try_load(&image_path, &side_path, layer, params, geometry) {
            Ok(field) => Some(field),
            Err(e) => {
                tracing::warn!(layer = layer.file_stem(), error = %e, "discarding cached noise field");
                None
            }
        }
    }

    fn try_load(
        image_path: &Path,
        side_path: &Path,
        layer: TerrainLayer,
        params: NoiseParams,
        geometry: ChunkGeometry,
    ) -> Result<Self, TerrainError> {
        let (dw, dh) = (geometry.divided_width(), geometry.divided_height());

        let file = File::open(side_path).map_err(|e| TerrainError::io(side_path, e))?;
        let table: ExtremaTable = serde_json::from_reader(BufReader::new(file))?;
        if table.width != dw
            || table.height != dh
            || table.chunks_x != geometry.chunks_x()
            || table.chunks_y != geometry.chunks_y()
            || table.min.len() != geometry.chunk_count()
            || table.max.len() != geometry.chunk_count()
        {
            return Err(TerrainError::DimensionMismatch {
                expected_width: dw,
                expected_height: dh,
                width: table.width,
                height: table.height,
            });
        }
        if table.params != params {
            return Err(TerrainError::StaleParameters(layer.file_stem()));
        }

        let DynamicImage::ImageLuma8(image) = image::open(image_path)? else {
            return Err(TerrainError::PixelFormat(image_path.to_path_buf()));
        };
        if image.width() != dw || image.height() != dh {
            return Err(TerrainError::DimensionMismatch {
                expected_width: dw,
                expected_height: dh,
                width: image.width(),
                height: image.height(),
            });
        }

        Ok(Self {
            layer,
            geometry,
            sampler: FractalSampler::new(params),
            data: image.into_raw(),
            next_row: dh,
            creation_in_progress: false,
            min_val: table.min,
            max_val: table.max,
        })
    }

    /// Load the field from `dir`, or compute and persist it.
    ///
    /// Save failures are logged; the computed field is returned regardless.
    pub fn load_or_generate(
        dir: &Path,
        layer: TerrainLayer,
        params: NoiseParams,
        geometry: ChunkGeometry,
        rows_per_step: u32,
    ) -> Self {
        if let Some(field) = Self::load(dir, layer, params.clone(), geometry) {
            tracing::info!(layer = layer.file_stem(), "loaded cached noise field");
            return field;
        }

        let start = std::time::Instant::now();
        let mut field = Self::new(layer, params, geometry);
        while !field.calculate_rows(rows_per_step) {
            tracing::trace!(layer = layer.file_stem(), row = field.next_row(), "row band done");
        }
        tracing::info!(
            layer = layer.file_stem(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "generated noise field"
        );

        if let Err(e) = field.save(dir) {
            tracing::warn!(layer = layer.file_stem(), error = %e, "failed to cache noise field");
        }
        field
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_geometry() -> ChunkGeometry {
        ChunkGeometry::new(64, 64, 32, 1).unwrap()
    }

    fn params(seed: u32) -> NoiseParams {
        NoiseParams {
            seed,
            frequency: 0.05,
            octaves: 4,
            ..Default::default()
        }
    }

    #[test]
    fn test_determinism_same_params_same_bytes() {
        let mut a = NoiseField::new(TerrainLayer::Height, params(42), small_geometry());
        let mut b = NoiseField::new(TerrainLayer::Height, params(42), small_geometry());
        a.calculate_all();
        b.calculate_all();
        assert_eq!(a.data(), b.data());
    }

    #[test]
    fn test_different_seeds_differ() {
        let mut a = NoiseField::new(TerrainLayer::Height, params(1), small_geometry());
        let mut b = NoiseField::new(TerrainLayer::Height, params(999), small_geometry());
        a.calculate_all();
        b.calculate_all();
        assert_ne!(a.data(), b.data());
    }

    #[test]
    fn test_incremental_equivalence() {
        let mut whole = NoiseField::new(TerrainLayer::Humidity, params(7), small_geometry());
        assert!(whole.calculate_rows(64));

        let mut banded = NoiseField::new(TerrainLayer::Humidity, params(7), small_geometry());
        assert!(!banded.calculate_rows(32));
        assert!(banded.is_creation_in_progress());
        assert_eq!(banded.next_row(), 32);
        assert!(banded.calculate_rows(32));
        assert!(!banded.is_creation_in_progress());

        assert_eq!(whole.data(), banded.data());
    }

    #[test]
    fn test_calculate_after_completion_is_noop() {
        let mut field = NoiseField::new(TerrainLayer::Biome, params(3), small_geometry());
        field.calculate_all();
        let before = field.data().to_vec();
        assert!(field.calculate_rows(10));
        assert_eq!(field.data(), &before[..]);
    }

    #[test]
    fn test_chunk_extrema_match_scan() {
        let mut field = NoiseField::new(TerrainLayer::Height, params(11), small_geometry());
        field.calculate_all();
        let g = *field.geometry();
        for coord in g.iter_chunks() {
            let b = g.scaled_bounds(coord);
            let values: Vec<u8> = (b.y_min..b.y_max)
                .flat_map(|y| (b.x_min..b.x_max).map(move |x| (x, y)))
                .map(|(x, y)| field.value_scaled(x, y).unwrap())
                .collect();
            assert_eq!(field.chunk_min(coord), *values.iter().min().unwrap());
            assert_eq!(field.chunk_max(coord), *values.iter().max().unwrap());
        }
    }

    #[test]
    fn test_border_gradient_lowers_edges() {
        let g = ChunkGeometry::new(128, 128, 64, 2).unwrap();
        let mut plain = NoiseField::new(TerrainLayer::Height, params(5), g);
        let mut island = NoiseField::new(
            TerrainLayer::Height,
            NoiseParams {
                border_gradient: true,
                ..params(5)
            },
            g,
        );
        plain.calculate_all();
        island.calculate_all();

        // The outermost ring is pulled down by the full gradient strength.
        for x in 0..g.divided_width() {
            assert_eq!(island.value_scaled(x, 0), Some(0));
        }
        // The centre is untouched.
        assert_eq!(island.value_scaled(32, 32), plain.value_scaled(32, 32));
    }

    #[test]
    fn test_border_gradient_shape() {
        assert_eq!(border_gradient(0.0, 50.0, 100.0, 100.0), 1.0);
        assert_eq!(border_gradient(50.0, 50.0, 100.0, 100.0), 0.0);
        let mid = border_gradient(5.0, 50.0, 100.0, 100.0);
        assert!(mid > 0.0 && mid < 1.0);
        // Max of both axes.
        assert_eq!(
            border_gradient(5.0, 2.0, 100.0, 100.0),
            border_gradient(50.0, 2.0, 100.0, 100.0)
        );
    }

    #[test]
    fn test_noise_to_byte_range() {
        assert_eq!(noise_to_byte(-1.0), 0);
        assert_eq!(noise_to_byte(1.0), 255);
        assert_eq!(noise_to_byte(-5.0), 0);
        assert_eq!(noise_to_byte(5.0), 255);
        assert_eq!(noise_to_byte(0.0), 128);
    }

    #[test]
    fn test_save_load_roundtrip_with_edit() {
        let dir = tempfile::tempdir().unwrap();
        let g = ChunkGeometry::new(128, 128, 64, 4).unwrap();
        let mut field = NoiseField::new(TerrainLayer::Height, params(21), g);
        field.calculate_all();
        assert!(field.set_value_raw(10, 10, 200));
        field.save(dir.path()).unwrap();

        let loaded = NoiseField::load(dir.path(), TerrainLayer::Height, params(21), g).unwrap();
        assert_eq!(loaded.value_raw(10, 10), Some(200));
        assert_eq!(loaded.data(), field.data());
        assert!(loaded.chunk_max(ChunkCoord::new(0, 0)) >= 200);
        assert!(!loaded.is_creation_in_progress());
    }

    #[test]
    fn test_missing_side_table_is_cache_miss() {
        let dir = tempfile::tempdir().unwrap();
        let g = small_geometry();
        let mut field = NoiseField::new(TerrainLayer::Height, params(2), g);
        field.calculate_all();
        field.save(dir.path()).unwrap();
        std::fs::remove_file(NoiseField::side_table_path(dir.path(), TerrainLayer::Height))
            .unwrap();

        assert!(NoiseField::load(dir.path(), TerrainLayer::Height, params(2), g).is_none());
    }

    #[test]
    fn test_corrupt_side_table_is_cache_miss() {
        let dir = tempfile::tempdir().unwrap();
        let g = small_geometry();
        let mut field = NoiseField::new(TerrainLayer::Height, params(2), g);
        field.calculate_all();
        field.save(dir.path()).unwrap();
        std::fs::write(
            NoiseField::side_table_path(dir.path(), TerrainLayer::Height),
            b"{ not json",
        )
        .unwrap();

        assert!(NoiseField::load(dir.path(), TerrainLayer::Height, params(2), g).is_none());
    }

    #[test]
    fn test_changed_params_is_cache_miss() {
        let dir = tempfile::tempdir().unwrap();
        let g = small_geometry();
        let mut field = NoiseField::new(TerrainLayer::Height, params(2), g);
        field.calculate_all();
        field.save(dir.path()).unwrap();

        assert!(NoiseField::load(dir.path(), TerrainLayer::Height, params(3), g).is_none());
    }

    #[test]
    fn test_side_table_keeps_exact_params() {
        let dir = tempfile::tempdir().unwrap();
        let g = small_geometry();
        let odd = NoiseParams {
            frequency: 0.1 + 0.2,
            lacunarity: 1.0 / 3.0,
            gain: std::f64::consts::FRAC_1_SQRT_2,
            ..params(5)
        };
        let mut field = NoiseField::new(TerrainLayer::Humidity, odd.clone(), g);
        field.calculate_all();
        field.save(dir.path()).unwrap();

        let json =
            std::fs::read_to_string(NoiseField::side_table_path(dir.path(), TerrainLayer::Humidity))
                .unwrap();
        let table: ExtremaTable = serde_json::from_str(&json).unwrap();
        assert_eq!(table.params, odd);
        assert!(NoiseField::load(dir.path(), TerrainLayer::Humidity, odd.clone(), g).is_some());

        let nudged = NoiseParams {
            gain: f64::from_bits(odd.gain.to_bits() + 1),
            ..odd
        };
        assert!(NoiseField::load(dir.path(), TerrainLayer::Humidity, nudged, g).is_none());
    }

    #[test]
    fn test_load_or_generate_reuses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let g = small_geometry();
        let first = NoiseField::load_or_generate(dir.path(), TerrainLayer::Biome, params(8), g, 16);
        assert!(NoiseField::image_path(dir.path(), TerrainLayer::Biome).exists());

        let second = NoiseField::load_or_generate(dir.path(), TerrainLayer::Biome, params(8), g, 16);
        assert_eq!(first.data(), second.data());
    }

    #[test]
    fn test_save_incomplete_field_fails() {
        let dir = tempfile::tempdir().unwrap();
        let field = NoiseField::new(TerrainLayer::Height, params(2), small_geometry());
        assert!(matches!(
            field.save(dir.path()),
            Err(TerrainError::Incomplete(_))
        ));
    }
}
