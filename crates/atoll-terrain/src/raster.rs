//! Terrain-to-color rasterization.
//!
//! A pixel's color comes from three bytes: height picks a base color from an
//! ordered band table; bands that are not fully opaque let the humidity color
//! show through from underneath; danger above a safe threshold darkens the
//! result with a red overlay whose alpha is quantized to coarse steps. The
//! quantization keeps the palette small so the upscalers see few distinct
//! neighbourhoods.

use image::{Rgba, RgbaImage};

use crate::geometry::ChunkCoord;
use crate::world::WorldTerrain;

/// Upper bound (inclusive) of deep water.
pub const DEEP_WATER_MAX: u8 = 90;
/// Upper bound of shallow water; everything at or below is sea.
pub const SHALLOW_WATER_MAX: u8 = 118;
/// Upper bound of the beach band.
pub const BEACH_MAX: u8 = 128;
/// Upper bound of plain ground.
pub const GROUND_MAX: u8 = 175;
/// Upper bound of the hills.
pub const HILLS_MAX: u8 = 200;
/// Upper bound of the lower mountains.
pub const MOUNTAIN_MAX: u8 = 222;
/// Upper bound of the high mountains.
pub const HIGH_MOUNTAIN_MAX: u8 = 236;
/// Upper bound of the volcano rim; above is lava.
pub const VOLCANO_EDGE_MAX: u8 = 246;

/// One entry of an ordered threshold table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorBand {
    /// Largest value (inclusive) that maps to this band.
    pub max: u8,
    /// Straight-alpha color of the band.
    pub color: Rgba<u8>,
}

const fn band(max: u8, r: u8, g: u8, b: u8, a: u8) -> ColorBand {
    ColorBand {
        max,
        color: Rgba([r, g, b, a]),
    }
}

/// Height bands, lowest first. Ground is fully transparent and hills are
/// translucent so humidity shows through.
pub const HEIGHT_BANDS: [ColorBand; 9] = [
    band(DEEP_WATER_MAX, 28, 58, 112, 255),
    band(SHALLOW_WATER_MAX, 48, 100, 168, 255),
    band(BEACH_MAX, 222, 204, 150, 255),
    band(GROUND_MAX, 0, 0, 0, 0),
    band(HILLS_MAX, 112, 98, 78, 120),
    band(MOUNTAIN_MAX, 124, 114, 104, 255),
    band(HIGH_MOUNTAIN_MAX, 158, 150, 144, 255),
    band(VOLCANO_EDGE_MAX, 66, 48, 44, 255),
    band(u8::MAX, 226, 86, 24, 255),
];

/// Humidity bands, driest first. All opaque.
pub const HUMIDITY_BANDS: [ColorBand; 5] = [
    band(50, 214, 190, 128, 255),
    band(100, 150, 122, 82, 255),
    band(140, 118, 104, 60, 255),
    band(190, 120, 150, 64, 255),
    band(u8::MAX, 64, 132, 52, 255),
];

/// RGB of the danger overlay.
pub const DANGER_RGB: [u8; 3] = [96, 8, 8];

/// First band whose `max` is at least `value`.
pub fn lookup_band(bands: &[ColorBand], value: u8) -> Rgba<u8> {
    bands
        .iter()
        .find(|b| value <= b.max)
        .or(bands.last())
        .map_or(Rgba([0, 0, 0, 0]), |b| b.color)
}

/// Straight alpha blend of `top` over `bottom`:
/// `rgb = bottom * (1 - a) + top * a`, alpha accumulates.
pub fn blend(top: Rgba<u8>, bottom: Rgba<u8>) -> Rgba<u8> {
    let a = u32::from(top[3]);
    let inv = 255 - a;
    let mix = |t: u8, b: u8| ((u32::from(b) * inv + u32::from(t) * a + 127) / 255) as u8;
    let alpha = a + (u32::from(bottom[3]) * inv + 127) / 255;
    Rgba([
        mix(top[0], bottom[0]),
        mix(top[1], bottom[1]),
        mix(top[2], bottom[2]),
        alpha.min(255) as u8,
    ])
}

/// Maps height, humidity and danger bytes to colors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRasterizer {
    /// Danger at or below this is not tinted.
    pub danger_safe_threshold: u8,
    /// Overlay alpha is rounded down to a multiple of this.
    pub danger_alpha_step: u8,
    /// Overlay alpha never exceeds this.
    pub danger_alpha_max: u8,
}

impl Default for PixelRasterizer {
    fn default() -> Self {
        Self {
            danger_safe_threshold: 150,
            danger_alpha_step: 15,
            danger_alpha_max: 165,
        }
    }
}

impl PixelRasterizer {
    /// Quantized alpha of the danger overlay, 0 when safe.
    pub fn danger_alpha(&self, danger: u8) -> u8 {
        if danger <= self.danger_safe_threshold {
            return 0;
        }
        let excess = u32::from(danger - self.danger_safe_threshold);
        let range = u32::from(u8::MAX - self.danger_safe_threshold);
        let alpha = (excess * 255 / range).min(u32::from(self.danger_alpha_max));
        let step = u32::from(self.danger_alpha_step.max(1));
        ((alpha / step) * step) as u8
    }

    /// Color of one grid cell.
    pub fn color(&self, height: u8, humidity: u8, danger: u8) -> Rgba<u8> {
        let mut color = lookup_band(&HEIGHT_BANDS, height);
        if color[3] < u8::MAX {
            color = blend(color, lookup_band(&HUMIDITY_BANDS, humidity));
        }

        let alpha = self.danger_alpha(danger);
        if alpha > 0 {
            let overlay = Rgba([DANGER_RGB[0], DANGER_RGB[1], DANGER_RGB[2], alpha]);
            color = blend(overlay, color);
        }
        color
    }

    /// Color of the grid cell at a (possibly out-of-range) grid coordinate,
    /// clamped to the world edge.
    pub fn color_at_scaled(&self, world: &WorldTerrain, x: i64, y: i64) -> Rgba<u8> {
        let (h, hum, danger) = world.sample_scaled_clamped(x, y);
        self.color(h, hum, danger)
    }

    /// Rasterize a chunk at grid resolution with a `margin`-cell border.
    ///
    /// Border cells come from neighbouring chunks when they exist. Cells
    /// outside the world repeat the nearest cell of this chunk instead.
    pub fn rasterize_chunk_padded(
        &self,
        world: &WorldTerrain,
        coord: ChunkCoord,
        margin: u32,
    ) -> RgbaImage {
        let geometry = world.geometry();
        let b = geometry.scaled_bounds(coord);
        let (dw, dh) = (
            i64::from(geometry.divided_width()),
            i64::from(geometry.divided_height()),
        );
        let m = i64::from(margin);

        let resolve = |local: i64, min: u32, max: u32, extent: i64| {
            let g = i64::from(min) + local;
            if (0..extent).contains(&g) {
                g
            } else {
                g.clamp(i64::from(min), i64::from(max) - 1)
            }
        };

        RgbaImage::from_fn(b.width() + 2 * margin, b.height() + 2 * margin, |px, py| {
            let gx = resolve(i64::from(px) - m, b.x_min, b.x_max, dw);
            let gy = resolve(i64::from(py) - m, b.y_min, b.y_max, dh);
            self.color_at_scaled(world, gx, gy)
        })
    }
}

/// Number of distinct RGBA values in an image.
pub fn distinct_colors(image: &RgbaImage) -> usize {
    let mut colors: Vec<[u8; 4]> = image.pixels().map(|p| p.0).collect();
    colors.sort_unstable();
    colors.dedup();
    colors.len()
}
