//! Whole-map preview texture.

use image::RgbaImage;
use rayon::prelude::*;

use crate::raster::PixelRasterizer;
use crate::world::WorldTerrain;

/// Render the whole world at `1 / multiplier` of full resolution.
///
/// Preview pixel `(px, py)` samples full-resolution coordinate
/// `(px * multiplier, py * multiplier)`. A multiplier of 0 is treated as 1.
pub fn build_preview_texture(
    world: &WorldTerrain,
    rasterizer: &PixelRasterizer,
    multiplier: u32,
) -> RgbaImage {
    let multiplier = multiplier.max(1);
    let geometry = world.geometry();
    let width = geometry.width().div_ceil(multiplier);
    let height = geometry.height().div_ceil(multiplier);

    let mut image = RgbaImage::new(width, height);
    let stride = width as usize * 4;
    if stride == 0 {
        return image;
    }

    image
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(py, row)| {
            let y = py as u32 * multiplier;
            for (px, pixel) in row.chunks_exact_mut(4).enumerate() {
                let color = world.pixel_color(rasterizer, px as u32 * multiplier, y);
                pixel.copy_from_slice(&color.0);
            }
        });

    tracing::debug!(width, height, multiplier, "built preview texture");
    image
}
