//! Corner-rule upscaling (Scale3x).
//!
//! Each source pixel becomes a 3x3 block. With the neighbourhood laid out as
//!
//! ```text
//! A B C
//! D E F
//! G H I
//! ```
//!
//! a corner sub-cell copies a side neighbour only when the two sides meeting
//! at that corner agree and the opposite sides do not, so true diagonals are
//! smoothed while flat areas and straight edges are left as they are. Edge
//! sub-cells additionally require the far corner to differ from the centre.

use image::{Rgba, RgbaImage};

/// Output pixels per source pixel along each axis.
pub const SCALE: u32 = 3;

/// A 3x3 neighbourhood, row-major, centre at index 4.
pub type Window = [Rgba<u8>; 9];

/// Expand one neighbourhood into its 3x3 output block, row-major.
pub fn scale3x_window(w: &Window) -> Window {
    let [a, b, c, d, e, f, g, h, i] = *w;

    // Which corners of the centre sit on a diagonal edge.
    let nw = d == b && b != f && d != h;
    let ne = b == f && b != d && f != h;
    let sw = d == h && d != b && h != f;
    let se = h == f && d != h && b != f;

    [
        if nw { d } else { e },
        if (nw && e != c) || (ne && e != a) { b } else { e },
        if ne { f } else { e },
        if (nw && e != g) || (sw && e != a) { d } else { e },
        e,
        if (ne && e != i) || (se && e != c) { f } else { e },
        if sw { d } else { e },
        if (sw && e != i) || (se && e != g) { h } else { e },
        if se { f } else { e },
    ]
}

/// Neighbourhood of `(x, y)`. Neighbours outside the image take the centre colour.
pub fn window_at(image: &RgbaImage, x: u32, y: u32) -> Window {
    let center = *image.get_pixel(x, y);
    let (w, h) = (i64::from(image.width()), i64::from(image.height()));
    let mut window = [center; 9];
    for (slot, cell) in window.iter_mut().enumerate() {
        let nx = i64::from(x) + slot as i64 % 3 - 1;
        let ny = i64::from(y) + slot as i64 / 3 - 1;
        if (0..w).contains(&nx) && (0..h).contains(&ny) {
            *cell = *image.get_pixel(nx as u32, ny as u32);
        }
    }
    window
}

/// Upscale `image` excluding a `margin`-pixel frame, resolving each window with `solve`.
///
/// The frame only supplies neighbours. Output is
/// `(width - 2 * margin) * 3` by `(height - 2 * margin) * 3`.
pub fn upscale_with(
    image: &RgbaImage,
    margin: u32,
    mut solve: impl FnMut(&Window) -> Window,
) -> RgbaImage {
    let inner_w = image.width().saturating_sub(2 * margin);
    let inner_h = image.height().saturating_sub(2 * margin);
    let mut out = RgbaImage::new(inner_w * SCALE, inner_h * SCALE);

    for y in 0..inner_h {
        for x in 0..inner_w {
            let block = solve(&window_at(image, x + margin, y + margin));
            for (slot, color) in block.iter().enumerate() {
                let ox = x * SCALE + slot as u32 % SCALE;
                let oy = y * SCALE + slot as u32 / SCALE;
                out.put_pixel(ox, oy, *color);
            }
        }
    }
    out
}

/// Upscale a whole image. Border pixels use synthetic windows.
pub fn upscale_corner_rule(image: &RgbaImage) -> RgbaImage {
    upscale_with(image, 0, scale3x_window)
}

/// Upscale the interior of an image padded with `margin` neighbour pixels.
pub fn upscale_corner_rule_interior(image: &RgbaImage, margin: u32) -> RgbaImage {
    upscale_with(image, margin, scale3x_window)
}
