//! Palette-indexed pixel blocks.
//!
//! Colors are numbered in row-major first-seen order, so two blocks with the
//! same arrangement of "same" and "different" pixels share a signature no
//! matter which concrete colors they use.

use std::fmt::Write;

use image::{Rgba, RgbaImage};

/// A small block of pixels stored as palette indices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexedBlock {
    width: u32,
    height: u32,
    indices: Vec<u8>,
    palette: Vec<Rgba<u8>>,
}

impl IndexedBlock {
    /// Index a `width x height` block from row-major pixels.
    ///
    /// Blocks are expected to be small; more than 256 distinct colors is not
    /// representable and panics in debug builds.
    pub fn from_pixels(width: u32, height: u32, pixels: impl IntoIterator<Item = Rgba<u8>>) -> Self {
        let mut palette: Vec<Rgba<u8>> = Vec::new();
        let indices: Vec<u8> = pixels
            .into_iter()
            .map(|color| {
                let index = match palette.iter().position(|&c| c == color) {
                    Some(i) => i,
                    None => {
                        palette.push(color);
                        palette.len() - 1
                    }
                };
                debug_assert!(index <= usize::from(u8::MAX), "block has too many colors");
                index as u8
            })
            .collect();
        debug_assert_eq!(indices.len(), width as usize * height as usize);

        Self {
            width,
            height,
            indices,
            palette,
        }
    }

    /// Index a whole image.
    pub fn from_image(image: &RgbaImage) -> Self {
        Self::from_pixels(image.width(), image.height(), image.pixels().copied())
    }

    /// Index the `width x height` region of `image` at `(x, y)`.
    pub fn from_region(image: &RgbaImage, x: u32, y: u32, width: u32, height: u32) -> Self {
        let pixels = (y..y + height)
            .flat_map(|py| (x..x + width).map(move |px| (px, py)))
            .map(|(px, py)| *image.get_pixel(px, py));
        Self::from_pixels(width, height, pixels)
    }

    /// Block width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Block height.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Palette indices, row-major.
    pub fn indices(&self) -> &[u8] {
        &self.indices
    }

    /// Distinct colors in first-seen order.
    pub fn palette(&self) -> &[Rgba<u8>] {
        &self.palette
    }

    /// Index of a color in this block's palette.
    pub fn index_of(&self, color: Rgba<u8>) -> Option<u8> {
        self.palette.iter().position(|&c| c == color).map(|i| i as u8)
    }

    /// Pattern signature, e.g. `"2x2:0,1,1,0"`. Independent of the concrete colors.
    pub fn signature(&self) -> String {
        let mut s = format!("{}x{}:", self.width, self.height);
        for (i, index) in self.indices.iter().enumerate() {
            if i > 0 {
                s.push(',');
            }
            let _ = write!(s, "{index}");
        }
        s
    }

    /// Paint `indices` with this block's colors.
    ///
    /// Returns `None` if an index has no color here.
    pub fn decode(&self, indices: &[u8]) -> Option<Vec<Rgba<u8>>> {
        indices
            .iter()
            .map(|&i| self.palette.get(usize::from(i)).copied())
            .collect()
    }
}
