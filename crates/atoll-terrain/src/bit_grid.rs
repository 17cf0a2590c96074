//! Two-dimensional bit array packed into `u64` words.
//!
//! Persisted as a 1-bit grayscale PNG: set bits are white, clear bits black.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::TerrainError;

/// A `width x height` grid of booleans, one bit per cell, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitGrid {
    words: Vec<u64>,
    width: u32,
    height: u32,
}

impl BitGrid {
    /// Creates a grid with every cell cleared.
    pub fn new(width: u32, height: u32) -> Self {
        let bits = width as u64 * height as u64;
        Self {
            words: vec![0; bits.div_ceil(64) as usize],
            width,
            height,
        }
    }

    /// Grid width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Grid height.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Returns `true` if the grid has no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn locate(&self, x: u32, y: u32) -> (usize, u32) {
        debug_assert!(x < self.width && y < self.height, "bit grid index out of bounds");
        let bit = y as usize * self.width as usize + x as usize;
        (bit / 64, (bit % 64) as u32)
    }

    /// Returns the cell at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate is outside the grid in debug builds.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        let (word, offset) = self.locate(x, y);
        (self.words[word] >> offset) & 1 == 1
    }

    /// Sets the cell at `(x, y)`.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        let (word, offset) = self.locate(x, y);
        if value {
            self.words[word] |= 1 << offset;
        } else {
            self.words[word] &= !(1 << offset);
        }
    }

    /// Sets every cell to `value`.
    pub fn fill(&mut self, value: bool) {
        let pattern = if value { u64::MAX } else { 0 };
        self.words.iter_mut().for_each(|w| *w = pattern);
        self.clear_padding();
    }

    /// Number of set cells.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Zero the unused bits of the last word so equality and counts stay exact.
    fn clear_padding(&mut self) {
        let used = self.len() % 64;
        if used != 0
            && let Some(last) = self.words.last_mut()
        {
            *last &= (1u64 << used) - 1;
        }
    }

    /// Write the grid as a 1-bit grayscale PNG.
    pub fn save_png(&self, path: &Path) -> Result<(), TerrainError> {
        let file = File::create(path).map_err(|e| TerrainError::io(path, e))?;
        let mut encoder = png::Encoder::new(BufWriter::new(file), self.width, self.height);
        encoder.set_color(png::ColorType::Grayscale);
        encoder.set_depth(png::BitDepth::One);

        let mut writer = encoder.write_header()?;
        writer.write_image_data(&self.pack_rows())?;
        writer.finish()?;
        Ok(())
    }

    /// Read a grid written by [`save_png`](Self::save_png).
    ///
    /// Any other pixel format is rejected.
    pub fn load_png(path: &Path) -> Result<Self, TerrainError> {
        let file = File::open(path).map_err(|e| TerrainError::io(path, e))?;
        let mut decoder = png::Decoder::new(BufReader::new(file));
        decoder.set_transformations(png::Transformations::IDENTITY);

        let mut reader = decoder.read_info()?;
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf)?;
        if info.color_type != png::ColorType::Grayscale || info.bit_depth != png::BitDepth::One {
            return Err(TerrainError::PixelFormat(path.to_path_buf()));
        }

        Ok(Self::unpack_rows(&buf, info.line_size, info.width, info.height))
    }

    /// Pack rows MSB-first, each row padded to a whole byte, as PNG expects.
    fn pack_rows(&self) -> Vec<u8> {
        let stride = self.width.div_ceil(8) as usize;
        let mut out = vec![0u8; stride * self.height as usize];
        for y in 0..self.height {
            let row = &mut out[y as usize * stride..(y as usize + 1) * stride];
            for x in 0..self.width {
                if self.get(x, y) {
                    row[x as usize / 8] |= 0x80 >> (x % 8);
                }
            }
        }
        out
    }

    fn unpack_rows(buf: &[u8], stride: usize, width: u32, height: u32) -> Self {
        let mut grid = Self::new(width, height);
        for y in 0..height {
            let row = &buf[y as usize * stride..];
            for x in 0..width {
                if row[x as usize / 8] & (0x80 >> (x % 8)) != 0 {
                    grid.set(x, y, true);
                }
            }
        }
        grid
    }
}
