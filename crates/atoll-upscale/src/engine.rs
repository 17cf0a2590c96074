//! The upscaler with its solved-case memo tables.

use image::{Rgba, RgbaImage};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rustc_hash::FxHashMap;

use crate::corner::{self, Window};
use crate::palette::IndexedBlock;
use crate::template::{SOURCE_SIZE, TemplateDictionary};

type BlockKey = [[u8; 4]; 4];
type WindowKey = [[u8; 4]; 9];

/// Upscaler state: the template dictionary, a seeded variant picker, and
/// memo tables of already solved blocks and windows.
///
/// The dictionary never changes after construction. The memo tables grow
/// during a batch and are emptied by
/// [`clean_up_after_upscaling_all`](Self::clean_up_after_upscaling_all).
pub struct UpscaleEngine {
    dictionary: TemplateDictionary,
    solved_blocks: FxHashMap<BlockKey, Option<Vec<Rgba<u8>>>>,
    solved_windows: FxHashMap<WindowKey, Window>,
    rng: ChaCha8Rng,
}

impl UpscaleEngine {
    /// Create an engine. `seed` drives the choice between equivalent variants.
    pub fn new(dictionary: TemplateDictionary, seed: u64) -> Self {
        Self {
            dictionary,
            solved_blocks: FxHashMap::default(),
            solved_windows: FxHashMap::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// The template dictionary.
    pub fn dictionary(&self) -> &TemplateDictionary {
        &self.dictionary
    }

    /// Number of memoized blocks and windows.
    pub fn solved_case_count(&self) -> usize {
        self.solved_blocks.len() + self.solved_windows.len()
    }

    /// Forget every memoized case. Call once a batch is done.
    pub fn clean_up_after_upscaling_all(&mut self) {
        tracing::debug!(
            blocks = self.solved_blocks.len(),
            windows = self.solved_windows.len(),
            "clearing solved upscale cases"
        );
        self.solved_blocks.clear();
        self.solved_windows.clear();
    }

    /// Corner-rule upscale of a whole image.
    pub fn upscale_corner_rule(&mut self, image: &RgbaImage) -> RgbaImage {
        self.upscale_corner_rule_interior(image, 0)
    }

    /// Corner-rule upscale of an image padded by `margin` neighbour pixels.
    pub fn upscale_corner_rule_interior(&mut self, image: &RgbaImage, margin: u32) -> RgbaImage {
        let solved = &mut self.solved_windows;
        corner::upscale_with(image, margin, |window| {
            *solved
                .entry(window.map(|p| p.0))
                .or_insert_with(|| corner::scale3x_window(window))
        })
    }

    /// Template upscale: every 2x2 block whose pattern is in the dictionary is
    /// replaced by one of its variants, repainted with the block's colors.
    ///
    /// Unmatched blocks, and the odd last row or column, are scaled by
    /// pixel repetition.
    pub fn upscale_templates(&mut self, image: &RgbaImage) -> RgbaImage {
        let scale = self.dictionary.scale();
        let (w, h) = image.dimensions();
        let mut out = RgbaImage::new(w * scale, h * scale);

        let Self {
            dictionary,
            solved_blocks,
            rng,
            ..
        } = self;

        for by in (0..h).step_by(SOURCE_SIZE as usize) {
            for bx in (0..w).step_by(SOURCE_SIZE as usize) {
                if bx + 1 < w && by + 1 < h {
                    let key = [
                        image.get_pixel(bx, by).0,
                        image.get_pixel(bx + 1, by).0,
                        image.get_pixel(bx, by + 1).0,
                        image.get_pixel(bx + 1, by + 1).0,
                    ];
                    let solved = solved_blocks
                        .entry(key)
                        .or_insert_with(|| resolve_block(dictionary, rng, &key));
                    if let Some(pixels) = solved {
                        paste(&mut out, pixels, bx * scale, by * scale, SOURCE_SIZE * scale);
                        continue;
                    }
                }
                for y in by..(by + SOURCE_SIZE).min(h) {
                    for x in bx..(bx + SOURCE_SIZE).min(w) {
                        fill(&mut out, *image.get_pixel(x, y), x * scale, y * scale, scale);
                    }
                }
            }
        }
        out
    }
}

fn resolve_block(
    dictionary: &TemplateDictionary,
    rng: &mut ChaCha8Rng,
    key: &BlockKey,
) -> Option<Vec<Rgba<u8>>> {
    let block = IndexedBlock::from_pixels(SOURCE_SIZE, SOURCE_SIZE, key.iter().map(|c| Rgba(*c)));
    let variants = dictionary.variants(&block.signature())?;
    let variant = &variants[rng.random_range(0..variants.len())];
    block.decode(&variant.indices)
}

fn paste(out: &mut RgbaImage, pixels: &[Rgba<u8>], x0: u32, y0: u32, size: u32) {
    for (i, color) in pixels.iter().enumerate() {
        let i = i as u32;
        out.put_pixel(x0 + i % size, y0 + i / size, *color);
    }
}

fn fill(out: &mut RgbaImage, color: Rgba<u8>, x0: u32, y0: u32, size: u32) {
    for y in y0..y0 + size {
        for x in x0..x0 + size {
            out.put_pixel(x, y, color);
        }
    }
}
