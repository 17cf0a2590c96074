//! World partitioning into fixed-size square chunks.
//!
//! Full-resolution pixel coordinates ("raw") address the world; the stored
//! scalar and boolean grids live at a reduced resolution ("scaled"), coarser by
//! the resolution divider. Every other component addresses data through
//! [`ChunkCoord`] and the bounds computed here.

use serde::{Deserialize, Serialize};

use crate::error::TerrainError;

/// Integer coordinates of a chunk in the chunk grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    /// Column index.
    pub x: u32,
    /// Row index.
    pub y: u32,
}

impl ChunkCoord {
    /// Create a new chunk coordinate.
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Half-open rectangle `[x_min, x_max) x [y_min, y_max)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkBounds {
    /// Inclusive left edge.
    pub x_min: u32,
    /// Exclusive right edge.
    pub x_max: u32,
    /// Inclusive top edge.
    pub y_min: u32,
    /// Exclusive bottom edge.
    pub y_max: u32,
}

impl ChunkBounds {
    /// Width of the rectangle.
    pub fn width(&self) -> u32 {
        self.x_max - self.x_min
    }

    /// Height of the rectangle.
    pub fn height(&self) -> u32 {
        self.y_max - self.y_min
    }

    /// Returns `true` if `(x, y)` lies inside.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x_min && x < self.x_max && y >= self.y_min && y < self.y_max
    }
}

/// Chunk layout of the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkGeometry {
    width: u32,
    height: u32,
    chunk_size: u32,
    divider: u32,
}

impl ChunkGeometry {
    /// Create and validate a geometry.
    ///
    /// `chunk_size` must be a non-zero multiple of `divider`, so that every
    /// chunk covers a whole number of grid cells.
    pub fn new(width: u32, height: u32, chunk_size: u32, divider: u32) -> Result<Self, TerrainError> {
        if width == 0 || height == 0 {
            return Err(TerrainError::InvalidGeometry(format!(
                "world size {width}x{height} must be non-zero"
            )));
        }
        if divider == 0 || chunk_size == 0 {
            return Err(TerrainError::InvalidGeometry(
                "chunk size and resolution divider must be non-zero".to_string(),
            ));
        }
        if !chunk_size.is_multiple_of(divider) {
            return Err(TerrainError::InvalidGeometry(format!(
                "chunk size {chunk_size} is not a multiple of divider {divider}"
            )));
        }
        Ok(Self {
            width,
            height,
            chunk_size,
            divider,
        })
    }

    /// World width in full-resolution pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// World height in full-resolution pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Chunk side length in full-resolution pixels.
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Resolution divider between raw and scaled coordinates.
    pub fn divider(&self) -> u32 {
        self.divider
    }

    /// Width of the stored grids.
    pub fn divided_width(&self) -> u32 {
        self.width.div_ceil(self.divider)
    }

    /// Height of the stored grids.
    pub fn divided_height(&self) -> u32 {
        self.height.div_ceil(self.divider)
    }

    /// Number of chunk columns.
    pub fn chunks_x(&self) -> u32 {
        self.width.div_ceil(self.chunk_size)
    }

    /// Number of chunk rows.
    pub fn chunks_y(&self) -> u32 {
        self.height.div_ceil(self.chunk_size)
    }

    /// Total number of chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunks_x() as usize * self.chunks_y() as usize
    }

    /// Row-major index of a chunk in per-chunk tables.
    pub fn chunk_index(&self, coord: ChunkCoord) -> usize {
        coord.y as usize * self.chunks_x() as usize + coord.x as usize
    }

    /// Returns `true` if the chunk exists in this world.
    pub fn contains_chunk(&self, coord: ChunkCoord) -> bool {
        coord.x < self.chunks_x() && coord.y < self.chunks_y()
    }

    /// Full-resolution bounds of a chunk, clipped to the world.
    pub fn bounds(&self, coord: ChunkCoord) -> ChunkBounds {
        let x_min = coord.x * self.chunk_size;
        let y_min = coord.y * self.chunk_size;
        ChunkBounds {
            x_min,
            x_max: (x_min + self.chunk_size).min(self.width),
            y_min,
            y_max: (y_min + self.chunk_size).min(self.height),
        }
    }

    /// Bounds of a chunk in stored-grid cells, clipped to the grid.
    pub fn scaled_bounds(&self, coord: ChunkCoord) -> ChunkBounds {
        let raw = self.bounds(coord);
        ChunkBounds {
            x_min: raw.x_min / self.divider,
            x_max: raw.x_max.div_ceil(self.divider).min(self.divided_width()),
            y_min: raw.y_min / self.divider,
            y_max: raw.y_max.div_ceil(self.divider).min(self.divided_height()),
        }
    }

    /// Chunk containing a raw coordinate, if inside the world.
    pub fn chunk_of_raw(&self, x: u32, y: u32) -> Option<ChunkCoord> {
        (x < self.width && y < self.height)
            .then(|| ChunkCoord::new(x / self.chunk_size, y / self.chunk_size))
    }

    /// Convert a raw coordinate to a grid index, if inside the grid.
    pub fn raw_to_index(&self, x: u32, y: u32) -> Option<usize> {
        self.scaled_to_index(x / self.divider, y / self.divider)
    }

    /// Convert a scaled coordinate to a grid index, if inside the grid.
    pub fn scaled_to_index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.divided_width() && y < self.divided_height())
            .then(|| y as usize * self.divided_width() as usize + x as usize)
    }

    /// Iterate over every chunk in row-major order.
    pub fn iter_chunks(&self) -> impl Iterator<Item = ChunkCoord> + use<> {
        let (cx, cy) = (self.chunks_x(), self.chunks_y());
        (0..cy).flat_map(move |y| (0..cx).map(move |x| ChunkCoord::new(x, y)))
    }
}
