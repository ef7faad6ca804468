//! Splits the image into horizontal bands, one per worker.  The
//! partition is computed once at engine start and never changes, and
//! it is the thing that makes unlocked concurrent writes to the pixel
//! buffer legal: every row belongs to exactly one tile.

use error::EngineError;
use std::ops::Range;

/// A contiguous band of image rows assigned to one worker.  `end` is
/// exclusive.  Tiles from [`assign`](fn.assign.html) never overlap
/// and together cover every row of the image.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Tile {
    /// First row of the band.
    pub start: usize,
    /// One past the last row of the band.
    pub end: usize,
}

impl Tile {
    /// The rows of this band, as a range suitable for iteration.
    pub fn rows(&self) -> Range<usize> {
        self.start..self.end
    }

    /// The number of rows in this band.
    pub fn height(&self) -> usize {
        self.end - self.start
    }
}

/// Divides `height` rows among `workers` tiles.  Every worker but the
/// last gets `height / workers` rows; the last absorbs the remainder.
/// That tie-break is part of the contract: tests depend on knowing
/// exactly which worker owns which row.
pub fn assign(height: usize, workers: usize) -> Result<Vec<Tile>, EngineError> {
    if workers == 0 || height == 0 {
        return Err(EngineError::InvalidPartition { height, workers });
    }
    let block = height / workers;
    let tiles = (0..workers)
        .map(|i| Tile {
            start: i * block,
            end: if i == workers - 1 { height } else { (i + 1) * block },
        })
        .collect();
    Ok(tiles)
}
