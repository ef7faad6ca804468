// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The pixel field: the shared output buffer and the escape-time
//! kernel that fills it.
//!
//! The buffer is one flat BGR byte array for the whole image, written
//! concurrently by every worker.  That is ordinarily the recipe for a
//! data race, and the reason it is not one here is entirely
//! structural: each worker holds a [`TileWriter`] for a band of rows
//! that no other worker's band overlaps, and the frame barrier keeps
//! the controller from reading while any worker is writing.
//!
//! The aliasing discipline matters as much as the disjointness.  All
//! band pointers are carved from a single `as_mut_ptr` call in
//! [`band_writers`], made under an exclusive `&mut` borrow before any
//! worker thread exists; a worker never re-forms a reference to the
//! whole buffer, only to its own band.  Two overlapping `&mut`s would
//! be undefined behavior even with disjoint *writes*, so the whole-
//! buffer `&mut` must never coexist with a live band slice.

use itertools::iproduct;
use num::Complex;
use space::FractalSpace;
use std::cell::UnsafeCell;
use std::slice;
use std::sync::Arc;
use tiles::Tile;

/// How quickly the point `c` escapes the Mandelbrot set, normalized
/// to `[0, 1]`.  Iterates `z ← z² + c` from zero, counting while
/// `|z|² < 4` and the count is under `limit`.
///
/// A point that exhausts `limit` renders as 0.0, i.e. black.  Note
/// that this deliberately lumps "never escapes" together with
/// "escaped exactly when the budget ran out": a point whose escape
/// lands on the final iteration also returns 0.0.  The boundary is
/// drawn this way on purpose and the tests pin it down; don't "fix"
/// it.
pub fn escape_time(c: Complex<f64>, limit: u32) -> f32 {
    let mut z: Complex<f64> = Complex::new(0.0, 0.0);
    let mut i = 0;
    while z.norm_sqr() < 4.0 && i < limit {
        z = z * z + c;
        i += 1;
    }
    if i == limit {
        return 0.0;
    }
    i as f32 / limit as f32
}

/// Owns the image's byte buffer.  Shared by reference among the
/// workers and the controller; all access goes through the band
/// pointers carved by [`band_writers`] or through
/// [`frame`](#method.frame).
pub(crate) struct PixelField {
    width: usize,
    height: usize,
    cells: UnsafeCell<Vec<u8>>,
}

// The buffer is raced-on by design; TileWriter disjointness and the
// frame barrier's ordering make it sound.
unsafe impl Sync for PixelField {}

impl PixelField {
    pub(crate) fn new(width: usize, height: usize) -> PixelField {
        PixelField {
            width,
            height,
            cells: UnsafeCell::new(vec![0; width * height * 3]),
        }
    }

    pub(crate) fn width(&self) -> usize {
        self.width
    }

    pub(crate) fn height(&self) -> usize {
        self.height
    }

    /// The whole buffer, read-only.
    ///
    /// Unsafe contract: the caller must know that no worker is
    /// mutating the buffer.  The engine calls this only after
    /// `wait_for_all` and before `release`, when every worker is
    /// parked in the barrier.
    pub(crate) unsafe fn frame(&self) -> &[u8] {
        &(&(*self.cells.get()))[..]
    }
}

/// Carves the field's buffer into one [`TileWriter`] per tile and
/// shares ownership of the field out to them.
///
/// This is the only place a pointer into the buffer is created, and
/// it happens under the exclusive `&mut` that `get_mut` requires, so
/// it cannot overlap any other access: the writers are built before
/// the field is shared and before any worker thread exists.  Every
/// band pointer descends from that one base pointer; nothing ever
/// re-borrows the whole buffer afterwards except the read-only
/// `frame`.
pub(crate) fn band_writers(
    mut field: PixelField,
    tiles: &[Tile],
) -> (Arc<PixelField>, Vec<TileWriter>) {
    let stride = field.width * 3;
    let base = field.cells.get_mut().as_mut_ptr();
    let bands: Vec<(*mut u8, usize)> = tiles
        .iter()
        .map(|tile| {
            assert!(tile.end <= field.height);
            // In bounds: the tile's rows lie inside the buffer just
            // checked against.
            let band = unsafe { base.add(tile.start * stride) };
            (band, tile.height() * stride)
        })
        .collect();
    let field = Arc::new(field);
    let writers = tiles
        .iter()
        .zip(bands)
        .map(|(tile, (band, band_len))| TileWriter {
            field: field.clone(),
            tile: *tile,
            band,
            band_len,
        })
        .collect();
    (field, writers)
}

/// A worker's write capability for its band of the image: a raw
/// pointer and length into the field's buffer, plus shared ownership
/// of the field to keep that pointer alive.  Holding `&mut self`
/// during `render` keeps each band single-writer.
pub(crate) struct TileWriter {
    field: Arc<PixelField>,
    tile: Tile,
    band: *mut u8,
    band_len: usize,
}

// The raw band pointer targets memory owned by the Arc the writer
// also holds, and no two writers' bands overlap.
unsafe impl Send for TileWriter {}

impl TileWriter {
    pub(crate) fn tile(&self) -> Tile {
        self.tile
    }

    /// The band's bytes.  Sound because the band never overlaps
    /// another writer's, `&mut self` keeps this one single-writer,
    /// and the frame barrier keeps the controller's reads out of the
    /// write phase.
    fn band(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.band, self.band_len) }
    }

    /// Computes the escape-time value for every pixel in the band
    /// under the given view and writes the BGR triples.  `v` is the
    /// escape speed scaled to a byte; `v, v>>1, v>>2` is the viewer's
    /// palette.
    pub(crate) fn render(&mut self, space: &FractalSpace) {
        let width = self.field.width();
        let height = self.field.height();
        let tile = self.tile;
        let band = self.band();
        for (row, col) in iproduct!(tile.rows(), 0..width) {
            let point = space.pixel_to_point(col, row, width, height);
            let v = (escape_time(point, space.iteration_limit) * 255.0) as u8;
            let offset = ((row - tile.start) * width + col) * 3;
            band[offset] = v;
            band[offset + 1] = v >> 1;
            band[offset + 2] = v >> 2;
        }
    }

    /// Stamps every byte of the band with a marker.  Lets tests
    /// verify, from the finished buffer alone, that each byte was
    /// written by exactly the worker that owns its row.
    #[cfg(test)]
    fn fill(&mut self, marker: u8) {
        for byte in self.band().iter_mut() {
            *byte = marker;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tiles;

    fn test_space() -> FractalSpace {
        FractalSpace {
            scale: 2.0,
            offset_x: -2.0,
            offset_y: -2.0,
            iteration_limit: 4,
        }
    }

    fn render_whole(width: usize, height: usize, space: &FractalSpace) -> Vec<u8> {
        let tiles = [Tile {
            start: 0,
            end: height,
        }];
        let (field, mut writers) = band_writers(PixelField::new(width, height), &tiles);
        writers[0].render(space);
        unsafe { field.frame() }.to_vec()
    }

    #[test]
    fn escape_time_is_deterministic() {
        let c = Complex::new(0.3, -0.52);
        let first = escape_time(c, 1000);
        for _ in 0..10 {
            assert_eq!(escape_time(c, 1000), first);
        }
    }

    #[test]
    fn points_outside_the_radius_two_disc_escape_quickly() {
        let v = escape_time(Complex::new(2.5, 2.5), 1000);
        assert!(v > 0.0);
        assert!(v < 0.01);
    }

    #[test]
    fn the_interior_renders_as_zero() {
        assert_eq!(escape_time(Complex::new(0.0, 0.0), 256), 0.0);
        assert_eq!(escape_time(Complex::new(-1.0, 0.0), 256), 0.0);
    }

    #[test]
    fn an_escape_on_the_final_iteration_also_renders_as_zero() {
        // c = -1 - i escapes after exactly 3 iterations, so a budget
        // of 3 puts the escape on the boundary and collapses it into
        // the interior class.
        let c = Complex::new(-1.0, -1.0);
        assert_eq!(escape_time(c, 4), 0.75);
        assert_eq!(escape_time(c, 3), 0.0);
    }

    #[test]
    fn a_zero_iteration_budget_renders_as_zero() {
        assert_eq!(escape_time(Complex::new(2.5, 2.5), 0), 0.0);
    }

    #[test]
    fn hand_computed_corner_pixel() {
        // 4x4 image, scale 2, offsets (-2, -2): pixel (0,0) maps to
        // c = -1 - i.  The orbit runs 0 -> -1-i -> -1+i -> -1-3i and
        // escapes after 3 of 4 iterations, so the intensity is 0.75,
        // the lead byte floor(0.75 * 255) = 191, and the channel
        // shifts give 95 and 47.
        let buffer = render_whole(4, 4, &test_space());
        assert_eq!(&buffer[0..3], &[191, 95, 47]);
    }

    #[test]
    fn render_is_idempotent() {
        let space = test_space();
        let tiles = [Tile { start: 0, end: 16 }];
        let (field, mut writers) = band_writers(PixelField::new(16, 16), &tiles);
        writers[0].render(&space);
        let first = unsafe { field.frame() }.to_vec();
        writers[0].render(&space);
        assert_eq!(unsafe { field.frame() }, &first[..]);
    }

    #[test]
    fn banded_rendering_matches_a_single_band() {
        let space = FractalSpace {
            scale: 3.0,
            offset_x: -20.0,
            offset_y: -11.0,
            iteration_limit: 64,
        };
        let reference = render_whole(31, 23, &space);
        for workers in &[2, 3, 5, 23] {
            let tiles = tiles::assign(23, *workers).unwrap();
            let (field, writers) = band_writers(PixelField::new(31, 23), &tiles);
            for mut writer in writers {
                writer.render(&space);
            }
            assert_eq!(unsafe { field.frame() }, &reference[..]);
        }
    }

    #[test]
    fn concurrent_writers_produce_the_single_writer_image() {
        // The band pointers are carved before the threads exist and
        // never re-borrow the whole buffer, so running every writer
        // at once must be indistinguishable from running them one at
        // a time.
        let space = FractalSpace {
            scale: 3.0,
            offset_x: -20.0,
            offset_y: -11.0,
            iteration_limit: 64,
        };
        let reference = render_whole(31, 23, &space);
        let tiles = tiles::assign(23, 4).unwrap();
        let (field, writers) = band_writers(PixelField::new(31, 23), &tiles);
        let threads: Vec<_> = writers
            .into_iter()
            .map(|mut writer| thread::spawn(move || writer.render(&space)))
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        assert_eq!(unsafe { field.frame() }, &reference[..]);
    }

    #[test]
    fn each_byte_is_written_by_exactly_its_rows_owner() {
        // Stamp every band with its worker's id, concurrently, and
        // check the assembled buffer byte by byte: a byte carrying
        // any id but its row's owner would mean two workers wrote
        // into the same range.
        let tiles = tiles::assign(23, 5).unwrap();
        let (field, writers) = band_writers(PixelField::new(7, 23), &tiles);
        let threads: Vec<_> = writers
            .into_iter()
            .enumerate()
            .map(|(id, mut writer)| thread::spawn(move || writer.fill(id as u8 + 1)))
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        let frame = unsafe { field.frame() };
        for row in 0..23 {
            let owner = tiles
                .iter()
                .position(|tile| tile.rows().contains(&row))
                .unwrap() as u8
                + 1;
            for byte in &frame[row * 7 * 3..(row + 1) * 7 * 3] {
                assert_eq!(*byte, owner, "row {}", row);
            }
        }
    }
}
