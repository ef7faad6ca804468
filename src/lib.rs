#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tiled parallel Mandelbrot engine
//!
//! The Mandelbrot set takes a point on the complex plane and
//! repeatedly multiplies it by itself, measuring how quickly that
//! number goes to infinity.  This "velocity" is the number used to
//! render the image.  The calculation is embarrassingly parallel: no
//! pixel depends on any other pixel.
//!
//! What an *interactive* viewer adds is a frame cycle.  The image is
//! cut into horizontal bands, one worker thread per band, and every
//! band must be finished before the frame can be shown; no worker may
//! start on the next frame while the current one is still being read
//! for display.  This crate is that cycle: a band partitioner, a
//! per-band escape-time kernel, a generation-counted frame barrier,
//! and an [`Engine`](engine/struct.Engine.html) that a rendering
//! shell drives one `step()` at a time.  The shell (window, texture
//! upload, input) is somebody else's problem; it hands us a view
//! rectangle and we hand it back a finished BGR buffer.

extern crate failure;
extern crate itertools;
extern crate log;
extern crate num;

pub mod barrier;
pub mod engine;
pub mod error;
pub mod space;
pub mod tiles;

mod field;
mod pool;

pub use engine::Engine;
pub use error::EngineError;
pub use field::escape_time;
pub use space::FractalSpace;
pub use tiles::Tile;
