//! The few ways the engine can fail.  Fractal computation itself is
//! pure and deterministic, so every error here is structural (a bad
//! configuration, an exhausted resource, or a logic defect) and
//! nothing is ever retried.

use failure::Fail;
use std::io;

/// Errors surfaced by engine configuration and the frame cycle.
#[derive(Debug, Fail)]
pub enum EngineError {
    /// The requested image height and worker count cannot form a
    /// partition: one of them is zero.
    #[fail(
        display = "cannot partition {} rows across {} workers",
        height, workers
    )]
    InvalidPartition {
        /// Image height, in rows.
        height: usize,
        /// Requested worker count.
        workers: usize,
    },

    /// The operating system refused to create a worker thread.  Fatal
    /// to configuration; the engine never starts half a pool.
    #[fail(display = "could not spawn worker thread: {}", _0)]
    WorkerSpawn(#[cause] io::Error),

    /// The frame barrier's bookkeeping went out of bounds: an arrival
    /// past the worker count, a generation that advanced by more than
    /// one while a worker slept, or a lock poisoned by a panicked
    /// peer.  This indicates a logic defect, not a runtime condition
    /// to recover from.
    #[fail(display = "frame barrier protocol violation: {}", _0)]
    BarrierProtocolViolation(String),

    /// The engine has been shut down; no further frames will be
    /// produced.
    #[fail(display = "engine stopped")]
    Stopped,
}
