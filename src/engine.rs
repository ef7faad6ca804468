//! The engine: what the rendering shell actually holds.
//!
//! The shell's loop is the classic interactive-viewer cycle: call
//! [`step`] to get a finished frame, upload it to wherever frames go,
//! feed any pending input back in with [`update_view`] or
//! [`update_iteration_limit`], and call [`step`] again.  The ordering
//! those three calls impose is the whole concurrency story: between
//! one `step` and the next every worker is parked in the barrier, so
//! the buffer the shell is reading cannot change under it and the
//! view can be mutated without any worker seeing a half-updated
//! frame.
//!
//! [`step`]: struct.Engine.html#method.step
//! [`update_view`]: struct.Engine.html#method.update_view
//! [`update_iteration_limit`]: struct.Engine.html#method.update_iteration_limit

use barrier::FrameBarrier;
use error::EngineError;
use field::{band_writers, PixelField};
use log::{info, warn};
use pool::WorkerPool;
use space::FractalSpace;
use std::convert::TryFrom;
use std::sync::{Arc, Mutex, MutexGuard};
use tiles;

/// A running tiled fractal engine: a pixel buffer, a view onto the
/// complex plane, and a pool of workers parked at a frame barrier.
pub struct Engine {
    field: Arc<PixelField>,
    space: Arc<Mutex<FractalSpace>>,
    barrier: Arc<FrameBarrier>,
    pool: WorkerPool,
    /// True once a frame has been handed out, meaning the barrier
    /// must be released before waiting for the next one.
    primed: bool,
    stopped: bool,
}

impl Engine {
    /// Builds the buffer, partitions the image, and starts one worker
    /// per tile.  The workers begin computing the first frame
    /// immediately.  Fails with `InvalidPartition` for a zero height
    /// or a worker count of zero or beyond the barrier's counting
    /// range, and with `WorkerSpawn` if the OS refuses a thread; in
    /// the latter case any workers already started are stopped and
    /// joined before this returns.
    pub fn configure(
        width: usize,
        height: usize,
        workers: usize,
        iteration_limit: u32,
        scale: f64,
        offset_x: f64,
        offset_y: f64,
    ) -> Result<Engine, EngineError> {
        // Checked before the partition is allocated: the barrier
        // counts arrivals in a u32, and a count that cannot fit was
        // never a plausible thread count anyway.
        let arrivals =
            u32::try_from(workers).map_err(|_| EngineError::InvalidPartition { height, workers })?;
        let assigned = tiles::assign(height, workers)?;
        let (field, writers) = band_writers(PixelField::new(width, height), &assigned);
        let space = Arc::new(Mutex::new(FractalSpace {
            scale,
            offset_x,
            offset_y,
            iteration_limit,
        }));
        let barrier = Arc::new(FrameBarrier::new(arrivals));
        let pool = WorkerPool::start(writers, &space, &barrier)?;
        info!(
            "engine configured: {}x{}, {} workers, limit {}",
            width, height, workers, iteration_limit
        );
        Ok(Engine {
            field,
            space,
            barrier,
            pool,
            primed: false,
            stopped: false,
        })
    }

    /// Image width in pixels.
    pub fn width(&self) -> usize {
        self.field.width()
    }

    /// Image height in pixels.
    pub fn height(&self) -> usize {
        self.field.height()
    }

    /// Blocks until the current frame is fully computed and returns
    /// the BGR buffer, valid until the next call that takes `&mut
    /// self`.  The previous frame's workers are released first, so
    /// frame `g+1` is only ever computed after the shell has finished
    /// with frame `g`.  After [`shutdown`](#method.shutdown) this
    /// fails with `Stopped` rather than hanging.
    pub fn step(&mut self) -> Result<&[u8], EngineError> {
        if self.stopped {
            return Err(EngineError::Stopped);
        }
        if self.primed {
            self.barrier.release()?;
        }
        self.barrier.wait_for_all()?;
        self.primed = true;
        // Safe per frame's contract: wait_for_all just confirmed that
        // every worker is parked, and they stay parked until the next
        // release.
        Ok(unsafe { self.field.frame() })
    }

    /// Repoints the view for the next frame.  Call only between
    /// [`step`](#method.step) calls; the workers are parked then, so
    /// they can never observe a half-applied view.
    pub fn update_view(
        &mut self,
        scale: f64,
        offset_x: f64,
        offset_y: f64,
    ) -> Result<(), EngineError> {
        let mut space = self.lock_space()?;
        space.scale = scale;
        space.offset_x = offset_x;
        space.offset_y = offset_y;
        Ok(())
    }

    /// Changes the per-pixel iteration budget for the next frame.
    pub fn update_iteration_limit(&mut self, iteration_limit: u32) -> Result<(), EngineError> {
        self.lock_space()?.iteration_limit = iteration_limit;
        Ok(())
    }

    /// Stops every worker and joins it.  Idempotent; afterwards
    /// [`step`](#method.step) fails with `Stopped`.  Reports a
    /// `BarrierProtocolViolation` if any worker had panicked.
    pub fn shutdown(&mut self) -> Result<(), EngineError> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        info!("engine shutting down");
        self.pool.stop()
    }

    fn lock_space(&self) -> Result<MutexGuard<FractalSpace>, EngineError> {
        self.space.lock().map_err(|_| {
            EngineError::BarrierProtocolViolation("view lock poisoned".to_string())
        })
    }
}

impl Drop for Engine {
    /// The buffer and the threads go away together; dropping the
    /// engine without an explicit shutdown still joins everything.
    fn drop(&mut self) {
        if let Err(fault) = self.shutdown() {
            warn!("shutdown during drop: {}", fault);
        }
    }
}
