//! Owns the worker threads.  Each worker is bound to one tile for the
//! life of the pool and runs the same fixed loop: snapshot the view,
//! render the band, meet everyone at the barrier, repeat.  All of the
//! thread-lifecycle bookkeeping (fallible spawn, final release,
//! joining) lives here so the engine proper never touches a
//! `JoinHandle`.

use barrier::{Arrival, FrameBarrier};
use error::EngineError;
use field::TileWriter;
use log::{debug, error, warn};
use space::FractalSpace;
use std::sync::{Arc, Mutex};
use std::thread;

pub(crate) struct WorkerPool {
    barrier: Arc<FrameBarrier>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns one named thread per band writer.  A refused spawn is
    /// fatal: the barrier is shut down so the already-running workers
    /// can observe it and exit, they are joined, and the error goes
    /// back to the caller.  There is no log-and-continue path; a
    /// short pool would leave the barrier counting arrivals that can
    /// never come.
    pub(crate) fn start(
        writers: Vec<TileWriter>,
        space: &Arc<Mutex<FractalSpace>>,
        barrier: &Arc<FrameBarrier>,
    ) -> Result<WorkerPool, EngineError> {
        let mut pool = WorkerPool {
            barrier: barrier.clone(),
            handles: Vec::with_capacity(writers.len()),
        };
        for (index, writer) in writers.into_iter().enumerate() {
            let space = space.clone();
            let barrier = barrier.clone();
            let spawned = thread::Builder::new()
                .name(format!("mandel-worker-{}", index))
                .spawn(move || run_worker(index, writer, &space, &barrier));
            match spawned {
                Ok(handle) => pool.handles.push(handle),
                Err(cause) => {
                    pool.barrier.shutdown();
                    if let Err(fault) = pool.join_all() {
                        warn!("while unwinding a failed pool start: {}", fault);
                    }
                    return Err(EngineError::WorkerSpawn(cause));
                }
            }
        }
        debug!("worker pool started with {} threads", pool.handles.len());
        Ok(pool)
    }

    /// Shuts the barrier down and joins every worker.  Safe to call
    /// with workers in any state: mid-band workers finish their tile,
    /// hit the barrier, and see the stop; parked workers are woken by
    /// the shutdown itself.
    pub(crate) fn stop(&mut self) -> Result<(), EngineError> {
        self.barrier.shutdown();
        self.join_all()
    }

    fn join_all(&mut self) -> Result<(), EngineError> {
        let mut panicked = 0;
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                panicked += 1;
            }
        }
        if panicked > 0 {
            Err(EngineError::BarrierProtocolViolation(format!(
                "{} worker(s) panicked before join",
                panicked
            )))
        } else {
            Ok(())
        }
    }
}

/// The per-worker frame loop.  Ends quietly on shutdown.  A barrier
/// protocol violation is a logic defect; the worker shuts the barrier
/// down first (so the controller cannot be left waiting on a dead
/// thread) and then panics, which `stop` reports at join time.
fn run_worker(
    index: usize,
    mut writer: TileWriter,
    space: &Mutex<FractalSpace>,
    barrier: &FrameBarrier,
) {
    let tile = writer.tile();
    debug!("worker {} owns rows {}..{}", index, tile.start, tile.end);
    loop {
        let snapshot = match space.lock() {
            Ok(guard) => *guard,
            Err(_) => {
                // The controller panicked mid-update; there is no
                // coherent view left to render.
                warn!("worker {} exiting: view lock poisoned", index);
                return;
            }
        };
        writer.render(&snapshot);
        match barrier.arrive_and_wait() {
            Ok(Arrival::Released) => continue,
            Ok(Arrival::Stopped) => {
                debug!("worker {} stopping", index);
                return;
            }
            Err(violation) => {
                error!("worker {}: {}", index, violation);
                barrier.shutdown();
                panic!("worker {}: {}", index, violation);
            }
        }
    }
}
