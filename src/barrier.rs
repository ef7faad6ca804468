//! The frame barrier: the one piece of real synchronization in the
//! engine.
//!
//! Twice per frame, everybody meets here.  Workers finish their bands
//! and call [`arrive_and_wait`]; when the last one arrives the
//! controller is woken, reads the finished buffer at its leisure, and
//! then calls [`release`] to start the next frame.  The barrier is
//! reused every frame, so each cycle is stamped with a generation
//! number: a worker only wakes from its wait when the generation has
//! actually advanced.  Without that stamp a spurious wakeup (or a
//! fast worker lapping a slow controller) would let a thread start
//! scribbling on a buffer the renderer is still reading.
//!
//! [`arrive_and_wait`]: struct.FrameBarrier.html#method.arrive_and_wait
//! [`release`]: struct.FrameBarrier.html#method.release

use error::EngineError;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// What a worker learns when its barrier wait ends.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Arrival {
    /// The controller released the frame; compute the next one.
    Released,
    /// The engine is shutting down; exit the worker loop.
    Stopped,
}

struct BarrierState {
    arrived: u32,
    generation: u64,
    stopped: bool,
}

/// A reusable two-phase barrier coordinating `n` workers with one
/// controller, once per frame.
///
/// Per-frame state machine: `Computing -> AllArrived -> Released ->
/// Computing` (next generation), with a terminal `Stopped` reachable
/// from anywhere via [`shutdown`](#method.shutdown).
pub struct FrameBarrier {
    workers: u32,
    state: Mutex<BarrierState>,
    all_arrived: Condvar,
    released: Condvar,
}

impl FrameBarrier {
    /// A barrier expecting `workers` arrivals per frame.
    pub fn new(workers: u32) -> FrameBarrier {
        FrameBarrier {
            workers,
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                stopped: false,
            }),
            all_arrived: Condvar::new(),
            released: Condvar::new(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<BarrierState>, EngineError> {
        self.state.lock().map_err(|_| poisoned())
    }

    /// Worker-side rendezvous.  Records this worker's arrival,
    /// wakes the controller if it was the last, and then sleeps until
    /// the controller releases the frame (or shuts the engine down).
    ///
    /// Returns [`Arrival::Stopped`](enum.Arrival.html) once shutdown
    /// has been requested; the caller must then exit its loop.  An
    /// arrival beyond the expected count, or a generation that moved
    /// by more than one while this worker slept, is a
    /// `BarrierProtocolViolation`.
    pub fn arrive_and_wait(&self) -> Result<Arrival, EngineError> {
        let mut state = self.lock()?;
        if state.stopped {
            return Ok(Arrival::Stopped);
        }
        if state.arrived >= self.workers {
            return Err(EngineError::BarrierProtocolViolation(format!(
                "arrival {} of an expected {}",
                state.arrived + 1,
                self.workers
            )));
        }
        state.arrived += 1;
        let generation = state.generation;
        if state.arrived == self.workers {
            self.all_arrived.notify_one();
        }
        while state.generation == generation && !state.stopped {
            state = self.released.wait(state).map_err(|_| poisoned())?;
        }
        if state.stopped {
            Ok(Arrival::Stopped)
        } else if state.generation == generation + 1 {
            Ok(Arrival::Released)
        } else {
            Err(EngineError::BarrierProtocolViolation(format!(
                "generation jumped from {} to {} during one wait",
                generation, state.generation
            )))
        }
    }

    /// Controller-side: block until every worker has arrived for the
    /// current frame.  Returns `Err(Stopped)` if the engine is shut
    /// down instead.
    pub fn wait_for_all(&self) -> Result<(), EngineError> {
        let mut state = self.lock()?;
        while state.arrived < self.workers && !state.stopped {
            state = self.all_arrived.wait(state).map_err(|_| poisoned())?;
        }
        if state.stopped {
            Err(EngineError::Stopped)
        } else {
            Ok(())
        }
    }

    /// Controller-side: start the next frame.  Resets the arrival
    /// count, advances the generation, and wakes every parked worker.
    /// Calling this before all workers have arrived is a
    /// `BarrierProtocolViolation`; the engine's step cycle makes that
    /// impossible by construction.
    pub fn release(&self) -> Result<(), EngineError> {
        let mut state = self.lock()?;
        if state.stopped {
            return Err(EngineError::Stopped);
        }
        if state.arrived != self.workers {
            return Err(EngineError::BarrierProtocolViolation(format!(
                "released with {} of {} workers arrived",
                state.arrived, self.workers
            )));
        }
        state.arrived = 0;
        state.generation += 1;
        self.released.notify_all();
        Ok(())
    }

    /// Marks the barrier stopped and wakes everyone, workers and
    /// controller alike.  Idempotent.  Without this wake a worker
    /// parked in `arrive_and_wait` would sleep forever with nobody
    /// left to release it.
    pub fn shutdown(&self) {
        // Proceed even if a panicking thread poisoned the lock; the
        // whole point here is to let the others out.
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        state.stopped = true;
        self.released.notify_all();
        self.all_arrived.notify_all();
    }
}

fn poisoned() -> EngineError {
    EngineError::BarrierProtocolViolation(
        "barrier lock poisoned by a panicked thread".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn generations_cycle_until_shutdown() {
        let barrier = Arc::new(FrameBarrier::new(3));
        let mut workers = vec![];
        for _ in 0..3 {
            let barrier = barrier.clone();
            workers.push(thread::spawn(move || {
                let mut frames = 0;
                loop {
                    match barrier.arrive_and_wait().unwrap() {
                        Arrival::Released => frames += 1,
                        Arrival::Stopped => return frames,
                    }
                }
            }));
        }
        for _ in 0..5 {
            barrier.wait_for_all().unwrap();
            barrier.release().unwrap();
        }
        barrier.wait_for_all().unwrap();
        barrier.shutdown();
        for worker in workers {
            assert_eq!(worker.join().unwrap(), 5);
        }
    }

    #[test]
    fn shutdown_wakes_a_parked_controller() {
        let barrier = Arc::new(FrameBarrier::new(1));
        let stopper = {
            let barrier = barrier.clone();
            thread::spawn(move || barrier.shutdown())
        };
        stopper.join().unwrap();
        match barrier.wait_for_all() {
            Err(EngineError::Stopped) => (),
            other => panic!("expected Stopped, got {:?}", other),
        }
    }

    #[test]
    fn arrivals_after_shutdown_return_immediately() {
        let barrier = FrameBarrier::new(2);
        barrier.shutdown();
        assert_eq!(barrier.arrive_and_wait().unwrap(), Arrival::Stopped);
        assert_eq!(barrier.arrive_and_wait().unwrap(), Arrival::Stopped);
    }

    #[test]
    fn premature_release_is_a_protocol_violation() {
        let barrier = FrameBarrier::new(2);
        match barrier.release() {
            Err(EngineError::BarrierProtocolViolation(_)) => (),
            other => panic!("expected a protocol violation, got {:?}", other),
        }
    }

    #[test]
    fn shutdown_is_idempotent() {
        let barrier = FrameBarrier::new(1);
        barrier.shutdown();
        barrier.shutdown();
        assert_eq!(barrier.arrive_and_wait().unwrap(), Arrival::Stopped);
    }
}
