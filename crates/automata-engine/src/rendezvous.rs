//! A counting-discipline barrier for the shared-buffer engine.
//!
//! Grounded in the original C++ substrate's `threadsReady` / `threadsDone`
//! counters guarded by a single mutex and two condition variables
//! (`examples/original_source/frame_threads_2D.hpp`): workers count in at
//! the end of a compute phase and count back out once the coordinator has
//! swapped the buffers and released the next step. A generation counter
//! distinguishes "still waiting on this round" from "already past it" so a
//! worker that loses a race with a spurious wakeup simply re-checks its
//! condition, per the Design Note in the specification favoring a
//! `Mutex`+`Condvar` pair over a bare [`std::sync::Barrier`] whenever the
//! coordinator must run code (the buffer swap) strictly between the two
//! halves of the rendezvous.
//!
//! A worker's rule panicking must never strand its peers: a worker that
//! caught a panic still calls [`Rendezvous::arrive_and_wait`] so the round
//! completes, and sets [`Rendezvous::abort`] so the coordinator knows to
//! stop dispatching new steps and unwind once every worker has returned.

use std::sync::{Condvar, Mutex};

struct State {
    generation: u64,
    arrived: usize,
    aborted: bool,
}

/// A reusable, n-party rendezvous point. Exactly `parties` callers must
/// each call [`Rendezvous::arrive_and_wait`] once per round for any of them
/// to proceed past it.
pub struct Rendezvous {
    parties: usize,
    state: Mutex<State>,
    cond: Condvar,
}

impl Rendezvous {
    pub fn new(parties: usize) -> Self {
        Self {
            parties,
            state: Mutex::new(State {
                generation: 0,
                arrived: 0,
                aborted: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Blocks until all `parties` have called this for the current round,
    /// then releases everyone and advances to the next round. Returns
    /// whether the run has been aborted (by any party, at any point up to
    /// and including this round).
    pub fn arrive_and_wait(&self) -> bool {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let my_generation = guard.generation;
        guard.arrived += 1;
        if guard.arrived == self.parties {
            guard.arrived = 0;
            guard.generation = guard.generation.wrapping_add(1);
            self.cond.notify_all();
        } else {
            while guard.generation == my_generation {
                guard = self
                    .cond
                    .wait(guard)
                    .unwrap_or_else(|e| e.into_inner());
            }
        }
        guard.aborted
    }

    /// Marks the run as aborted. Does not itself release a round; the
    /// caller must still arrive so the rendezvous completes.
    pub fn abort(&self) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).aborted = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn all_parties_release_together() {
        let rendezvous = Arc::new(Rendezvous::new(4));
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let r = Arc::clone(&rendezvous);
                let c = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..50 {
                        c.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        r.arrive_and_wait();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 200);
    }

    #[test]
    fn abort_flag_is_observed_by_all_after_next_round() {
        let rendezvous = Arc::new(Rendezvous::new(2));
        rendezvous.abort();
        let r2 = Arc::clone(&rendezvous);
        let h = thread::spawn(move || r2.arrive_and_wait());
        let aborted_here = rendezvous.arrive_and_wait();
        assert!(aborted_here);
        assert!(h.join().unwrap());
    }
}
