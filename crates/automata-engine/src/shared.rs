//! The shared-buffer barrier engine.
//!
//! One [`Grid`] lives behind an [`std::cell::UnsafeCell`], visible to every
//! worker thread for the whole run. Each worker owns a disjoint linear range
//! of cells (from [`Partitioner::linear_ranges`]) and, every step, reads
//! anywhere in `current` but writes only inside its own range of `next` —
//! the structural safety argument behind [`SharedGrid`]'s `unsafe impl Sync`.
//! Workers rendezvous twice a step through [`Rendezvous`]: once after
//! compute (so the coordinator only swaps once every worker has stopped
//! reading `current`/writing `next`), once after swap (so no worker starts
//! the next step's reads before the swap is visible to it).
//!
//! Grounded in `examples/original_source/frame_threads_2D.hpp`'s
//! `Game::Worker` loop (compute row band, signal ready, wait for go) and in
//! the specification's Design Note sanctioning a counter-discipline
//! rendezvous as a `std::sync::Barrier` substitute whenever the coordinator
//! must act strictly between two halves of it.

use std::cell::UnsafeCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use automata_grid::{Error, Grid, LinearRange, Partitioner};
use automata_rule::Rule;

use crate::rendezvous::Rendezvous;
use crate::sequential;

/// A [`Grid`] wrapped for concurrent access by disjoint-range workers.
///
/// # Safety
///
/// [`SharedGrid`] hands out `&SharedGrid` to every worker thread and lets
/// each call [`SharedGrid::get`] (reads `current`) and [`SharedGrid::write`]
/// (writes `next`) without further synchronization. This is sound only
/// because [`SharedBarrierEngine::run`] guarantees, structurally, that:
///
/// - every worker's [`LinearRange`] is disjoint from every other's, so
///   concurrent `write` calls never alias;
/// - no worker calls `get` or `write` while [`SharedGrid::swap`] runs — all
///   workers are parked at the compute-phase rendezvous before the
///   coordinator swaps, and none resumes until the following rendezvous
///   releases it.
struct SharedGrid(UnsafeCell<Grid>);

unsafe impl Sync for SharedGrid {}

impl SharedGrid {
    fn get(&self, r: usize, c: usize) -> u8 {
        unsafe { (*self.0.get()).get(r, c) }
    }

    fn neighbors(&self, r: usize, c: usize) -> [u8; 8] {
        unsafe { (*self.0.get()).neighbors(r, c) }
    }

    fn write(&self, r: usize, c: usize, value: u8) {
        unsafe { (*self.0.get()).set_next(r, c, value) }
    }

    /// # Safety: caller guarantees every worker is parked at a rendezvous.
    fn swap(&self) {
        unsafe { (*self.0.get()).swap() }
    }

    fn width(&self) -> usize {
        unsafe { (*self.0.get()).width() }
    }
}

/// Bulk-synchronous engine over one grid shared by every worker.
pub struct SharedBarrierEngine;

impl SharedBarrierEngine {
    /// Runs `steps` synchronous rounds of `rule` over `grid` split across
    /// `workers` threads, returning the measured wall-clock time in
    /// milliseconds. `workers == 1` always takes the sequential fast path;
    /// it still measures real elapsed time rather than hardcoding zero.
    ///
    /// If `rule` panics on any worker, that panic is caught, every other
    /// worker is released from its rendezvous rather than left stranded,
    /// and the original panic is re-raised on the caller's thread once all
    /// workers have stopped — so a user-rule fault aborts the run instead
    /// of deadlocking it.
    pub fn run(
        grid: &mut Grid,
        rule: Arc<dyn Rule>,
        workers: usize,
        steps: usize,
    ) -> Result<f64, Error> {
        if workers == 0 {
            return Err(Error::InvalidParameters(
                "shared engine requires at least one worker".into(),
            ));
        }
        if workers == 1 || steps == 0 {
            return sequential::run(grid, rule.as_ref(), steps);
        }

        let partitioner = Partitioner::new(grid.height(), grid.width(), workers)?;
        let ranges = partitioner.linear_ranges();
        let width = grid.width();

        let shared = SharedGrid(UnsafeCell::new(std::mem::replace(
            grid,
            Grid::new_from(1, 1, vec![0]).expect("1x1 placeholder grid is always valid"),
        )));
        let shared = Arc::new(shared);
        let rendezvous = Arc::new(Rendezvous::new(workers + 1));
        let panicked = Arc::new(AtomicBool::new(false));

        let start = Instant::now();

        let handles: Vec<_> = ranges
            .into_iter()
            .map(|range| {
                let shared = Arc::clone(&shared);
                let rendezvous = Arc::clone(&rendezvous);
                let panicked = Arc::clone(&panicked);
                let rule = Arc::clone(&rule);
                std::thread::Builder::new()
                    .name("automata-shared-worker".into())
                    .spawn(move || worker_loop(shared, rendezvous, panicked, rule, range, width, steps))
                    .map_err(|e| Error::SubstrateFailure(format!("failed to spawn worker: {e}")))
            })
            .collect::<Result<_, _>>()?;

        // Coordinator side of the two rendezvous points: swap the buffers
        // between them, once every worker has parked after computing.
        for _ in 0..steps {
            let aborted = rendezvous.arrive_and_wait(); // workers finished compute
            if !aborted {
                shared.swap();
            }
            let aborted = rendezvous.arrive_and_wait(); // workers may read the swap
            if aborted {
                break;
            }
        }

        let mut first_panic = None;
        for handle in handles {
            match handle.join() {
                Ok(Some(payload)) if first_panic.is_none() => first_panic = Some(payload),
                Ok(_) => {}
                Err(payload) if first_panic.is_none() => first_panic = Some(payload),
                Err(_) => {}
            }
        }

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let recovered = Arc::try_unwrap(shared)
            .map_err(|_| ())
            .expect("all worker threads joined; no other Arc clone can remain")
            .0
            .into_inner();
        *grid = recovered;

        if let Some(payload) = first_panic {
            panic::resume_unwind(payload);
        }

        Ok(elapsed_ms)
    }
}

#[allow(clippy::too_many_arguments)]
fn worker_loop(
    shared: Arc<SharedGrid>,
    rendezvous: Arc<Rendezvous>,
    panicked: Arc<AtomicBool>,
    rule: Arc<dyn Rule>,
    range: LinearRange,
    width: usize,
    steps: usize,
) -> Option<Box<dyn std::any::Any + Send>> {
    let mut caught = None;
    for _ in 0..steps {
        if !panicked.load(Ordering::Acquire) {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                for idx in range.lo..range.hi {
                    let r = idx / width;
                    let c = idx % width;
                    let value = shared.get(r, c);
                    let neighbors = shared.neighbors(r, c);
                    shared.write(r, c, rule.next(value, neighbors));
                }
            }));
            if let Err(payload) = result {
                panicked.store(true, Ordering::Release);
                rendezvous.abort();
                caught = Some(payload);
            }
        }
        let aborted = rendezvous.arrive_and_wait(); // compute done
        if aborted {
            // still arrive at the second rendezvous so the coordinator's
            // loop, which always calls arrive_and_wait twice per step,
            // does not wait forever on a worker that stops early.
            rendezvous.arrive_and_wait();
            break;
        }
        rendezvous.arrive_and_wait(); // swap visible, free to read next round
    }
    caught
}
