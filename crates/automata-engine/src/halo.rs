//! The ghost-row halo-exchange engine.
//!
//! Each worker owns its row band as an exclusive, non-shared [`Subgrid`]:
//! `band` interior rows plus one ghost row above and below. No two threads
//! ever touch the same memory, so unlike [`crate::shared`] this engine needs
//! no `unsafe`. Coordination instead rides entirely on message passing,
//! matching the specification's Design Note that a rendezvous carrying a
//! payload (the exchanged ghost rows) is better modeled as a tagged message
//! over a channel than as a bare barrier: `crossbeam_channel` gives each
//! worker a `Go`/`Halo`/`End` mailbox, and the coordinator's blocking
//! `recv()` loop over the shared ready-channel *is* the arrival count — no
//! separate counter needed.
//!
//! Grounded in `examples/original_source/frameFF_DM2D.hpp`'s
//! `Game`/`Worker`/`Emitter` pipeline: workers compute their interior band,
//! emit their new boundary rows, and the coordinator pairs each worker's
//! emitted boundary with its neighbors' before releasing the next step.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use automata_grid::{modulo, Cell, Error, Grid, Partitioner, RowBand};
use automata_rule::Rule;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

use crate::sequential;

/// Message from the coordinator to a single worker.
enum ToWorker {
    Go,
    Halo { top: Vec<Cell>, bot: Vec<Cell> },
    End,
}

/// Message from a worker back to the coordinator, sent once per step
/// regardless of whether that step's compute phase panicked.
struct FromWorker {
    id: usize,
    first_interior: Vec<Cell>,
    last_interior: Vec<Cell>,
    /// The full interior band (rows `1..=band_len`, row-major), so the
    /// coordinator can reassemble the global grid once the run ends without
    /// a separate finalization round-trip.
    interior: Vec<Cell>,
    panic: Option<Box<dyn std::any::Any + Send>>,
}

/// A worker's exclusive row band: `band.len()` interior rows (indices
/// `1..=band.len()`) bracketed by ghost rows at `0` and `band.len() + 1`.
/// Column wrap is toroidal via [`modulo`]; row neighbors are the immediate
/// local row above/below, never wrapped — the ghost rows already hold
/// whatever the global torus would wrap to.
struct Subgrid {
    rows: usize,
    width: usize,
    current: Vec<Cell>,
    next: Vec<Cell>,
}

impl Subgrid {
    fn from_grid(grid: &Grid, band: RowBand) -> Self {
        let width = grid.width();
        let height = grid.height();
        let rows = band.len() + 2;
        let mut current = Vec::with_capacity(rows * width);
        let top_global = modulo(band.lo as i64 - 1, height as i64);
        current.extend_from_slice(grid.row(top_global));
        for r in band.lo..band.hi {
            current.extend_from_slice(grid.row(r));
        }
        let bot_global = modulo(band.hi as i64, height as i64);
        current.extend_from_slice(grid.row(bot_global));
        Self {
            rows,
            width,
            next: vec![0; rows * width],
            current,
        }
    }

    fn band_len(&self) -> usize {
        self.rows - 2
    }

    fn row(&self, r: usize) -> &[Cell] {
        &self.current[r * self.width..(r + 1) * self.width]
    }

    fn set_row(&mut self, r: usize, data: &[Cell]) {
        self.current[r * self.width..(r + 1) * self.width].copy_from_slice(data);
    }

    fn neighbors(&self, r: usize, c: usize) -> [Cell; 8] {
        let w = self.width as i64;
        let left = modulo(c as i64 - 1, w);
        let right = modulo(c as i64 + 1, w);
        let up = r - 1;
        let down = r + 1;
        [
            self.current[up * self.width + left],
            self.current[up * self.width + c],
            self.current[up * self.width + right],
            self.current[r * self.width + left],
            self.current[r * self.width + right],
            self.current[down * self.width + left],
            self.current[down * self.width + c],
            self.current[down * self.width + right],
        ]
    }

    fn compute_interior(&mut self, rule: &dyn Rule) {
        for r in 1..=self.band_len() {
            for c in 0..self.width {
                let value = self.current[r * self.width + c];
                let neighbors = self.neighbors(r, c);
                self.next[r * self.width + c] = rule.next(value, neighbors);
            }
        }
    }

    fn swap(&mut self) {
        std::mem::swap(&mut self.current, &mut self.next);
    }
}

pub struct HaloExchangeEngine;

impl HaloExchangeEngine {
    /// Runs `steps` rounds across `workers` subgrids, writing the final
    /// state back into `grid`. Returns measured elapsed milliseconds.
    /// `workers == 1` collapses to the sequential path, per the
    /// specification: there is no second worker to exchange a halo with.
    pub fn run(
        grid: &mut Grid,
        rule: Arc<dyn Rule>,
        workers: usize,
        steps: usize,
    ) -> Result<f64, Error> {
        if workers == 0 {
            return Err(Error::InvalidParameters(
                "halo engine requires at least one worker".into(),
            ));
        }
        if workers == 1 || steps == 0 {
            return sequential::run(grid, rule.as_ref(), steps);
        }

        let partitioner = Partitioner::new(grid.height(), grid.width(), workers)?;
        let bands = partitioner.row_bands();

        let (ready_tx, ready_rx): (Sender<FromWorker>, Receiver<FromWorker>) = unbounded();
        let mut cmd_txs = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        let start = Instant::now();

        for (id, band) in bands.iter().copied().enumerate() {
            let subgrid = Subgrid::from_grid(grid, band);
            let (cmd_tx, cmd_rx) = bounded::<ToWorker>(1);
            cmd_txs.push(cmd_tx);
            let ready_tx = ready_tx.clone();
            let rule = Arc::clone(&rule);
            let handle = std::thread::Builder::new()
                .name(format!("automata-halo-worker-{id}"))
                .spawn(move || worker_loop(id, subgrid, rule, cmd_rx, ready_tx))
                .map_err(|e| Error::SubstrateFailure(format!("failed to spawn worker: {e}")))?;
            handles.push(handle);
        }
        drop(ready_tx);

        let mut panic_payload: Option<Box<dyn std::any::Any + Send>> = None;
        let mut last_replies: Vec<Option<FromWorker>> = (0..workers).map(|_| None).collect();
        'rounds: for _ in 0..steps {
            for tx in &cmd_txs {
                let _ = tx.send(ToWorker::Go);
            }
            let mut replies: Vec<Option<FromWorker>> = (0..workers).map(|_| None).collect();
            for _ in 0..workers {
                let mut msg = ready_rx
                    .recv()
                    .expect("every spawned worker sends exactly one reply per round");
                if panic_payload.is_none() {
                    if let Some(payload) = msg.panic.take() {
                        panic_payload = Some(payload);
                    }
                }
                let id = msg.id;
                replies[id] = Some(msg);
            }
            if panic_payload.is_some() {
                last_replies = replies;
                for tx in &cmd_txs {
                    let _ = tx.send(ToWorker::End);
                }
                break 'rounds;
            }
            for (k, tx) in cmd_txs.iter().enumerate() {
                let upstream = &replies[(k + workers - 1) % workers].as_ref().unwrap().last_interior;
                let downstream = &replies[(k + 1) % workers].as_ref().unwrap().first_interior;
                let _ = tx.send(ToWorker::Halo {
                    top: upstream.clone(),
                    bot: downstream.clone(),
                });
            }
            last_replies = replies;
        }
        if panic_payload.is_none() {
            for tx in &cmd_txs {
                let _ = tx.send(ToWorker::End);
            }
        }

        for handle in handles {
            if let Err(payload) = handle.join() {
                if panic_payload.is_none() {
                    panic_payload = Some(payload);
                }
            }
        }

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        for (band, reply) in bands.iter().zip(last_replies.into_iter()) {
            if let Some(reply) = reply {
                for (offset, r) in (band.lo..band.hi).enumerate() {
                    let row = &reply.interior[offset * grid.width()..(offset + 1) * grid.width()];
                    grid.load_row(r, row);
                }
            }
        }

        if let Some(payload) = panic_payload {
            panic::resume_unwind(payload);
        }

        Ok(elapsed_ms)
    }
}

fn worker_loop(
    id: usize,
    mut subgrid: Subgrid,
    rule: Arc<dyn Rule>,
    cmd_rx: Receiver<ToWorker>,
    ready_tx: Sender<FromWorker>,
) {
    loop {
        match cmd_rx.recv() {
            Ok(ToWorker::Go) => {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    subgrid.compute_interior(rule.as_ref());
                }));
                let panic = match result {
                    Ok(()) => {
                        subgrid.swap();
                        None
                    }
                    Err(payload) => Some(payload),
                };
                let band_len = subgrid.band_len();
                let mut interior = Vec::with_capacity(band_len * subgrid.width);
                for r in 1..=band_len {
                    interior.extend_from_slice(subgrid.row(r));
                }
                let reply = FromWorker {
                    id,
                    first_interior: subgrid.row(1).to_vec(),
                    last_interior: subgrid.row(band_len).to_vec(),
                    interior,
                    panic,
                };
                if ready_tx.send(reply).is_err() {
                    return;
                }
            }
            Ok(ToWorker::Halo { top, bot }) => {
                subgrid.set_row(0, &top);
                let last = subgrid.rows - 1;
                subgrid.set_row(last, &bot);
            }
            Ok(ToWorker::End) | Err(_) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use automata_rule::{Identity, Life};

    #[test]
    fn single_worker_collapses_to_sequential() {
        let mut v = vec![0u8; 25];
        for r in 1..4 {
            v[r * 5 + 2] = 1;
        }
        let mut g = Grid::new_from(5, 5, v.clone()).unwrap();
        HaloExchangeEngine::run(&mut g, Arc::new(Life), 1, 2).unwrap();
        assert_eq!(g.current_slice(), v.as_slice());
    }

    #[test]
    fn halo_and_sequential_agree_on_a_glider_torus() {
        // Glider on an 8x8 torus, period 32 under Life.
        let mut v = vec![0u8; 64];
        for &(r, c) in &[(0, 1), (1, 2), (2, 0), (2, 1), (2, 2)] {
            v[r * 8 + c] = 1;
        }
        let mut g_seq = Grid::new_from(8, 8, v.clone()).unwrap();
        let mut g_halo = Grid::new_from(8, 8, v).unwrap();
        sequential::run(&mut g_seq, &Life, 32).unwrap();
        HaloExchangeEngine::run(&mut g_halo, Arc::new(Life), 4, 32).unwrap();
        assert_eq!(g_seq.current_slice(), g_halo.current_slice());
    }

    #[test]
    fn identity_rule_never_mutates_grid_across_a_halo_exchange() {
        let v = vec![1u8, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0];
        let mut g = Grid::new_from(4, 3, v.clone()).unwrap();
        HaloExchangeEngine::run(&mut g, Arc::new(Identity), 2, 5).unwrap();
        assert_eq!(g.current_slice(), v.as_slice());
    }

    #[test]
    #[should_panic(expected = "boom")]
    fn a_rule_panic_propagates_through_run_instead_of_deadlocking() {
        struct Boom;
        impl Rule for Boom {
            fn next(&self, _value: u8, _neighbors: [u8; 8]) -> u8 {
                panic!("boom")
            }
        }
        let mut g = Grid::new_from(6, 6, vec![0; 36]).unwrap();
        let _ = HaloExchangeEngine::run(&mut g, Arc::new(Boom), 3, 4);
    }
}
