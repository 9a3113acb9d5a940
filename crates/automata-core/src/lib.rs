//! The `Engine` façade: picks a parallel strategy, owns the grid and rule,
//! and exposes the four operations the specification names —
//! `new`/`new_from`/`run`/`print` — regardless of which engine ends up
//! doing the work.

pub mod config;

pub use config::{ConfigFile, EngineConfig};

use std::sync::Arc;

use serde::Deserialize;

use automata_engine::{HaloExchangeEngine, SharedBarrierEngine};
use automata_grid::{Cell, Grid};
use automata_rule::Rule;

/// Construction and runtime failures. Re-exported from `automata_grid`:
/// every layer above the grid surfaces the same two kinds of failure (bad
/// parameters, a parallel substrate that failed to come up or tear down),
/// so a second, identical enum here would only duplicate `From` plumbing.
/// A user rule's panic is deliberately **not** a variant — see the engine
/// crate's docs on why it propagates instead of converting to a `Result`.
pub use automata_grid::Error;

/// Which step engine an [`Engine`] uses. `Halo` degenerates to `Shared`
/// automatically when there's no useful halo to exchange (`workers <= 1`,
/// or fewer rows than workers); see [`Engine::build`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Shared,
    Halo,
}

/// Owns one grid, one rule, and a worker count, and dispatches `run` to
/// whichever engine `kind` resolved to at construction time.
pub struct Engine {
    grid: Grid,
    rule: Arc<dyn Rule>,
    workers: usize,
    kind: EngineKind,
}

impl Engine {
    /// A freshly, unseeded-randomly initialized grid.
    pub fn new<R: Rule + 'static>(
        height: usize,
        width: usize,
        workers: usize,
        rule: R,
        kind: EngineKind,
    ) -> Result<Self, Error> {
        let grid = Grid::new(height, width)?;
        Self::build(grid, workers, rule, kind)
    }

    /// As [`Engine::new`], but reproducible: the grid is filled from a seeded RNG.
    pub fn new_seeded<R: Rule + 'static>(
        height: usize,
        width: usize,
        workers: usize,
        seed: u64,
        rule: R,
        kind: EngineKind,
    ) -> Result<Self, Error> {
        let grid = Grid::new_seeded(height, width, seed)?;
        Self::build(grid, workers, rule, kind)
    }

    /// A grid initialized from a caller-supplied row-major vector.
    pub fn new_from<R: Rule + 'static>(
        height: usize,
        width: usize,
        cells: Vec<Cell>,
        workers: usize,
        rule: R,
        kind: EngineKind,
    ) -> Result<Self, Error> {
        let grid = Grid::new_from(height, width, cells)?;
        Self::build(grid, workers, rule, kind)
    }

    /// Builds from an [`EngineConfig`] resolved by the caller (CLI flags
    /// merged over a config file), plus an already-constructed grid.
    pub fn from_config<R: Rule + 'static>(
        grid: Grid,
        config: EngineConfig,
        rule: R,
    ) -> Result<Self, Error> {
        Self::build(grid, config.workers, rule, config.kind)
    }

    fn build<R: Rule + 'static>(
        grid: Grid,
        workers: usize,
        rule: R,
        kind: EngineKind,
    ) -> Result<Self, Error> {
        if workers == 0 {
            return Err(Error::InvalidParameters(
                "engine requires at least one worker".into(),
            ));
        }
        let kind = Self::resolve_kind(kind, &grid, workers);
        Ok(Self {
            grid,
            rule: Arc::new(rule),
            workers,
            kind,
        })
    }

    fn resolve_kind(kind: EngineKind, grid: &Grid, workers: usize) -> EngineKind {
        let degenerate = workers <= 1 || grid.height() < workers;
        if kind == EngineKind::Halo && degenerate {
            tracing::debug!(
                target: "engine",
                workers,
                height = grid.height(),
                "engine_kind_coerced_to_shared"
            );
            EngineKind::Shared
        } else {
            kind
        }
    }

    /// Runs `steps` synchronous rounds, returning measured elapsed
    /// wall-clock time in milliseconds — always a real measurement, never a
    /// hardcoded `0`, even on the single-worker sequential path.
    pub fn run(&mut self, steps: usize) -> Result<f64, Error> {
        match self.kind {
            EngineKind::Shared => {
                SharedBarrierEngine::run(&mut self.grid, Arc::clone(&self.rule), self.workers, steps)
            }
            EngineKind::Halo => {
                HaloExchangeEngine::run(&mut self.grid, Arc::clone(&self.rule), self.workers, steps)
            }
        }
    }

    /// Renders the current grid to stdout: `-`/`x`, row-major, blank line
    /// after the grid.
    pub fn print(&self) {
        print!("{}", self.grid.render());
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use automata_rule::{Identity, Life};

    fn cells(pattern: &[(usize, usize)], height: usize, width: usize) -> Vec<Cell> {
        let mut v = vec![0u8; height * width];
        for &(r, c) in pattern {
            v[r * width + c] = 1;
        }
        v
    }

    // S1: a vertical blinker has period 2 under Life.
    #[test]
    fn s1_blinker_period_two() {
        for workers in [1, 2, 4] {
            for kind in [EngineKind::Shared, EngineKind::Halo] {
                let v = cells(&[(1, 2), (2, 2), (3, 2)], 5, 5);
                let mut engine =
                    Engine::new_from(5, 5, v.clone(), workers, Life, kind).unwrap();
                engine.run(2).unwrap();
                assert_eq!(engine.grid().current_slice(), v.as_slice());
            }
        }
    }

    // S2: a 2x2 block is a still life under Life.
    #[test]
    fn s2_block_is_a_still_life() {
        for workers in [1, 2, 3] {
            let v = cells(&[(1, 1), (1, 2), (2, 1), (2, 2)], 4, 4);
            let mut engine =
                Engine::new_from(4, 4, v.clone(), workers, Life, EngineKind::Halo).unwrap();
            engine.run(5).unwrap();
            assert_eq!(engine.grid().current_slice(), v.as_slice());
        }
    }

    // S3: an empty grid is a fixed point under Life.
    #[test]
    fn s3_empty_grid_is_a_fixed_point() {
        let mut engine =
            Engine::new_from(6, 6, vec![0; 36], 3, Life, EngineKind::Shared).unwrap();
        engine.run(10).unwrap();
        assert!(engine.grid().current_slice().iter().all(|&c| c == 0));
    }

    // S4: a full grid dies off under Life (overpopulation everywhere).
    #[test]
    fn s4_full_grid_dies_off() {
        let mut engine =
            Engine::new_from(6, 6, vec![1; 36], 2, Life, EngineKind::Halo).unwrap();
        engine.run(1).unwrap();
        assert!(engine.grid().current_slice().iter().all(|&c| c == 0));
    }

    // S5: Identity never mutates the grid regardless of engine or worker count.
    #[test]
    fn s5_identity_rule_is_idempotent_everywhere() {
        for workers in [1, 2, 3, 5] {
            for kind in [EngineKind::Shared, EngineKind::Halo] {
                let v = cells(&[(0, 0), (2, 3), (4, 4)], 6, 6);
                let mut engine =
                    Engine::new_from(6, 6, v.clone(), workers, Identity, kind).unwrap();
                engine.run(7).unwrap();
                assert_eq!(engine.grid().current_slice(), v.as_slice());
            }
        }
    }

    // S6: a glider on an 8x8 torus has period 32 under Life, including with a
    // degenerate worker count that does not divide the grid evenly.
    #[test]
    fn s6_toroidal_glider_has_period_32() {
        let v = cells(&[(0, 1), (1, 2), (2, 0), (2, 1), (2, 2)], 8, 8);
        for (workers, kind) in [
            (1, EngineKind::Shared),
            (4, EngineKind::Halo),
            (3, EngineKind::Halo),
        ] {
            let mut engine =
                Engine::new_from(8, 8, v.clone(), workers, Life, kind).unwrap();
            engine.run(32).unwrap();
            assert_eq!(engine.grid().current_slice(), v.as_slice());
        }
    }

    #[test]
    fn parallel_and_sequential_engines_agree_on_a_random_seeded_grid() {
        let mut seq = Engine::new_seeded(10, 10, 1, 99, Life, EngineKind::Shared).unwrap();
        let mut par = Engine::new_seeded(10, 10, 4, 99, Life, EngineKind::Halo).unwrap();
        seq.run(6).unwrap();
        par.run(6).unwrap();
        assert_eq!(seq.grid().current_slice(), par.grid().current_slice());
    }

    #[test]
    fn halo_kind_coerces_to_shared_for_a_single_worker() {
        let engine = Engine::new(4, 4, 1, Life, EngineKind::Halo).unwrap();
        assert_eq!(engine.kind(), EngineKind::Shared);
    }

    #[test]
    fn halo_kind_coerces_to_shared_when_workers_exceed_rows() {
        let engine = Engine::new(2, 4, 5, Life, EngineKind::Halo).unwrap();
        assert_eq!(engine.kind(), EngineKind::Shared);
    }

    #[test]
    fn zero_workers_is_rejected() {
        assert!(Engine::new(4, 4, 0, Life, EngineKind::Shared).is_err());
    }

    // Testable Property 5, generalized: Identity is a fixed point across a
    // sweep of shapes, worker counts, and engines.
    #[test]
    fn property_sweep_identity_is_always_a_fixed_point() {
        let shapes = [(3, 3), (5, 7), (8, 8), (9, 4)];
        for &(h, w) in &shapes {
            for workers in [1, 2, 3, 4] {
                for kind in [EngineKind::Shared, EngineKind::Halo] {
                    let seed = (h * 1000 + w * 10 + workers) as u64;
                    let mut engine =
                        Engine::new_seeded(h, w, workers, seed, Identity, kind).unwrap();
                    let before = engine.grid().current_slice().to_vec();
                    engine.run(5).unwrap();
                    assert_eq!(engine.grid().current_slice(), before.as_slice());
                }
            }
        }
    }

    #[test]
    fn print_does_not_panic() {
        let engine = Engine::new(2, 2, 1, Life, EngineKind::Shared).unwrap();
        engine.print();
    }
}
