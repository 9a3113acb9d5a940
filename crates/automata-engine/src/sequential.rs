//! The single-threaded fast path shared by both engines when `workers == 1`.
//!
//! Grounded in `examples/original_source/ints_2D_t.hpp`'s single-threaded
//! `Table::evolve`: no partitioning, no rendezvous, compute every cell into
//! `next` and swap once per step. The specification's redesign flag is
//! enforced here directly — `run` always measures real wall-clock time with
//! [`std::time::Instant`], even on this path, rather than returning `0`.

use std::time::Instant;

use automata_grid::{Error, Grid};
use automata_rule::Rule;

pub fn run(grid: &mut Grid, rule: &dyn Rule, steps: usize) -> Result<f64, Error> {
    let start = Instant::now();
    let (height, width) = (grid.height(), grid.width());
    for _ in 0..steps {
        for r in 0..height {
            for c in 0..width {
                let value = grid.get(r, c);
                let neighbors = grid.neighbors(r, c);
                grid.set_next(r, c, rule.next(value, neighbors));
            }
        }
        grid.swap();
    }
    Ok(start.elapsed().as_secs_f64() * 1000.0)
}
