//! Toroidal double-buffered grid storage.
//!
//! [`Grid`] is the state store shared (or, in the halo engine, cloned per
//! worker as a subgrid) by the parallel step engines in `automata-engine`.
//! It owns exactly two buffers and never copies them on a step boundary —
//! `swap` exchanges which buffer plays `current` and which plays `next`.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub mod partition;

pub use partition::{LinearRange, Partitioner, RowBand};

/// A single automaton cell. The framework treats this opaquely beyond
/// storing, reading, and handing it to the user's [`automata_rule::Rule`](../automata_rule/trait.Rule.html).
pub type Cell = u8;

/// Errors surfaced synchronously from construction, or from a framework-internal
/// failure to bring up or tear down the parallel substrate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("parallel substrate failure: {0}")]
    SubstrateFailure(String),
}

/// Floored modulo: `modulo(-1, n) == n - 1`, unlike Rust's truncating `%`.
///
/// Row indices wrap by `height`, column indices wrap by `width` — always;
/// the two moduli are never swapped regardless of which is larger.
#[inline]
pub fn modulo(a: i64, b: i64) -> usize {
    debug_assert!(b > 0, "modulus must be positive");
    let r = a % b;
    (if r < 0 { r + b } else { r }) as usize
}

/// A rectangular, double-buffered grid of [`Cell`] values with toroidal
/// (wrap-around) Moore-neighborhood lookup.
#[derive(Debug, Clone)]
pub struct Grid {
    height: usize,
    width: usize,
    current: Vec<Cell>,
    next: Vec<Cell>,
}

impl Grid {
    /// Allocate a grid with `current` randomized over `{0,1}` from OS entropy
    /// and `next` zeroed.
    pub fn new(height: usize, width: usize) -> Result<Self, Error> {
        Self::validate_dims(height, width)?;
        let mut rng = rand::thread_rng();
        let current = (0..height * width).map(|_| rng.gen_range(0..=1)).collect();
        tracing::trace!(target: "grid", height, width, "grid_allocated_random");
        Ok(Self {
            height,
            width,
            current,
            next: vec![0; height * width],
        })
    }

    /// As [`Grid::new`] but with a reproducible seed, so benchmark and test
    /// runs can be repeated byte-for-byte.
    pub fn new_seeded(height: usize, width: usize, seed: u64) -> Result<Self, Error> {
        Self::validate_dims(height, width)?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let current = (0..height * width).map(|_| rng.gen_range(0..=1)).collect();
        tracing::trace!(target: "grid", height, width, seed, "grid_allocated_seeded");
        Ok(Self {
            height,
            width,
            current,
            next: vec![0; height * width],
        })
    }

    /// Allocate a grid initialized from a caller-supplied row-major vector.
    ///
    /// Fails with [`Error::InvalidParameters`] when `height == 0`,
    /// `width == 0`, or `v.len() != height * width`.
    pub fn new_from(height: usize, width: usize, v: Vec<Cell>) -> Result<Self, Error> {
        Self::validate_dims(height, width)?;
        if v.len() != height * width {
            return Err(Error::InvalidParameters(format!(
                "initial vector has {} cells, expected {}",
                v.len(),
                height * width
            )));
        }
        Ok(Self {
            height,
            width,
            next: vec![0; height * width],
            current: v,
        })
    }

    fn validate_dims(height: usize, width: usize) -> Result<(), Error> {
        if height == 0 || width == 0 {
            return Err(Error::InvalidParameters(format!(
                "height and width must be positive, got ({height}, {width})"
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    fn index(&self, r: usize, c: usize) -> usize {
        r * self.width + c
    }

    /// Read a cell from `current`.
    #[inline]
    pub fn get(&self, r: usize, c: usize) -> Cell {
        self.current[self.index(r, c)]
    }

    /// Write a cell into `next`. Never visible via [`Grid::get`] until the
    /// next [`Grid::swap`].
    #[inline]
    pub fn set_next(&mut self, r: usize, c: usize, value: Cell) {
        let idx = self.index(r, c);
        self.next[idx] = value;
    }

    /// Exchange the roles of `current` and `next`. The caller guarantees no
    /// worker is mid-step at the moment of the call.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.current, &mut self.next);
    }

    /// The eight Moore neighbors of `(r, c)`, in order NW, N, NE, W, E, SW, S, SE,
    /// wrapping toroidally with floored modulo. Row wraps by `height`, column
    /// wraps by `width`.
    pub fn neighbors(&self, r: usize, c: usize) -> [Cell; 8] {
        let h = self.height as i64;
        let w = self.width as i64;
        let r = r as i64;
        let c = c as i64;
        let up = modulo(r - 1, h);
        let down = modulo(r + 1, h);
        let left = modulo(c - 1, w);
        let right = modulo(c + 1, w);
        let r0 = r as usize;
        let c0 = c as usize;
        [
            self.current[self.index(up, left)],
            self.current[self.index(up, c0)],
            self.current[self.index(up, right)],
            self.current[self.index(r0, left)],
            self.current[self.index(r0, right)],
            self.current[self.index(down, left)],
            self.current[self.index(down, c0)],
            self.current[self.index(down, right)],
        ]
    }

    /// Row `r` of `current`, row-major, length `width`.
    pub fn row(&self, r: usize) -> &[Cell] {
        let start = r * self.width;
        &self.current[start..start + self.width]
    }

    /// Row-major snapshot of `current`.
    pub fn current_slice(&self) -> &[Cell] {
        &self.current
    }

    /// Overwrite row `r` of `current` directly. Not used by rules or step
    /// engines mid-step; exists for callers that assemble or finalize a
    /// grid's state from outside the step loop (the halo engine writes its
    /// workers' subgrids back through this after a run completes).
    pub fn load_row(&mut self, r: usize, data: &[Cell]) {
        assert_eq!(data.len(), self.width, "row length must equal grid width");
        let start = r * self.width;
        self.current[start..start + self.width].copy_from_slice(data);
    }

    /// Render the grid: `-` for 0, `x` for anything else, one row per line,
    /// a blank line after the whole grid.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity((self.width + 1) * self.height + 1);
        for r in 0..self.height {
            for &cell in self.row(r) {
                out.push(if cell == 0 { '-' } else { 'x' });
            }
            out.push('\n');
        }
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modulo_is_floored_not_truncated() {
        assert_eq!(modulo(-1, 5), 4);
        assert_eq!(modulo(-6, 5), 4);
        assert_eq!(modulo(0, 5), 0);
        assert_eq!(modulo(5, 5), 0);
        assert_eq!(modulo(7, 5), 2);
    }

    #[test]
    fn modulo_agrees_with_math_congruence() {
        for a in -20i64..20 {
            for b in 1i64..7 {
                let r = modulo(a, b);
                assert!(r < b as usize);
                assert_eq!((a - r as i64).rem_euclid(b), 0);
            }
        }
    }

    #[test]
    fn new_from_rejects_mismatched_length() {
        let err = Grid::new_from(2, 2, vec![0, 1, 0]).unwrap_err();
        assert!(matches!(err, Error::InvalidParameters(_)));
    }

    #[test]
    fn new_from_rejects_non_positive_dimensions() {
        assert!(Grid::new_from(0, 2, vec![]).is_err());
        assert!(Grid::new_from(2, 0, vec![]).is_err());
    }

    #[test]
    fn neighbors_order_and_wrap_at_corner() {
        // 3x3 grid, values equal to row*3+col so neighbor identities are checkable.
        let v: Vec<Cell> = (0..9).collect();
        let g = Grid::new_from(3, 3, v).unwrap();
        // cell (0,0): NW should be (2,2)=8, N=(2,0)=6, NE=(2,1)=7,
        // W=(0,2)=2, E=(0,1)=1, SW=(1,2)=5, S=(1,0)=3, SE=(1,1)=4
        assert_eq!(g.neighbors(0, 0), [8, 6, 7, 2, 1, 5, 3, 4]);
    }

    #[test]
    fn swap_exposes_next_as_current() {
        let mut g = Grid::new_from(2, 2, vec![0, 0, 0, 0]).unwrap();
        g.set_next(0, 0, 1);
        g.set_next(0, 1, 1);
        g.set_next(1, 0, 1);
        g.set_next(1, 1, 1);
        assert_eq!(g.get(0, 0), 0); // writes to next are invisible before swap
        g.swap();
        assert_eq!(g.get(0, 0), 1);
        assert_eq!(g.get(1, 1), 1);
    }

    #[test]
    fn render_uses_dash_and_x() {
        let g = Grid::new_from(1, 3, vec![0, 1, 2]).unwrap();
        assert_eq!(g.render(), "-xx\n\n");
    }

    #[test]
    fn new_seeded_is_reproducible() {
        let a = Grid::new_seeded(4, 4, 42).unwrap();
        let b = Grid::new_seeded(4, 4, 42).unwrap();
        assert_eq!(a.current_slice(), b.current_slice());
    }
}
