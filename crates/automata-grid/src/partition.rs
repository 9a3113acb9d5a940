//! Partitioning of a grid into worker-owned row bands or linear index ranges.
//!
//! Both partitioning schemes share one rule (`band_sizes`): the first
//! `N - 1` shares get `floor(total / N)` items each, and the last share
//! absorbs the remainder (`floor(total / N) + total % N`). The shared engine
//! applies this over `H * W` cells; the halo engine applies it over `H` rows.

use crate::Error;

/// A contiguous, half-open row range `[lo, hi)` owned by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBand {
    pub lo: usize,
    pub hi: usize,
}

impl RowBand {
    /// Number of rows in this band.
    pub fn len(&self) -> usize {
        self.hi - self.lo
    }

    pub fn is_empty(&self) -> bool {
        self.hi == self.lo
    }
}

/// A contiguous, half-open linear index range `[lo, hi)` over a flattened
/// `H * W` grid, owned by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearRange {
    pub lo: usize,
    pub hi: usize,
}

impl LinearRange {
    pub fn len(&self) -> usize {
        self.hi - self.lo
    }

    pub fn is_empty(&self) -> bool {
        self.hi == self.lo
    }
}

/// Computes worker share sizes for `total` items split `workers` ways: the
/// first `workers - 1` shares get `total / workers`, the last absorbs the
/// remainder. Panics only on `workers == 0`, which callers must have already
/// rejected via [`Partitioner::new`].
fn band_sizes(total: usize, workers: usize) -> Vec<usize> {
    assert!(workers > 0, "band_sizes requires at least one worker");
    let base = total / workers;
    let remainder = total % workers;
    let mut sizes = vec![base; workers];
    if let Some(last) = sizes.last_mut() {
        *last += remainder;
    }
    sizes
}

/// Maps a grid's dimensions and worker count onto contiguous row bands or
/// linear index ranges.
#[derive(Debug, Clone, Copy)]
pub struct Partitioner {
    height: usize,
    width: usize,
    workers: usize,
}

impl Partitioner {
    /// Construct a partitioner. Fails with [`Error::InvalidParameters`] when
    /// `workers == 0`, `height == 0`, or `width == 0`.
    pub fn new(height: usize, width: usize, workers: usize) -> Result<Self, Error> {
        if workers == 0 || height == 0 || width == 0 {
            return Err(Error::InvalidParameters(format!(
                "partitioner requires positive height, width, and worker count; got ({height}, {width}, {workers})"
            )));
        }
        Ok(Self {
            height,
            width,
            workers,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Row bands over `[0, height)`, one per worker, disjoint and covering
    /// the full grid; the last band absorbs the remainder.
    pub fn row_bands(&self) -> Vec<RowBand> {
        let mut lo = 0;
        band_sizes(self.height, self.workers)
            .into_iter()
            .map(|len| {
                let hi = lo + len;
                let band = RowBand { lo, hi };
                lo = hi;
                band
            })
            .collect()
    }

    /// Linear index ranges over `[0, height * width)`, one per worker.
    pub fn linear_ranges(&self) -> Vec<LinearRange> {
        let mut lo = 0;
        band_sizes(self.height * self.width, self.workers)
            .into_iter()
            .map(|len| {
                let hi = lo + len;
                let range = LinearRange { lo, hi };
                lo = hi;
                range
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_workers_or_dimensions() {
        assert!(Partitioner::new(4, 4, 0).is_err());
        assert!(Partitioner::new(0, 4, 2).is_err());
        assert!(Partitioner::new(4, 0, 2).is_err());
    }

    #[test]
    fn single_worker_gets_whole_grid() {
        let p = Partitioner::new(7, 5, 1).unwrap();
        let bands = p.row_bands();
        assert_eq!(bands, vec![RowBand { lo: 0, hi: 7 }]);
    }

    #[test]
    fn bands_are_disjoint_and_cover_the_grid() {
        let p = Partitioner::new(10, 4, 3).unwrap();
        let bands = p.row_bands();
        assert_eq!(bands.len(), 3);
        assert_eq!(bands[0].lo, 0);
        let mut prev_hi = 0;
        for band in &bands {
            assert_eq!(band.lo, prev_hi);
            assert!(band.hi >= band.lo);
            prev_hi = band.hi;
        }
        assert_eq!(prev_hi, 10);
    }

    #[test]
    fn last_band_absorbs_remainder() {
        // 10 rows over 3 workers: 3, 3, 4.
        let p = Partitioner::new(10, 1, 3).unwrap();
        let bands = p.row_bands();
        assert_eq!(bands[0].len(), 3);
        assert_eq!(bands[1].len(), 3);
        assert_eq!(bands[2].len(), 4);
    }

    #[test]
    fn linear_ranges_cover_all_cells() {
        let p = Partitioner::new(5, 5, 4).unwrap();
        let ranges = p.linear_ranges();
        assert_eq!(ranges.first().unwrap().lo, 0);
        assert_eq!(ranges.last().unwrap().hi, 25);
        let total: usize = ranges.iter().map(|r| r.len()).sum();
        assert_eq!(total, 25);
    }
}
