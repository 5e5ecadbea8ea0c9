use std::collections::HashSet;
use std::fmt;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::validate_dimensions;
use crate::error::{HeatError, HeatResult};

/// Temperature every randomly seeded heat source is pinned at.
pub const HEAT_SOURCE_TEMPERATURE: f64 = 100.0;

/// Row-major temperature field plus the mask of pinned cells.
///
/// Cell `(x, y)` lives at `y * width + x`. Fixed cells keep the value they
/// were constructed with; solvers only ever replace the whole buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    width: usize,
    height: usize,
    pub(crate) data: Vec<f64>,
    pub(crate) fixed: Vec<bool>,
}

impl Grid {
    /// Zeroed grid with `heat_points` sources picked by a seeded RNG.
    ///
    /// Coordinates may repeat; a repeated pick pins the same cell again.
    pub fn initialize(width: usize, height: usize, heat_points: usize, seed: u64) -> HeatResult<Self> {
        validate_dimensions(width, height)?;

        let mut grid = Grid::zeroed(width, height);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        for _ in 0..heat_points {
            let x = rng.gen_range(0..width);
            let y = rng.gen_range(0..height);
            grid.pin(x, y, HEAT_SOURCE_TEMPERATURE);
        }
        log::debug!(
            "initialized {}x{} grid with {} distinct sources ({} requested)",
            width,
            height,
            grid.fixed_count(),
            heat_points
        );
        Ok(grid)
    }

    /// Zeroed grid with explicitly placed sources `(x, y, temperature)`.
    pub fn with_sources(width: usize, height: usize, sources: &[(usize, usize, f64)]) -> HeatResult<Self> {
        validate_dimensions(width, height)?;

        let mut grid = Grid::zeroed(width, height);
        for &(x, y, temperature) in sources {
            if x >= width || y >= height {
                return Err(HeatError::configuration(format!(
                    "heat source ({}, {}) lies outside the {}x{} grid",
                    x, y, width, height
                )));
            }
            if !temperature.is_finite() {
                return Err(HeatError::configuration(format!(
                    "heat source ({}, {}) has non-finite temperature {}",
                    x, y, temperature
                )));
            }
            grid.pin(x, y, temperature);
        }
        Ok(grid)
    }

    /// Rebuilds a grid from flattened row-major buffers.
    pub(crate) fn from_parts(width: usize, height: usize, data: Vec<f64>, fixed: Vec<bool>) -> HeatResult<Self> {
        validate_dimensions(width, height)?;
        if data.len() != width * height || fixed.len() != width * height {
            return Err(HeatError::configuration(format!(
                "expected {} cells, got {} temperatures and {} mask entries",
                width * height,
                data.len(),
                fixed.len()
            )));
        }
        Ok(Grid { width, height, data, fixed })
    }

    fn zeroed(width: usize, height: usize) -> Self {
        Grid {
            width,
            height,
            data: vec![0.0; width * height],
            fixed: vec![false; width * height],
        }
    }

    fn pin(&mut self, x: usize, y: usize, temperature: f64) {
        let idx = self.index(x, y);
        self.data[idx] = temperature;
        self.fixed[idx] = true;
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.width && y < self.height);
        y * self.width + x
    }

    #[inline]
    pub fn read(&self, x: usize, y: usize) -> f64 {
        self.data[self.index(x, y)]
    }

    #[inline]
    pub fn is_fixed(&self, x: usize, y: usize) -> bool {
        self.fixed[self.index(x, y)]
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn fixed_mask(&self) -> &[bool] {
        &self.fixed
    }

    pub fn fixed_count(&self) -> usize {
        self.fixed.iter().filter(|&&f| f).count()
    }

    /// Coordinates of every pinned cell.
    pub fn sources(&self) -> HashSet<(usize, usize)> {
        self.fixed
            .iter()
            .enumerate()
            .filter(|(_, &f)| f)
            .map(|(idx, _)| (idx % self.width, idx / self.width))
            .collect()
    }

    pub fn neighbor_count(&self, x: usize, y: usize) -> HeatResult<usize> {
        neighbor_count(x, y, self.width, self.height)
    }

    /// Swaps in a freshly computed buffer and hands back the old one.
    pub(crate) fn swap_data(&mut self, next: &mut Vec<f64>) {
        debug_assert_eq!(next.len(), self.data.len());
        std::mem::swap(&mut self.data, next);
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot { grid: self }
    }
}

/// Read-only view handed to rendering collaborators between sweeps.
#[derive(Clone, Copy, Debug)]
pub struct Snapshot<'a> {
    grid: &'a Grid,
}

impl<'a> Snapshot<'a> {
    pub fn width(&self) -> usize {
        self.grid.width
    }

    pub fn height(&self) -> usize {
        self.grid.height
    }

    pub fn read(&self, x: usize, y: usize) -> f64 {
        self.grid.read(x, y)
    }

    pub fn is_fixed(&self, x: usize, y: usize) -> bool {
        self.grid.is_fixed(x, y)
    }

    pub fn to_grid(&self) -> Grid {
        self.grid.clone()
    }
}

/// One line per row, temperatures to one decimal, space separated.
impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.data.chunks(self.width) {
            let mut first = true;
            for value in row {
                if !first {
                    f.write_str(" ")?;
                }
                write!(f, "{:.1}", value)?;
                first = false;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

pub fn neighbor_count(x: usize, y: usize, width: usize, height: usize) -> HeatResult<usize> {
    let count = usize::from(x > 0)
        + usize::from(x + 1 < width)
        + usize::from(y > 0)
        + usize::from(y + 1 < height);
    if count == 0 {
        return Err(HeatError::NeighborCount { x, y });
    }
    Ok(count)
}

/// Mean of the in-bounds von Neumann neighbors of `(x, y)`.
///
/// `value` is queried in the fixed order left, right, up, down so every
/// solver sums the same terms in the same order and agrees bit for bit.
/// Callers guarantee the grid is at least 2x2.
#[inline]
pub fn neighbor_mean<F>(x: usize, y: usize, width: usize, height: usize, value: F) -> f64
where
    F: Fn(usize, usize) -> f64,
{
    let mut sum = 0.0;
    let mut count = 0u32;
    if x > 0 {
        sum += value(x - 1, y);
        count += 1;
    }
    if x + 1 < width {
        sum += value(x + 1, y);
        count += 1;
    }
    if y > 0 {
        sum += value(x, y - 1);
        count += 1;
    }
    if y + 1 < height {
        sum += value(x, y + 1);
        count += 1;
    }
    debug_assert!(count >= 2);
    sum / f64::from(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_is_deterministic_for_a_seed() {
        let a = Grid::initialize(20, 15, 10, 7).unwrap();
        let b = Grid::initialize(20, 15, 10, 7).unwrap();
        assert_eq!(a, b);
        assert!(a.fixed_count() >= 1 && a.fixed_count() <= 10);
    }

    #[test]
    fn sources_are_pinned_at_source_temperature() {
        let grid = Grid::initialize(8, 8, 5, 42).unwrap();
        for (x, y) in grid.sources() {
            assert_eq!(grid.read(x, y), HEAT_SOURCE_TEMPERATURE);
        }
        for y in 0..8 {
            for x in 0..8 {
                if !grid.is_fixed(x, y) {
                    assert_eq!(grid.read(x, y), 0.0);
                }
            }
        }
    }

    #[test]
    fn duplicate_picks_collapse_into_one_source() {
        // 2x2 with 50 picks must revisit cells
        let grid = Grid::initialize(2, 2, 50, 1).unwrap();
        assert!(grid.fixed_count() <= 4);
    }

    #[test]
    fn zero_heat_points_is_allowed() {
        let grid = Grid::initialize(3, 3, 0, 0).unwrap();
        assert_eq!(grid.fixed_count(), 0);
    }

    #[test]
    fn rejects_single_row_or_column() {
        assert!(matches!(Grid::initialize(1, 5, 1, 0), Err(HeatError::Configuration(_))));
        assert!(matches!(Grid::initialize(5, 1, 1, 0), Err(HeatError::Configuration(_))));
        assert!(Grid::with_sources(4, 4, &[(4, 0, 1.0)]).is_err());
    }

    #[test]
    fn neighbor_counts_by_position() {
        let grid = Grid::with_sources(4, 3, &[]).unwrap();
        assert_eq!(grid.neighbor_count(0, 0), Ok(2));
        assert_eq!(grid.neighbor_count(1, 0), Ok(3));
        assert_eq!(grid.neighbor_count(1, 1), Ok(4));
        assert_eq!(grid.neighbor_count(3, 2), Ok(2));
        assert_eq!(neighbor_count(0, 0, 1, 1), Err(HeatError::NeighborCount { x: 0, y: 0 }));
    }

    #[test]
    fn neighbor_mean_uses_only_in_bounds_cells() {
        let grid = Grid::with_sources(3, 3, &[(0, 0, 90.0), (2, 2, 30.0)]).unwrap();
        let at = |x: usize, y: usize| grid.read(x, y);
        // (1,0): left 90, right 0, down 0
        assert!((neighbor_mean(1, 0, 3, 3, at) - 30.0).abs() < 1e-12);
        // (1,1): 0 + 0 + 0 + 0
        assert_eq!(neighbor_mean(1, 1, 3, 3, at), 0.0);
        // (2,1): left 0, up 0, down 30
        assert!((neighbor_mean(2, 1, 3, 3, at) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn display_dumps_rows_to_one_decimal() {
        let grid = Grid::with_sources(3, 2, &[(0, 0, 100.0), (2, 1, 12.34)]).unwrap();
        assert_eq!(grid.to_string(), "100.0 0.0 0.0\n0.0 0.0 12.3\n");
    }

    #[test]
    fn snapshot_reads_through_to_grid() {
        let grid = Grid::with_sources(2, 2, &[(1, 0, 5.0)]).unwrap();
        let view = grid.snapshot();
        assert_eq!(view.read(1, 0), 5.0);
        assert!(view.is_fixed(1, 0));
        assert!(!view.is_fixed(0, 1));
        assert_eq!((view.width(), view.height()), (2, 2));
        assert_eq!(view.to_grid(), grid);
    }
}
