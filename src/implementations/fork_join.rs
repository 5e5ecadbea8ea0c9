use parking_lot::Mutex;

use crate::config::DEFAULT_LEAF_SIZE;
use crate::convergence::{combine, ConvergenceDetector};
use crate::error::{HeatError, HeatResult};
use crate::grid::{Grid, Snapshot};
use crate::implementations::{relax, relax_cell, SolveReport, Sweep};

/*
  Recursive quadrant decomposition.

  Each sweep splits the grid into four quadrants until a region holds at
  most `leaf_size` cells. The destination buffer is carved up the same way
  (rows split with `Vec::split_off`, columns with `split_at_mut`), so every
  leaf owns a disjoint set of `&mut` row segments and no locking is needed.
  All leaves read the same immutable previous grid. The join of the root
  task is the iteration barrier: the buffer swap happens only after it.
*/

/// Half-open cell rectangle `[x0, x1) x [y0, y1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl Region {
    pub fn whole(width: usize, height: usize) -> Self {
        Region { x0: 0, y0: 0, x1: width, y1: height }
    }

    pub fn width(&self) -> usize {
        self.x1 - self.x0
    }

    pub fn height(&self) -> usize {
        self.y1 - self.y0
    }

    pub fn area(&self) -> usize {
        self.width() * self.height()
    }

    /// Top-left, top-right, bottom-left, bottom-right. Any of them may be
    /// empty when the parent is one cell wide or tall.
    pub fn quadrants(&self) -> [Region; 4] {
        let mid_x = (self.x0 + self.x1) / 2;
        let mid_y = (self.y0 + self.y1) / 2;
        [
            Region { x0: self.x0, y0: self.y0, x1: mid_x, y1: mid_y },
            Region { x0: mid_x, y0: self.y0, x1: self.x1, y1: mid_y },
            Region { x0: self.x0, y0: mid_y, x1: mid_x, y1: self.y1 },
            Region { x0: mid_x, y0: mid_y, x1: self.x1, y1: self.y1 },
        ]
    }
}

/// How the two halves of a split are executed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Scheduler {
    /// Work-stealing on the current rayon pool.
    #[default]
    Rayon,
    /// Plain recursion on the calling thread.
    Inline,
}

impl Scheduler {
    fn join<A, B, RA, RB>(self, a: A, b: B) -> (RA, RB)
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send,
    {
        match self {
            Scheduler::Rayon => rayon::join(a, b),
            Scheduler::Inline => (a(), b()),
        }
    }
}

/// Exclusive view of one region of the destination buffer.
struct Tile<'a> {
    region: Region,
    rows: Vec<&'a mut [f64]>,
}

impl<'a> Tile<'a> {
    fn split(self) -> [Tile<'a>; 4] {
        let [tl, tr, bl, br] = self.region.quadrants();
        let col = tl.x1 - self.region.x0;

        let mut top = self.rows;
        let bottom = top.split_off(tl.y1 - self.region.y0);
        let (top_left, top_right) = split_columns(top, col);
        let (bottom_left, bottom_right) = split_columns(bottom, col);

        [
            Tile { region: tl, rows: top_left },
            Tile { region: tr, rows: top_right },
            Tile { region: bl, rows: bottom_left },
            Tile { region: br, rows: bottom_right },
        ]
    }
}

fn split_columns<'a>(rows: Vec<&'a mut [f64]>, at: usize) -> (Vec<&'a mut [f64]>, Vec<&'a mut [f64]>) {
    rows.into_iter().map(|row| row.split_at_mut(at)).unzip()
}

fn relax_leaf(prev: &Grid, tile: Tile<'_>, detector: &ConvergenceDetector) -> bool {
    let mut stable = true;
    for (dy, row) in tile.rows.into_iter().enumerate() {
        let y = tile.region.y0 + dy;
        for (dx, cell) in row.iter_mut().enumerate() {
            let (value, cell_stable) = relax_cell(prev, tile.region.x0 + dx, y, detector);
            *cell = value;
            stable &= cell_stable;
        }
    }
    stable
}

/// Splits `tile` into quadrants until a piece holds at most `leaf_size`
/// cells, then hands each piece to `leaf`. Returns the AND of the leaf results.
fn split_until_leaves<F>(tile: Tile<'_>, leaf_size: usize, scheduler: Scheduler, leaf: &F) -> bool
where
    F: Fn(Tile<'_>) -> bool + Sync,
{
    if tile.region.area() <= leaf_size {
        return leaf(tile);
    }

    let [a, b, c, d] = tile.split();
    let ((sa, sb), (sc, sd)) = scheduler.join(
        || {
            scheduler.join(
                || split_until_leaves(a, leaf_size, scheduler, leaf),
                || split_until_leaves(b, leaf_size, scheduler, leaf),
            )
        },
        || {
            scheduler.join(
                || split_until_leaves(c, leaf_size, scheduler, leaf),
                || split_until_leaves(d, leaf_size, scheduler, leaf),
            )
        },
    );
    combine([sa, sb, sc, sd])
}

/// Non-empty leaves of the decomposition, in depth-first order. Walks the
/// same splitter the solver runs, over a scratch buffer.
pub fn plan_leaves(region: Region, leaf_size: usize) -> Vec<Region> {
    if region.area() == 0 {
        return Vec::new();
    }
    let mut scratch = vec![0.0; region.area()];
    let tile = Tile {
        region,
        rows: scratch.chunks_mut(region.width()).collect(),
    };

    let leaves = Mutex::new(Vec::new());
    split_until_leaves(tile, leaf_size.max(1), Scheduler::Inline, &|piece: Tile<'_>| {
        if piece.region.area() > 0 {
            leaves.lock().push(piece.region);
        }
        true
    });
    leaves.into_inner()
}

/// Fork/join solver over quadrant tiles.
#[derive(Clone, Copy, Debug)]
pub struct ForkJoin {
    leaf_size: usize,
    scheduler: Scheduler,
}

impl Default for ForkJoin {
    fn default() -> Self {
        ForkJoin {
            leaf_size: DEFAULT_LEAF_SIZE,
            scheduler: Scheduler::Rayon,
        }
    }
}

impl ForkJoin {
    pub fn new(leaf_size: usize, scheduler: Scheduler) -> HeatResult<Self> {
        if leaf_size == 0 {
            return Err(HeatError::configuration("leaf size must be at least 1 cell"));
        }
        Ok(ForkJoin { leaf_size, scheduler })
    }

    pub fn leaf_size(&self) -> usize {
        self.leaf_size
    }

    /// Leaves one sweep of a `width` x `height` grid is split into.
    pub fn plan(&self, width: usize, height: usize) -> Vec<Region> {
        plan_leaves(Region::whole(width, height), self.leaf_size)
    }
}

impl Sweep for ForkJoin {
    fn sweep(&self, prev: &Grid, next: &mut [f64], detector: &ConvergenceDetector) -> bool {
        let tile = Tile {
            region: Region::whole(prev.width(), prev.height()),
            rows: next.chunks_mut(prev.width()).collect(),
        };
        split_until_leaves(tile, self.leaf_size, self.scheduler, &|piece: Tile<'_>| relax_leaf(prev, piece, detector))
    }
}

/// Same contract as the sequential `run`, executed on the rayon pool.
pub fn run(grid: Grid, threshold: f64) -> HeatResult<(Grid, usize)> {
    Ok(run_with_observer(grid, threshold, ForkJoin::default(), None, |_, _| {})?.into_parts())
}

pub fn run_with_observer<F>(
    grid: Grid,
    threshold: f64,
    solver: ForkJoin,
    max_iterations: Option<usize>,
    observer: F,
) -> HeatResult<SolveReport>
where
    F: FnMut(usize, Snapshot<'_>),
{
    let detector = ConvergenceDetector::new(threshold)?;
    Ok(relax(&solver, grid, detector, max_iterations, observer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::implementations::single::{self, Sequential};
    use std::collections::HashSet;

    #[test]
    fn leaves_cover_every_cell_once() {
        for (w, h, leaf) in [(80, 60, 20), (7, 13, 4), (1, 2, 1), (33, 1, 5), (64, 64, 1)] {
            let leaves = plan_leaves(Region::whole(w, h), leaf);
            let mut seen = HashSet::new();
            for region in &leaves {
                assert!(region.area() <= leaf);
                for y in region.y0..region.y1 {
                    for x in region.x0..region.x1 {
                        assert!(seen.insert((x, y)), "cell ({}, {}) covered twice", x, y);
                    }
                }
            }
            assert_eq!(seen.len(), w * h);
        }
    }

    #[test]
    fn solver_plan_uses_its_leaf_size() {
        let solver = ForkJoin::default();
        let leaves = solver.plan(80, 60);
        assert_eq!(leaves, plan_leaves(Region::whole(80, 60), DEFAULT_LEAF_SIZE));
        assert!(leaves.iter().all(|r| r.area() >= 1 && r.area() <= solver.leaf_size()));
        assert_eq!(leaves.iter().map(Region::area).sum::<usize>(), 80 * 60);

        let coarse = ForkJoin::new(80 * 60, Scheduler::Inline).unwrap();
        assert_eq!(coarse.plan(80, 60), vec![Region::whole(80, 60)]);
    }

    #[test]
    fn offset_regions_plan_inside_their_bounds() {
        let region = Region { x0: 3, y0: 5, x1: 10, y1: 9 };
        let leaves = plan_leaves(region, 4);
        assert_eq!(leaves.iter().map(Region::area).sum::<usize>(), region.area());
        for leaf in leaves {
            assert!(leaf.x0 >= 3 && leaf.x1 <= 10 && leaf.y0 >= 5 && leaf.y1 <= 9);
        }
    }

    #[test]
    fn thin_regions_still_split() {
        let quads = Region::whole(1, 40).quadrants();
        assert_eq!(quads[0].area(), 0);
        assert_eq!(quads[1], Region { x0: 0, y0: 0, x1: 1, y1: 20 });
        assert_eq!(quads[3], Region { x0: 0, y0: 20, x1: 1, y1: 40 });
    }

    #[test]
    fn one_sweep_equals_sequential_sweep() {
        let grid = Grid::initialize(37, 23, 12, 9).unwrap();
        let detector = ConvergenceDetector::new(0.25).unwrap();

        let mut expected = grid.data().to_vec();
        let expected_stable = Sequential.sweep(&grid, &mut expected, &detector);

        for scheduler in [Scheduler::Rayon, Scheduler::Inline] {
            let solver = ForkJoin::new(5, scheduler).unwrap();
            let mut actual = vec![f64::NAN; grid.data().len()];
            let stable = solver.sweep(&grid, &mut actual, &detector);
            assert_eq!(stable, expected_stable);
            assert_eq!(actual, expected);
        }
    }

    #[test]
    fn full_run_matches_sequential() {
        let grid = Grid::initialize(40, 30, 10, 89211208).unwrap();
        let (seq, seq_iters) = single::run(grid.clone(), 0.25).unwrap();
        let (par, par_iters) = run(grid, 0.25).unwrap();

        assert_eq!(seq_iters, par_iters);
        for (a, b) in seq.data().iter().zip(par.data()) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn inline_scheduler_matches_rayon() {
        let grid = Grid::initialize(19, 11, 4, 5).unwrap();
        let inline = ForkJoin::new(3, Scheduler::Inline).unwrap();
        let pooled = ForkJoin::new(3, Scheduler::Rayon).unwrap();

        let a = run_with_observer(grid.clone(), 0.1, inline, None, |_, _| {}).unwrap();
        let b = run_with_observer(grid, 0.1, pooled, None, |_, _| {}).unwrap();
        assert_eq!(a.iterations, b.iterations);
        assert_eq!(a.grid, b.grid);
    }

    #[test]
    fn zero_leaf_size_is_rejected() {
        assert!(ForkJoin::new(0, Scheduler::Inline).is_err());
    }
}
