use std::ops::Range;

use crate::convergence::ConvergenceDetector;
use crate::error::{HeatError, HeatResult};
use crate::grid::neighbor_mean;

/// Contiguous rows `[start, end)` owned by one rank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowRange {
    pub start: usize,
    pub end: usize,
}

impl RowRange {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn cells(&self, width: usize) -> Range<usize> {
        self.start * width..self.end * width
    }
}

/// `height / workers` rows each; the last rank takes the remainder.
pub fn row_ranges(height: usize, workers: usize) -> HeatResult<Vec<RowRange>> {
    if workers == 0 || workers > height {
        return Err(HeatError::configuration(format!(
            "cannot split {} rows across {} workers",
            height, workers
        )));
    }
    let rows_per_worker = height / workers;
    Ok((0..workers)
        .map(|rank| RowRange {
            start: rank * rows_per_worker,
            end: if rank == workers - 1 { height } else { (rank + 1) * rows_per_worker },
        })
        .collect())
}

/// One rank's private slice of the global grid.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalPartition {
    pub rank: usize,
    pub width: usize,
    pub global_height: usize,
    pub rows: RowRange,
    pub data: Vec<f64>,
    pub fixed: Vec<bool>,
}

impl LocalPartition {
    pub fn new(rank: usize, width: usize, global_height: usize, rows: RowRange, data: Vec<f64>, fixed: Vec<bool>) -> HeatResult<Self> {
        if rows.is_empty() || width == 0 || rows.end > global_height {
            return Err(HeatError::configuration(format!(
                "rank {} cannot own rows {}..{} of a {}-wide, {}-tall grid",
                rank, rows.start, rows.end, width, global_height
            )));
        }
        let cells = rows.len() * width;
        if data.len() != cells || fixed.len() != cells {
            return Err(HeatError::communication(
                "scatter",
                rank,
                format!(
                    "partition rows {}..{} need {} cells, received {} temperatures and {} mask entries",
                    rows.start,
                    rows.end,
                    cells,
                    data.len(),
                    fixed.len()
                ),
            ));
        }
        Ok(LocalPartition { rank, width, global_height, rows, data, fixed })
    }

    pub fn first_row(&self) -> &[f64] {
        &self.data[..self.width]
    }

    pub fn last_row(&self) -> &[f64] {
        &self.data[self.data.len() - self.width..]
    }

    /// Fills `next` for the owned rows. Rows outside the partition are read
    /// from the halos, which must be present whenever such a row exists.
    pub fn sweep(
        &self,
        halo_above: Option<&[f64]>,
        halo_below: Option<&[f64]>,
        next: &mut [f64],
        detector: &ConvergenceDetector,
    ) -> HeatResult<bool> {
        let width = self.width;
        let RowRange { start, end } = self.rows;

        let above = match (start > 0, halo_above) {
            (true, Some(row)) if row.len() == width => row,
            (true, _) => return Err(self.missing_halo("above")),
            (false, _) => &[][..],
        };
        let below = match (end < self.global_height, halo_below) {
            (true, Some(row)) if row.len() == width => row,
            (true, _) => return Err(self.missing_halo("below")),
            (false, _) => &[][..],
        };

        let value = |x: usize, y: usize| -> f64 {
            if y < start {
                above[x]
            } else if y >= end {
                below[x]
            } else {
                self.data[(y - start) * width + x]
            }
        };

        let mut stable = true;
        for (local_y, row) in next.chunks_mut(width).enumerate() {
            let y = start + local_y;
            for (x, cell) in row.iter_mut().enumerate() {
                let idx = local_y * width + x;
                let old = self.data[idx];
                if self.fixed[idx] {
                    *cell = old;
                    continue;
                }
                let new = neighbor_mean(x, y, width, self.global_height, &value);
                stable &= detector.is_cell_stable(old, new);
                *cell = new;
            }
        }
        Ok(stable)
    }

    fn missing_halo(&self, side: &str) -> HeatError {
        HeatError::communication("halo exchange", self.rank, format!("no usable halo row {} rows {}..{}", side, self.rows.start, self.rows.end))
    }
}
