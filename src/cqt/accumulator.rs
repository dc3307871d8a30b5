use crate::error::{CqtError, Result};

/// Outcome of writing one `(frame, bin)` cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellWrite {
    Stored,
    /// The cell already held a value; the new one replaced it.
    Overwritten,
    /// Index outside the announced dimensions; nothing was stored.
    Ignored,
}

/// Upper bound on `frames × bins` for one announced series.
pub const MAX_CELLS: usize = 1 << 28;

/// Collects per-cell results that arrive in any order.
///
/// Storage is a flat `frames × bins` buffer sized once from the announced
/// totals and never grown.
#[derive(Debug)]
pub struct SeriesAccumulator {
    bin_count: usize,
    cells: Vec<Option<f64>>,
    filled_per_frame: Vec<usize>,
    complete_frames: usize,
    ignored: usize,
}

impl SeriesAccumulator {
    /// Fails with `BackendFailure` when the announced dimensions overflow,
    /// exceed `MAX_CELLS`, or cannot be allocated.
    pub fn new(total_frames: usize, bin_count: usize) -> Result<Self> {
        let too_large = || {
            CqtError::BackendFailure(format!(
                "announced {} frames of {} bins exceeds the {} cell limit",
                total_frames, bin_count, MAX_CELLS
            ))
        };
        let len = total_frames
            .checked_mul(bin_count)
            .filter(|&len| len <= MAX_CELLS && total_frames <= MAX_CELLS)
            .ok_or_else(too_large)?;

        let mut cells = Vec::new();
        cells.try_reserve_exact(len).map_err(|e| {
            CqtError::BackendFailure(format!("cannot allocate {} cells: {}", len, e))
        })?;
        cells.resize(len, None);

        let mut filled_per_frame = Vec::new();
        filled_per_frame.try_reserve_exact(total_frames).map_err(|e| {
            CqtError::BackendFailure(format!("cannot allocate {} frames: {}", total_frames, e))
        })?;
        filled_per_frame.resize(total_frames, 0);

        Ok(Self {
            bin_count,
            cells,
            filled_per_frame,
            complete_frames: 0,
            ignored: 0,
        })
    }

    pub fn total_frames(&self) -> usize {
        self.filled_per_frame.len()
    }

    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    pub fn complete_frames(&self) -> usize {
        self.complete_frames
    }

    /// Writes that fell outside the announced dimensions.
    pub fn ignored(&self) -> usize {
        self.ignored
    }

    pub fn record(&mut self, frame: usize, bin: usize, value: f64) -> CellWrite {
        if frame >= self.total_frames() || bin >= self.bin_count {
            self.ignored += 1;
            return CellWrite::Ignored;
        }
        let cell = &mut self.cells[frame * self.bin_count + bin];
        if cell.replace(value).is_some() {
            return CellWrite::Overwritten;
        }
        self.filled_per_frame[frame] += 1;
        if self.filled_per_frame[frame] == self.bin_count {
            self.complete_frames += 1;
        }
        CellWrite::Stored
    }

    /// Records whole frames starting at `first_frame`; `values` is row-major
    /// with `bin_count` values per frame.
    pub fn record_block(&mut self, first_frame: usize, values: &[f64]) {
        if self.bin_count == 0 {
            return;
        }
        for (offset, row) in values.chunks(self.bin_count).enumerate() {
            let Some(frame) = first_frame.checked_add(offset) else {
                self.ignored += values.len() - offset * self.bin_count;
                return;
            };
            for (bin, &value) in row.iter().enumerate() {
                self.record(frame, bin, value);
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete_frames == self.total_frames()
    }

    /// Fraction of announced frames fully received, in `[0, 1]`.
    pub fn completion(&self) -> f64 {
        if self.total_frames() == 0 {
            1.0
        } else {
            self.complete_frames as f64 / self.total_frames() as f64
        }
    }

    /// Hands back the frames once every cell has been written.
    pub fn into_frames(self) -> Result<Vec<Vec<f64>>> {
        if !self.is_complete() {
            return Err(CqtError::BackendFailure(format!(
                "only {} of {} frames received",
                self.complete_frames,
                self.total_frames()
            )));
        }
        if self.bin_count == 0 {
            return Ok(vec![Vec::new(); self.total_frames()]);
        }
        Ok(self
            .cells
            .chunks(self.bin_count)
            .map(|row| row.iter().map(|c| c.unwrap_or_default()).collect())
            .collect())
    }
}
