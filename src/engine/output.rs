//! Shared output matrix with atomic accumulation.

use std::sync::atomic::{AtomicU32, Ordering};

/// Row-major `f32` matrix whose cells can be added to from many threads.
///
/// Cells hold `f32` bit patterns; [`AtomicOutput::add`] is a
/// compare-and-swap loop, so concurrent contributions to the same cell are
/// never lost. The order in which contributions land is unspecified.
pub struct AtomicOutput {
    rows: usize,
    cols: usize,
    cells: Vec<AtomicU32>,
}

impl AtomicOutput {
    /// All-zero `rows × cols` output.
    pub fn zeroed(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: (0..rows * cols).map(|_| AtomicU32::new(0.0f32.to_bits())).collect(),
        }
    }

    /// Start from existing values; the kernel then accumulates on top.
    pub fn from_values(values: &[f32], rows: usize, cols: usize) -> Self {
        assert_eq!(values.len(), rows * cols, "C: expected {}x{}={} elements", rows, cols, rows * cols);
        Self {
            rows,
            cols,
            cells: values.iter().map(|v| AtomicU32::new(v.to_bits())).collect(),
        }
    }

    /// Rows of C.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Columns of C.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Atomically add `value` to cell `(row, col)`.
    #[inline]
    pub fn add(&self, row: usize, col: usize, value: f32) {
        let cell = &self.cells[row * self.cols + col];
        // The closure never returns None, so this cannot fail.
        let _ = cell.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
            Some((f32::from_bits(bits) + value).to_bits())
        });
    }

    /// Current value of cell `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> f32 {
        f32::from_bits(self.cells[row * self.cols + col].load(Ordering::Relaxed))
    }

    /// Copy the current values out. Only meaningful once every writer has
    /// finished.
    pub fn copy_into(&self, dst: &mut [f32]) {
        for (d, cell) in dst.iter_mut().zip(&self.cells) {
            *d = f32::from_bits(cell.load(Ordering::Relaxed));
        }
    }

    /// Consume the output into a row-major `Vec`.
    pub fn into_vec(self) -> Vec<f32> {
        self.cells
            .into_iter()
            .map(|cell| f32::from_bits(cell.into_inner()))
            .collect()
    }
}
