//! Engine-native fractal layouts.
//!
//! The multiply engine never sees row-major data. Operands are cut into
//! small fixed-size fractals (row-major inside), and the order of the
//! fractals themselves depends on the operand:
//!
//! - **Nd**: plain row-major, how A, B and C live in global memory.
//! - **Nz**: fractals in column-block-major order. Column block `cb` holds
//!   every row of the matrix for `shape.cols` columns, contiguous.
//! - **Zz**: fractals in row-block-major order. The left operand's layout.
//! - **Zn**: every fractal transposed, in column-block order. The
//!   stationary (right) operand's layout; each output column becomes one
//!   contiguous run along K.
//!
//! All conversions are parameterized by [`FractalShape`] so they can be
//! tested without a particular engine in mind.

use crate::config::{CUBE_M, FRACTAL_N, cube_k};
use crate::element::Element;
use crate::matrix::transpose::{transpose, transpose_square};

/// Dimensions of one fractal, in elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FractalShape {
    pub rows: usize,
    pub cols: usize,
}

impl FractalShape {
    /// Fractal of `rows × cols` elements.
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Elements in one fractal.
    pub const fn len(&self) -> usize {
        self.rows * self.cols
    }

    /// True for a degenerate zero-sized fractal.
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Left operand fractal: `CUBE_M × CUBE_K`.
    pub fn sparse<T: Element>() -> Self {
        Self::new(CUBE_M, cube_k::<T>())
    }

    /// Right operand fractal as loaded: `CUBE_K` rows of K by
    /// `FRACTAL_N` columns of N.
    pub fn dense<T: Element>() -> Self {
        Self::new(cube_k::<T>(), FRACTAL_N)
    }

    /// Accumulator fractal: `CUBE_M × FRACTAL_N` in `f32`.
    pub const fn accumulator() -> Self {
        Self::new(CUBE_M, FRACTAL_N)
    }
}

/// Granularity of the fractal transpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransposeMode {
    /// Narrow elements: one dense fractal is transposed as a whole.
    Dense,
    /// Wide elements: a fractal is transposed as consecutive squares, each
    /// written one square-height further into the destination.
    Gapped,
}

impl TransposeMode {
    /// Dense for elements of two bytes or fewer, gapped otherwise.
    pub fn for_element<T: Element>() -> Self {
        if T::bytes() <= 2 { Self::Dense } else { Self::Gapped }
    }
}

/// Offset of `(r, c)` in an Nz matrix with `rows` rows.
#[inline]
pub fn nz_offset(shape: FractalShape, rows: usize, r: usize, c: usize) -> usize {
    ((c / shape.cols) * rows + r) * shape.cols + c % shape.cols
}

/// Offset of `(r, c)` in a Zz matrix with `cols` columns.
#[inline]
pub fn zz_offset(shape: FractalShape, cols: usize, r: usize, c: usize) -> usize {
    let col_blocks = cols / shape.cols;
    (((r / shape.rows) * col_blocks + c / shape.cols) * shape.rows + r % shape.rows) * shape.cols
        + c % shape.cols
}

/// Offset of logical `(r, c)` after a Zn transpose of an Nz matrix whose
/// fractals are `shape`.
#[inline]
pub fn zn_offset(shape: FractalShape, r: usize, c: usize) -> usize {
    (c / shape.cols) * shape.len() + (c % shape.cols) * shape.rows + r
}

/// Copy a strided row-major region into Nz order.
///
/// Columns are padded with `T::default()` up to a whole number of
/// fractals, so the destination must hold
/// `rows * cols.div_ceil(shape.cols) * shape.cols` elements.
pub fn nd_to_nz<T: Copy + Default>(
    src: &[T],
    src_stride: usize,
    rows: usize,
    cols: usize,
    shape: FractalShape,
    dst: &mut [T],
) {
    for cb in 0..cols.div_ceil(shape.cols) {
        let c0 = cb * shape.cols;
        let take = shape.cols.min(cols - c0);
        for r in 0..rows {
            let d = (cb * rows + r) * shape.cols;
            let s = r * src_stride + c0;
            dst[d..d + take].copy_from_slice(&src[s..s + take]);
            dst[d + take..d + shape.cols].fill(T::default());
        }
    }
}

/// Reorder an Nz matrix into Zz. Values are untouched.
///
/// `rows` and `cols` must be whole multiples of the fractal shape.
pub fn nz_to_zz<T: Copy>(src: &[T], rows: usize, cols: usize, shape: FractalShape, dst: &mut [T]) {
    debug_assert!(rows % shape.rows == 0 && cols % shape.cols == 0);
    for r in 0..rows {
        for c0 in (0..cols).step_by(shape.cols) {
            let s = nz_offset(shape, rows, r, c0);
            let d = zz_offset(shape, cols, r, c0);
            dst[d..d + shape.cols].copy_from_slice(&src[s..s + shape.cols]);
        }
    }
}

/// Transpose `count` consecutive fractals in place order (Nz to Zn).
///
/// Fractal `f` of `src` is `shape.rows × shape.cols`; fractal `f` of `dst`
/// is its transpose, `shape.cols × shape.rows`. In gapped mode the longer
/// side must be a multiple of the shorter one.
pub fn transpose_fractals<T: Copy>(
    src: &[T],
    shape: FractalShape,
    count: usize,
    mode: TransposeMode,
    dst: &mut [T],
) {
    let len = shape.len();
    for f in 0..count {
        let s = &src[f * len..(f + 1) * len];
        let d = &mut dst[f * len..(f + 1) * len];
        match mode {
            TransposeMode::Dense => transpose(s, d, shape.rows, shape.cols),
            TransposeMode::Gapped => {
                let side = shape.rows.min(shape.cols);
                debug_assert!(shape.rows.max(shape.cols) % side == 0);
                if shape.rows <= shape.cols {
                    for sq in 0..shape.cols / side {
                        let src_at = sq * side;
                        let dst_at = sq * side * shape.rows;
                        transpose_square(&s[src_at..], shape.cols, &mut d[dst_at..], shape.rows, side);
                    }
                } else {
                    for sq in 0..shape.rows / side {
                        let src_at = sq * side * shape.cols;
                        let dst_at = sq * side;
                        transpose_square(&s[src_at..], shape.cols, &mut d[dst_at..], shape.rows, side);
                    }
                }
            }
        }
    }
}
