//! Software implementation of the engine intrinsics.

use super::{AtomicOutput, MatrixEngine, OutputRegion};
use crate::element::Element;
use crate::kernels::block_mma::{MmaShape, block_mma};
use crate::layout::{self, FractalShape, TransposeMode, nz_offset};

/// Runs every intrinsic on the calling thread with ordinary memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct PortableEngine;

impl MatrixEngine for PortableEngine {
    fn load_blocked<T: Element>(
        &self,
        src: &[T],
        src_stride: usize,
        rows: usize,
        cols: usize,
        shape: FractalShape,
        dst: &mut [T],
    ) {
        layout::nd_to_nz(src, src_stride, rows, cols, shape, dst);
    }

    fn relayout<T: Element>(
        &self,
        src: &[T],
        rows: usize,
        cols: usize,
        shape: FractalShape,
        dst: &mut [T],
    ) {
        layout::nz_to_zz(src, rows, cols, shape, dst);
    }

    fn transpose<T: Element>(
        &self,
        src: &[T],
        shape: FractalShape,
        count: usize,
        mode: TransposeMode,
        dst: &mut [T],
    ) {
        layout::transpose_fractals(src, shape, count, mode, dst);
    }

    fn multiply_accumulate<T: Element>(
        &self,
        a: &[T],
        a_frac: FractalShape,
        b: &[T],
        b_frac: FractalShape,
        acc: &mut [f32],
        shape: MmaShape,
    ) {
        block_mma(a, a_frac, b, b_frac, acc, shape);
    }

    fn atomic_accumulate_store(
        &self,
        acc: &[f32],
        acc_rows: usize,
        dst: &AtomicOutput,
        region: OutputRegion,
    ) {
        let c_frac = FractalShape::accumulator();
        for r in 0..region.rows {
            for c in 0..region.cols {
                let v = acc[nz_offset(c_frac, acc_rows, r, c)];
                dst.add(region.row + r, region.col + c, v);
            }
        }
    }
}
