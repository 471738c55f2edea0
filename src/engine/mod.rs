//! The block engine's fixed-function operations.
//!
//! A tile-constrained multiply engine exposes a handful of intrinsics:
//! a blocked load that re-lays data on the way in, a staging move, a
//! fractal transpose, the multiply-accumulate itself, and an atomic
//! accumulate-store back to global memory. [`MatrixEngine`] names those
//! operations so the pipeline is written once against them;
//! [`PortableEngine`] implements them with plain buffer copies, an
//! in-memory transpose, a scalar tiled inner product and CAS adds.

pub mod output;
pub mod portable;

use crate::element::Element;
use crate::kernels::block_mma::MmaShape;
use crate::layout::{FractalShape, TransposeMode};

pub use output::AtomicOutput;
pub use portable::PortableEngine;

/// Destination rectangle of a writeback in C.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputRegion {
    pub row: usize,
    pub col: usize,
    pub rows: usize,
    pub cols: usize,
}

/// Engine intrinsics used by the per-core pipeline.
///
/// Implementations must be shareable across cores; each core drives the
/// engine with its own buffers.
pub trait MatrixEngine: Sync {
    /// Fetch a `rows × cols` region starting at `src[0]` with row stride
    /// `src_stride`, converting it to Nz with `shape` fractals. Columns
    /// past `cols` are zero-padded to a whole fractal.
    fn load_blocked<T: Element>(
        &self,
        src: &[T],
        src_stride: usize,
        rows: usize,
        cols: usize,
        shape: FractalShape,
        dst: &mut [T],
    );

    /// Move an Nz operand into the Zz layout the left operand port reads.
    fn relayout<T: Element>(
        &self,
        src: &[T],
        rows: usize,
        cols: usize,
        shape: FractalShape,
        dst: &mut [T],
    );

    /// Transpose `count` consecutive fractals (Nz to Zn).
    fn transpose<T: Element>(
        &self,
        src: &[T],
        shape: FractalShape,
        count: usize,
        mode: TransposeMode,
        dst: &mut [T],
    );

    /// `acc += a × b` for one fixed-shape tile. See
    /// [`block_mma`](crate::kernels::block_mma::block_mma) for layouts.
    fn multiply_accumulate<T: Element>(
        &self,
        a: &[T],
        a_frac: FractalShape,
        b: &[T],
        b_frac: FractalShape,
        acc: &mut [f32],
        shape: MmaShape,
    );

    /// Add the Nz accumulator tile (`acc_rows` rows) into `region` of
    /// `dst`, one atomic add per element.
    fn atomic_accumulate_store(
        &self,
        acc: &[f32],
        acc_rows: usize,
        dst: &AtomicOutput,
        region: OutputRegion,
    );
}
