//! The six stages of one (block, sub-tile) iteration.
//!
//! Buffers move between stages only through the core's stage queues, so
//! the same stage functions serve both the sequential and the overlapped
//! schedule.

use super::queue::{QueueConsumer, QueueProducer};
use crate::config::{CUBE_M, FRACTAL_N, cube_k};
use crate::element::Element;
use crate::engine::{AtomicOutput, MatrixEngine, OutputRegion};
use crate::error::Result;
use crate::kernels::block_mma::MmaShape;
use crate::layout::{FractalShape, TransposeMode};
use crate::matrix::bcsr::BcsrMatrix;
use crate::tiling::{CoreSlice, SubTile, TilingParams};

/// One (row-window, nonzero block, N-sub-tile) iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub row_window: usize,
    /// Global index of the nonzero block.
    pub block: usize,
    /// Block column of the block, i.e. which `CUBE_K` rows of B it needs.
    pub block_col: usize,
    pub sub_tile: SubTile,
}

/// Everything one core reads: its slice of the plan plus shared operands.
pub struct CoreContext<'a, T, E> {
    pub engine: &'a E,
    pub params: &'a TilingParams,
    pub slice: CoreSlice,
    pub a: &'a BcsrMatrix<T>,
    pub b: &'a [T],
    pub out: &'a AtomicOutput,
}

impl<'a, T: Element, E: MatrixEngine> CoreContext<'a, T, E> {
    /// Iterations of this core in program order.
    pub fn steps(&self) -> impl Iterator<Item = Step> + 'a {
        let a = self.a;
        let params = self.params;
        self.slice.range().flat_map(move |row_window| {
            a.block_range(row_window).flat_map(move |block| {
                let block_col = a.col_idx()[block];
                params.sub_tiles().map(move |sub_tile| Step {
                    row_window,
                    block,
                    block_col,
                    sub_tile,
                })
            })
        })
    }

    /// Nonzero blocks in this core's row-windows.
    pub fn nonzero_blocks(&self) -> usize {
        let range = self.slice.range();
        self.a.row_ptr()[range.end] - self.a.row_ptr()[range.start]
    }

    /// LOAD_SPARSE: fetch block `step.block` of A into A1 (Nz).
    ///
    /// The tile is fetched again for every sub-tile; A1 only ever holds one.
    pub fn copy_in_a(&self, step: &Step, a1: &QueueProducer<Vec<T>>) -> Result<()> {
        let ck = cube_k::<T>();
        let mut a1_local = a1.alloc()?;
        self.engine.load_blocked(
            self.a.tile(step.block),
            ck,
            CUBE_M,
            ck,
            FractalShape::sparse::<T>(),
            &mut a1_local,
        );
        a1.enque(a1_local)
    }

    /// LOAD_DENSE: fetch the `CUBE_K × width` region of B at
    /// `(block_col * CUBE_K, sub_tile.offset)` into B1 (Nz, zero-padded to
    /// whole fractals).
    pub fn copy_in_b(&self, step: &Step, b1: &QueueProducer<Vec<T>>) -> Result<()> {
        let ck = cube_k::<T>();
        let n = self.params.n;
        let tile = step.sub_tile;
        let offset = step.block_col * ck * n + tile.offset;
        let len = ck * tile.block_count * FRACTAL_N;

        let mut b1_local = b1.alloc()?;
        self.engine.load_blocked(
            &self.b[offset..],
            n,
            ck,
            tile.width,
            FractalShape::dense::<T>(),
            &mut b1_local[..len],
        );
        b1.enque(b1_local)
    }

    /// TRANSFORM_SPARSE: move A1 to A2 in the left operand's Zz layout.
    pub fn split_a(&self, a1: &QueueConsumer<Vec<T>>, a2: &QueueProducer<Vec<T>>) -> Result<()> {
        let a1_local = a1.deque()?;
        let mut a2_local = a2.alloc()?;
        self.engine.relayout(
            &a1_local,
            CUBE_M,
            cube_k::<T>(),
            FractalShape::sparse::<T>(),
            &mut a2_local,
        );
        a2.enque(a2_local)?;
        a1.free(a1_local)
    }

    /// TRANSFORM_DENSE: transpose the sub-tile's fractals from B1 into B2.
    pub fn split_b(
        &self,
        step: &Step,
        b1: &QueueConsumer<Vec<T>>,
        b2: &QueueProducer<Vec<T>>,
    ) -> Result<()> {
        let b1_local = b1.deque()?;
        let mut b2_local = b2.alloc()?;
        self.engine.transpose(
            &b1_local,
            FractalShape::dense::<T>(),
            step.sub_tile.block_count,
            TransposeMode::for_element::<T>(),
            &mut b2_local,
        );
        b1.free(b1_local)?;
        b2.enque(b2_local)
    }

    /// MULTIPLY: one `CUBE_M × CUBE_K × width` multiply into a fresh CO1
    /// tile.
    pub fn compute(
        &self,
        step: &Step,
        a2: &QueueConsumer<Vec<T>>,
        b2: &QueueConsumer<Vec<T>>,
        co1: &QueueProducer<Vec<f32>>,
    ) -> Result<()> {
        let a2_local = a2.deque()?;
        let b2_local = b2.deque()?;
        let mut co1_local = co1.alloc()?;

        let tile = step.sub_tile;
        co1_local[..CUBE_M * tile.block_count * FRACTAL_N].fill(0.0);
        self.engine.multiply_accumulate(
            &a2_local,
            FractalShape::sparse::<T>(),
            &b2_local,
            FractalShape::dense::<T>(),
            &mut co1_local,
            MmaShape {
                m: CUBE_M,
                k: cube_k::<T>(),
                n: tile.width,
            },
        );

        co1.enque(co1_local)?;
        a2.free(a2_local)?;
        b2.free(b2_local)
    }

    /// WRITEBACK: atomically add CO1 into C at the row-window's rows and
    /// the sub-tile's columns, clipped to M.
    pub fn copy_out(&self, step: &Step, co1: &QueueConsumer<Vec<f32>>) -> Result<()> {
        let co1_local = co1.deque()?;
        let region = OutputRegion {
            row: step.row_window * CUBE_M,
            col: step.sub_tile.offset,
            rows: self.a.window_rows(step.row_window),
            cols: step.sub_tile.width,
        };
        self.engine
            .atomic_accumulate_store(&co1_local, CUBE_M, self.out, region);
        co1.free(co1_local)
    }
}
