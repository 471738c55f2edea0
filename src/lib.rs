//! Block-sparse times dense matrix multiplication, C = A·B.
//!
//! I built this to understand how a sparse kernel is scheduled onto a
//! tile-constrained matrix engine: the kind with many small cores, each
//! driving a fixed-shape multiply-accumulate unit that only accepts
//! operands in its own fractal layouts. A is stored in BCSR (dense
//! `16 × CUBE_K` blocks grouped into row-windows), B and C are dense.
//!
//! It comes down to two pieces:
//! - a host-side planner that splits the row-windows across cores and cuts
//!   N into engine-sized sub-tiles ([`tiling`])
//! - a per-core pipeline that loads, re-lays, multiplies and atomically
//!   accumulates one block at a time ([`pipeline`])
//!
//! The engine itself is a trait ([`MatrixEngine`]); [`PortableEngine`]
//! runs it on ordinary CPU threads.
//!
//! ## Usage
//!
//! ```
//! use bcsr_spmm::{BcsrMatrix, EngineConfig, bcsr_spmm};
//! use half::f16;
//!
//! // 16×16 A with a single identity block.
//! let mut tile = vec![f16::ZERO; 16 * 16];
//! for i in 0..16 {
//!     tile[i * 16 + i] = f16::ONE;
//! }
//! let a = BcsrMatrix::new(16, 16, vec![0, 1], vec![0], tile).unwrap();
//! let b = vec![f16::from_f32(2.0); 16 * 8];
//!
//! let c = bcsr_spmm(&a, &b, 8, &EngineConfig::default()).unwrap();
//! assert!(c.iter().all(|&v| v == 2.0));
//! ```
//!
//! ## What's inside
//!
//! - `f16`, `bf16` and `f32` elements, always accumulated in `f32`
//! - Nz / Zz / Zn fractal layouts and the transposes between them
//! - Single-slot stage queues, run sequentially or overlapped
//! - A host harness that reads raw operand files and logs timings

pub mod config;
pub mod element;
pub mod engine;
pub mod error;
pub mod host;
pub mod kernels;
pub mod layout;
pub mod matrix;
pub mod pipeline;
pub mod threaded;
pub mod tiling;

pub use config::{EngineConfig, PipelineMode};
pub use element::Element;
pub use engine::{AtomicOutput, MatrixEngine, PortableEngine};
pub use error::{Result, SpmmError};
pub use matrix::bcsr::BcsrMatrix;
pub use threaded::LaunchReport;
pub use tiling::{TilingInput, TilingParams, infer_output_shape, plan_tiling};

/// Sparse-dense multiply: returns C = A·B as a fresh `M × N` matrix.
///
/// B is `K × N` row-major.
pub fn bcsr_spmm<T: Element>(
    a: &BcsrMatrix<T>,
    b: &[T],
    n: usize,
    config: &EngineConfig,
) -> Result<Vec<f32>> {
    let mut c = vec![0.0f32; a.m() * n];
    bcsr_spmm_into(a, b, n, &mut c, config)?;
    Ok(c)
}

/// Sparse-dense multiply: C += A·B.
///
/// C is `M × N` row-major and is accumulated into, so pass zeros for a
/// plain product.
pub fn bcsr_spmm_into<T: Element>(
    a: &BcsrMatrix<T>,
    b: &[T],
    n: usize,
    c: &mut [f32],
    config: &EngineConfig,
) -> Result<()> {
    bcsr_spmm_with_engine(&PortableEngine, a, b, n, c, config).map(|_| ())
}

/// [`bcsr_spmm_into`] on a caller-supplied engine, returning what each
/// core did.
pub fn bcsr_spmm_with_engine<T: Element, E: MatrixEngine>(
    engine: &E,
    a: &BcsrMatrix<T>,
    b: &[T],
    n: usize,
    c: &mut [f32],
    config: &EngineConfig,
) -> Result<LaunchReport> {
    check_len("B", a.k() * n, b.len())?;
    check_len("C", a.m() * n, c.len())?;

    let params = plan_tiling(&TilingInput::for_operands(a, n), config)?;
    let out = AtomicOutput::from_values(c, a.m(), n);
    let report = threaded::launch(engine, &params, a, b, &out, config.pipeline)?;
    out.copy_into(c);
    Ok(report)
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(SpmmError::ShapeMismatch {
            what,
            expected,
            actual,
        })
    }
}
