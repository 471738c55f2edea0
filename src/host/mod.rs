//! Host harness: read raw BCSR operands, run the kernel once, write C and
//! append the timing to a per-category log.

pub mod args;
pub mod io;
pub mod timer;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::matrix::bcsr::BcsrMatrix;
use args::HarnessArgs;
use half::f16;
use std::path::Path;
use timer::Timer;
use tracing::info;

/// Name of the timer around the kernel launch.
pub const RUN_OP_TIMER: &str = "opRunner.RunOp";

/// Execute one harness invocation.
///
/// `row_ptr` and `col` are `i32`, `values` and `b` are `f16`, and C is
/// written as `f32`. Column entries are element offsets of each block's
/// first column.
pub fn run_harness(args: &HarnessArgs, output_dir: &Path, config: &EngineConfig) -> Result<()> {
    io::ensure_output_dir(output_dir)?;

    let row_ptr = io::indices(&io::read_raw::<i32>(&args.row_ptr)?, "row_ptr")?;
    let col_starts = io::indices(&io::read_raw::<i32>(&args.col)?, "col")?;
    let values = io::read_raw::<f16>(&args.values)?;
    let b = io::read_raw::<f16>(&args.b)?;

    let a = BcsrMatrix::from_element_columns(args.m, args.k, row_ptr, col_starts, values)?;
    info!(
        m = args.m,
        k = args.k,
        n = args.n,
        nnz = args.nnz,
        blocks = a.nnz_blocks(),
        sample = %args.sample_name,
        "operands loaded"
    );

    let timer = Timer::new();
    let mut c = vec![0.0f32; args.m * args.n];
    timer.start(RUN_OP_TIMER);
    crate::bcsr_spmm_into(&a, &b, args.n, &mut c, config)?;
    timer.stop(RUN_OP_TIMER);

    io::write_raw(&args.c, &c)?;

    timer.calculate_and_record_all();
    io::append_log(output_dir, &args.category, &args.sample_name, &timer.timings())?;
    timer.clear();
    info!(output = %args.c.display(), "run op success");
    Ok(())
}
