//! Fan the plan out over cores.

use crate::config::PipelineMode;
use crate::element::Element;
use crate::engine::{AtomicOutput, MatrixEngine};
use crate::error::{Result, SpmmError};
use crate::matrix::bcsr::BcsrMatrix;
use crate::pipeline::{CoreContext, CoreStats, run_core};
use crate::tiling::TilingParams;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use tracing::debug;

/// Per-core statistics of one launch, in core order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchReport {
    pub cores: Vec<CoreStats>,
}

impl LaunchReport {
    /// Multiply-accumulate calls issued across all cores.
    pub fn total_steps(&self) -> usize {
        self.cores.iter().map(|c| c.steps).sum()
    }

    /// Nonzero blocks processed across all cores.
    pub fn total_blocks(&self) -> usize {
        self.cores.iter().map(|c| c.nonzero_blocks).sum()
    }
}

/// Run every active core of `params` against `out`.
///
/// With no active cores this returns an empty report without touching
/// `out`. A single core runs on the calling thread. Otherwise each core
/// gets a scoped thread; a panicking core fails the whole launch with
/// [`SpmmError::CorePanicked`].
pub fn launch<T: Element, E: MatrixEngine>(
    engine: &E,
    params: &TilingParams,
    a: &BcsrMatrix<T>,
    b: &[T],
    out: &AtomicOutput,
    mode: PipelineMode,
) -> Result<LaunchReport> {
    let context = |core: usize| CoreContext {
        engine,
        params,
        slice: params.core_slice(core),
        a,
        b,
        out,
    };

    match params.active_cores {
        0 => return Ok(LaunchReport::default()),
        1 => {
            let ctx = context(0);
            let stats = panic::catch_unwind(AssertUnwindSafe(|| run_core(&ctx, mode)))
                .map_err(|_| SpmmError::CorePanicked(0))??;
            return Ok(LaunchReport { cores: vec![stats] });
        }
        _ => {}
    }

    let results: Vec<(usize, thread::Result<Result<CoreStats>>)> = thread::scope(|s| {
        let handles: Vec<_> = (0..params.active_cores)
            .map(|core| {
                let ctx = context(core);
                (core, s.spawn(move || run_core(&ctx, mode)))
            })
            .collect();

        handles
            .into_iter()
            .map(|(core, handle)| (core, handle.join()))
            .collect()
    });

    let mut cores = Vec::with_capacity(results.len());
    for (core, result) in results {
        match result {
            Ok(stats) => cores.push(stats?),
            Err(_) => return Err(SpmmError::CorePanicked(core)),
        }
    }

    let report = LaunchReport { cores };
    debug!(
        cores = report.cores.len(),
        steps = report.total_steps(),
        "launch finished"
    );
    Ok(report)
}
