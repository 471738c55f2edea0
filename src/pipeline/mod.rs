//! Per-core block-multiply pipeline.
//!
//! Each core walks its row-windows, and for every nonzero block and every
//! N-sub-tile pushes one iteration through six stages:
//!
//! ```text
//!   GM(A) --load_sparse--> A1 --transform_sparse--> A2 --+
//!                                                       multiply --> CO1 --writeback--> GM(C)
//!   GM(B) --load_dense---> B1 --transform_dense---> B2 --+
//! ```
//!
//! Every arrow into a named buffer goes through a single-slot
//! [`queue`]. In [`PipelineMode::Overlapped`] the loads, transforms,
//! multiply and writeback run on their own threads, so iteration `i + 1`
//! can start loading as soon as iteration `i` has vacated the buffer it
//! needs, without waiting for `i`'s writeback.

pub mod queue;
pub mod stages;

use crate::config::{CUBE_M, PipelineMode, tile_len};
use crate::element::Element;
use crate::engine::MatrixEngine;
use crate::error::{Result, SpmmError};
use queue::{QueueConsumer, QueueProducer, stage_queue};
use std::thread;
use tracing::debug;

pub use stages::{CoreContext, Step};

/// What one core did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreStats {
    pub core: usize,
    pub row_windows: usize,
    pub nonzero_blocks: usize,
    /// Multiply-accumulate calls issued.
    pub steps: usize,
}

/// The five staging buffers of one core, each as a producer/consumer pair.
struct StageQueues<T> {
    a1: (QueueProducer<Vec<T>>, QueueConsumer<Vec<T>>),
    a2: (QueueProducer<Vec<T>>, QueueConsumer<Vec<T>>),
    b1: (QueueProducer<Vec<T>>, QueueConsumer<Vec<T>>),
    b2: (QueueProducer<Vec<T>>, QueueConsumer<Vec<T>>),
    co1: (QueueProducer<Vec<f32>>, QueueConsumer<Vec<f32>>),
}

impl<T: Element> StageQueues<T> {
    fn new(staging_width: usize) -> Self {
        let a_len = tile_len::<T>();
        let b_len = crate::config::cube_k::<T>() * staging_width;
        Self {
            a1: stage_queue("A1", vec![T::default(); a_len]),
            a2: stage_queue("A2", vec![T::default(); a_len]),
            b1: stage_queue("B1", vec![T::default(); b_len]),
            b2: stage_queue("B2", vec![T::default(); b_len]),
            co1: stage_queue("CO1", vec![0.0f32; CUBE_M * staging_width]),
        }
    }
}

/// Run every iteration owned by `ctx.slice` to completion.
pub fn run_core<T: Element, E: MatrixEngine>(
    ctx: &CoreContext<'_, T, E>,
    mode: PipelineMode,
) -> Result<CoreStats> {
    let queues = StageQueues::<T>::new(ctx.params.staging_width());
    let stats = CoreStats {
        core: ctx.slice.core,
        row_windows: ctx.slice.row_windows,
        nonzero_blocks: ctx.nonzero_blocks(),
        steps: ctx.nonzero_blocks() * ctx.params.sub_tile_count,
    };
    debug!(
        core = stats.core,
        first_row_window = ctx.slice.first_row_window,
        row_windows = stats.row_windows,
        blocks = stats.nonzero_blocks,
        ?mode,
        "core starting"
    );

    match mode {
        PipelineMode::Sequential => run_sequential(ctx, queues)?,
        PipelineMode::Overlapped => run_overlapped(ctx, queues)?,
    }
    Ok(stats)
}

fn run_sequential<T: Element, E: MatrixEngine>(
    ctx: &CoreContext<'_, T, E>,
    queues: StageQueues<T>,
) -> Result<()> {
    let StageQueues { a1, a2, b1, b2, co1 } = queues;
    for step in ctx.steps() {
        ctx.copy_in_a(&step, &a1.0)?;
        ctx.copy_in_b(&step, &b1.0)?;
        ctx.split_a(&a1.1, &a2.0)?;
        ctx.split_b(&step, &b1.1, &b2.0)?;
        ctx.compute(&step, &a2.1, &b2.1, &co1.0)?;
        ctx.copy_out(&step, &co1.1)?;
    }
    Ok(())
}

fn run_overlapped<T: Element, E: MatrixEngine>(
    ctx: &CoreContext<'_, T, E>,
    queues: StageQueues<T>,
) -> Result<()> {
    let StageQueues {
        a1: (a1_in, a1_out),
        a2: (a2_in, a2_out),
        b1: (b1_in, b1_out),
        b2: (b2_in, b2_out),
        co1: (co1_in, co1_out),
    } = queues;

    let results: Vec<thread::Result<Result<()>>> = thread::scope(|s| {
        let load = s.spawn(move || -> Result<()> {
            for step in ctx.steps() {
                ctx.copy_in_a(&step, &a1_in)?;
                ctx.copy_in_b(&step, &b1_in)?;
            }
            Ok(())
        });
        let transform = s.spawn(move || -> Result<()> {
            for step in ctx.steps() {
                ctx.split_a(&a1_out, &a2_in)?;
                ctx.split_b(&step, &b1_out, &b2_in)?;
            }
            Ok(())
        });
        let multiply = s.spawn(move || -> Result<()> {
            for step in ctx.steps() {
                ctx.compute(&step, &a2_out, &b2_out, &co1_in)?;
            }
            Ok(())
        });
        let writeback = s.spawn(move || -> Result<()> {
            for step in ctx.steps() {
                ctx.copy_out(&step, &co1_out)?;
            }
            Ok(())
        });
        [load, transform, multiply, writeback]
            .into_iter()
            .map(|handle| handle.join())
            .collect()
    });

    // A failing stage drops its queue ends, so its peers report
    // disconnects. Surface the original failure, not the knock-on ones.
    let mut disconnect = None;
    for result in results {
        match result {
            Err(_) => return Err(SpmmError::CorePanicked(ctx.slice.core)),
            Ok(Err(SpmmError::Pipeline(msg))) => {
                disconnect.get_or_insert(SpmmError::Pipeline(msg));
            }
            Ok(Err(e)) => return Err(e),
            Ok(Ok(())) => {}
        }
    }
    disconnect.map_or(Ok(()), Err)
}
