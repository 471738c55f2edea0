//! SpMM benchmarks: sequential vs overlapped stages, and core scaling.

use bcsr_spmm::config::tile_len;
use bcsr_spmm::{BcsrMatrix, EngineConfig, PipelineMode, bcsr_spmm};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use half::f16;

const SIZES: &[usize] = &[256, 512];
const N: usize = 256;

/// Banded block pattern: row-window `w` holds blocks at columns
/// `w - 1 ..= w + 1` where they exist.
fn banded(size: usize) -> BcsrMatrix<f16> {
    let windows = size / 16;
    let block_cols = size / 16;
    let mut row_ptr = vec![0];
    let mut col_idx = Vec::new();
    for w in 0..windows {
        for c in w.saturating_sub(1)..(w + 2).min(block_cols) {
            col_idx.push(c);
        }
        row_ptr.push(col_idx.len());
    }
    let values = (0..col_idx.len() * tile_len::<f16>())
        .map(|i| f16::from_f32((i % 100) as f32 / 100.0))
        .collect();
    BcsrMatrix::new(size, size, row_ptr, col_idx, values).expect("valid banded matrix")
}

fn dense_b(k: usize) -> Vec<f16> {
    (0..k * N).map(|i| f16::from_f32((i % 100) as f32 / 100.0)).collect()
}

fn bench_pipeline_modes(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_mode");
    for &size in SIZES {
        let a = banded(size);
        let b = dense_b(size);
        group.throughput(Throughput::Elements((a.nnz_blocks() * tile_len::<f16>() * N) as u64));

        for mode in [PipelineMode::Sequential, PipelineMode::Overlapped] {
            let config = EngineConfig::single_core().with_pipeline(mode);
            group.bench_with_input(BenchmarkId::new(format!("{mode:?}"), size), &size, |bench, _| {
                bench.iter(|| bcsr_spmm(black_box(&a), black_box(&b), N, &config).unwrap());
            });
        }
    }
    group.finish();
}

fn bench_core_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("core_count");
    let size = 512;
    let a = banded(size);
    let b = dense_b(size);

    for cores in [1, 2, 4, 8] {
        let config = EngineConfig::default().with_core_count(cores);
        group.bench_with_input(BenchmarkId::from_parameter(cores), &cores, |bench, _| {
            bench.iter(|| bcsr_spmm(black_box(&a), black_box(&b), N, &config).unwrap());
        });
    }
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_pipeline_modes, bench_core_scaling
);
criterion_main!(benches);
