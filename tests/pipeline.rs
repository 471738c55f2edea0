//! Drives the pipeline through instrumented engines: one records every
//! intrinsic call before delegating to the portable one, one faults.

use bcsr_spmm::config::tile_len;
use bcsr_spmm::engine::OutputRegion;
use bcsr_spmm::kernels::block_mma::MmaShape;
use bcsr_spmm::layout::{FractalShape, TransposeMode};
use bcsr_spmm::{
    AtomicOutput, BcsrMatrix, Element, EngineConfig, MatrixEngine, PipelineMode, PortableEngine,
    SpmmError, bcsr_spmm_with_engine,
};
use half::f16;
use parking_lot::Mutex;

#[derive(Default)]
struct RecordingEngine {
    mma: Mutex<Vec<MmaShape>>,
    transposes: Mutex<Vec<(usize, TransposeMode)>>,
    stores: Mutex<Vec<OutputRegion>>,
}

impl MatrixEngine for RecordingEngine {
    fn load_blocked<T: Element>(
        &self,
        src: &[T],
        src_stride: usize,
        rows: usize,
        cols: usize,
        shape: FractalShape,
        dst: &mut [T],
    ) {
        PortableEngine.load_blocked(src, src_stride, rows, cols, shape, dst);
    }

    fn relayout<T: Element>(&self, src: &[T], rows: usize, cols: usize, shape: FractalShape, dst: &mut [T]) {
        PortableEngine.relayout(src, rows, cols, shape, dst);
    }

    fn transpose<T: Element>(
        &self,
        src: &[T],
        shape: FractalShape,
        count: usize,
        mode: TransposeMode,
        dst: &mut [T],
    ) {
        self.transposes.lock().push((count, mode));
        PortableEngine.transpose(src, shape, count, mode, dst);
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
        self.mma.lock().push(shape);
        PortableEngine.multiply_accumulate(a, a_frac, b, b_frac, acc, shape);
    }

    fn atomic_accumulate_store(&self, acc: &[f32], acc_rows: usize, dst: &AtomicOutput, region: OutputRegion) {
        self.stores.lock().push(region);
        PortableEngine.atomic_accumulate_store(acc, acc_rows, dst, region);
    }
}

fn single_block(m: usize, k: usize) -> BcsrMatrix<f16> {
    let values = (0..tile_len::<f16>()).map(|i| f16::from_f32((i % 3) as f32)).collect();
    BcsrMatrix::new(m, k, vec![0, 1], vec![0], values).unwrap()
}

#[test]
fn test_boundary_sub_tiles_reach_engine() {
    // M = 16, K = 32, N = 48, max engine N = 32: two multiplies of width
    // 32 and 16, written back at columns 0 and 32.
    for mode in [PipelineMode::Sequential, PipelineMode::Overlapped] {
        let engine = RecordingEngine::default();
        let a = single_block(16, 32);
        let b = vec![f16::ONE; 32 * 48];
        let mut c = vec![0.0f32; 16 * 48];
        let config = EngineConfig::single_core().with_max_engine_n(32).with_pipeline(mode);

        let report = bcsr_spmm_with_engine(&engine, &a, &b, 48, &mut c, &config).unwrap();
        assert_eq!(report.total_steps(), 2);

        let mma = engine.mma.lock();
        let widths: Vec<_> = mma.iter().map(|s| s.n).collect();
        assert_eq!(widths, vec![32, 16]);
        assert_eq!(widths.iter().sum::<usize>(), 48);
        assert!(mma.iter().all(|s| s.m == 16 && s.k == 16));

        let stores = engine.stores.lock();
        let cols: Vec<_> = stores.iter().map(|r| (r.col, r.cols)).collect();
        assert_eq!(cols, vec![(0, 32), (32, 16)]);
        assert!(stores.iter().all(|r| r.row == 0 && r.rows == 16));

        assert_eq!(*engine.transposes.lock(), vec![(2, TransposeMode::Dense), (1, TransposeMode::Dense)]);
    }
}

#[test]
fn test_block_reloaded_per_sub_tile() {
    let engine = RecordingEngine::default();
    let a = single_block(16, 32);
    let n = 100;
    let b = vec![f16::ONE; 32 * n];
    let mut c = vec![0.0f32; 16 * n];
    let config = EngineConfig::single_core().with_max_engine_n(16);

    bcsr_spmm_with_engine(&engine, &a, &b, n, &mut c, &config).unwrap();
    assert_eq!(engine.mma.lock().len(), 7);
    assert_eq!(engine.stores.lock().last().map(|r| (r.col, r.cols)), Some((96, 4)));
}

#[test]
fn test_partial_window_store_is_clipped() {
    let engine = RecordingEngine::default();
    let a = single_block(10, 16);
    let b = vec![f16::ONE; 16 * 16];
    let mut c = vec![0.0f32; 10 * 16];

    bcsr_spmm_with_engine(&engine, &a, &b, 16, &mut c, &EngineConfig::single_core()).unwrap();
    assert_eq!(engine.stores.lock()[0].rows, 10);
}

#[test]
fn test_f32_uses_gapped_transpose() {
    let engine = RecordingEngine::default();
    let values = vec![1.0f32; tile_len::<f32>()];
    let a = BcsrMatrix::new(16, 8, vec![0, 1], vec![0], values).unwrap();
    let b = vec![1.0f32; 8 * 16];
    let mut c = vec![0.0f32; 16 * 16];

    bcsr_spmm_with_engine(&engine, &a, &b, 16, &mut c, &EngineConfig::single_core()).unwrap();
    assert_eq!(*engine.transposes.lock(), vec![(1, TransposeMode::Gapped)]);
    assert!(c.iter().all(|&v| v == 8.0));
}

/// Engine whose multiply unit faults on every call.
struct FaultyEngine;

impl MatrixEngine for FaultyEngine {
    fn load_blocked<T: Element>(
        &self,
        src: &[T],
        src_stride: usize,
        rows: usize,
        cols: usize,
        shape: FractalShape,
        dst: &mut [T],
    ) {
        PortableEngine.load_blocked(src, src_stride, rows, cols, shape, dst);
    }

    fn relayout<T: Element>(&self, src: &[T], rows: usize, cols: usize, shape: FractalShape, dst: &mut [T]) {
        PortableEngine.relayout(src, rows, cols, shape, dst);
    }

    fn transpose<T: Element>(
        &self,
        src: &[T],
        shape: FractalShape,
        count: usize,
        mode: TransposeMode,
        dst: &mut [T],
    ) {
        PortableEngine.transpose(src, shape, count, mode, dst);
    }

    fn multiply_accumulate<T: Element>(
        &self,
        _a: &[T],
        _a_frac: FractalShape,
        _b: &[T],
        _b_frac: FractalShape,
        _acc: &mut [f32],
        _shape: MmaShape,
    ) {
        panic!("multiply unit fault");
    }

    fn atomic_accumulate_store(&self, acc: &[f32], acc_rows: usize, dst: &AtomicOutput, region: OutputRegion) {
        PortableEngine.atomic_accumulate_store(acc, acc_rows, dst, region);
    }
}

#[test]
fn test_core_fault_becomes_error() {
    let values = (0..2 * tile_len::<f16>()).map(|i| f16::from_f32((i % 3) as f32)).collect();
    let a = BcsrMatrix::new(32, 16, vec![0, 1, 2], vec![0, 0], values).unwrap();
    let b = vec![f16::ONE; 16 * 32];

    for cores in [1, 2] {
        for mode in [PipelineMode::Sequential, PipelineMode::Overlapped] {
            let mut c = vec![0.0f32; 32 * 32];
            let config = EngineConfig::single_core().with_core_count(cores).with_pipeline(mode);
            let result = bcsr_spmm_with_engine(&FaultyEngine, &a, &b, 32, &mut c, &config);
            assert!(
                matches!(result, Err(SpmmError::CorePanicked(0))),
                "cores={cores} {mode:?}: {result:?}"
            );
        }
    }
}
