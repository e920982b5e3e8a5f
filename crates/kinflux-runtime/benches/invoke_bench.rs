//! Invocation throughput: whole-problem runs vs memory-constrained chunking.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use kinflux_backends::QueueBackend;
use kinflux_runtime::kernels::{register_builtin_kernels, sample_conditions, toy_kernel_spec, NEQ};
use kinflux_runtime::{DataOrder, KernelRuntime, RuntimeConfig};

const PER_CONDITION_BYTES: usize = 14 * 8;
const PROBLEM_SIZE: usize = 4096;

fn runtime_with_limit(mem_limit_bytes: usize) -> KernelRuntime {
    register_builtin_kernels();
    let config = RuntimeConfig {
        mem_limit_bytes,
        ..RuntimeConfig::default()
    };
    let spec = toy_kernel_spec(DataOrder::RowMajor);
    let backend = QueueBackend::new(&config.device_query(config.work_size)).unwrap();
    KernelRuntime::new(config, spec, Box::new(backend))
}

fn bench_invoke(c: &mut Criterion) {
    let data = sample_conditions(PROBLEM_SIZE, DataOrder::RowMajor);
    let work_size = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    let mut group = c.benchmark_group("invoke");
    for (label, mem_limit) in [
        ("single_chunk", usize::MAX / 2),
        ("chunked_x8", (PROBLEM_SIZE / 8) * PER_CONDITION_BYTES),
    ] {
        let mut runtime = runtime_with_limit(mem_limit);
        runtime.resize(PROBLEM_SIZE, work_size, false).unwrap();
        let mut dphi = vec![0.0f64; PROBLEM_SIZE * NEQ];

        group.bench_function(BenchmarkId::from_parameter(label), |b| {
            b.iter(|| {
                runtime
                    .invoke(
                        &[data.phi.as_slice(), data.pressure.as_slice()],
                        &mut [dphi.as_mut_slice()],
                    )
                    .unwrap();
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_invoke);
criterion_main!(benches);
