use criterion::{black_box, criterion_group, criterion_main, Criterion};
use healthwatch_core::config::OrchestratorConfig;
use healthwatch_core::orchestration::{aggregate_status, CheckRegistry, Orchestrator};
use healthwatch_core::probe::{CheckResult, CheckStatus, FnProbe};
use std::sync::Arc;

fn benchmark_aggregate_status(c: &mut Criterion) {
    let statuses = [CheckStatus::Healthy, CheckStatus::Degraded, CheckStatus::Error];
    let entries: Vec<(bool, CheckStatus)> = (0..64)
        .map(|i| (i % 4 == 0, statuses[i % statuses.len()]))
        .collect();

    c.bench_function("aggregate_status_64", |b| {
        b.iter(|| aggregate_status(black_box(entries.iter().copied())))
    });
}

fn benchmark_run_all(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let registry = Arc::new(CheckRegistry::default());
    for i in 0..16 {
        registry
            .register(
                format!("check_{i}"),
                Arc::new(FnProbe::new(|| async { Ok(CheckResult::healthy("ok")) })),
                i % 2 == 0,
            )
            .expect("unique check name");
    }
    let orchestrator = Orchestrator::new(registry, &OrchestratorConfig::default());

    c.bench_function("run_all_parallel_16", |b| {
        b.iter(|| runtime.block_on(orchestrator.run_all(true)))
    });
    c.bench_function("run_all_sequential_16", |b| {
        b.iter(|| runtime.block_on(orchestrator.run_all(false)))
    });
}

criterion_group!(benches, benchmark_aggregate_status, benchmark_run_all);
criterion_main!(benches);
