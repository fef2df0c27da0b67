//! Benchmarks for pipeline execution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use provisionflow::prelude::*;
use std::sync::Arc;

fn noop(name: &str) -> Arc<dyn Stage> {
    Arc::new(FnStage::new(name, |_ctx| Ok(StageOutput::ok_empty())))
}

fn context() -> Arc<PipelineContext> {
    Arc::new(
        PipelineContext::new(RunIdentity::new("bench"), DeployableUnit::workspace("bench", "."))
            .with_event_sink(Arc::new(NoOpEventSink)),
    )
}

fn pipeline_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    let group = (0..8).fold(ParallelGroup::new("fan-out"), |group, i| {
        group.member(noop(&format!("member-{i}")))
    });
    c.bench_function("group_fork_join_8", |b| {
        b.iter(|| runtime.block_on(async { black_box(group.run(&context()).await) }));
    });

    let pipeline = PipelineBuilder::new("bench")
        .stage(noop("init"))
        .group(ParallelGroup::new("inspect").member(noop("drift")).member(noop("plan")))
        .stage(noop("apply"))
        .build()
        .unwrap();
    c.bench_function("sequential_with_group", |b| {
        b.iter(|| runtime.block_on(async { black_box(pipeline.run(context()).await) }));
    });
}

criterion_group!(benches, pipeline_benchmark);
criterion_main!(benches);
