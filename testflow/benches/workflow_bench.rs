//! Benchmarks for workflow execution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use testflow::core::StageId;
use testflow::extract::extract_artifact;
use testflow::testing::SuccessStage;
use testflow::workflow::WorkflowBuilder;

const SOURCE: &str = "public class Calculator {\n  int add(int a, int b) { return a + b; }\n}\n";

fn workflow_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let executor = WorkflowBuilder::new()
        .stage(SuccessStage::answering(StageId::Dependency, "deps"))
        .stage(SuccessStage::answering(StageId::Context, "ctx"))
        .stage(SuccessStage::answering(StageId::Generation, "class CalculatorTest {}"))
        .build()
        .unwrap();

    c.bench_function("run_stub_stages", |b| {
        b.iter(|| runtime.block_on(executor.execute(black_box(SOURCE))));
    });
}

fn extract_benchmark(c: &mut Criterion) {
    let raw = format!("Here are the tests:\n```java\n{}\n```\nDone.", SOURCE.repeat(50));
    c.bench_function("extract_fenced", |b| {
        b.iter(|| extract_artifact(black_box(&raw)));
    });
}

criterion_group!(benches, workflow_benchmark, extract_benchmark);
criterion_main!(benches);
