use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{json, Value};
use std::sync::Arc;
use switchyard::prelude::*;
use switchyard::store::INPUT_RESOURCE;

// =============================================================================
// Benchmark Flows
// =============================================================================

struct Noop;

#[async_trait]
impl Call for Noop {
    async fn call(&self, _cancel: &CancellationToken, store: &dyn Store) -> CallResult {
        black_box(store.len());
        Ok(())
    }
}

fn chain(length: usize) -> Flow {
    let nodes = (0..length)
        .map(|i| {
            let node = Node::new(format!("n{i}")).with_call(Noop);
            if i == 0 {
                node
            } else {
                node.depends_on([format!("n{}", i - 1)])
            }
        })
        .collect();

    Flow::new("chain", nodes).unwrap()
}

fn diamond(width: usize) -> Flow {
    let mut nodes = vec![Node::new("root").with_call(Noop)];
    for i in 0..width {
        nodes.push(Node::new(format!("branch{i}")).depends_on(["root"]).with_call(Noop));
    }
    nodes.push(
        Node::new("join")
            .depends_on((0..width).map(|i| format!("branch{i}")))
            .with_call(Noop),
    );

    Flow::new("diamond", nodes).unwrap()
}

// =============================================================================
// Invocation Benchmarks
// =============================================================================

fn bench_invocation(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("invocation");

    let single = chain(1);
    group.bench_function("single_node", |b| {
        b.iter(|| {
            rt.block_on(async { black_box(single.invoke(Arc::new(ReferenceStore::new())).await) })
        })
    });

    let long = chain(16);
    group.bench_function("chain_16", |b| {
        b.iter(|| {
            rt.block_on(async { black_box(long.invoke(Arc::new(ReferenceStore::new())).await) })
        })
    });

    let wide = diamond(16);
    group.bench_function("diamond_16", |b| {
        b.iter(|| {
            rt.block_on(async { black_box(wide.invoke(Arc::new(ReferenceStore::new())).await) })
        })
    });

    group.finish();
}

// =============================================================================
// Condition Benchmarks
// =============================================================================

fn bench_condition(c: &mut Criterion) {
    let store = ReferenceStore::new();
    store.store(INPUT_RESOURCE, Reference::new("age", json!(42)));

    let condition = Condition::new(|params: &Params| -> Result<Value, BoxError> {
        Ok(Value::Bool(params["age"].as_i64().unwrap_or(0) >= 18))
    })
    .with_param("age", Property::reference(INPUT_RESOURCE, "age"));

    c.bench_function("condition_eval", |b| b.iter(|| black_box(condition.eval(&store).unwrap())));
}

// =============================================================================
// Criterion Configuration
// =============================================================================

criterion_group!(benches, bench_invocation, bench_condition);
criterion_main!(benches);
