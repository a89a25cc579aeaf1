//! Benchmark: property write propagation

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;

use trellis_core::reactive::{Autorun, Computed, Property};
use trellis_core::{declare, BindingRegistry, Definition, EngineConfig, Renderer, Template};

fn property_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");
    for readers in [1usize, 16, 256] {
        let property = Property::new("p", json!(0));
        let _autoruns: Vec<Autorun> = (0..readers)
            .map(|_| {
                let source = property.clone();
                Autorun::new(move || {
                    black_box(source.get());
                })
            })
            .collect();

        let mut n = 0u64;
        group.bench_with_input(BenchmarkId::from_parameter(readers), &readers, |b, _| {
            b.iter(|| {
                n += 1;
                property.set(json!(n));
            })
        });
    }
    group.finish();
}

fn computed_chain(c: &mut Criterion) {
    let source = Property::new("source", json!(0));
    let mut last = {
        let source = source.clone();
        Computed::new("c0", move || source.get())
    };
    for i in 1..32 {
        let previous = last.clone();
        last = Computed::new(format!("c{i}"), move || previous.get());
    }
    let tail = last.clone();
    let _sink = Autorun::new(move || {
        black_box(tail.get());
    });

    let mut n = 0u64;
    c.bench_function("computed_chain_32", |b| {
        b.iter(|| {
            n += 1;
            source.set(json!(n));
        })
    });
}

fn bound_input(c: &mut Criterion) {
    let config = EngineConfig::default();
    let renderer = Renderer::with_registry(config.clone(), Arc::new(BindingRegistry::with_builtins()));

    let mut body = Template::new("body");
    declare(&mut body, None, Definition::new().prop("name", json!("")), &config)
        .expect("declare");
    body.render(|scope| {
        let input = scope.element("input");
        scope.bind(&input, "value: name")
    });
    let view = renderer.mount(body).expect("mount");
    let input = view.roots()[0].clone();

    let mut n = 0u64;
    c.bench_function("input_event_to_property", |b| {
        b.iter(|| {
            n += 1;
            input.set_val(json!(n));
            input.fire("input");
        })
    });
}

criterion_group!(benches, property_fan_out, computed_chain, bound_input);
criterion_main!(benches);
