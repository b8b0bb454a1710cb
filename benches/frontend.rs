mod common;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use loop2c::{GrammarProfile, TargetOptions, emitter, parse_str};

fn bench_frontend(c: &mut Criterion) {
    for workload in common::workloads() {
        let label = &workload.label;
        let program = workload.program();

        c.bench_function(&format!("frontend_parse_{label}"), |b| {
            b.iter(|| {
                let out = parse_str(black_box(&workload.source), workload.profile).expect("parse");
                black_box(out);
            })
        });

        c.bench_function(&format!("frontend_emit_{label}"), |b| {
            let options = TargetOptions::default();
            b.iter(|| {
                let out = emitter::emit(black_box(&program), &options).expect("emit");
                black_box(out);
            })
        });
    }

    let source = common::synthetic_source(16, 2000);
    c.bench_function("frontend_parse_synthetic", |b| {
        b.iter(|| {
            let out = parse_str(black_box(&source), GrammarProfile::base()).expect("parse");
            black_box(out);
        })
    });
}

criterion_group!(benches, bench_frontend);
criterion_main!(benches);
