#![allow(dead_code)]
use std::path::Path;

use loop2c::{GrammarProfile, Program, parse_str};
use test_support::{Case, bench_cases};

pub struct Workload {
    pub label: String,
    pub source: String,
    pub profile: GrammarProfile,
    pub inputs: Vec<u64>,
}

impl Workload {
    pub fn program(&self) -> Program {
        parse_str(&self.source, self.profile)
            .unwrap_or_else(|err| panic!("parse {}: {err}", self.label))
    }
}

fn workload(case: Case) -> Workload {
    let source = case
        .source()
        .unwrap_or_else(|err| panic!("read {}: {err}", case.name));
    let inputs = case
        .spec
        .runs
        .first()
        .map(|run| run.inputs.clone())
        .unwrap_or_default();
    Workload {
        label: case.name,
        source,
        profile: case.spec.profile.grammar_profile(),
        inputs,
    }
}

/// Every fixture case marked for benchmarking.
pub fn workloads() -> Vec<Workload> {
    bench_cases(Path::new("tests/programs"))
        .expect("load bench cases")
        .into_iter()
        .map(workload)
        .collect()
}

/// A long straight-line program with deep nesting, for parser throughput.
pub fn synthetic_source(depth: usize, statements: usize) -> String {
    let mut source = String::new();
    for level in 1..=depth {
        source.push_str(&format!("LOOP x{level} DO\n"));
    }
    for index in 0..statements {
        if index > 0 {
            source.push_str(";\n");
        }
        source.push_str(&format!("x0 := x{} + {}", index % (depth + 1), index % 7));
    }
    for _ in 0..depth {
        source.push_str("\nEND");
    }
    source.push('\n');
    source
}
