use stackscript::fixtures::{self, Case};

pub fn bench_cases() -> Vec<Case> {
    let cases: Vec<Case> = fixtures::cases()
        .into_iter()
        .filter(|case| case.bench)
        .collect();
    assert!(!cases.is_empty(), "no fixtures are marked for benchmarking");
    cases
}
