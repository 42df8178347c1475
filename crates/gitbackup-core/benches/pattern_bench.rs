use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use gitbackup_core::exclusion::ExclusionEvaluator;
use gitbackup_core::pattern::Pattern;

/// Synthetic relative paths of a mid-sized project tree.
fn sample_paths(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| match i % 5 {
            0 => format!("src/module_{}/lib.rs", i),
            1 => format!("node_modules/pkg_{}/index.js", i),
            2 => format!("logs/2024/run_{}.log", i),
            3 => format!("docs/chapter_{}.md", i),
            _ => format!("build/out/obj_{}.o", i),
        })
        .collect()
}

/// Benchmark: compiling single patterns
fn bench_compile(c: &mut Criterion) {
    let patterns = ["*.log", "node_modules/", "/build/", "**/cache/*.bin", "[ab]?.txt"];

    c.bench_function("pattern_compile", |b| {
        b.iter(|| {
            for p in &patterns {
                std::hint::black_box(Pattern::compile(p));
            }
        });
    });
}

/// Benchmark: evaluating an ordered rule list against many paths
fn bench_evaluate(c: &mut Criterion) {
    let rules = ExclusionEvaluator::new(&[
        "*.log",
        "!important.log",
        "node_modules/",
        "/build/",
        "*.tmp",
        "**/cache/**",
    ]);

    let mut group = c.benchmark_group("evaluate_patterns");
    for size in [100usize, 1_000, 10_000] {
        let paths = sample_paths(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &paths, |b, paths| {
            b.iter(|| {
                let excluded = paths.iter().filter(|p| rules.matches_patterns(p)).count();
                std::hint::black_box(excluded)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile, bench_evaluate);
criterion_main!(benches);
