//! Criterion benchmarks for the search strategies.
//!
//! Each strategy indexes the same synthetic message corpus and answers
//! short queries against it.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use sim_query::search::{SearchableDocument, StrategyKind};
use std::hint::black_box;
use std::time::Duration;

const WORDS: [&str; 12] = [
    "release", "planning", "deploy", "lunch", "budget", "review", "incident", "roadmap",
    "hiring", "offsite", "metrics", "retro",
];

/// Builds `n` documents of eight pseudo-random words each.
fn corpus(n: usize) -> Vec<SearchableDocument> {
    (0..n)
        .map(|i| {
            let text: Vec<&str> = (0..8).map(|j| WORDS[(i * 7 + j * 5) % WORDS.len()]).collect();
            let text = text.join(" ");
            let space = format!("spaces/{}", i % 4);
            SearchableDocument::new(i.to_string(), text.clone(), json!({"id": i, "text": text}))
                .with_metadata("space", json!(space))
        })
        .collect()
}

fn benchmark_search_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("search_strategies");

    for size in [100usize, 1_000].iter() {
        let docs = corpus(*size);
        for kind in StrategyKind::ALL {
            let mut strategy = kind.build();
            strategy.upsert_documents(docs.clone());

            group.bench_with_input(BenchmarkId::new(kind.as_str(), size), size, |b, _| {
                b.iter(|| black_box(strategy.search(black_box("deploy review"), None, Some(10))));
            });
        }
    }

    group.finish();
}

fn benchmark_indexing(c: &mut Criterion) {
    let mut group = c.benchmark_group("indexing");
    let docs = corpus(1_000);

    for kind in [StrategyKind::Keyword, StrategyKind::Substring] {
        group.bench_function(kind.as_str(), |b| {
            b.iter(|| {
                let mut strategy = kind.build();
                strategy.upsert_documents(black_box(docs.clone()));
                black_box(strategy.len())
            });
        });
    }

    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default()
        .sample_size(20)
        .warm_up_time(Duration::from_secs(1))
        .measurement_time(Duration::from_secs(3));
    targets = benchmark_search_strategies, benchmark_indexing
);
criterion_main!(benches);
