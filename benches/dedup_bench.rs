use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use paper_scout::pipeline::{cluster, DedupConfig, TokenEditSimilarity};
use paper_scout::{Paper, PaperId, SourceId};

const TOPICS: [&str; 8] = [
    "graph neural networks",
    "protein structure prediction",
    "sparse attention",
    "federated learning",
    "quantum error correction",
    "causal inference",
    "diffusion models",
    "reinforcement learning",
];

/// Roughly one in three papers is a cased or punctuated duplicate of another.
fn corpus(size: usize) -> Vec<Paper> {
    (0..size)
        .map(|i| {
            let topic = TOPICS[i % TOPICS.len()];
            let variant = i / 3;
            let title = if i % 3 == 2 {
                format!("{}: Study {}", topic.to_uppercase(), variant)
            } else {
                format!("{topic} study {variant}")
            };
            let id = u32::try_from(i).unwrap_or(u32::MAX);
            let mut paper = Paper::new(
                PaperId(id),
                SourceId::SEARCHABLE[i % SourceId::SEARCHABLE.len()],
                title,
            );
            paper.year = Some(2015 + i32::try_from(i % 8).unwrap_or(0));
            paper.authors = vec![format!("Author {}", i % 17)];
            if i % 5 == 0 {
                paper.doi = Some(format!("10.1000/{}", i / 5));
            }
            paper
        })
        .collect()
}

fn bench_cluster(c: &mut Criterion) {
    let config = DedupConfig::default();
    let mut group = c.benchmark_group("cluster");
    for size in [50usize, 150, 400] {
        let papers = corpus(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &papers, |b, papers| {
            b.iter(|| cluster(black_box(papers.clone()), &config, &TokenEditSimilarity));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_cluster);
criterion_main!(benches);
