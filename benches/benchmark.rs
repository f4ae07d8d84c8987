use criterion::{criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;
use tf_idf_cluster::{Corpus, CorpusAssembly, DefaultTFIDFEngine, Document, KMeans, VectorizerConfig};

// Synthetic articles drawn from a few topic vocabularies so the clusters are real.
fn synthetic_corpus(docs: usize, len: usize) -> Corpus {
    let topics: Vec<Vec<String>> = (0..4)
        .map(|t| (0..200).map(|w| format!("t{}w{}", t, w)).collect())
        .collect();
    let shared: Vec<String> = (0..50).map(|w| format!("common{}", w)).collect();

    let mut rng = StdRng::seed_from_u64(42);
    let documents = (0..docs).map(|i| {
        let topic = &topics[i % topics.len()];
        let tokens: Vec<&str> = (0..len)
            .map(|_| {
                if rng.random_range(0..4) == 0 {
                    shared[rng.random_range(0..shared.len())].as_str()
                } else {
                    topic[rng.random_range(0..topic.len())].as_str()
                }
            })
            .collect();
        Document::new(format!("doc{}", i), &tokens)
    });
    Corpus::from_documents(documents.collect::<Vec<_>>()).expect("keys are unique")
}

fn assembly_benchmark(c: &mut Criterion) {
    let corpus = synthetic_corpus(400, 300);

    c.bench_function("assemble_parallel", |b| {
        b.iter(|| {
            CorpusAssembly::<DefaultTFIDFEngine>::new(black_box(&corpus))
                .build()
                .expect("assembly")
        });
    });

    c.bench_function("assemble_sequential", |b| {
        b.iter(|| {
            CorpusAssembly::<DefaultTFIDFEngine>::new(black_box(&corpus))
                .with_config(VectorizerConfig {
                    parallel: false,
                    ..VectorizerConfig::default()
                })
                .build()
                .expect("assembly")
        });
    });

    let model = CorpusAssembly::<DefaultTFIDFEngine>::new(&corpus)
        .build()
        .expect("assembly");
    let query = ["t1w3", "t1w17", "common4"];
    c.bench_function("rank_query", |b| {
        b.iter(|| model.rank(black_box(&query)).expect("rank"));
    });
}

fn kmeans_benchmark(c: &mut Criterion) {
    let corpus = synthetic_corpus(400, 300);
    let model = CorpusAssembly::<DefaultTFIDFEngine>::new(&corpus)
        .build()
        .expect("assembly");
    let vectors = model.matrix.vectors();

    c.bench_function("kmeans_k4", |b| {
        b.iter(|| KMeans::new(4).with_seed(7).fit(black_box(vectors)).expect("fit"));
    });
}

criterion_group!(benches, assembly_benchmark, kmeans_benchmark);
criterion_main!(benches);
