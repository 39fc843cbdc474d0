//! `RetrievalEngine::retrieve` latency at varying table sizes (§4.4).
//!
//! Run with: cargo bench --package memory-benches --bench retrieval

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use memory_core::cache::mock::InMemoryCache;
use memory_core::embeddings::MockEmbeddingClient;
use memory_core::orchestrator::{StoreMemoryRequest, MEMORIES_TABLE};
use memory_core::retrieval::{RetrievalEngine, RetrievalQuery};
use memory_core::storage::mock::InMemoryVectorStore;
use memory_core::types::OptimizeFor;
use memory_core::{EmbeddingClient, EventStream, Orchestrator};
use std::sync::Arc;

fn seeded_engine(rt: &tokio::runtime::Runtime, rows: usize) -> RetrievalEngine {
    let store = Arc::new(InMemoryVectorStore::default());
    let embeddings = Arc::new(MockEmbeddingClient::new(16));
    let orch = Orchestrator::new(
        store.clone(),
        embeddings.clone(),
        Arc::new(memory_core::completion::MockCompletionClient),
        Arc::new(InMemoryCache::default()),
        Arc::new(EventStream::new()),
    );

    rt.block_on(async {
        for i in 0..rows {
            orch.store_memory(StoreMemoryRequest {
                user_id: "bench-user".to_string(),
                session_id: None,
                content: format!("기록 번호 {i}: Rust와 FastAPI로 서비스를 만들었습니다."),
                type_path: Some("knowledge/fact/general".to_string()),
                metadata: Default::default(),
            })
            .await
            .unwrap();
        }
    });

    RetrievalEngine::new(store, embeddings)
}

fn bench_retrieval(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("retrieval");

    for rows in [10usize, 100, 1_000] {
        let engine = seeded_engine(&rt, rows);
        group.bench_with_input(BenchmarkId::new("retrieve", rows), &rows, |b, _| {
            b.to_async(&rt).iter(|| async {
                black_box(
                    engine
                        .retrieve(&RetrievalQuery {
                            table: MEMORIES_TABLE.to_string(),
                            query_text: "어떤 기술을 썼지?".to_string(),
                            filters: RetrievalEngine::scoped_filters("bench-user", Vec::new()),
                            limit: 10,
                            optimize_for: OptimizeFor::Balanced,
                        })
                        .await,
                )
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_retrieval);
criterion_main!(benches);
