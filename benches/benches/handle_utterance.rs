//! `Orchestrator::handle_utterance` end-to-end latency (§4.6.2): classify,
//! retrieve, generate, auto-store.
//!
//! Run with: cargo bench --package memory-benches --bench handle_utterance

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use memory_core::orchestrator::{HandleUtteranceRequest, StoreMemoryRequest};
use test_utils::in_memory_orchestrator;

fn seeded_orchestrator(rt: &tokio::runtime::Runtime) -> memory_core::Orchestrator {
    let orch = in_memory_orchestrator(16);
    rt.block_on(async {
        for content in ["저는 Python 개발자입니다.", "FastAPI를 주로 씁니다.", "서울에 삽니다."] {
            orch.store_memory(StoreMemoryRequest {
                user_id: "bench-user".to_string(),
                session_id: Some("bench-session".to_string()),
                content: content.to_string(),
                type_path: None,
                metadata: Default::default(),
            })
            .await
            .unwrap();
        }
    });
    orch
}

fn bench_handle_utterance(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let orch = seeded_orchestrator(&rt);

    c.bench_function("handle_utterance_with_recall", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(
                orch.handle_utterance(HandleUtteranceRequest {
                    user_id: "bench-user".to_string(),
                    session_id: "bench-session".to_string(),
                    prompt: "제가 쓰는 언어가 뭐죠?".to_string(),
                    auto_store: false,
                    generate_response: true,
                })
                .await,
            )
        });
    });
}

criterion_group!(benches, bench_handle_utterance);
criterion_main!(benches);
