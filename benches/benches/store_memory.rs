//! `Orchestrator::store_memory` throughput across content shapes (§4.6.1).
//!
//! Run with: cargo bench --package memory-benches --bench store_memory

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use memory_core::orchestrator::StoreMemoryRequest;
use test_utils::in_memory_orchestrator;

fn bench_store_memory(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("store_memory");

    let cases = [
        ("identity", "제 이름은 김철수입니다."),
        ("preference", "저는 Rust를 정말 좋아합니다."),
        ("fact", "Rust는 2010년에 발표된 시스템 프로그래밍 언어입니다."),
    ];

    for (label, content) in cases {
        group.bench_with_input(BenchmarkId::new("classify_and_store", label), &content, |b, content| {
            let orch = in_memory_orchestrator(16);
            b.to_async(&rt).iter(|| async {
                black_box(
                    orch.store_memory(StoreMemoryRequest {
                        user_id: "bench-user".to_string(),
                        session_id: None,
                        content: (*content).to_string(),
                        type_path: None,
                        metadata: Default::default(),
                    })
                    .await,
                )
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_store_memory);
criterion_main!(benches);
