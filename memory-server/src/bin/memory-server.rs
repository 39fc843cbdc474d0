//! JSON-RPC-over-stdio binary: boots tracing, loads [`MemoryConfig`],
//! wires storage backends (falling back to in-memory when unconfigured,
//! mirroring the teacher's Turso-local/Turso-cloud+redb/redb-only/in-memory
//! cascade), and runs the request/response loop against [`McpServer::dispatch`].

use anyhow::Context;
use memory_core::cache::mock::InMemoryCache;
use memory_core::cache::MemoryCache;
use memory_core::completion::MockCompletionClient;
use memory_core::embeddings::MockEmbeddingClient;
use memory_core::events::EventStream;
use memory_core::storage::mock::InMemoryVectorStore;
use memory_core::storage::VectorStore;
use memory_core::MemoryConfig;
use memory_server::jsonrpc::{
    read_next_message, write_response_line, write_response_with_length, JsonRpcRequest, JsonRpcResponse,
};
use memory_server::McpServer;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Storage backend selection cascade, mirroring the teacher's
/// Turso-local / Turso-cloud+redb / redb-only / in-memory fallback order.
/// The downstream embedding/completion endpoint is explicitly out of scope
/// (§1 Non-goals) and always a mock.
async fn initialize_backends() -> (Arc<dyn VectorStore>, Arc<dyn MemoryCache>) {
    let store: Arc<dyn VectorStore> = match std::env::var("TURSO_DATABASE_URL") {
        Ok(url) => {
            let token = std::env::var("TURSO_AUTH_TOKEN").unwrap_or_default();
            match memory_storage_turso::TursoStore::connect(&url, &token).await {
                Ok(store) => {
                    info!(url = %url, "connected to turso vector store");
                    Arc::new(store)
                }
                Err(e) => {
                    warn!(error = %e, "failed to connect to turso, falling back to in-memory store");
                    Arc::new(InMemoryVectorStore::default())
                }
            }
        }
        Err(_) => {
            info!("TURSO_DATABASE_URL unset, using in-memory vector store");
            Arc::new(InMemoryVectorStore::default())
        }
    };

    let cache: Arc<dyn MemoryCache> = match std::env::var("REDB_CACHE_PATH") {
        Ok(path) => match memory_storage_redb::RedbCache::open(Path::new(&path)).await {
            Ok(cache) => {
                info!(path = %path, "opened redb cache");
                Arc::new(cache)
            }
            Err(e) => {
                warn!(error = %e, "failed to open redb cache, falling back to in-memory cache");
                Arc::new(InMemoryCache::default())
            }
        },
        Err(_) => {
            info!("REDB_CACHE_PATH unset, using in-memory cache");
            Arc::new(InMemoryCache::default())
        }
    };

    (store, cache)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    info!("starting memory-server in JSON-RPC mode");

    let config = MemoryConfig::from_env().context("failed to load configuration from environment")?;
    info!(?config, "loaded configuration");

    let (store, cache) = initialize_backends().await;
    let embeddings = Arc::new(MockEmbeddingClient::new(1536));
    let completion = Arc::new(MockCompletionClient);
    let events = Arc::new(EventStream::new());

    let server = Arc::new(McpServer::new(store, embeddings, completion, cache, events));
    info!("memory-server initialized successfully");

    run_jsonrpc_loop(server).await
}

async fn run_jsonrpc_loop(server: Arc<McpServer>) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();

    loop {
        match read_next_message(&mut handle) {
            Ok(None) => {
                info!("received EOF, shutting down");
                break;
            }
            Ok(Some((line, is_lsp))) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let response = match serde_json::from_str::<JsonRpcRequest>(line) {
                    Ok(request) => handle_request(&server, request).await,
                    Err(e) => {
                        error!(error = %e, "failed to parse JSON-RPC request");
                        JsonRpcResponse::err(None, -32700, format!("parse error: {e}"))
                    }
                };

                let response_str = serde_json::to_string(&response)?;
                if is_lsp {
                    write_response_with_length(&mut stdout, &response_str)?;
                } else {
                    write_response_line(&mut stdout, &response_str)?;
                }
            }
            Err(e) => {
                error!(error = %e, "error reading from stdin");
                break;
            }
        }
    }

    info!("memory-server shutting down");
    Ok(())
}

async fn handle_request(server: &Arc<McpServer>, request: JsonRpcRequest) -> JsonRpcResponse {
    let id = request.id;
    let params = request.params.unwrap_or(serde_json::Value::Null);
    match server.dispatch(&request.method, params).await {
        Ok(result) => JsonRpcResponse::ok(id, result),
        Err(e) => JsonRpcResponse::err(id, e.code(), e.to_string()),
    }
}
