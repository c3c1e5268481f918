//! End-to-end answering against a local OpenAI-compatible server.

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use unirag::{
    AnswerPass, DistanceMetric, InMemoryVectorStore, OpenAiProvider, Passage, QueryRequest,
    RagConfig, RagError, RagOrchestrator, VectorStore,
};

const DIM: usize = 8;

/// Letter-bucket embedding: deterministic and similar for similar words.
fn bucket_embedding(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    for c in text.to_lowercase().chars().filter(char::is_ascii_lowercase) {
        v[(c as usize - 'a' as usize) % DIM] += 1.0;
    }
    v
}

#[derive(Clone, Default)]
struct Server {
    prompts: Arc<Mutex<Vec<Value>>>,
}

async fn embeddings(Json(body): Json<Value>) -> Json<Value> {
    let input = body["input"].as_str().unwrap_or_default();
    Json(json!({"data": [{"embedding": bucket_embedding(input)}]}))
}

async fn chat(State(server): State<Server>, Json(body): Json<Value>) -> Json<Value> {
    let mut prompts = server.prompts.lock().unwrap();
    prompts.push(body["messages"].clone());
    let content = format!("answer #{}", prompts.len());
    Json(json!({"choices": [{"message": {"role": "assistant", "content": content}}]}))
}

async fn spawn_server() -> (String, Server) {
    let server = Server::default();
    let app = Router::new()
        .route("/v1/embeddings", post(embeddings))
        .route("/v1/chat/completions", post(chat))
        .with_state(server.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/v1/"), server)
}

fn provider(base_url: &str) -> Arc<OpenAiProvider> {
    let mut provider = OpenAiProvider::new("test-key").with_compatible_url(base_url);
    provider.set_generation_model("llama3");
    provider.set_embedding_model("nomic-embed-text", DIM);
    Arc::new(provider)
}

fn orchestrator(base_url: &str, store: Arc<dyn VectorStore>) -> RagOrchestrator {
    let provider = provider(base_url);
    RagOrchestrator::builder()
        .config(RagConfig::builder().background_context("A small test corpus.").build().unwrap())
        .embedding_provider(provider.clone())
        .generation_provider(provider)
        .vector_store(store)
        .build()
        .unwrap()
}

fn corpus() -> Vec<Passage> {
    ["apples and pears", "rust borrow checker", "quantum field theory", "pears and apples again"]
        .iter()
        .enumerate()
        .map(|(i, t)| Passage { id: i as u64, text: t.to_string(), metadata: json!({"n": i}) })
        .collect()
}

#[tokio::test]
async fn indexes_retrieves_and_answers_over_http() {
    let (url, server) = spawn_server().await;
    let store = Arc::new(InMemoryVectorStore::new(DistanceMetric::Cosine));
    let orchestrator = orchestrator(&url, store);

    assert_eq!(orchestrator.index_into_collection("p1", &corpus(), false).await.unwrap(), 4);
    assert_eq!(orchestrator.collection_info("p1").await.unwrap().dimensions, DIM);

    let hits = orchestrator.search_collection("p1", "rust borrow checker", 1, None).await.unwrap();
    assert_eq!(hits[0].text, "rust borrow checker");
    assert!((hits[0].score - 1.0).abs() < 1e-5);

    let request = QueryRequest::new("apples and pears").with_limit(2).with_second_pass(true);
    let answer = orchestrator.answer_with_refinement("p1", &request).await.unwrap();

    assert_eq!(answer.pass, AnswerPass::Second);
    assert_eq!(answer.result.answer.as_deref(), Some("answer #2"));
    assert_eq!(answer.first_pass.unwrap().used_documents.len(), 2);
    assert!(answer.result.used_documents.len() <= 12);

    let prompts = server.prompts.lock().unwrap();
    let first = prompts[0].as_array().unwrap();
    assert_eq!(first[0]["role"], "system");
    assert!(first[0]["content"].as_str().unwrap().contains("A small test corpus."));
    assert_eq!(first[1]["role"], "user");
    assert!(first[1]["content"].as_str().unwrap().contains("Document No. 1"));

    let second_user = prompts[1][1]["content"].as_str().unwrap();
    assert!(second_user.contains("Additional context from first pass: answer #1"));
}

#[tokio::test]
async fn unreachable_backend_yields_no_answer() {
    let (url, _server) = spawn_server().await;
    let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::default());
    orchestrator(&url, store.clone()).index_into_collection("p2", &corpus(), false).await.unwrap();

    // Same store, dead endpoint.
    let offline = orchestrator("http://127.0.0.1:9/v1/", store);
    let result = offline.answer("p2", &QueryRequest::new("apples")).await.unwrap();
    assert!(result.answer.is_none());
    assert!(result.used_documents.is_empty());

    assert!(matches!(
        offline.answer("nope", &QueryRequest::new("apples")).await,
        Err(RagError::CollectionNotFound(_))
    ));
}

#[tokio::test]
async fn persistent_store_survives_reconnect() {
    let (url, _server) = spawn_server().await;
    let dir = tempfile::tempdir().unwrap();

    let store = Arc::new(InMemoryVectorStore::persistent(dir.path(), DistanceMetric::Cosine));
    store.connect().await.unwrap();
    orchestrator(&url, store.clone()).index_into_collection("p3", &corpus(), false).await.unwrap();
    store.disconnect().await.unwrap();

    let reopened = Arc::new(InMemoryVectorStore::persistent(dir.path(), DistanceMetric::Cosine));
    reopened.connect().await.unwrap();
    let orchestrator = orchestrator(&url, reopened);
    assert_eq!(orchestrator.collection_info("p3").await.unwrap().points_count, 4);

    let query = "quantum field theory";
    let hits = orchestrator.search_collection("p3", query, 1, Some(0.9)).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].text, "quantum field theory");
}
