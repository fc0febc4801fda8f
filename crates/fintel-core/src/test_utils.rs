//! Test utilities for fintel-core
//!
//! This module provides testing infrastructure including a mock Ollama server
//! that can be used for development and integration tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::config::AnalysisKind;

/// How the mock server answers `/api/generate`
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// Response text per analysis (an empty result list if absent)
    pub responses: HashMap<AnalysisKind, String>,
    /// Fail every generate call with this status
    pub status: Option<StatusCode>,
    /// Sleep before answering
    pub delay: Option<Duration>,
}

impl MockBehavior {
    pub fn respond(mut self, kind: AnalysisKind, response: impl Into<String>) -> Self {
        self.responses.insert(kind, response.into());
        self
    }

    pub fn fail_with(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

struct MockState {
    behavior: MockBehavior,
    requests: AtomicUsize,
}

/// Mock Ollama server for testing and development
pub struct MockOllamaServer {
    addr: SocketAddr,
    state: Arc<MockState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockOllamaServer {
    /// Start the mock server on an available port (empty results for every analysis)
    pub async fn start() -> Self {
        Self::start_with(MockBehavior::default()).await
    }

    /// Start the mock server with custom behavior
    pub async fn start_with(behavior: MockBehavior) -> Self {
        let state = Arc::new(MockState {
            behavior,
            requests: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/api/tags", get(handle_tags))
            .route("/api/generate", post(handle_generate))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of generate requests received
    pub fn request_count(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockOllamaServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Ollama tags endpoint response (health check)
async fn handle_tags() -> Json<TagsResponse> {
    Json(TagsResponse {
        models: vec![ModelInfo {
            name: "llama3.2:latest".to_string(),
            modified_at: "2024-01-01T00:00:00Z".to_string(),
            size: 4_000_000_000,
        }],
    })
}

/// Ollama generate endpoint
async fn handle_generate(
    State(state): State<Arc<MockState>>,
    Json(request): Json<GenerateRequest>,
) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);

    if let Some(delay) = state.behavior.delay {
        tokio::time::sleep(delay).await;
    }
    if let Some(status) = state.behavior.status {
        return (status, "mock failure").into_response();
    }

    let kind = detect_analysis(&request.prompt);
    let response = kind
        .and_then(|k| state.behavior.responses.get(&k).cloned())
        .unwrap_or_else(|| empty_response(kind));

    Json(GenerateResponse {
        model: request.model,
        response,
        done: true,
    })
    .into_response()
}

/// Work out which analysis a prompt belongs to
/// These phrases match the prompt files in prompts/*.md
fn detect_analysis(prompt: &str) -> Option<AnalysisKind> {
    if prompt.contains("uncategorized transaction") {
        Some(AnalysisKind::CategorizeTransactions)
    } else if prompt.contains("spending patterns") {
        Some(AnalysisKind::IdentifyPatterns)
    } else if prompt.contains("unusual transactions") {
        Some(AnalysisKind::DetectAnomalies)
    } else if prompt.contains("Forecast the") {
        Some(AnalysisKind::GeneratePredictions)
    } else {
        None
    }
}

fn empty_response(kind: Option<AnalysisKind>) -> String {
    match kind {
        Some(AnalysisKind::CategorizeTransactions) => r#"{"assignments": []}"#,
        Some(AnalysisKind::IdentifyPatterns) => r#"{"patterns": []}"#,
        Some(AnalysisKind::DetectAnomalies) => r#"{"anomalies": []}"#,
        Some(AnalysisKind::GeneratePredictions) => r#"{"predictions": []}"#,
        None => "{}",
    }
    .to_string()
}

// Request/Response types for the mock server

#[derive(Debug, Serialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Serialize)]
struct ModelInfo {
    name: String,
    modified_at: String,
    size: u64,
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    #[allow(dead_code)]
    #[serde(default)]
    system: Option<String>,
    #[allow(dead_code)]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    model: String,
    response: String,
    done: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AIBackend, OllamaBackend};

    #[tokio::test]
    async fn test_mock_server_health_check() {
        let server = MockOllamaServer::start().await;
        let client = OllamaBackend::new(&server.url(), "test-model");

        assert!(client.health_check().await);
    }

    #[tokio::test]
    async fn test_mock_server_empty_results() {
        let server = MockOllamaServer::start().await;
        let client = OllamaBackend::new(&server.url(), "test-model");

        let result = client
            .generate("Flag the unusual transactions below.", None)
            .await
            .unwrap();
        assert_eq!(result, r#"{"anomalies": []}"#);
        assert_eq!(server.request_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_server_canned_response() {
        let server = MockOllamaServer::start_with(
            MockBehavior::default().respond(AnalysisKind::IdentifyPatterns, r#"{"patterns": [1]}"#),
        )
        .await;
        let client = OllamaBackend::new(&server.url(), "test-model");

        let result = client
            .generate("Find the spending patterns in these transactions.", None)
            .await
            .unwrap();
        assert_eq!(result, r#"{"patterns": [1]}"#);
    }

    #[tokio::test]
    async fn test_mock_server_failure_status() {
        let server =
            MockOllamaServer::start_with(MockBehavior::default().fail_with(StatusCode::SERVICE_UNAVAILABLE))
                .await;
        let client = OllamaBackend::new(&server.url(), "test-model");

        let err = client.generate("Forecast the next month.", None).await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_ollama_client_model_and_host() {
        let client = OllamaBackend::new("http://localhost:11434", "llama3.2");
        assert_eq!(client.model(), "llama3.2");
        assert_eq!(client.host(), "http://localhost:11434");
    }
}
