//! HTTP chat API for the web front end.
//!
//! `POST /api/chat` answers one question. A well-formed request never gets an
//! error status: any failure comes back as the apology with no evidence.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::rag::{EvidenceItem, RagEngine, APOLOGY};
use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

/// Shared application state.
struct AppState {
    engine: RagEngine,
}

/// Run the HTTP API server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let cors = cors_layer(&settings.server.allowed_origins);

    let orchestrator = Orchestrator::new(settings)?;
    let state = Arc::new(AppState {
        engine: orchestrator.engine(),
    });
    let app = router(state, cors);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Courtside API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Chat", "POST /api/chat");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .layer(cors)
        .with_state(state)
}

/// CORS for the configured origins.
///
/// A `*` entry allows any origin without credentials. Otherwise the listed
/// origins are allowed with credentials, which requires explicit methods and
/// headers.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .allow_credentials(true)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct ChatRequest {
    question: String,
}

#[derive(Serialize)]
struct ChatResponse {
    answer: String,
    evidence: Vec<EvidenceItem>,
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn chat(State(state): State<Arc<AppState>>, Json(req): Json<ChatRequest>) -> Json<ChatResponse> {
    info!("Received question: {}", req.question);

    match state.engine.ask(&req.question).await {
        Ok(answer) => Json(ChatResponse {
            answer: answer.answer,
            evidence: answer.evidence,
        }),
        Err(e) => {
            warn!("Question failed: {}", e);
            Json(ChatResponse {
                answer: APOLOGY.to_string(),
                evidence: Vec::new(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::fakes::{FixedEmbedder, ScriptedGenerator};
    use crate::rag::Retriever;
    use crate::vector_store::fixtures::seeded_store;

    fn state(embedding: Vec<f32>) -> Arc<AppState> {
        let store = Arc::new(seeded_store());
        Arc::new(AppState {
            engine: RagEngine::new(
                Arc::new(FixedEmbedder(embedding)),
                Retriever::new(store, 5, 5, 2),
                Arc::new(ScriptedGenerator::reply("No games found.")),
            ),
        })
    }

    #[tokio::test]
    async fn test_chat_failure_returns_apology() {
        let Json(response) = chat(
            State(state(Vec::new())),
            Json(ChatRequest {
                question: "Who won?".to_string(),
            }),
        )
        .await;

        assert_eq!(response.answer, APOLOGY);
        assert!(response.evidence.is_empty());
    }

    #[tokio::test]
    async fn test_chat_answers() {
        let Json(response) = chat(
            State(state(vec![1.0, 0.0])),
            Json(ChatRequest {
                question: "Who won?".to_string(),
            }),
        )
        .await;

        assert_eq!(response.answer, "No games found.");
        assert!(response.evidence.is_empty());
    }

    #[test]
    fn test_router_accepts_configured_cors() {
        let _ = router(state(vec![1.0]), cors_layer(&["http://localhost:4200".to_string()]));
        let _ = router(state(vec![1.0]), cors_layer(&["*".to_string()]));
    }
}
