//! REST API server for CentralChain
//!
//! Thin HTTP boundary over a shared [`Blockchain`]: handlers translate routes
//! into ledger calls and serialize the results as JSON. Mining runs on the
//! blocking thread pool while the ledger's write lock is held.

use axum::{
    extract::{Path, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use crate::blockchain::{BlockSnapshot, Blockchain};
use crate::error::ChainError;

const BLOCK_NOT_FOUND: &str = "Block not found";

/// Shared ledger handle passed to every handler.
#[derive(Clone)]
pub struct Node {
    pub blockchain: Arc<RwLock<Blockchain>>,
}

impl Node {
    pub fn new(blockchain: Blockchain) -> Self {
        Self::new_shared(Arc::new(RwLock::new(blockchain)))
    }

    /// Create a node over an existing ledger handle, so other tasks observe
    /// the same in-memory chain.
    pub fn new_shared(blockchain: Arc<RwLock<Blockchain>>) -> Self {
        Self { blockchain }
    }

    /// Mine and append a block. The write lock is held for the whole search.
    pub async fn append_block(&self, data: Value) -> Result<BlockSnapshot, ApiError> {
        let mut chain = self.blockchain.clone().write_owned().await;
        tokio::task::spawn_blocking(move || chain.append(data).snapshot())
            .await
            .map_err(|e| ApiError::InternalError(format!("Mining task failed: {}", e)))
    }

    /// Re-mine the block at `index` and cascade to its descendants.
    pub async fn remine_block(&self, index: usize) -> Result<BlockSnapshot, ApiError> {
        let mut chain = self.blockchain.clone().write_owned().await;
        let mined = tokio::task::spawn_blocking(move || {
            let block = chain.remine(index)?;
            Ok::<_, ChainError>(block.snapshot())
        })
        .await
        .map_err(|e| ApiError::InternalError(format!("Mining task failed: {}", e)))??;
        Ok(mined)
    }
}

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BlockchainError(ChainError),
    InvalidInput(String),
    NotFound(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BlockchainError(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::BlockchainError(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct ChainResponse {
    pub chain: Vec<BlockSnapshot>,
    pub valid: bool,
}

#[derive(Serialize)]
pub struct ValidityResponse {
    pub valid: bool,
}

#[derive(Serialize)]
pub struct MinedResponse {
    pub message: String,
    pub block: BlockSnapshot,
}

// ============================================================================
// Utility Functions
// ============================================================================

/// Parse a path segment as a block index. Negative and non-numeric values
/// yield `None`; they can never name a block.
fn parse_index(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok()
}

// ============================================================================
// Middleware
// ============================================================================

/// Logs method, path, status and duration of every request.
async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    let duration = start.elapsed();
    let status = response.status();

    info!(
        method = %method,
        path = %path,
        status = %status.as_u16(),
        duration_ms = %duration.as_millis(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints
pub fn build_api_router(node: Arc<Node>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE]);

    Router::new()
        .route("/blocks", get(get_blocks).post(append_block))
        .route("/blocks/:index", get(get_block))
        .route("/mine/:index", post(remine_block))
        .route("/validate", get(validate_chain))
        .route("/health", get(health_check))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(node)
        .layer(cors)
}

/// Bind `host:port` and serve the API until the process exits.
pub async fn run_api_server(
    node: Arc<Node>,
    host: &str,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_api_router(node);
    let listener = tokio::net::TcpListener::bind((host, port)).await?;

    info!("Central blockchain server running on http://{}", listener.local_addr()?);
    info!(
        "Endpoints: GET /blocks, GET /blocks/:index, POST /blocks, POST /mine/:index, GET /validate"
    );

    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn health_check(State(node): State<Arc<Node>>) -> impl IntoResponse {
    let blockchain = node.blockchain.read().await;
    Json(serde_json::json!({
        "status": "healthy",
        "height": blockchain.len(),
        "difficulty": blockchain.difficulty(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn get_blocks(State(node): State<Arc<Node>>) -> Json<ChainResponse> {
    let blockchain = node.blockchain.read().await;
    Json(ChainResponse {
        chain: blockchain.list(),
        valid: blockchain.validate(),
    })
}

async fn get_block(
    State(node): State<Arc<Node>>,
    Path(raw_index): Path<String>,
) -> Result<Json<BlockSnapshot>, ApiError> {
    let blockchain = node.blockchain.read().await;

    parse_index(&raw_index)
        .and_then(|index| blockchain.get(index))
        .map(|block| Json(block.snapshot()))
        .ok_or_else(|| ApiError::NotFound(BLOCK_NOT_FOUND.to_string()))
}

async fn append_block(
    State(node): State<Arc<Node>>,
    body: Option<Json<Value>>,
) -> Result<(StatusCode, Json<BlockSnapshot>), ApiError> {
    // `{"data": null}` is a payload; only an absent key is rejected
    let data = body
        .and_then(|Json(mut body)| body.as_object_mut().and_then(|fields| fields.remove("data")))
        .ok_or_else(|| {
            warn!("Rejected block without data");
            ApiError::InvalidInput("Missing data".to_string())
        })?;

    let block = node.append_block(data).await?;
    Ok((StatusCode::CREATED, Json(block)))
}

async fn remine_block(
    State(node): State<Arc<Node>>,
    Path(raw_index): Path<String>,
) -> Result<Json<MinedResponse>, ApiError> {
    let index = parse_index(&raw_index)
        .ok_or_else(|| ApiError::InvalidInput(BLOCK_NOT_FOUND.to_string()))?;

    let block = node.remine_block(index).await?;
    Ok(Json(MinedResponse {
        message: "Block mined".to_string(),
        block,
    }))
}

async fn validate_chain(State(node): State<Arc<Node>>) -> Json<ValidityResponse> {
    let blockchain = node.blockchain.read().await;
    Json(ValidityResponse {
        valid: blockchain.validate(),
    })
}
