// Copyright 2025 sudonet Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! HTTP front-end for a node.
//!
//! A thin request/response wrapper around a [`NodeHandle`]: it never touches
//! cluster state directly.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sudonet_common::{Grid, SudonetError};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::node::{JobOutcome, NodeHandle};
use crate::puzzle::generate_candidates;

/// Body of `POST /solve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveRequest {
    pub sudoku: Grid,
}

/// Successful answer to `POST /solve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveResponse {
    pub solution: Grid,
    pub index: usize,
    pub elapsed_ms: u64,
}

struct AppState {
    node: NodeHandle,
    max_candidates: usize,
}

/// HTTP server for a node.
///
/// - `POST /solve` expands a puzzle and searches it across the cluster
/// - `GET /stats` returns cluster-wide validation counters
/// - `GET /network` returns the known peer adjacency
/// - `GET /__health` returns `OK`
pub struct HttpServer {
    state: Arc<AppState>,
}

impl HttpServer {
    pub fn new(node: NodeHandle, max_candidates: usize) -> Self {
        Self {
            state: Arc::new(AppState { node, max_candidates }),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/solve", post(solve))
            .route("/stats", get(stats))
            .route("/network", get(network))
            .route("/__health", get(health_check))
            .layer(CorsLayer::permissive())
            .with_state(Arc::clone(&self.state))
    }

    /// Binds `addr` and serves until the process exits.
    pub async fn run(self, addr: SocketAddr) -> Result<(), SudonetError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| SudonetError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        self.serve(listener).await
    }

    /// Serves on an already-bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), SudonetError> {
        info!("HTTP interface listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .await
            .map_err(|e| SudonetError::Connection(format!("HTTP server error: {}", e)))
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

async fn solve(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request: SolveRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("Invalid request: {}", e)),
    };

    let started = Instant::now();
    let max = state.max_candidates;
    let generated = tokio::task::spawn_blocking(move || generate_candidates(&request.sudoku, max)).await;

    let candidates = match generated {
        Ok(Ok(candidates)) => candidates,
        Ok(Err(e @ SudonetError::TooManyCandidates { .. })) => {
            return error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
        Ok(Err(e)) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    match state.node.solve(candidates).await {
        Ok(JobOutcome::Solved { index, solution }) => {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            info!("Solved puzzle in {}ms (candidate {})", elapsed_ms, index);
            Json(SolveResponse {
                solution,
                index,
                elapsed_ms,
            })
            .into_response()
        }
        Ok(JobOutcome::Exhausted) => error_response(StatusCode::NOT_FOUND, "No valid solution exists"),
        Err(e) => {
            warn!("Search failed: {}", e);
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

async fn stats(State(state): State<Arc<AppState>>) -> Response {
    match state.node.stats().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

async fn network(State(state): State<Arc<AppState>>) -> Response {
    match state.node.network().await {
        Ok(network) => Json(network).into_response(),
        Err(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
