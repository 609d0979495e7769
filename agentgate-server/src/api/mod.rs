// Copyright 2025 Agentgate Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! HTTP API surface: shared state, error mapping, and the chat/health
//! endpoints for the desktop frontend.

pub mod chat;
pub mod health;

pub use chat::chat_endpoint;
pub use health::health_check;

use crate::chat::ChatOrchestrator;
use crate::connection::ConnectionManager;
use crate::invoker::ToolInvoker;
use crate::mcp::GatewayMcpHandler;
use crate::router::ToolRouter;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ConnectionManager>,
    pub router: Arc<ToolRouter>,
    pub invoker: Arc<ToolInvoker>,
    /// Absent when no completion API key is configured.
    pub orchestrator: Option<Arc<ChatOrchestrator>>,
    pub mcp: Arc<GatewayMcpHandler>,
}

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}
