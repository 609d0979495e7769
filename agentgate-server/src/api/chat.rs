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

use crate::api::{ApiError, AppState};
use crate::completion::ChatMessage;
use axum::{
    body::Body,
    extract::State,
    http::header,
    response::Response,
    Json,
};
use serde::Deserialize;
use std::convert::Infallible;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<IncomingMessage>,
}

#[derive(Deserialize)]
pub struct IncomingMessage {
    pub role: String,
    pub content: String,
}

/// POST /chat - streamed plain-text answer for the frontend.
///
/// Tool-call activity stays internal; the body is the concatenated text
/// deltas of the orchestration loop.
pub async fn chat_endpoint(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let orchestrator = state
        .orchestrator
        .as_ref()
        .ok_or_else(|| ApiError::Internal("completion backend not configured".to_string()))?;

    if request.messages.is_empty() {
        return Err(ApiError::BadRequest("messages must not be empty".to_string()));
    }

    let conversation: Vec<ChatMessage> = request
        .messages
        .into_iter()
        .map(|m| ChatMessage::plain(m.role, m.content))
        .collect();

    let deltas = orchestrator.run(conversation);
    let stream =
        ReceiverStream::new(deltas).map(|delta| Ok::<_, Infallible>(bytes::Bytes::from(delta)));

    Response::builder()
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::Internal(e.to_string()))
}
