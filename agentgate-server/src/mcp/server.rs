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

//! Axum endpoint for the gateway RPC surface.

use crate::api::AppState;
use agentgate_core::{JsonRpcError, JsonRpcId, JsonRpcRequest, JsonRpcResponse, SESSION_HEADER};
use axum::{
    extract::State,
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, warn};

/// Handle a JSON-RPC request over HTTP POST.
///
/// Notifications are accepted with 202 and no body; malformed bodies get
/// a parse-error reply with null id; `initialize` responses carry the
/// freshly issued session id in the `Mcp-Session-Id` header.
pub async fn handle_rpc(State(state): State<AppState>, body: String) -> Response {
    let request: JsonRpcRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "malformed RPC body");
            let response = JsonRpcResponse::error(
                JsonRpcId::Null,
                JsonRpcError::parse_error(format!("Invalid JSON: {}", e)),
            );
            return Json(response).into_response();
        }
    };

    if request.is_notification() {
        debug!(method = %request.method, "accepted notification");
        return StatusCode::ACCEPTED.into_response();
    }

    let (response, session) = state.mcp.handle_request(request).await;
    let mut http_response = Json(response).into_response();
    if let Some(session) = session {
        if let Ok(value) = HeaderValue::from_str(&session) {
            http_response
                .headers_mut()
                .insert(HeaderName::from_static(SESSION_HEADER), value);
        }
    }
    http_response
}
