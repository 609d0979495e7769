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

//! In-process mock downstream tool service for integration tests.

#![allow(dead_code)]

use agentgate_core::{
    CallToolParams, JsonRpcError, JsonRpcResponse, JsonRpcRequest, MCP_PROTOCOL_VERSION,
    SESSION_HEADER,
};
use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Scripted behavior for one tool.
pub enum MockReply {
    /// Fixed single-text result.
    Text(String),
    /// Raw content array, for exercising heterogeneous shapes.
    Content(Value),
    /// Delay before answering.
    Sleep(Duration),
    /// RPC error while the counter is positive, then a fixed success.
    FailTimes {
        remaining: Arc<AtomicUsize>,
        message: String,
    },
}

#[derive(Clone)]
pub struct MockService {
    tools: Arc<Vec<Value>>,
    replies: Arc<HashMap<String, MockReply>>,
    sse: bool,
    pub calls: Arc<AtomicUsize>,
    pub sessions: Arc<AtomicUsize>,
}

/// Builder for a mock service with scripted tools.
pub struct ServiceBuilder {
    tools: Vec<Value>,
    replies: HashMap<String, MockReply>,
    sse: bool,
}

/// A running mock service.
pub struct MockHandle {
    pub endpoint: String,
    pub calls: Arc<AtomicUsize>,
    pub sessions: Arc<AtomicUsize>,
}

pub fn tool_json(name: &str) -> Value {
    json!({
        "name": name,
        "description": format!("{} tool", name),
        "inputSchema": {
            "type": "object",
            "title": "Arguments",
            "properties": {}
        }
    })
}

impl ServiceBuilder {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            replies: HashMap::new(),
            sse: false,
        }
    }

    /// Frame every response as an event-stream payload.
    pub fn sse(mut self) -> Self {
        self.sse = true;
        self
    }

    pub fn tool(mut self, name: &str, reply: MockReply) -> Self {
        self.tools.push(tool_json(name));
        self.replies.insert(name.to_string(), reply);
        self
    }

    pub async fn spawn(self) -> MockHandle {
        let service = MockService {
            tools: Arc::new(self.tools),
            replies: Arc::new(self.replies),
            sse: self.sse,
            calls: Arc::new(AtomicUsize::new(0)),
            sessions: Arc::new(AtomicUsize::new(0)),
        };
        let calls = service.calls.clone();
        let sessions = service.sessions.clone();

        let app = Router::new()
            .route(
                "/mcp",
                post(handle_rpc).delete(|| async { StatusCode::NO_CONTENT }),
            )
            .with_state(service);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockHandle {
            endpoint: format!("http://{}/mcp", addr),
            calls,
            sessions,
        }
    }
}

async fn handle_rpc(State(service): State<MockService>, body: String) -> Response {
    let request: JsonRpcRequest = serde_json::from_str(&body).unwrap();
    if request.is_notification() {
        return StatusCode::ACCEPTED.into_response();
    }
    let id = request.id.clone().unwrap();

    let (result, session) = match request.method.as_str() {
        "initialize" => {
            service.sessions.fetch_add(1, Ordering::SeqCst);
            let result = json!({
                "protocolVersion": MCP_PROTOCOL_VERSION,
                "capabilities": {"tools": {"listChanged": false}},
                "serverInfo": {"name": "mock-service", "version": "0.0.1"}
            });
            (result, Some(Uuid::new_v4().to_string()))
        }
        "tools/list" => (json!({"tools": service.tools.as_ref()}), None),
        "tools/call" => {
            service.calls.fetch_add(1, Ordering::SeqCst);
            let params: CallToolParams =
                serde_json::from_value(request.params.clone().unwrap()).unwrap();
            match service.replies.get(&params.name) {
                Some(MockReply::Text(text)) => {
                    (json!({"content": [{"type": "text", "text": text}]}), None)
                }
                Some(MockReply::Content(content)) => (json!({"content": content}), None),
                Some(MockReply::Sleep(duration)) => {
                    tokio::time::sleep(*duration).await;
                    (json!({"content": [{"type": "text", "text": "late"}]}), None)
                }
                Some(MockReply::FailTimes { remaining, message }) => {
                    let failing = remaining
                        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                        .is_ok();
                    if failing {
                        let response = JsonRpcResponse::error(
                            id,
                            JsonRpcError::internal_error(message.clone()),
                        );
                        return respond(service.sse, response, None);
                    }
                    (json!({"content": [{"type": "text", "text": "recovered"}]}), None)
                }
                None => {
                    let response = JsonRpcResponse::error(
                        id,
                        JsonRpcError::internal_error(format!("unknown tool: {}", params.name)),
                    );
                    return respond(service.sse, response, None);
                }
            }
        }
        _ => {
            let response =
                JsonRpcResponse::error(id, JsonRpcError::method_not_found(&request.method));
            return respond(service.sse, response, None);
        }
    };

    respond(service.sse, JsonRpcResponse::success(id, result), session)
}

fn respond(sse: bool, response: JsonRpcResponse, session: Option<String>) -> Response {
    let mut http = if sse {
        let payload = serde_json::to_string(&response).unwrap();
        (
            [(header::CONTENT_TYPE, "text/event-stream")],
            format!("event: message\ndata: {}\n\n", payload),
        )
            .into_response()
    } else {
        Json(response).into_response()
    };
    if let Some(session) = session {
        http.headers_mut().insert(
            HeaderName::from_static(SESSION_HEADER),
            HeaderValue::from_str(&session).unwrap(),
        );
    }
    http
}
