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

//! Gateway RPC request handlers
//!
//! JSON-RPC 2.0 method dispatch for the gateway's own MCP surface.

use crate::invoker::ToolInvoker;
use crate::router::ToolRouter;
use agentgate_core::{
    CallToolParams, CallToolResult, InitializeResult, JsonRpcError, JsonRpcId, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, ServerCapabilities, ServerInfo, ToolsCapability,
    MCP_PROTOCOL_VERSION,
};
use dashmap::DashMap;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Gateway request handler. Issues session ids on `initialize` and
/// dispatches tool operations through the router/invoker pair.
pub struct GatewayMcpHandler {
    router: Arc<ToolRouter>,
    invoker: Arc<ToolInvoker>,
    sessions: DashMap<String, ()>,
}

impl GatewayMcpHandler {
    pub fn new(router: Arc<ToolRouter>, invoker: Arc<ToolInvoker>) -> Self {
        Self {
            router,
            invoker,
            sessions: DashMap::new(),
        }
    }

    /// Number of sessions issued since startup.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Handle a JSON-RPC request. The second element is a freshly issued
    /// session id to attach as a response header, when applicable.
    pub async fn handle_request(
        &self,
        request: JsonRpcRequest,
    ) -> (JsonRpcResponse, Option<String>) {
        let id = request.id.clone().unwrap_or(JsonRpcId::Null);
        info!(method = %request.method, "gateway RPC request");

        match request.method.as_str() {
            "ping" => (JsonRpcResponse::success(id, json!({})), None),
            "initialize" => self.handle_initialize(id),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => (self.handle_tools_call(id, request.params).await, None),
            _ => {
                warn!(method = %request.method, "unknown RPC method");
                (
                    JsonRpcResponse::error(id, JsonRpcError::method_not_found(&request.method)),
                    None,
                )
            }
        }
    }

    fn handle_initialize(&self, id: JsonRpcId) -> (JsonRpcResponse, Option<String>) {
        let session = Uuid::new_v4().to_string();
        self.sessions.insert(session.clone(), ());

        let result = InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: ServerInfo {
                name: "agentgate".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        (
            JsonRpcResponse::success(id, serde_json::to_value(result).unwrap_or_default()),
            Some(session),
        )
    }

    fn handle_tools_list(&self, id: JsonRpcId) -> (JsonRpcResponse, Option<String>) {
        let result = ListToolsResult {
            tools: self.router.tools(),
            next_cursor: None,
        };
        (
            JsonRpcResponse::success(id, serde_json::to_value(result).unwrap_or_default()),
            None,
        )
    }

    async fn handle_tools_call(
        &self,
        id: JsonRpcId,
        params: Option<serde_json::Value>,
    ) -> JsonRpcResponse {
        let params: CallToolParams = match params {
            Some(params) => match serde_json::from_value(params) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(
                        id,
                        JsonRpcError::invalid_params(format!("Invalid call params: {}", e)),
                    )
                }
            },
            None => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params("Missing call params"),
                )
            }
        };

        // Invoker failures become error-flagged tool results, not protocol
        // errors; the caller always gets a consumable reply.
        let result = match self.invoker.invoke(&params.name, params.arguments).await {
            Ok(text) => CallToolResult::text(text),
            Err(e) => CallToolResult::error(format!("Error: {}", e)),
        };

        JsonRpcResponse::success(id, serde_json::to_value(result).unwrap_or_default())
    }
}
