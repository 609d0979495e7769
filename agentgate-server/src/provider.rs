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

//! Tool Provider client
//!
//! The downstream side of the gateway: each tool-provider service is an
//! MCP server reachable over streamable HTTP. `HttpToolProvider` speaks
//! JSON-RPC POSTs with session-header continuity and accepts both plain
//! JSON and event-stream response bodies.

use agentgate_core::{
    extract_rpc_json, CallToolResult, ClientCapabilities, ClientInfo, InitializeParams,
    JsonRpcId, JsonRpcRequest, JsonRpcResponse, ListToolsResult, Tool, MCP_PROTOCOL_VERSION,
    SESSION_HEADER,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;
use tracing::{debug, warn};

/// Provider-level errors.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned HTTP {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("RPC error {code}: {message}")]
    Rpc { code: i32, message: String },
}

/// A downstream service exposing discoverable, invocable named operations.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<Tool>, ProviderError>;
    async fn call_tool(
        &self,
        name: &str,
        arguments: HashMap<String, serde_json::Value>,
    ) -> Result<CallToolResult, ProviderError>;
}

/// Streamable-HTTP MCP client for one downstream service.
pub struct HttpToolProvider {
    client: reqwest::Client,
    endpoint: String,
    session_id: Mutex<Option<String>>,
    next_id: AtomicI64,
}

impl HttpToolProvider {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            session_id: Mutex::new(None),
            next_id: AtomicI64::new(1),
        }
    }

    /// The captured session token, present once the handshake succeeded.
    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().clone()
    }

    /// Perform the provider handshake: `initialize` followed by the
    /// `notifications/initialized` notification.
    pub async fn initialize(&self) -> Result<(), ProviderError> {
        let params = InitializeParams {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: ClientInfo {
                name: "agentgate".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };
        self.rpc_call("initialize", Some(serde_json::to_value(params).unwrap_or_default()))
            .await?;
        self.notify("notifications/initialized").await?;
        Ok(())
    }

    /// Release the session: best-effort HTTP DELETE with the session header.
    pub async fn shutdown(&self) {
        let Some(session) = self.session_id.lock().take() else {
            return;
        };
        let result = self
            .client
            .delete(&self.endpoint)
            .header(SESSION_HEADER, session.as_str())
            .send()
            .await;
        if let Err(e) = result {
            debug!(endpoint = %self.endpoint, error = %e, "session release failed");
        }
    }

    async fn notify(&self, method: &str) -> Result<(), ProviderError> {
        let request = JsonRpcRequest::notification(method, None);
        let response = self.post(&request).await?;
        let status = response.status();
        // 202 is the accepted-notification status; any 2xx is fine.
        if !status.is_success() && status.as_u16() != 202 {
            return Err(ProviderError::Status(status.as_u16()));
        }
        Ok(())
    }

    async fn rpc_call(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(JsonRpcId::Number(id), method, params);

        let response = self.post(&request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let value = extract_rpc_json(&body)
            .ok_or_else(|| ProviderError::Malformed(format!("unparseable body: {:.200}", body)))?;
        let parsed: JsonRpcResponse = serde_json::from_value(value)
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        if let Some(error) = parsed.error {
            return Err(ProviderError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        parsed
            .result
            .ok_or_else(|| ProviderError::Malformed("response carries neither result nor error".to_string()))
    }

    async fn post(&self, request: &JsonRpcRequest) -> Result<reqwest::Response, ProviderError> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json, text/event-stream")
            .json(request);
        if let Some(session) = self.session_id.lock().clone() {
            builder = builder.header(SESSION_HEADER, session);
        }

        let response = builder.send().await?;

        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            *self.session_id.lock() = Some(session.to_string());
        }
        Ok(response)
    }
}

#[async_trait]
impl ToolProvider for HttpToolProvider {
    async fn list_tools(&self) -> Result<Vec<Tool>, ProviderError> {
        let result = self.rpc_call("tools/list", None).await?;
        let listed: ListToolsResult = serde_json::from_value(result)
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        Ok(listed.tools)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: HashMap<String, serde_json::Value>,
    ) -> Result<CallToolResult, ProviderError> {
        let params = json!({ "name": name, "arguments": arguments });
        let result = self.rpc_call("tools/call", Some(params)).await?;
        match serde_json::from_value(result) {
            Ok(parsed) => Ok(parsed),
            Err(e) => {
                warn!(tool = name, error = %e, "unparseable tool result");
                Err(ProviderError::Malformed(e.to_string()))
            }
        }
    }
}
