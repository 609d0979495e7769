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

//! Protocol Types
//!
//! JSON-RPC 2.0 message types plus the MCP tool vocabulary used on both
//! sides of the gateway.
//! Reference: https://modelcontextprotocol.io/specification

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// JSON-RPC 2.0 protocol version
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol version
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Header carrying the opaque session token across requests.
/// Case-insensitive on the wire; kept lowercase for axum header names.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Method namespace whose requests never receive a reply.
pub const NOTIFICATION_PREFIX: &str = "notifications/";

/// True if `method` lives in the notification namespace.
pub fn is_notification_method(method: &str) -> bool {
    method.starts_with(NOTIFICATION_PREFIX)
}

// =============================================================================
// Core JSON-RPC 2.0 Types
// =============================================================================

/// JSON-RPC 2.0 Request. Notifications carry no id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<JsonRpcId>,
}

impl JsonRpcRequest {
    /// Create a request expecting a reply.
    pub fn new(id: JsonRpcId, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: Some(id),
        }
    }

    /// Create a notification (no id, no reply expected).
    pub fn notification(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: None,
        }
    }

    /// True when no reply should be produced: either the method is in the
    /// notification namespace or the request carries no id.
    pub fn is_notification(&self) -> bool {
        self.id.is_none() || is_notification_method(&self.method)
    }
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: JsonRpcId,
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: JsonRpcId, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response
    pub fn error(id: JsonRpcId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

/// JSON-RPC 2.0 ID (can be string, number, or null)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum JsonRpcId {
    String(String),
    Number(i64),
    Null,
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    /// Parse error (-32700)
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self {
            code: -32700,
            message: message.into(),
            data: None,
        }
    }

    /// Invalid request (-32600)
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
            data: None,
        }
    }

    /// Method not found (-32601)
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {}", method),
            data: None,
        }
    }

    /// Invalid params (-32602)
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
            data: None,
        }
    }

    /// Internal error (-32603)
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            code: -32603,
            message: message.into(),
            data: None,
        }
    }
}

// =============================================================================
// Response body extraction
// =============================================================================

/// Extract the JSON-RPC document from a streamable-HTTP response body.
///
/// Upstreams reply either with a plain JSON document or with an
/// event-stream payload (`event: message\ndata: {...}`). The `data: `
/// prefixed form is attempted first, then direct parsing.
pub fn extract_rpc_json(body: &str) -> Option<serde_json::Value> {
    for line in body.lines() {
        if let Some(data) = line.strip_prefix("data: ") {
            if let Ok(value) = serde_json::from_str(data) {
                return Some(value);
            }
        }
    }
    serde_json::from_str(body).ok()
}

// =============================================================================
// Initialization Types
// =============================================================================

/// Initialize request params
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeParams {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: ClientCapabilities,
    #[serde(rename = "clientInfo")]
    pub client_info: ClientInfo,
}

/// Client capabilities (none advertised by the gateway's own client)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientCapabilities {}

/// Client info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

/// Initialize result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

/// Server capabilities advertised during initialization
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolsCapability {
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Server info returned during initialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

// =============================================================================
// Tool Types
// =============================================================================

/// MCP Tool - an action that can be executed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Unique name for the tool
    pub name: String,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for tool parameters
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// List tools result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<Tool>,
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Call tool params
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: HashMap<String, serde_json::Value>,
}

/// One item of tool output. Downstream services return heterogeneous
/// shapes: a typed text object (`{"type": "text", "text": ...}`), a bare
/// mapping with a `text` key, or something else entirely. The distinction
/// is resolved once at deserialization; anything without extractable text
/// lands in `Unrecognized` and is dropped by callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolContent {
    Text(TextContent),
    Unrecognized(serde_json::Value),
}

/// Text content item. The `type` tag is optional on input (bare
/// `{"text": ...}` mappings are accepted) but always written on output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    #[serde(rename = "type", default = "text_content_type")]
    pub kind: String,
    pub text: String,
}

fn text_content_type() -> String {
    "text".to_string()
}

impl ToolContent {
    /// Extractable text, if this item carries any.
    pub fn text(&self) -> Option<&str> {
        match self {
            ToolContent::Text(content) => Some(&content.text),
            ToolContent::Unrecognized(_) => None,
        }
    }

    /// Build a typed text item.
    pub fn from_text(text: impl Into<String>) -> Self {
        ToolContent::Text(TextContent {
            kind: text_content_type(),
            text: text.into(),
        })
    }
}

/// Call tool result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl CallToolResult {
    /// Single-text success result.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::from_text(text)],
            is_error: None,
        }
    }

    /// Single-text error result.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::from_text(text)],
            is_error: Some(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_id_shapes() {
        let string_id: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"ping","id":"abc"}"#).unwrap();
        assert_eq!(string_id.id, Some(JsonRpcId::String("abc".to_string())));

        let number_id: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"ping","id":7}"#).unwrap();
        assert_eq!(number_id.id, Some(JsonRpcId::Number(7)));

        let no_id: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"ping"}"#).unwrap();
        assert!(no_id.is_notification());
    }

    #[test]
    fn test_notification_detection() {
        let request = JsonRpcRequest::new(
            JsonRpcId::Number(1),
            "notifications/initialized",
            None,
        );
        assert!(request.is_notification());
        assert!(is_notification_method("notifications/cancelled"));
        assert!(!is_notification_method("tools/call"));
    }

    #[test]
    fn test_notification_serializes_without_id() {
        let notification = JsonRpcRequest::notification("notifications/initialized", None);
        let text = serde_json::to_string(&notification).unwrap();
        assert!(!text.contains("\"id\""));
    }

    #[test]
    fn test_extract_rpc_json_event_stream() {
        let body = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"result\":{\"ok\":true},\"id\":1}\n";
        let value = extract_rpc_json(body).unwrap();
        assert_eq!(value["result"]["ok"], json!(true));
    }

    #[test]
    fn test_extract_rpc_json_plain() {
        let body = r#"{"jsonrpc":"2.0","result":{"ok":true},"id":1}"#;
        let value = extract_rpc_json(body).unwrap();
        assert_eq!(value["result"]["ok"], json!(true));
    }

    #[test]
    fn test_extract_rpc_json_equivalence() {
        let plain = r#"{"jsonrpc":"2.0","result":{"tools":[]},"id":3}"#;
        let framed = format!("event: message\ndata: {}\n", plain);
        assert_eq!(
            extract_rpc_json(plain).unwrap(),
            extract_rpc_json(&framed).unwrap()
        );
    }

    #[test]
    fn test_extract_rpc_json_garbage() {
        assert!(extract_rpc_json("not json at all").is_none());
    }

    #[test]
    fn test_tool_content_shapes() {
        let typed: ToolContent =
            serde_json::from_value(json!({"type": "text", "text": "hello"})).unwrap();
        assert_eq!(typed.text(), Some("hello"));

        let mapping: ToolContent = serde_json::from_value(json!({"text": "plain"})).unwrap();
        assert_eq!(mapping.text(), Some("plain"));

        let other: ToolContent =
            serde_json::from_value(json!({"type": "image", "data": "aGk="})).unwrap();
        assert_eq!(other.text(), None);

        let serialized = serde_json::to_value(ToolContent::from_text("hi")).unwrap();
        assert_eq!(serialized, json!({"type": "text", "text": "hi"}));
    }

    #[test]
    fn test_call_tool_params_default_arguments() {
        let params: CallToolParams =
            serde_json::from_value(json!({"name": "get_leave_balance"})).unwrap();
        assert!(params.arguments.is_empty());
    }
}
