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

//! Stdio to streamable-HTTP bridge
//!
//! Runs as a subprocess of a desktop MCP client: reads line-delimited
//! JSON-RPC from an input stream, forwards each request to the gateway's
//! HTTP endpoint, and writes the reply line back. Tracks the session id
//! issued by the upstream and attaches it to subsequent requests.
//!
//! The loop is generic over the reader/writer pair so tests can drive it
//! with in-memory buffers instead of stdin/stdout.

use agentgate_core::{
    extract_rpc_json, is_notification_method, JsonRpcError, JsonRpcId, JsonRpcRequest,
    JsonRpcResponse, SESSION_HEADER,
};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Bridge-level errors, all of which become JSON-RPC error replies.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned HTTP {0}")]
    Status(u16),
    #[error("invalid response from upstream")]
    MalformedResponse,
}

/// HTTP side of the bridge: one client, one upstream URL, one session.
pub struct HttpBridge {
    client: reqwest::Client,
    url: String,
    session_id: Option<String>,
}

impl HttpBridge {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            session_id: None,
        })
    }

    /// The session token captured from the upstream, if any.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Forward one request upstream. `Ok(None)` means the upstream
    /// accepted it with no body (HTTP 202, notifications).
    pub async fn forward(
        &mut self,
        request: &JsonRpcRequest,
    ) -> Result<Option<JsonRpcResponse>, BridgeError> {
        let mut builder = self
            .client
            .post(&self.url)
            .header(reqwest::header::ACCEPT, "application/json, text/event-stream")
            .json(request);
        if let Some(session) = &self.session_id {
            builder = builder.header(SESSION_HEADER, session.as_str());
        }

        let response = builder.send().await?;

        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            debug!(session, "captured session id");
            self.session_id = Some(session.to_string());
        }

        let status = response.status();
        if status.as_u16() == 202 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(BridgeError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let value = extract_rpc_json(&body).ok_or(BridgeError::MalformedResponse)?;
        let parsed = serde_json::from_value(value).map_err(|_| BridgeError::MalformedResponse)?;
        Ok(Some(parsed))
    }
}

/// Main bridge loop: one reply line per request line, nothing for
/// notifications or malformed input, termination on EOF.
pub async fn run_loop<R, W>(bridge: &mut HttpBridge, reader: R, mut writer: W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "skipping malformed inbound line");
                continue;
            }
        };

        // Notifications are forwarded fire-and-forget: the upstream sees
        // them, but no reply line is ever produced.
        if is_notification_method(&request.method) {
            if let Err(e) = bridge.forward(&request).await {
                debug!(method = %request.method, error = %e, "notification forward failed");
            }
            continue;
        }

        let id = request.id.clone().unwrap_or(JsonRpcId::Null);
        let reply = match bridge.forward(&request).await {
            Ok(Some(response)) => response,
            Ok(None) => continue,
            Err(e) => {
                warn!(method = %request.method, error = %e, "request forwarding failed");
                JsonRpcResponse::error(id, JsonRpcError::internal_error(e.to_string()))
            }
        };

        let mut out = serde_json::to_vec(&reply)?;
        out.push(b'\n');
        writer.write_all(&out).await?;
        writer.flush().await?;
    }

    info!("EOF on input, bridge exiting");
    Ok(())
}
