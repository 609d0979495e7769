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

//! Tool Invoker
//!
//! Executes a single tool call against the routed service with a hard
//! timeout, at most two sequential attempts, and output sanitization.
//! Call-level failures surface as user-facing text, never as faults.

use crate::config::InvokerConfig;
use crate::connection::ConnectionManager;
use crate::provider::ToolProvider;
use crate::router::ToolRouter;
use agentgate_core::CallToolResult;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Marker appended to lossy (truncated) results.
pub const TRUNCATION_MARKER: &str = "\n...[truncated]...";

/// Placeholder for tool results with no extractable text.
pub const NO_CONTENT_PLACEHOLDER: &str = "[No content returned by tool]";

/// Invocation errors that are not representable as a tool result.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("Tool {0} not found")]
    ToolNotFound(String),
    #[error("Failed to execute {0}")]
    Exhausted(String),
}

pub struct ToolInvoker {
    manager: Arc<ConnectionManager>,
    router: Arc<ToolRouter>,
    config: InvokerConfig,
}

impl ToolInvoker {
    pub fn new(
        manager: Arc<ConnectionManager>,
        router: Arc<ToolRouter>,
        config: InvokerConfig,
    ) -> Self {
        Self {
            manager,
            router,
            config,
        }
    }

    /// Execute a tool on the appropriate downstream service.
    ///
    /// Timeouts and call failures come back as `Ok` text the caller can
    /// show verbatim; only an unroutable tool or two exhausted attempts
    /// produce an error.
    pub async fn invoke(
        &self,
        tool: &str,
        arguments: HashMap<String, serde_json::Value>,
    ) -> Result<String, InvokeError> {
        let service = match self.router.route(tool) {
            Some(service) => service,
            None => {
                // One rediscovery pass before concluding the tool is gone.
                self.manager.refresh_all().await;
                self.router
                    .route(tool)
                    .ok_or_else(|| InvokeError::ToolNotFound(tool.to_string()))?
            }
        };

        debug!(tool, service = %service, "executing tool");

        for attempt in 0..2 {
            let Some(provider) = self.manager.get(&service).await else {
                // Stale record; clear it and try once more.
                self.manager.disconnect(&service).await;
                continue;
            };

            let call = provider.call_tool(tool, arguments.clone());
            match tokio::time::timeout(self.config.call_timeout(), call).await {
                Err(_) => {
                    // A slow call does not imply a broken transport; the
                    // connection stays up and only this call is abandoned.
                    warn!(tool, service = %service, "tool call timed out");
                    return Ok(format!("Error: {} timed out", tool));
                }
                Ok(Ok(result)) => {
                    let combined = render_result(&result, self.config.max_output_chars);
                    debug!(tool, chars = combined.len(), "tool call returned");
                    return Ok(combined);
                }
                Ok(Err(e)) => {
                    warn!(tool, service = %service, error = %e, "tool call failed");
                    if attempt == 0 && e.to_string().to_lowercase().contains("connection") {
                        self.manager.disconnect(&service).await;
                        continue;
                    }
                    return Ok(format!("Error: {}", e));
                }
            }
        }

        Err(InvokeError::Exhausted(tool.to_string()))
    }
}

/// Flatten heterogeneous content into one text block: text-bearing items
/// joined by blank lines, truncated at `max_chars` with an explicit
/// marker, or the fixed placeholder when nothing yields text.
fn render_result(result: &CallToolResult, max_chars: usize) -> String {
    let texts: Vec<&str> = result.content.iter().filter_map(|c| c.text()).collect();
    if texts.is_empty() {
        return NO_CONTENT_PLACEHOLDER.to_string();
    }

    let mut combined = texts.join("\n\n");
    if combined.len() > max_chars {
        let mut cut = max_chars;
        while !combined.is_char_boundary(cut) {
            cut -= 1;
        }
        combined.truncate(cut);
        combined.push_str(TRUNCATION_MARKER);
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentgate_core::{CallToolResult, ToolContent};
    use serde_json::json;

    #[test]
    fn test_render_joins_text_items() {
        let result = CallToolResult {
            content: vec![
                ToolContent::from_text("first"),
                ToolContent::Unrecognized(json!({"type": "image", "data": "aGk="})),
                ToolContent::from_text("second"),
            ],
            is_error: None,
        };
        assert_eq!(render_result(&result, 4000), "first\n\nsecond");
    }

    #[test]
    fn test_render_empty_content_placeholder() {
        let result = CallToolResult {
            content: vec![ToolContent::Unrecognized(json!({"type": "image"}))],
            is_error: None,
        };
        assert_eq!(render_result(&result, 4000), NO_CONTENT_PLACEHOLDER);

        let empty = CallToolResult {
            content: vec![],
            is_error: None,
        };
        assert_eq!(render_result(&empty, 4000), NO_CONTENT_PLACEHOLDER);
    }

    #[test]
    fn test_render_truncates_with_marker() {
        let result = CallToolResult::text("x".repeat(5000));
        let rendered = render_result(&result, 4000);
        assert_eq!(rendered.len(), 4000 + TRUNCATION_MARKER.len());
        assert!(rendered.starts_with(&"x".repeat(4000)));
        assert!(rendered.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_render_exact_limit_untouched() {
        let result = CallToolResult::text("x".repeat(4000));
        let rendered = render_result(&result, 4000);
        assert_eq!(rendered.len(), 4000);
        assert!(!rendered.contains("[truncated]"));
    }

    #[test]
    fn test_render_truncation_respects_char_boundaries() {
        // 3-byte characters straddling the cut point must not panic.
        let result = CallToolResult::text("日".repeat(200));
        let rendered = render_result(&result, 100);
        assert!(rendered.ends_with(TRUNCATION_MARKER));
    }
}
