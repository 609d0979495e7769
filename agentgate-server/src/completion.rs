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

//! Completion Stream backend
//!
//! Abstraction over a streaming chat-completions API. One round is one
//! call to `stream`: the returned channel yields text deltas and partial
//! tool-call fragments, and closes when the round ends.

use crate::config::CompletionConfig;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// One conversation message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain("system", content)
    }

    pub fn plain(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    /// Assistant message carrying a finalized tool-call batch.
    pub fn assistant_with_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: "assistant".to_string(),
            content,
            tool_call_id: None,
            tool_calls: Some(tool_calls),
        }
    }

    /// Tool result message keyed by its call id.
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_call_id: Some(call_id.into()),
            tool_calls: None,
        }
    }
}

/// A finalized tool call as the completion API represents it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Raw JSON string, parsed only once the round completes.
    pub arguments: String,
}

/// One streamed event within a round.
#[derive(Debug, Clone)]
pub enum CompletionEvent {
    TextDelta(String),
    /// Index-addressed partial tool call; any field may arrive alone.
    ToolCallFragment {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    },
}

/// A streaming completion backend. Channel closure signals end-of-round.
#[async_trait]
pub trait CompletionStream: Send + Sync {
    async fn stream(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<Value>,
    ) -> anyhow::Result<mpsc::Receiver<CompletionEvent>>;
}

/// OpenAI-compatible chat-completions backend.
pub struct OpenAiCompletion {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiCompletion {
    pub fn new(config: &CompletionConfig) -> anyhow::Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("completion API key not configured"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl CompletionStream for OpenAiCompletion {
    async fn stream(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<Value>,
    ) -> anyhow::Result<mpsc::Receiver<CompletionEvent>> {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
        });
        if !tools.is_empty() {
            body["tools"] = json!(tools);
            body["tool_choice"] = json!("auto");
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("completion request failed with HTTP {}", status.as_u16());
        }

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = stream.next().await {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!(error = %e, "completion stream interrupted");
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim().to_string();
                    buffer.drain(..=newline);

                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    if data == "[DONE]" {
                        return;
                    }
                    let Ok(chunk) = serde_json::from_str::<Value>(data) else {
                        debug!("skipping unparseable stream frame");
                        continue;
                    };
                    for event in delta_events(&chunk) {
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Ok(rx)
    }
}

/// Events carried by one streamed chunk's delta.
fn delta_events(chunk: &Value) -> Vec<CompletionEvent> {
    let mut events = Vec::new();
    let delta = &chunk["choices"][0]["delta"];

    if let Some(text) = delta["content"].as_str() {
        if !text.is_empty() {
            events.push(CompletionEvent::TextDelta(text.to_string()));
        }
    }

    if let Some(calls) = delta["tool_calls"].as_array() {
        for call in calls {
            let index = call["index"].as_u64().unwrap_or(0) as usize;
            events.push(CompletionEvent::ToolCallFragment {
                index,
                id: call["id"].as_str().map(str::to_string),
                name: call["function"]["name"].as_str().map(str::to_string),
                arguments: call["function"]["arguments"].as_str().map(str::to_string),
            });
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_events_text() {
        let chunk = json!({
            "choices": [{"delta": {"content": "Hello"}}]
        });
        let events = delta_events(&chunk);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], CompletionEvent::TextDelta(t) if t == "Hello"));
    }

    #[test]
    fn test_delta_events_tool_call_fragments() {
        let chunk = json!({
            "choices": [{"delta": {"tool_calls": [
                {"index": 0, "id": "call_1", "function": {"name": "get_leave_balance"}},
                {"index": 0, "function": {"arguments": "{\"employee"}}
            ]}}]
        });
        let events = delta_events(&chunk);
        assert_eq!(events.len(), 2);
        match &events[0] {
            CompletionEvent::ToolCallFragment { index, id, name, .. } => {
                assert_eq!(*index, 0);
                assert_eq!(id.as_deref(), Some("call_1"));
                assert_eq!(name.as_deref(), Some("get_leave_balance"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        match &events[1] {
            CompletionEvent::ToolCallFragment { arguments, .. } => {
                assert_eq!(arguments.as_deref(), Some("{\"employee"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_delta_events_empty_delta() {
        let chunk = json!({"choices": [{"delta": {}, "finish_reason": "stop"}]});
        assert!(delta_events(&chunk).is_empty());
    }

    #[test]
    fn test_message_serialization_skips_absent_fields() {
        let message = ChatMessage::plain("user", "hi");
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value, json!({"role": "user", "content": "hi"}));

        let tool = ChatMessage::tool_result("call_1", "42");
        let value = serde_json::to_value(&tool).unwrap();
        assert_eq!(
            value,
            json!({"role": "tool", "content": "42", "tool_call_id": "call_1"})
        );
    }
}
