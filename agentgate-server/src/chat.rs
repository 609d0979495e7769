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

//! Chat Orchestrator
//!
//! Drives the bounded streaming tool-call loop: each round streams a
//! completion, forwarding text deltas to the caller while accumulating
//! index-addressed tool-call fragments; finalized calls are dispatched
//! through the invoker and their results fed back into the conversation
//! for the next round.

use crate::completion::{
    ChatMessage, CompletionEvent, CompletionStream, FunctionCall, ToolCall,
};
use crate::invoker::ToolInvoker;
use crate::router::ToolRouter;
use agentgate_core::Tool;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Upper bound on completion rounds per conversation.
pub const MAX_ROUNDS: usize = 5;

/// Instruction prepended when the conversation does not start with one.
pub const SYSTEM_PROMPT: &str = "You are the HR Assistant for this company. You must categorize the user's input and act accordingly:\n\n\
**CATEGORY 1: GREETINGS & SMALL TALK**\n\
- If the user says 'Hi', 'Hello', 'Who are you?', or 'Thanks', reply briefly and politely.\n\n\
**CATEGORY 2: BUSINESS QUESTIONS (LEAVE, LOANS, POLICIES)**\n\
- You are an information retrieval assistant that can also perform tasks through tools.\n\
- Answer ONLY using information returned by the tools.\n\
- If the tool output is empty or irrelevant, state you are unable to answer.";

/// Index-addressed accumulator for one streamed tool call.
#[derive(Debug, Default, Clone)]
struct ToolCallDraft {
    id: String,
    name: String,
    arguments: String,
}

/// Merge one fragment into the drafts, growing the vector as needed.
/// Name and argument chunks append; the id is last-write.
fn apply_fragment(
    drafts: &mut Vec<ToolCallDraft>,
    index: usize,
    id: Option<String>,
    name: Option<String>,
    arguments: Option<String>,
) {
    while drafts.len() <= index {
        drafts.push(ToolCallDraft::default());
    }
    let draft = &mut drafts[index];
    if let Some(id) = id {
        draft.id = id;
    }
    if let Some(name) = name {
        draft.name.push_str(&name);
    }
    if let Some(arguments) = arguments {
        draft.arguments.push_str(&arguments);
    }
}

/// Completion-API tool schema built from the router's descriptors. The
/// non-portable `title` key some schema generators emit is stripped.
pub fn completion_tools(tools: &[Tool]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            let mut schema = tool.input_schema.clone();
            if let Some(map) = schema.as_object_mut() {
                map.remove("title");
            }
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": schema,
                }
            })
        })
        .collect()
}

pub struct ChatOrchestrator {
    router: Arc<ToolRouter>,
    invoker: Arc<ToolInvoker>,
    completion: Arc<dyn CompletionStream>,
}

impl ChatOrchestrator {
    pub fn new(
        router: Arc<ToolRouter>,
        invoker: Arc<ToolInvoker>,
        completion: Arc<dyn CompletionStream>,
    ) -> Self {
        Self {
            router,
            invoker,
            completion,
        }
    }

    /// Run the loop for one conversation. The returned channel yields
    /// text deltas as they stream in and closes when the final answer is
    /// complete (or the round limit is reached).
    pub fn run(&self, conversation: Vec<ChatMessage>) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(64);
        let router = self.router.clone();
        let invoker = self.invoker.clone();
        let completion = self.completion.clone();

        tokio::spawn(async move {
            drive_conversation(router, invoker, completion, conversation, tx).await;
        });

        rx
    }
}

async fn drive_conversation(
    router: Arc<ToolRouter>,
    invoker: Arc<ToolInvoker>,
    completion: Arc<dyn CompletionStream>,
    mut conversation: Vec<ChatMessage>,
    tx: mpsc::Sender<String>,
) {
    if conversation.first().map_or(true, |m| m.role != "system") {
        conversation.insert(0, ChatMessage::system(SYSTEM_PROMPT));
    }

    let tools = completion_tools(&router.tools());

    for round in 0..MAX_ROUNDS {
        let mut events = match completion.stream(conversation.clone(), tools.clone()).await {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "completion request failed");
                let _ = tx.send(format!("Error: {}", e)).await;
                return;
            }
        };

        let mut content = String::new();
        let mut drafts: Vec<ToolCallDraft> = Vec::new();

        while let Some(event) = events.recv().await {
            match event {
                CompletionEvent::TextDelta(text) => {
                    content.push_str(&text);
                    if tx.send(text).await.is_err() {
                        // Consumer went away; stop the whole loop.
                        return;
                    }
                }
                CompletionEvent::ToolCallFragment {
                    index,
                    id,
                    name,
                    arguments,
                } => apply_fragment(&mut drafts, index, id, name, arguments),
            }
        }

        if drafts.is_empty() {
            // No tool calls this round: the streamed text is the answer.
            return;
        }

        debug!(round, calls = drafts.len(), "round requested tool calls");

        let tool_calls: Vec<ToolCall> = drafts
            .iter()
            .map(|draft| ToolCall {
                id: draft.id.clone(),
                kind: "function".to_string(),
                function: FunctionCall {
                    name: draft.name.clone(),
                    arguments: draft.arguments.clone(),
                },
            })
            .collect();
        conversation.push(ChatMessage::assistant_with_calls(
            (!content.is_empty()).then_some(content),
            tool_calls,
        ));

        for draft in &drafts {
            let arguments: HashMap<String, Value> =
                serde_json::from_str(&draft.arguments).unwrap_or_default();

            let result = match invoker.invoke(&draft.name, arguments).await {
                Ok(text) => text,
                Err(e) => format!("Error executing tool {}: {}", draft.name, e),
            };
            conversation.push(ChatMessage::tool_result(draft.id.clone(), result));
        }
    }

    // Round limit reached with tool calls still pending; the last
    // streamed text stands as the answer.
    debug!("chat round limit reached");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_fragment_out_of_order() {
        let mut drafts = Vec::new();
        apply_fragment(&mut drafts, 1, Some("call_2".into()), None, None);
        apply_fragment(&mut drafts, 0, Some("call_1".into()), Some("lookup".into()), None);
        apply_fragment(&mut drafts, 1, None, Some("sea".into()), Some("{\"q\":".into()));
        apply_fragment(&mut drafts, 1, None, Some("rch".into()), Some("\"x\"}".into()));

        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].id, "call_1");
        assert_eq!(drafts[0].name, "lookup");
        assert_eq!(drafts[1].id, "call_2");
        assert_eq!(drafts[1].name, "search");
        assert_eq!(drafts[1].arguments, "{\"q\":\"x\"}");
    }

    #[test]
    fn test_completion_tools_strips_title() {
        let tools = vec![Tool {
            name: "get_leave_balance".to_string(),
            description: Some("Balance lookup".to_string()),
            input_schema: json!({
                "type": "object",
                "title": "GetLeaveBalanceArguments",
                "properties": {"employee_id": {"type": "string"}}
            }),
        }];

        let schema = completion_tools(&tools);
        assert_eq!(schema.len(), 1);
        assert_eq!(schema[0]["type"], "function");
        assert_eq!(schema[0]["function"]["name"], "get_leave_balance");
        assert!(schema[0]["function"]["parameters"].get("title").is_none());
        assert!(schema[0]["function"]["parameters"].get("properties").is_some());
    }
}
