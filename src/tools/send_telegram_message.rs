//! `send_telegram_message`: the blocking tool. When `requires_user_response`
//! is set, dispatching it short-circuits the rest of the current batch and
//! the driver yields control back to the transport instead of continuing
//! the loop (spec.md §4.4's blocking-tool rule).
//!
//! There is no real transport in this crate (SPEC_FULL.md §0 — `main.rs`
//! drives the loop against stdin lines standing in for it), so this is a
//! stand-in: it records sent messages in-memory for test observability
//! instead of calling out to a bot API.

use std::sync::{Arc, Mutex};

use serde_json::json;

use crate::llm::ToolCall;

use super::{BoxFuture, ContextParam, ToolHandler};

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub chat_id: i64,
    pub text: String,
    pub requires_user_response: bool,
}

pub struct SendTelegramMessageTool {
    sent: Arc<Mutex<Vec<SentMessage>>>,
}

impl SendTelegramMessageTool {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared handle for tests/observers to inspect what was "sent".
    pub fn sent_log(&self) -> Arc<Mutex<Vec<SentMessage>>> {
        self.sent.clone()
    }
}

impl Default for SendTelegramMessageTool {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolHandler for SendTelegramMessageTool {
    fn name(&self) -> &str {
        "send_telegram_message"
    }

    fn brief(&self) -> &str {
        "Send a message to the chat, optionally pausing the loop for a user reply."
    }

    fn full_description(&self) -> String {
        "Send a message to the current chat. Set requires_user_response to true when \
         the message asks the user a question or otherwise needs their input before \
         the agent can continue; doing so ends the current turn immediately after \
         this call, even if other tool calls were requested alongside it."
            .to_string()
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The message text to send."
                },
                "requires_user_response": {
                    "type": "boolean",
                    "description": "Whether the agent must wait for the user to reply before continuing.",
                    "default": false
                },
                "chat_id": {
                    "type": "integer",
                    "description": "Destination chat. Defaults to the chat this request came from."
                }
            },
            "required": ["text"]
        })
    }

    fn context_params(&self) -> Vec<ContextParam> {
        vec![ContextParam::ChatId]
    }

    fn is_blocking(&self, args: &serde_json::Value) -> bool {
        args.get("requires_user_response")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    fn execute<'a>(&'a self, call: &'a ToolCall) -> BoxFuture<'a, Result<String, String>> {
        Box::pin(async move {
            let text = call
                .arguments
                .get("text")
                .and_then(|v| v.as_str())
                .ok_or_else(|| "missing 'text' argument".to_string())?
                .to_string();
            let chat_id = call
                .arguments
                .get("chat_id")
                .and_then(|v| v.as_i64())
                .ok_or_else(|| "missing 'chat_id' argument".to_string())?;
            let requires_user_response = call
                .arguments
                .get("requires_user_response")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);

            self.sent.lock().unwrap().push(SentMessage {
                chat_id,
                text: text.clone(),
                requires_user_response,
            });

            Ok(format!("sent to chat {chat_id}: {text}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_send_records_message() {
        let tool = SendTelegramMessageTool::new();
        let log = tool.sent_log();
        let call = ToolCall {
            id: "1".to_string(),
            name: "send_telegram_message".to_string(),
            arguments: json!({"text": "hi", "chat_id": 42}),
        };
        tool.execute(&call).await.unwrap();
        assert_eq!(log.lock().unwrap().len(), 1);
        assert_eq!(log.lock().unwrap()[0].text, "hi");
    }

    #[test]
    fn test_is_blocking_follows_requires_user_response() {
        let tool = SendTelegramMessageTool::new();
        assert!(!tool.is_blocking(&json!({"text": "hi"})));
        assert!(tool.is_blocking(&json!({"text": "hi", "requires_user_response": true})));
    }
}
