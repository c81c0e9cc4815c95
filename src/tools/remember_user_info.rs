//! `remember_user_info`: thin wrapper over [`crate::store::HistoryStore::upsert_note`].
//!
//! Grounded on `database/crud_ops/notes.py`'s merge semantics, already
//! implemented in `store::upsert_note`; this handler only adapts the
//! dispatcher-facing argument shape onto that call.

use std::sync::Arc;

use serde_json::json;

use crate::llm::ToolCall;
use crate::store::HistoryStore;

use super::{BoxFuture, ContextParam, ToolHandler};

pub struct RememberUserInfoTool {
    store: Arc<HistoryStore>,
}

impl RememberUserInfoTool {
    pub fn new(store: Arc<HistoryStore>) -> Self {
        Self { store }
    }
}

impl ToolHandler for RememberUserInfoTool {
    fn name(&self) -> &str {
        "remember_user_info"
    }

    fn brief(&self) -> &str {
        "Store or update a durable note about a user."
    }

    fn full_description(&self) -> String {
        "Record a piece of information about the user for future conversations \
         (e.g. a preference, a fact they shared). Notes are grouped by category; \
         writing to an existing category merges with what's already known rather \
         than replacing it outright, unless merge_lists is set to false."
            .to_string()
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "user_id": {
                    "type": "integer",
                    "description": "The user this note is about."
                },
                "info_category": {
                    "type": "string",
                    "description": "Short category label, e.g. 'preferences' or 'hobbies'."
                },
                "info_value": {
                    "description": "The value to remember. Any JSON value; lists and objects merge with existing notes in the same category."
                },
                "merge_lists": {
                    "type": "boolean",
                    "description": "Merge with the existing note in this category instead of overwriting it. Defaults to true.",
                    "default": true
                }
            },
            "required": ["user_id", "info_category", "info_value"]
        })
    }

    fn context_params(&self) -> Vec<ContextParam> {
        vec![ContextParam::UserId]
    }

    fn execute<'a>(&'a self, call: &'a ToolCall) -> BoxFuture<'a, Result<String, String>> {
        Box::pin(async move {
            let user_id = call
                .arguments
                .get("user_id")
                .and_then(|v| v.as_i64())
                .ok_or_else(|| "missing or invalid 'user_id' argument".to_string())?;
            let category = call
                .arguments
                .get("info_category")
                .and_then(|v| v.as_str())
                .ok_or_else(|| "missing 'info_category' argument".to_string())?;
            let value = call
                .arguments
                .get("info_value")
                .cloned()
                .ok_or_else(|| "missing 'info_value' argument".to_string())?;
            let merge_lists = call
                .arguments
                .get("merge_lists")
                .and_then(|v| v.as_bool())
                .unwrap_or(true);

            self.store
                .upsert_note(user_id, category, value, merge_lists)
                .map_err(|e| format!("failed to store note: {e}"))?;

            Ok(format!("remembered '{category}' for user {user_id}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_with_user(user_id: i64) -> Arc<HistoryStore> {
        let store = HistoryStore::open_in_memory(1000).unwrap();
        store
            .upsert_profile(&crate::store::UserProfile {
                user_id,
                last_seen: "2026-01-01T00:00:00Z".to_string(),
                ..Default::default()
            })
            .unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_remember_user_info_round_trips() {
        let store = store_with_user(1);
        let tool = RememberUserInfoTool::new(store.clone());
        let call = ToolCall {
            id: "1".to_string(),
            name: "remember_user_info".to_string(),
            arguments: json!({
                "user_id": 1,
                "info_category": "hobbies",
                "info_value": "chess"
            }),
        };
        let result = tool.execute(&call).await;
        assert!(result.is_ok());
        let notes = store.get_notes(1).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].0, "hobbies");
    }

    #[tokio::test]
    async fn test_remember_user_info_requires_value() {
        let store = store_with_user(1);
        let tool = RememberUserInfoTool::new(store);
        let call = ToolCall {
            id: "1".to_string(),
            name: "remember_user_info".to_string(),
            arguments: json!({"user_id": 1, "info_category": "hobbies"}),
        };
        assert!(tool.execute(&call).await.is_err());
    }
}
