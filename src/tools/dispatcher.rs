//! Dispatcher: the seven-step contract of spec.md §4.3, on top of a
//! read-only [`ToolRegistry`].

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::llm::ToolCall;

use super::{ContextParam, ToolRegistry};

/// Outcome of dispatching one call. `result` is always a JSON object
/// ("Dispatcher output is always a map" — spec.md §4.3), ready to be
/// serialized back to the model as a ToolResponse part / tool message.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub status: &'static str,
    pub result: Value,
    pub blocking: bool,
}

pub struct Dispatcher<'a> {
    registry: &'a ToolRegistry,
}

impl<'a> Dispatcher<'a> {
    pub fn new(registry: &'a ToolRegistry) -> Self {
        Self { registry }
    }

    pub async fn dispatch(
        &self,
        call: &ToolCall,
        caller_chat_id: i64,
        caller_user_id: Option<i64>,
    ) -> DispatchOutcome {
        let Some(handler) = self.registry.get(&call.name) else {
            log::warn!("dispatcher: unknown tool '{}'", call.name);
            return DispatchOutcome {
                status: "not_found",
                result: error_map(format!("unknown tool '{}'", call.name)),
                blocking: false,
            };
        };

        let mut args = match call.arguments.as_object() {
            Some(obj) => obj.clone(),
            None => Map::new(),
        };

        let param_names: HashSet<String> = handler
            .parameters()
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default();

        // Steps 2-3: inject caller context the model omitted. The model's
        // own value, if present, always wins.
        for ctx in handler.context_params() {
            match ctx {
                ContextParam::ChatId => {
                    args.entry("chat_id".to_string())
                        .or_insert_with(|| Value::from(caller_chat_id));
                }
                ContextParam::UserId => {
                    if !args.contains_key("user_id") {
                        args.insert(
                            "user_id".to_string(),
                            caller_user_id.map(Value::from).unwrap_or(Value::Null),
                        );
                    }
                }
            }
        }

        // Step 4: drop keys the handler doesn't declare.
        if !param_names.is_empty() {
            args.retain(|k, _| param_names.contains(k));
        }

        // Step 5: required-argument validation.
        let missing: Vec<String> = handler
            .required_params()
            .into_iter()
            .filter(|p| !args.contains_key(p))
            .collect();

        if !missing.is_empty() {
            return DispatchOutcome {
                status: "error",
                result: error_map(format!("missing required arguments: {:?}", missing)),
                blocking: false,
            };
        }

        let blocking = handler.is_blocking(&Value::Object(args.clone()));

        let adjusted_call = ToolCall {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: Value::Object(args),
        };

        // Step 6/7: dispatch and catch handler errors. `ToolHandler::execute`
        // already models "exception" as `Err(String)`; async handlers run
        // in place, and a genuinely blocking handler (e.g. a sync
        // filesystem call) is expected to offload itself to a worker
        // thread via `tokio::task::spawn_blocking` internally.
        match handler.execute(&adjusted_call).await {
            Ok(value) => DispatchOutcome {
                status: "success",
                result: success_map(value),
                blocking,
            },
            Err(message) => DispatchOutcome {
                status: "error",
                result: error_map(message),
                blocking: false,
            },
        }
    }
}

fn success_map(value: String) -> Value {
    // Try to parse structured output first (handlers are free to return
    // pre-formed JSON); otherwise wrap as the scalar normalization spec.md
    // §4.3 describes.
    if let Ok(parsed @ Value::Object(_)) = serde_json::from_str::<Value>(&value) {
        let mut obj = parsed.as_object().unwrap().clone();
        obj.entry("status".to_string())
            .or_insert_with(|| Value::String("success".to_string()));
        Value::Object(obj)
    } else {
        let mut obj = Map::new();
        obj.insert("status".to_string(), Value::String("success".to_string()));
        obj.insert("result_value".to_string(), Value::String(value));
        Value::Object(obj)
    }
}

fn error_map(message: String) -> Value {
    let mut obj = Map::new();
    obj.insert("status".to_string(), Value::String("error".to_string()));
    obj.insert("message".to_string(), Value::String(message));
    Value::Object(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::BashTool;

    #[tokio::test]
    async fn test_dispatch_unknown_tool_is_not_found() {
        let registry = ToolRegistry::new();
        let dispatcher = Dispatcher::new(&registry);
        let call = ToolCall {
            id: "1".to_string(),
            name: "ghost".to_string(),
            arguments: serde_json::json!({}),
        };
        let outcome = dispatcher.dispatch(&call, 1, None).await;
        assert_eq!(outcome.status, "not_found");
    }

    #[tokio::test]
    async fn test_dispatch_missing_required_arg_skips_handler() {
        let registry = ToolRegistry::new().register(BashTool::new());
        let dispatcher = Dispatcher::new(&registry);
        let call = ToolCall {
            id: "1".to_string(),
            name: "bash".to_string(),
            arguments: serde_json::json!({}),
        };
        let outcome = dispatcher.dispatch(&call, 1, None).await;
        assert_eq!(outcome.status, "error");
        assert!(outcome.result["message"]
            .as_str()
            .unwrap()
            .contains("missing required arguments"));
    }

    #[tokio::test]
    async fn test_dispatch_drops_unknown_keys_and_succeeds() {
        let registry = ToolRegistry::new().register(BashTool::new());
        let dispatcher = Dispatcher::new(&registry);
        let call = ToolCall {
            id: "1".to_string(),
            name: "bash".to_string(),
            arguments: serde_json::json!({"command": "echo hi", "bogus_key": 1}),
        };
        let outcome = dispatcher.dispatch(&call, 1, None).await;
        assert_eq!(outcome.status, "success");
    }
}
