//! Pre-Filter ("Lite"): a constrained, tool-less LLM call that triages a
//! group-chat message into no-op / inline side effects / escalate-to-heavy.
//!
//! Grounded on `agent_processor.py`'s Lite-model branch and
//! `response_parsers.py`'s JSON-fence-stripping parse, re-expressed against
//! the same `LLMProvider::chat` single-turn call the heavy driver uses for
//! its own simple completions.

use futures::StreamExt;
use serde_json::Value;

use crate::llm::{LLMProvider, ProviderError, StreamChunk};

#[derive(Debug, Clone, PartialEq)]
pub struct PrefilterAction {
    pub function_name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PrefilterOutcome {
    NoActionNeeded,
    Actions(Vec<PrefilterAction>),
    ParseError(String),
}

/// Ask the Lite model to classify one message. The prompt is deliberately
/// just the three raw fields concatenated — the Lite model's system prompt
/// (loaded from config) carries the actual instructions and JSON contract.
pub async fn triage<P: LLMProvider>(
    provider: &P,
    user_id: i64,
    chat_id: i64,
    text: &str,
) -> Result<PrefilterOutcome, ProviderError> {
    let prompt = format!("user_id={user_id}\nchat_id={chat_id}\n{text}");
    let mut stream = provider.chat(&prompt).await?;

    let mut raw = String::new();
    while let Some(chunk) = stream.next().await {
        match chunk? {
            StreamChunk::Content(delta) => raw.push_str(&delta),
            StreamChunk::Done { full_content, .. } => {
                if !full_content.is_empty() {
                    raw = full_content;
                }
                break;
            }
            _ => {}
        }
    }

    Ok(parse_response(&raw))
}

/// Strip an optional ```...``` fence (with optional `json` language tag),
/// JSON-decode, validate the top-level shape, coerce chat/user id-looking
/// arguments to integers, and drop malformed action items.
fn parse_response(raw: &str) -> PrefilterOutcome {
    let stripped = strip_fence(raw.trim());

    let parsed: Value = match serde_json::from_str(stripped) {
        Ok(v) => v,
        Err(e) => return PrefilterOutcome::ParseError(format!("invalid JSON: {e}")),
    };

    let Some(actions) = parsed.get("actions_to_perform").and_then(Value::as_array) else {
        return PrefilterOutcome::ParseError(
            "missing 'actions_to_perform' array".to_string(),
        );
    };

    if actions.is_empty() {
        return PrefilterOutcome::NoActionNeeded;
    }

    let mut out = Vec::new();
    for item in actions {
        let Some(name) = item.get("function_name").and_then(Value::as_str) else {
            log::warn!("prefilter: dropping action with no function_name: {item}");
            continue;
        };
        let mut arguments = item
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));

        if let Some(obj) = arguments.as_object_mut() {
            for key in ["user_id", "chat_id"] {
                if let Some(v) = obj.get(key).cloned() {
                    if let Some(coerced) = coerce_to_i64(&v) {
                        obj.insert(key.to_string(), Value::from(coerced));
                    }
                }
            }
        }

        out.push(PrefilterAction {
            function_name: name.to_string(),
            arguments,
        });
    }

    if out.is_empty() {
        PrefilterOutcome::NoActionNeeded
    } else {
        PrefilterOutcome::Actions(out)
    }
}

fn coerce_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse::<i64>().ok(),
        _ => None,
    }
}

fn strip_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\n', '\r']);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_no_action_needed() {
        let outcome = parse_response(r#"{"actions_to_perform": []}"#);
        assert_eq!(outcome, PrefilterOutcome::NoActionNeeded);
    }

    #[test]
    fn test_parse_strips_fence_and_language_tag() {
        let raw = "```json\n{\"actions_to_perform\": []}\n```";
        assert_eq!(parse_response(raw), PrefilterOutcome::NoActionNeeded);
    }

    #[test]
    fn test_parse_actions_coerces_ids() {
        let raw = r#"{"actions_to_perform": [
            {"function_name": "remember_user_info", "arguments": {"user_id": "42", "info_category": "hobbies", "info_value": "chess"}}
        ]}"#;
        match parse_response(raw) {
            PrefilterOutcome::Actions(actions) => {
                assert_eq!(actions.len(), 1);
                assert_eq!(actions[0].arguments["user_id"], Value::from(42));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_parse_drops_malformed_action_items() {
        let raw = r#"{"actions_to_perform": [
            {"arguments": {}},
            {"function_name": "trigger_pro_model_processing", "arguments": {}}
        ]}"#;
        match parse_response(raw) {
            PrefilterOutcome::Actions(actions) => {
                assert_eq!(actions.len(), 1);
                assert_eq!(actions[0].function_name, "trigger_pro_model_processing");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_on_invalid_json() {
        match parse_response("not json") {
            PrefilterOutcome::ParseError(_) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
