//! History Manager: bridges the Part-coded rows held by the History Store
//! and the flattened `Message` shape the Provider Driver speaks.
//!
//! Grounded on `core_agent/history_manager.py`'s `prepare_history`/
//! `save_history` pair; the loop-avoidance filter and incremental-save
//! logic are carried over verbatim in spirit, re-expressed against the
//! Part codec (§4.1) and History Store (§4.2) types.

use crate::error::AgentResult;
use crate::llm::provider::Role;
use crate::llm::Message;
use crate::part::{is_deserialization_sentinel, reconstruct, Part};
use crate::store::{HistoryStore, ToolExecutionLog, UserProfile};

#[derive(Debug, Clone, Default)]
pub struct PrepareFlags {
    pub add_recent_logs: bool,
    pub add_user_context: bool,
    pub is_group_chat: bool,
}

pub struct PreparedHistory {
    pub messages: Vec<Message>,
    /// Length of `messages` at the moment it's handed to the driver — the
    /// baseline `save` diffs new entries against.
    pub original_loaded_length: usize,
}

const DEFAULT_RECENT_LOGS: usize = 4;

pub fn prepare(
    store: &HistoryStore,
    chat_id: i64,
    user_id: Option<i64>,
    max_entries: usize,
    flags: &PrepareFlags,
) -> AgentResult<PreparedHistory> {
    let mut entries = store.read_last_n(chat_id, max_entries)?;

    // Loop-avoidance filter: drop a bare echoed final-text turn that
    // immediately follows a tool round-trip in the same role.
    if entries.len() >= 2 {
        let last_idx = entries.len() - 1;
        let (prev, last) = (&entries[last_idx - 1], &entries[last_idx]);
        let both_model = prev.role == Role::Assistant && last.role == Role::Assistant;
        let prev_has_tool_part = prev.parts.iter().any(is_tool_related_dict);
        let last_is_only_nonempty_text = !last.parts.is_empty()
            && last.parts.iter().all(is_text_dict)
            && last.parts.iter().any(|d| text_dict_nonempty(d));
        if both_model && prev_has_tool_part && last_is_only_nonempty_text {
            entries.pop();
        }
    }

    let mut messages = Vec::new();

    if flags.add_recent_logs {
        let logs: Vec<ToolExecutionLog> = store
            .read_recent_tool_logs(chat_id, DEFAULT_RECENT_LOGS)?
            .into_iter()
            .filter(|l| l.tool_name != "send_telegram_message")
            .collect();
        if !logs.is_empty() {
            messages.push(context_message(format_logs_block(&logs)));
        }
    }

    if flags.add_user_context {
        if let Some(uid) = user_id {
            let profile = store.get_profile(uid)?;
            let notes = store.get_notes(uid)?;
            if profile.is_some() || !notes.is_empty() {
                messages.push(context_message(format_user_context_block(
                    profile.as_ref(),
                    &notes,
                )));
            }
        }
    }

    for entry in entries {
        if entry.parts.len() == 1 && is_deserialization_sentinel(&entry.parts[0]) {
            continue;
        }

        let reconstructed = reconstruct(entry.role.clone(), &entry.parts);
        let had_any_parts_before_strip = reconstructed
            .as_ref()
            .map(|c| !c.parts.is_empty())
            .unwrap_or(false);
        let mut parts = match reconstructed {
            Some(c) => c.parts,
            None => {
                if entry.role == Role::Assistant {
                    Vec::new()
                } else {
                    continue;
                }
            }
        };

        if flags.is_group_chat && entry.role == Role::User {
            if let Some(Part::Text(t)) = parts.first_mut() {
                *t = format!("User {}: {}", entry.user_id.unwrap_or_default(), t);
            }
        }

        if entry.role == Role::Assistant {
            parts.retain(|p| matches!(p, Part::Text(_)));
        }

        let content = parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if entry.role == Role::Assistant && content.is_empty() && had_any_parts_before_strip {
            // Stripping tool-call/response parts left nothing behind;
            // this turn carried no user-visible content.
            continue;
        }

        messages.push(Message {
            role: entry.role,
            content,
            tool_call_id: None,
            tool_calls: None,
        });
    }

    let original_loaded_length = messages.len();
    Ok(PreparedHistory {
        messages,
        original_loaded_length,
    })
}

pub fn save(
    store: &HistoryStore,
    chat_id: i64,
    final_history: &[Message],
    original_loaded_length: usize,
    current_user_id: Option<i64>,
) -> AgentResult<()> {
    let delta = final_history.len() as i64 - original_loaded_length as i64;
    if delta <= 0 {
        return Ok(());
    }
    let start = final_history.len() - delta as usize;

    for msg in &final_history[start..] {
        match msg.role {
            Role::User | Role::Tool => continue,
            Role::System => continue,
            Role::Assistant => {
                let mut parts = Vec::new();
                if !msg.content.is_empty() {
                    parts.push(Part::Text(msg.content.clone()));
                }
                if let Some(calls) = &msg.tool_calls {
                    for call in calls {
                        let args = call
                            .arguments
                            .as_object()
                            .cloned()
                            .unwrap_or_default();
                        parts.push(Part::ToolCall {
                            name: call.name.clone(),
                            args,
                        });
                    }
                }
                store.append_message(chat_id, current_user_id, Role::Assistant, &parts)?;
            }
        }
    }
    Ok(())
}

fn context_message(content: String) -> Message {
    Message {
        role: Role::Assistant,
        content,
        tool_call_id: None,
        tool_calls: None,
    }
}

fn is_text_dict(d: &serde_json::Value) -> bool {
    d.get("text").is_some()
}

fn text_dict_nonempty(d: &serde_json::Value) -> bool {
    d.get("text")
        .and_then(|v| v.as_str())
        .map(|s| !s.is_empty())
        .unwrap_or(false)
}

fn is_tool_related_dict(d: &serde_json::Value) -> bool {
    d.get("function_call").is_some() || d.get("function_response").is_some()
}

fn format_logs_block(logs: &[ToolExecutionLog]) -> String {
    const SNIPPET_LIMIT: usize = 500;
    let mut out = String::from("[recent actions]\n");
    for log in logs {
        out.push_str(&format!(
            "- tool={} status={}",
            log.tool_name, log.status
        ));
        if let Some(msg) = &log.result_message {
            out.push_str(&format!(" message={}", truncate(msg, 200)));
        }
        if let Some(stdout) = &log.stdout {
            out.push_str(&format!("\n  stdout: {}", truncate(stdout, 200)));
        }
        if let Some(stderr) = &log.stderr {
            out.push_str(&format!("\n  stderr: {}", truncate(stderr, 200)));
        }
        if let Some(full) = &log.full_result {
            out.push_str(&format!(
                "\n  ```\n  {}\n  ```",
                truncate(&full.to_string(), SNIPPET_LIMIT)
            ));
        }
        out.push('\n');
    }
    out
}

fn format_user_context_block(profile: Option<&UserProfile>, notes: &[(String, serde_json::Value)]) -> String {
    let mut out = String::from("[user context]\n");
    if let Some(p) = profile {
        out.push_str(&format!(
            "name: {}\nusername: {}\n",
            p.first_name.clone().unwrap_or_default(),
            p.username.clone().unwrap_or_default(),
        ));
    }
    for (category, value) in notes {
        out.push_str(&format!("{}: {}\n", category, value));
    }
    out
}

fn truncate(s: &str, limit: usize) -> String {
    if s.len() <= limit {
        s.to_string()
    } else {
        let mut cut = limit;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &s[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolCall;

    fn store_with_user(user_id: i64) -> HistoryStore {
        let store = HistoryStore::open_in_memory(1000).unwrap();
        store
            .upsert_profile(&UserProfile {
                user_id,
                last_seen: "2026-01-01T00:00:00Z".to_string(),
                ..Default::default()
            })
            .unwrap();
        store
    }

    #[test]
    fn test_prepare_reconstructs_text_entries() {
        let store = store_with_user(1);
        store
            .append_message(10, Some(1), Role::User, &[Part::Text("hi".to_string())])
            .unwrap();
        store
            .append_message(
                10,
                Some(1),
                Role::Assistant,
                &[Part::Text("hello".to_string())],
            )
            .unwrap();

        let prepared = prepare(&store, 10, Some(1), 50, &PrepareFlags::default()).unwrap();
        assert_eq!(prepared.messages.len(), 2);
        assert_eq!(prepared.messages[1].content, "hello");
        assert_eq!(prepared.original_loaded_length, 2);
    }

    #[test]
    fn test_loop_avoidance_filter_drops_echoed_text() {
        let store = store_with_user(1);
        store
            .append_message(
                10,
                Some(1),
                Role::Assistant,
                &[Part::ToolCall {
                    name: "bash".to_string(),
                    args: serde_json::Map::new(),
                }],
            )
            .unwrap();
        store
            .append_message(
                10,
                Some(1),
                Role::Assistant,
                &[Part::Text("echoed final answer".to_string())],
            )
            .unwrap();

        let prepared = prepare(&store, 10, Some(1), 50, &PrepareFlags::default()).unwrap();
        // The tool-call turn strips to empty and is dropped; the echoed
        // text turn is removed by the loop-avoidance filter.
        assert!(prepared.messages.is_empty());
    }

    #[test]
    fn test_group_chat_prefixes_user_entries() {
        let store = store_with_user(7);
        store
            .append_message(10, Some(7), Role::User, &[Part::Text("hey".to_string())])
            .unwrap();

        let flags = PrepareFlags {
            is_group_chat: true,
            ..Default::default()
        };
        let prepared = prepare(&store, 10, Some(7), 50, &flags).unwrap();
        assert_eq!(prepared.messages[0].content, "User 7: hey");
    }

    #[test]
    fn test_save_persists_only_new_model_turns() {
        let store = store_with_user(1);
        let final_history = vec![
            Message {
                role: Role::User,
                content: "hi".to_string(),
                tool_call_id: None,
                tool_calls: None,
            },
            Message {
                role: Role::Assistant,
                content: "".to_string(),
                tool_call_id: None,
                tool_calls: Some(vec![ToolCall {
                    id: "1".to_string(),
                    name: "bash".to_string(),
                    arguments: serde_json::json!({"command": "ls"}),
                }]),
            },
            Message {
                role: Role::Tool,
                content: "ok".to_string(),
                tool_call_id: Some("1".to_string()),
                tool_calls: None,
            },
            Message {
                role: Role::Assistant,
                content: "done".to_string(),
                tool_call_id: None,
                tool_calls: None,
            },
        ];

        save(&store, 10, &final_history, 1, Some(1)).unwrap();

        let rows = store.read_last_n(10, 50).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.role == Role::Assistant));
    }
}
