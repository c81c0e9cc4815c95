//! History Store: the embedded relational store backing chat history,
//! user profiles/notes, chat settings, and tool execution logs.
//!
//! Grounded on `database/crud_ops/*.py` for the exact column/merge
//! semantics; the storage engine itself (`rusqlite`, bundled SQLite) is
//! pinned in SPEC_FULL.md §4.2 since the donor crate has no embedded-store
//! precedent of its own.

use std::collections::BTreeSet;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::llm::provider::Role;
use crate::part::{deserialize_parts, serialize_parts, Part};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chat_history (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_id     INTEGER NOT NULL,
    user_id     INTEGER,
    role        TEXT NOT NULL CHECK (role IN ('user','model','system','tool')),
    parts_json  TEXT NOT NULL,
    timestamp   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
);
CREATE INDEX IF NOT EXISTS idx_chat_history_chat ON chat_history(chat_id, id);

CREATE TABLE IF NOT EXISTS user_profiles (
    user_id             INTEGER PRIMARY KEY,
    username            TEXT,
    first_name          TEXT,
    last_name           TEXT,
    avatar_id           TEXT,
    avatar_description  TEXT,
    last_seen           TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
);

CREATE TABLE IF NOT EXISTS user_notes (
    user_id     INTEGER NOT NULL REFERENCES user_profiles(user_id),
    category    TEXT NOT NULL,
    value_json  TEXT NOT NULL,
    timestamp   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
    PRIMARY KEY (user_id, category)
);

CREATE TABLE IF NOT EXISTS chat_settings (
    chat_id       INTEGER PRIMARY KEY,
    custom_prompt TEXT,
    ai_mode       TEXT NOT NULL DEFAULT 'default' CHECK (ai_mode IN ('pro','default')),
    model_name    TEXT
);

CREATE TABLE IF NOT EXISTS tool_executions (
    execution_id        INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_id             INTEGER NOT NULL,
    user_id             INTEGER,
    timestamp           TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
    tool_name           TEXT NOT NULL,
    tool_args_json      TEXT,
    status              TEXT NOT NULL CHECK (status IN ('success','error','not_found','warning','timeout')),
    return_code         INTEGER,
    result_message      TEXT,
    stdout              TEXT,
    stderr              TEXT,
    full_result_json    TEXT,
    trigger_message_id  INTEGER
);
CREATE INDEX IF NOT EXISTS idx_tool_executions_chat ON tool_executions(chat_id, timestamp DESC);
"#;

const VALID_TOOL_STATUSES: &[&str] =
    &["success", "error", "not_found", "warning", "timeout"];

/// A persisted history row, oldest→newest when read back in a batch.
#[derive(Debug, Clone)]
pub struct MessageEntry {
    pub id: i64,
    pub chat_id: i64,
    pub user_id: Option<i64>,
    pub role: Role,
    pub parts: Vec<Value>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_id: Option<String>,
    pub avatar_description: Option<String>,
    pub last_seen: String,
}

#[derive(Debug, Clone, Default)]
pub struct ChatSettings {
    pub chat_id: i64,
    pub custom_prompt: Option<String>,
    pub ai_mode: String,
    pub model_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ToolExecutionLog {
    pub chat_id: i64,
    pub user_id: Option<i64>,
    pub tool_name: String,
    pub tool_args: Option<Value>,
    pub status: String,
    pub return_code: Option<i64>,
    pub result_message: Option<String>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub full_result: Option<Value>,
    pub trigger_message_id: Option<i64>,
}

/// Single shared connection handle per process, matching spec.md §4.2's
/// "the store uses a single shared connection handle per process" — internal
/// serialization via the mutex is the store's concern, not the caller's.
pub struct HistoryStore {
    conn: Mutex<Connection>,
    max_log_len: usize,
}

impl HistoryStore {
    pub fn open(path: impl AsRef<std::path::Path>, max_log_len: usize) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            max_log_len,
        })
    }

    pub fn open_in_memory(max_log_len: usize) -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            max_log_len,
        })
    }

    /// Forces a WAL checkpoint to bound the journal's size; call on shutdown.
    pub fn checkpoint(&self) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
    }

    // ---- chat_history ----------------------------------------------------

    pub fn append_message(
        &self,
        chat_id: i64,
        user_id: Option<i64>,
        role: Role,
        parts: &[Part],
    ) -> rusqlite::Result<i64> {
        let role_str = role_to_str(role);
        let parts_json = serialize_parts(parts);
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO chat_history (chat_id, user_id, role, parts_json) VALUES (?1, ?2, ?3, ?4)",
            params![chat_id, user_id, role_str, parts_json],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn read_last_n(&self, chat_id: i64, n: usize) -> rusqlite::Result<Vec<MessageEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, chat_id, user_id, role, parts_json, timestamp FROM chat_history \
             WHERE chat_id = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let mut rows = stmt
            .query_map(params![chat_id, n as i64], |row| {
                let role_str: String = row.get(3)?;
                let parts_json: String = row.get(4)?;
                Ok(MessageEntry {
                    id: row.get(0)?,
                    chat_id: row.get(1)?,
                    user_id: row.get(2)?,
                    role: str_to_role(&role_str),
                    parts: deserialize_parts(&parts_json),
                    timestamp: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.reverse(); // oldest -> newest
        Ok(rows)
    }

    pub fn clear_chat(&self, chat_id: i64) -> rusqlite::Result<usize> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM chat_history WHERE chat_id = ?1", params![chat_id])
    }

    // ---- user_profiles -----------------------------------------------------

    pub fn upsert_profile(&self, profile: &UserProfile) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO user_profiles (user_id, username, first_name, last_name, avatar_id, avatar_description) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(user_id) DO UPDATE SET \
                username = excluded.username, \
                first_name = excluded.first_name, \
                last_name = excluded.last_name, \
                avatar_id = COALESCE(excluded.avatar_id, user_profiles.avatar_id), \
                avatar_description = COALESCE(excluded.avatar_description, user_profiles.avatar_description), \
                last_seen = strftime('%Y-%m-%dT%H:%M:%fZ','now')",
            params![
                profile.user_id,
                profile.username,
                profile.first_name,
                profile.last_name,
                profile.avatar_id,
                profile.avatar_description,
            ],
        )?;
        Ok(())
    }

    pub fn get_profile(&self, user_id: i64) -> rusqlite::Result<Option<UserProfile>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT user_id, username, first_name, last_name, avatar_id, avatar_description, last_seen \
             FROM user_profiles WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(UserProfile {
                    user_id: row.get(0)?,
                    username: row.get(1)?,
                    first_name: row.get(2)?,
                    last_name: row.get(3)?,
                    avatar_id: row.get(4)?,
                    avatar_description: row.get(5)?,
                    last_seen: row.get(6)?,
                })
            },
        )
        .optional()
    }

    // ---- user_notes ----------------------------------------------------

    /// Upsert a note. When `merge_lists` is true and both the existing and
    /// new values parse as JSON lists, they are unioned by canonical JSON
    /// identity; when both parse as JSON maps, the new map's keys win
    /// (right-wins-update). Otherwise the new value replaces the old one
    /// as-is. Mirrors `database/crud_ops/notes.py::upsert_user_note`.
    pub fn upsert_note(
        &self,
        user_id: i64,
        category: &str,
        value: Value,
        merge_lists: bool,
    ) -> rusqlite::Result<()> {
        let category = category.trim().to_lowercase();
        let conn = self.conn.lock().unwrap();

        let merged_value = if merge_lists {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT value_json FROM user_notes WHERE user_id = ?1 AND category = ?2",
                    params![user_id, category],
                    |row| row.get(0),
                )
                .optional()?;

            match existing {
                Some(existing_json) => merge_note_values(&existing_json, &value),
                None => value,
            }
        } else {
            value
        };

        let value_json = merged_value.to_string();
        conn.execute(
            "INSERT INTO user_notes (user_id, category, value_json) VALUES (?1, ?2, ?3) \
             ON CONFLICT(user_id, category) DO UPDATE SET \
                value_json = excluded.value_json, \
                timestamp = strftime('%Y-%m-%dT%H:%M:%fZ','now')",
            params![user_id, category, value_json],
        )?;
        Ok(())
    }

    pub fn get_notes(&self, user_id: i64) -> rusqlite::Result<Vec<(String, Value)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT category, value_json FROM user_notes WHERE user_id = ?1")?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                let category: String = row.get(0)?;
                let value_json: String = row.get(1)?;
                Ok((category, value_json))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .map(|(category, value_json)| {
                let value = serde_json::from_str(&value_json)
                    .unwrap_or(Value::String(value_json));
                (category, value)
            })
            .collect())
    }

    pub fn delete_note(&self, user_id: i64, category: &str) -> rusqlite::Result<usize> {
        let category = category.trim().to_lowercase();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM user_notes WHERE user_id = ?1 AND category = ?2",
            params![user_id, category],
        )
    }

    /// Delete a single key from a map-valued note, or a single item from a
    /// list-valued note. Deletes the whole note if the result becomes empty.
    /// Falls back to `delete_note` if neither `key` nor `list_item` is given.
    pub fn delete_note_nested(
        &self,
        user_id: i64,
        category: &str,
        key: Option<&str>,
        list_item: Option<&Value>,
    ) -> rusqlite::Result<bool> {
        let category = category.trim().to_lowercase();

        if key.is_none() && list_item.is_none() {
            return self.delete_note(user_id, &category).map(|n| n > 0);
        }

        let conn = self.conn.lock().unwrap();
        let existing: Option<String> = conn
            .query_row(
                "SELECT value_json FROM user_notes WHERE user_id = ?1 AND category = ?2",
                params![user_id, category],
                |row| row.get(0),
            )
            .optional()?;

        let Some(existing_json) = existing else {
            return Ok(false);
        };

        let Ok(mut value) = serde_json::from_str::<Value>(&existing_json) else {
            return Ok(false);
        };

        let now_empty = match (&mut value, key, list_item) {
            (Value::Object(map), Some(k), _) => {
                map.remove(k);
                map.is_empty()
            }
            (Value::Array(items), _, Some(item)) => {
                items.retain(|v| v != item);
                items.is_empty()
            }
            _ => return Ok(false),
        };

        if now_empty {
            conn.execute(
                "DELETE FROM user_notes WHERE user_id = ?1 AND category = ?2",
                params![user_id, category],
            )?;
        } else {
            conn.execute(
                "UPDATE user_notes SET value_json = ?1, timestamp = strftime('%Y-%m-%dT%H:%M:%fZ','now') \
                 WHERE user_id = ?2 AND category = ?3",
                params![value.to_string(), user_id, category],
            )?;
        }
        Ok(true)
    }

    // ---- chat_settings -----------------------------------------------------

    pub fn upsert_chat_settings(&self, settings: &ChatSettings) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO chat_settings (chat_id, custom_prompt, ai_mode, model_name) VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(chat_id) DO UPDATE SET \
                custom_prompt = excluded.custom_prompt, \
                ai_mode = excluded.ai_mode, \
                model_name = excluded.model_name",
            params![
                settings.chat_id,
                settings.custom_prompt,
                settings.ai_mode,
                settings.model_name,
            ],
        )?;
        Ok(())
    }

    pub fn get_chat_settings(&self, chat_id: i64) -> rusqlite::Result<ChatSettings> {
        let conn = self.conn.lock().unwrap();
        let result = conn
            .query_row(
                "SELECT chat_id, custom_prompt, ai_mode, model_name FROM chat_settings WHERE chat_id = ?1",
                params![chat_id],
                |row| {
                    Ok(ChatSettings {
                        chat_id: row.get(0)?,
                        custom_prompt: row.get(1)?,
                        ai_mode: row.get(2)?,
                        model_name: row.get(3)?,
                    })
                },
            )
            .optional()?;

        Ok(result.unwrap_or(ChatSettings {
            chat_id,
            custom_prompt: None,
            ai_mode: "default".to_string(),
            model_name: None,
        }))
    }

    // ---- tool_executions -----------------------------------------------------

    pub fn append_tool_log(&self, mut log: ToolExecutionLog) -> rusqlite::Result<i64> {
        if !VALID_TOOL_STATUSES.contains(&log.status.as_str()) {
            log::warn!(
                "store: invalid tool execution status '{}', defaulting to 'error'",
                log.status
            );
            log.status = "error".to_string();
        }

        let truncate = |s: Option<String>| -> Option<String> {
            s.map(|s| truncate_with_suffix(&s, self.max_log_len))
        };

        let tool_args_json = log.tool_args.map(|v| v.to_string());
        let full_result_json = log.full_result.map(|v| v.to_string());
        let stdout = truncate(log.stdout);
        let stderr = truncate(log.stderr);

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO tool_executions \
                (chat_id, user_id, tool_name, tool_args_json, status, return_code, \
                 result_message, stdout, stderr, full_result_json, trigger_message_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                log.chat_id,
                log.user_id,
                log.tool_name,
                tool_args_json,
                log.status,
                log.return_code,
                log.result_message,
                stdout,
                stderr,
                full_result_json,
                log.trigger_message_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn read_recent_tool_logs(
        &self,
        chat_id: i64,
        limit: usize,
    ) -> rusqlite::Result<Vec<ToolExecutionLog>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT chat_id, user_id, tool_name, tool_args_json, status, return_code, \
                    result_message, stdout, stderr, full_result_json, trigger_message_id \
             FROM tool_executions WHERE chat_id = ?1 ORDER BY timestamp DESC LIMIT ?2",
        )?;
        stmt.query_map(params![chat_id, limit as i64], |row| {
            let tool_args_json: Option<String> = row.get(3)?;
            let full_result_json: Option<String> = row.get(9)?;
            Ok(ToolExecutionLog {
                chat_id: row.get(0)?,
                user_id: row.get(1)?,
                tool_name: row.get(2)?,
                tool_args: tool_args_json.and_then(|s| serde_json::from_str(&s).ok()),
                status: row.get(4)?,
                return_code: row.get(5)?,
                result_message: row.get(6)?,
                stdout: row.get(7)?,
                stderr: row.get(8)?,
                full_result: full_result_json.and_then(|s| serde_json::from_str(&s).ok()),
                trigger_message_id: row.get(10)?,
            })
        })?
        .collect()
    }
}

fn truncate_with_suffix(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let mut cut = max_len;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...[truncated]", &s[..cut])
    }
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
        Role::System => "system",
        Role::Tool => "tool",
    }
}

fn str_to_role(s: &str) -> Role {
    match s {
        "user" => Role::User,
        "model" => Role::Assistant,
        "system" => Role::System,
        _ => Role::Tool,
    }
}

/// List union by canonical JSON identity, or map right-wins-update. Falls
/// back to "new value wins as-is" for any other combination.
fn merge_note_values(existing_json: &str, new_value: &Value) -> Value {
    let existing: Option<Value> = serde_json::from_str(existing_json).ok();

    match (existing, new_value) {
        (Some(Value::Array(old_items)), Value::Array(new_items)) => {
            let mut seen: BTreeSet<String> = BTreeSet::new();
            let mut merged = Vec::new();
            for item in old_items.into_iter().chain(new_items.iter().cloned()) {
                let identity = canonical_json(&item);
                if seen.insert(identity) {
                    merged.push(item);
                }
            }
            Value::Array(merged)
        }
        (Some(Value::Object(mut old_map)), Value::Object(new_map)) => {
            for (k, v) in new_map {
                old_map.insert(k.clone(), v.clone());
            }
            Value::Object(old_map)
        }
        _ => new_value.clone(),
    }
}

fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let sorted = Value::Object(entries.into_iter().map(|(k, v)| (k.clone(), v.clone())).collect());
            sorted.to_string()
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> HistoryStore {
        HistoryStore::open_in_memory(4_000).unwrap()
    }

    #[test]
    fn test_append_and_read_history_oldest_first() {
        let store = store();
        store
            .append_message(1, Some(10), Role::User, &[Part::Text("hi".to_string())])
            .unwrap();
        store
            .append_message(1, None, Role::Assistant, &[Part::Text("hello".to_string())])
            .unwrap();

        let entries = store.read_last_n(1, 10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].role, Role::User);
        assert_eq!(entries[1].role, Role::Assistant);
    }

    #[test]
    fn test_clear_chat_removes_all_rows() {
        let store = store();
        store
            .append_message(1, Some(10), Role::User, &[Part::Text("hi".to_string())])
            .unwrap();
        store.clear_chat(1).unwrap();
        assert!(store.read_last_n(1, 10).unwrap().is_empty());
    }

    #[test]
    fn test_profile_upsert_then_get() {
        let store = store();
        store
            .upsert_profile(&UserProfile {
                user_id: 1,
                username: Some("alice".to_string()),
                ..Default::default()
            })
            .unwrap();
        let profile = store.get_profile(1).unwrap().unwrap();
        assert_eq!(profile.username.as_deref(), Some("alice"));
    }

    #[test]
    fn test_note_requires_profile_foreign_key() {
        let store = store();
        let result = store.upsert_note(999, "likes", Value::String("tea".to_string()), true);
        assert!(result.is_err());
    }

    #[test]
    fn test_note_list_merge_unions_by_identity() {
        let store = store();
        store.upsert_profile(&UserProfile { user_id: 1, ..Default::default() }).unwrap();

        store
            .upsert_note(1, "hobbies", serde_json::json!(["chess", "reading"]), true)
            .unwrap();
        store
            .upsert_note(1, "hobbies", serde_json::json!(["reading", "hiking"]), true)
            .unwrap();

        let notes = store.get_notes(1).unwrap();
        let (_, value) = notes.iter().find(|(c, _)| c == "hobbies").unwrap();
        let items: Vec<&str> = value.as_array().unwrap().iter().map(|v| v.as_str().unwrap()).collect();
        assert_eq!(items, vec!["chess", "reading", "hiking"]);
    }

    #[test]
    fn test_note_map_merge_right_wins() {
        let store = store();
        store.upsert_profile(&UserProfile { user_id: 1, ..Default::default() }).unwrap();

        store
            .upsert_note(1, "prefs", serde_json::json!({"theme": "dark", "lang": "en"}), true)
            .unwrap();
        store
            .upsert_note(1, "prefs", serde_json::json!({"theme": "light"}), true)
            .unwrap();

        let notes = store.get_notes(1).unwrap();
        let (_, value) = notes.iter().find(|(c, _)| c == "prefs").unwrap();
        assert_eq!(value["theme"], "light");
        assert_eq!(value["lang"], "en");
    }

    #[test]
    fn test_category_is_case_and_whitespace_normalized() {
        let store = store();
        store.upsert_profile(&UserProfile { user_id: 1, ..Default::default() }).unwrap();
        store
            .upsert_note(1, "  Likes ", Value::String("tea".to_string()), false)
            .unwrap();
        let notes = store.get_notes(1).unwrap();
        assert_eq!(notes[0].0, "likes");
    }

    #[test]
    fn test_delete_note_nested_key_removes_entry_when_empty() {
        let store = store();
        store.upsert_profile(&UserProfile { user_id: 1, ..Default::default() }).unwrap();
        store
            .upsert_note(1, "prefs", serde_json::json!({"theme": "dark"}), false)
            .unwrap();

        let deleted = store.delete_note_nested(1, "prefs", Some("theme"), None).unwrap();
        assert!(deleted);
        assert!(store.get_notes(1).unwrap().is_empty());
    }

    #[test]
    fn test_chat_settings_defaults_to_default_mode() {
        let store = store();
        let settings = store.get_chat_settings(42).unwrap();
        assert_eq!(settings.ai_mode, "default");
    }

    #[test]
    fn test_tool_log_invalid_status_defaults_to_error() {
        let store = store();
        let id = store
            .append_tool_log(ToolExecutionLog {
                chat_id: 1,
                user_id: None,
                tool_name: "bash".to_string(),
                tool_args: None,
                status: "bogus".to_string(),
                return_code: None,
                result_message: None,
                stdout: None,
                stderr: None,
                full_result: None,
                trigger_message_id: None,
            })
            .unwrap();
        assert!(id > 0);
        let logs = store.read_recent_tool_logs(1, 10).unwrap();
        assert_eq!(logs[0].status, "error");
    }

    #[test]
    fn test_tool_log_stdout_is_truncated() {
        let store = HistoryStore::open_in_memory(5).unwrap();
        store
            .append_tool_log(ToolExecutionLog {
                chat_id: 1,
                user_id: None,
                tool_name: "bash".to_string(),
                tool_args: None,
                status: "success".to_string(),
                return_code: Some(0),
                result_message: None,
                stdout: Some("0123456789".to_string()),
                stderr: None,
                full_result: None,
                trigger_message_id: None,
            })
            .unwrap();
        let logs = store.read_recent_tool_logs(1, 10).unwrap();
        assert!(logs[0].stdout.as_ref().unwrap().ends_with("...[truncated]"));
    }
}
