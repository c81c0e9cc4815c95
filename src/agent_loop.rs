//! Agent Loop: the top-level state machine for one inbound user text
//! message — `TRIAGE → [PREFILTER] → [PRO] → DONE | ERROR`.
//!
//! Grounded on `agent_processor.py`'s `handle_user_request` /
//! `_execute_pro_model_logic`.

use serde_json::Value;

use crate::driver::{self, DriverConfig};
use crate::error::AgentResult;
use crate::history_manager::{self, PrepareFlags};
use crate::llm::{KeyRotator, LLMProvider, LoopDetector, Role};
use crate::part::Part;
use crate::prefilter::{self, PrefilterOutcome};
use crate::store::{HistoryStore, UserProfile};
use crate::tools::ToolRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatType {
    Private,
    Group,
}

/// Everything the triage step needs about the inbound message that isn't
/// the text itself.
#[derive(Debug, Clone)]
pub struct ChatContext {
    pub chat_id: i64,
    pub user_id: i64,
    pub chat_type: ChatType,
    pub force_pro: bool,
    pub is_reply_to_bot: bool,
    pub mentions_bot: bool,
}

pub struct AgentLoop<'a, P: LLMProvider, L: LLMProvider> {
    pub store: &'a HistoryStore,
    pub registry: &'a ToolRegistry,
    pub rotator: &'a KeyRotator<P>,
    pub lite_provider: Option<&'a L>,
    pub driver_config: DriverConfig,
    pub max_history_length: usize,
}

impl<'a, P: LLMProvider, L: LLMProvider> AgentLoop<'a, P, L> {
    pub async fn handle_user_request(
        &self,
        ctx: &ChatContext,
        text: &str,
    ) -> AgentResult<Option<String>> {
        // Step 1: persist the user turn and upsert the profile before any
        // LLM call, so failures downstream still leave a correct record.
        self.store.append_message(
            ctx.chat_id,
            Some(ctx.user_id),
            Role::User,
            &[Part::Text(text.to_string())],
        )?;
        self.store.upsert_profile(&UserProfile {
            user_id: ctx.user_id,
            last_seen: String::new(), // store computes the real timestamp
            ..Default::default()
        })?;

        // Step 2: triage.
        let direct_to_pro = ctx.force_pro
            || ctx.chat_type == ChatType::Private
            || ctx.is_reply_to_bot
            || ctx.mentions_bot;

        if !direct_to_pro {
            if let Some(lite) = self.lite_provider {
                match prefilter::triage(lite, ctx.user_id, ctx.chat_id, text).await {
                    Ok(PrefilterOutcome::NoActionNeeded) => return Ok(None),
                    Ok(PrefilterOutcome::Actions(actions)) => {
                        let mut escalate = false;
                        for action in &actions {
                            match action.function_name.as_str() {
                                "remember_user_info" => {
                                    if let Err(e) =
                                        self.apply_remember_user_info(ctx, &action.arguments)
                                    {
                                        log::warn!("prefilter inline remember_user_info failed: {e}");
                                    }
                                }
                                "trigger_pro_model_processing" => escalate = true,
                                other => {
                                    log::debug!("prefilter: ignoring unknown action '{other}'");
                                }
                            }
                        }
                        if !escalate {
                            return Ok(None);
                        }
                    }
                    Ok(PrefilterOutcome::ParseError(e)) => {
                        log::warn!("prefilter parse error, falling through to pro model: {e}");
                    }
                    Err(e) => {
                        log::warn!("prefilter call failed, falling through to pro model: {e}");
                    }
                }
            }
        }

        // Step 4: PRO.
        let flags = PrepareFlags {
            add_recent_logs: true,
            add_user_context: true,
            is_group_chat: ctx.chat_type == ChatType::Group,
        };
        let prepared = history_manager::prepare(
            self.store,
            ctx.chat_id,
            Some(ctx.user_id),
            self.max_history_length,
            &flags,
        )?;

        let mut detector = LoopDetector::new();
        let outcome = driver::drive(
            self.rotator,
            self.registry,
            self.store,
            prepared.messages,
            ctx.chat_id,
            Some(ctx.user_id),
            None,
            &self.driver_config,
            &mut detector,
        )
        .await;

        if let Some(err) = outcome.error {
            // Step 5: surface the error; don't save a partial assistant turn.
            return Ok(Some(format!(
                "Sorry, something went wrong: {}",
                escape_for_transport(&err)
            )));
        }

        history_manager::save(
            self.store,
            ctx.chat_id,
            &outcome.final_history,
            prepared.original_loaded_length,
            Some(ctx.user_id),
        )?;

        Ok(outcome.final_text.map(|t| escape_for_transport(&t)))
    }

    fn apply_remember_user_info(&self, ctx: &ChatContext, args: &Value) -> AgentResult<()> {
        let user_id = args
            .get("user_id")
            .and_then(Value::as_i64)
            .unwrap_or(ctx.user_id);
        let category = args
            .get("info_category")
            .and_then(Value::as_str)
            .unwrap_or("general");
        let value = args.get("info_value").cloned().unwrap_or(Value::Null);
        let merge_lists = args
            .get("merge_lists")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        self.store.upsert_note(user_id, category, value, merge_lists)?;
        Ok(())
    }
}

/// Minimal reserved-character escaping for the stand-in transport. Real
/// deployments format for their own markup dialect; this crate has no
/// transport of its own (SPEC_FULL.md §0), so this only neutralizes the
/// characters that would otherwise be misread as markup.
fn escape_for_transport(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '_' | '*' | '[' | ']' | '`' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_for_transport_escapes_markup_chars() {
        assert_eq!(escape_for_transport("a_b*c"), "a\\_b\\*c");
    }

    #[test]
    fn test_escape_for_transport_leaves_plain_text_alone() {
        assert_eq!(escape_for_transport("hello world"), "hello world");
    }
}
