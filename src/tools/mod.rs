//! Tool Registry & Dispatcher surface: the `ToolHandler` trait every
//! concrete tool implements, plus the built-in handlers.
//!
//! `ToolHandler` is the donor's `ToolProvider`, renamed because the donor's
//! name carried a stale association with the file-scanning/CLI domain this
//! crate no longer has.

use std::future::Future;
use std::pin::Pin;

use crate::llm::{Tool, ToolCall};

pub mod bash;
pub mod dispatcher;
pub mod edit_file;
pub mod registry;
pub mod remember_user_info;
pub mod send_telegram_message;

pub use bash::BashTool;
pub use dispatcher::Dispatcher;
pub use edit_file::EditFileTool;
pub use registry::ToolRegistry;
pub use remember_user_info::RememberUserInfoTool;
pub use send_telegram_message::SendTelegramMessageTool;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Caller-supplied identifiers a handler may ask to have injected. Mirrors
/// spec.md §4.3's "inject chat_id/user_id into args if handler wants it and
/// model didn't supply" — the model's own value, if present, always wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextParam {
    ChatId,
    UserId,
}

/// A single registered tool. Implementors should be cheap to clone (the
/// registry stores them behind `Arc`).
pub trait ToolHandler: Send + Sync {
    /// Stable name used both for LLM-facing tool declarations and for
    /// dispatch lookup. Names starting with `_` are rejected at
    /// registration time (the Rust equivalent of the original's
    /// reflection-time "private function" skip, since there is no
    /// reflection to skip here).
    fn name(&self) -> &str;

    /// One-line summary, used in brief tool listings.
    fn brief(&self) -> &str;

    /// Full multi-paragraph description sent to the model alongside the
    /// JSON schema.
    fn full_description(&self) -> String;

    /// JSON-schema `parameters` object for the LLM-facing tool declaration.
    fn parameters(&self) -> serde_json::Value;

    /// Argument names the dispatcher must validate as present before
    /// dispatch (spec.md §4.3's "check required params present"). Defaults
    /// to reading the schema's own `required` array.
    fn required_params(&self) -> Vec<String> {
        self.parameters()
            .get("required")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Context the dispatcher should inject into `args` when the model
    /// omitted them. Only `send_telegram_message` needs `chat_id`; most
    /// tools want none.
    fn context_params(&self) -> Vec<ContextParam> {
        Vec::new()
    }

    /// Whether this call should short-circuit the remainder of the current
    /// batch (spec.md's blocking-tool rule). Driven by the call's own
    /// arguments, not a static flag — only `send_telegram_message` with a
    /// truthy `requires_user_response` returns `true`.
    fn is_blocking(&self, _args: &serde_json::Value) -> bool {
        false
    }

    fn execute<'a>(&'a self, call: &'a ToolCall) -> BoxFuture<'a, Result<String, String>>;
}

/// LLM-facing declaration for a handler, matching `registry.rs`'s
/// `get_tools_for_llm` shape.
pub fn declaration_for(handler: &dyn ToolHandler) -> Tool {
    Tool {
        name: handler.name().to_string(),
        description: handler.full_description(),
        parameters: handler.parameters(),
        full_description: None,
    }
}

/// The illustrative handler set this crate ships with (spec.md §1's
/// Non-goals exclude the original bot's full tool surface — news, admin,
/// FSM tools — these are a representative slice exercising the dispatcher
/// end-to-end, per SPEC_FULL.md §12).
pub fn builtin_handlers() -> Vec<std::sync::Arc<dyn ToolHandler>> {
    vec![
        std::sync::Arc::new(BashTool::new()),
        std::sync::Arc::new(EditFileTool::new()),
    ]
}
