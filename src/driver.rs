//! Provider Driver: one contract, two implementations.
//!
//! Grounded on `llm/helpers.rs::chat_loop_with_tools`, which already drives
//! any `LLMProvider` through the same `ChatLoopHandle`/`LoopStep` event
//! protocol regardless of wire dialect — each provider's `chat_loop` hides
//! its own wire format (inline parts for Gemini, separate tool messages plus
//! the sanitizer for OpenAI) internally. This module generalizes that
//! pattern: key rotation, dispatcher-backed tool execution, execution
//! logging, the blocking-tool short-circuit, and the text/tool-call
//! tie-break all live here, once, instead of once per dialect.

use std::time::Duration;

use crate::error::{AgentError, AgentResult};
use crate::llm::{
    KeyRotator, LLMProvider, LoopAction, LoopDetector, LoopStep, Message, ProviderError, Role,
    Tool, ToolCall, ToolResult,
};
use crate::store::{HistoryStore, ToolExecutionLog};
use crate::tools::{Dispatcher, ToolRegistry};

/// Driver-level knobs. Distinct from `ProviderConfig`: these govern the
/// outer loop, not a single request.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Maximum tool-call rounds before the loop is forcibly ended
    /// (spec.md's step budget).
    pub max_steps: usize,
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            system_prompt: None,
            temperature: 1.0,
            max_tokens: 40960,
        }
    }
}

/// Result of driving one conversation to a terminal assistant turn.
#[derive(Debug, Clone, Default)]
pub struct DriverOutcome {
    pub final_history: Vec<Message>,
    pub error: Option<String>,
    pub last_tool_called: Option<String>,
    pub last_text_sent_via_tool: Option<String>,
    pub last_tool_result: Option<serde_json::Value>,
    /// The text to surface to the user for this turn, if any. `None` when
    /// the terminal action was a blocking `send_telegram_message` call (the
    /// tool itself already delivered the message).
    pub final_text: Option<String>,
}

const QUOTA_BACKOFF: Duration = Duration::from_secs(2);

pub async fn drive<P: LLMProvider>(
    rotator: &KeyRotator<P>,
    registry: &ToolRegistry,
    store: &HistoryStore,
    history: Vec<Message>,
    chat_id: i64,
    user_id: Option<i64>,
    trigger_message_id: Option<i64>,
    config: &DriverConfig,
    loop_detector: &mut LoopDetector,
) -> DriverOutcome {
    let tools_for_llm = registry.get_tools_for_llm();

    let mut handle = match start_with_rotation(
        rotator,
        history.clone(),
        Some(tools_for_llm),
        config,
    )
    .await
    {
        Ok(h) => h,
        Err(e) => {
            return DriverOutcome {
                final_history: history,
                error: Some(e.to_string()),
                ..Default::default()
            }
        }
    };

    let dispatcher = Dispatcher::new(registry);
    let mut working_history = history;
    let mut rounds = 0usize;
    let mut last_tool_called: Option<String> = None;
    let mut last_text_sent_via_tool: Option<String> = None;
    let mut last_tool_result: Option<serde_json::Value> = None;
    let mut last_content = String::new();

    loop {
        let event = match handle.next().await {
            Some(Ok(event)) => event,
            Some(Err(e)) => {
                return DriverOutcome {
                    final_history: working_history,
                    error: Some(e.to_string()),
                    last_tool_called,
                    last_text_sent_via_tool,
                    last_tool_result,
                    final_text: None,
                }
            }
            None => {
                return DriverOutcome {
                    final_history: working_history,
                    error: Some(AgentError::LoopTerminated(
                        "provider stream ended unexpectedly".to_string(),
                    )
                    .to_string()),
                    last_tool_called,
                    last_text_sent_via_tool,
                    last_tool_result,
                    final_text: None,
                }
            }
        };

        match event {
            LoopStep::Thinking(_) => {}
            LoopStep::Content(delta) => {
                last_content.push_str(&delta);
            }
            LoopStep::ToolCallsRequested {
                tool_calls,
                content,
            } => {
                rounds += 1;
                if !content.is_empty() {
                    last_content.push_str(&content);
                }

                if rounds > config.max_steps {
                    handle.cancel();
                    return DriverOutcome {
                        final_history: working_history,
                        error: Some(
                            AgentError::StepBudgetExceeded(config.max_steps).to_string(),
                        ),
                        last_tool_called,
                        last_text_sent_via_tool,
                        last_tool_result,
                        final_text: None,
                    };
                }

                working_history.push(Message {
                    role: Role::Assistant,
                    content: content.clone(),
                    tool_call_id: None,
                    tool_calls: Some(tool_calls.clone()),
                });

                let mut results = Vec::new();
                let mut blocking_triggered = false;

                for call in &tool_calls {
                    if let Some(detection) = loop_detector.check(call) {
                        log::warn!(
                            "loop detector: {:?} (confidence {:.2}) -> {:?}",
                            detection.loop_type,
                            detection.confidence,
                            detection.action
                        );
                        if detection.action == LoopAction::Terminate {
                            handle.cancel();
                            return DriverOutcome {
                                final_history: working_history,
                                error: Some(
                                    AgentError::LoopTerminated(
                                        detection
                                            .warning_message
                                            .unwrap_or_else(|| "loop detected".to_string()),
                                    )
                                    .to_string(),
                                ),
                                last_tool_called,
                                last_text_sent_via_tool,
                                last_tool_result,
                                final_text: None,
                            };
                        }
                    }

                    let outcome = dispatcher.dispatch(call, chat_id, user_id).await;

                    let is_blocking = registry
                        .get(&call.name)
                        .map(|h| h.is_blocking(&call.arguments))
                        .unwrap_or(false);

                    if let Err(e) = store.append_tool_log(ToolExecutionLog {
                        chat_id,
                        user_id,
                        tool_name: call.name.clone(),
                        tool_args: Some(call.arguments.clone()),
                        status: outcome.status.to_string(),
                        return_code: None,
                        result_message: outcome
                            .result
                            .get("message")
                            .or_else(|| outcome.result.get("result_value"))
                            .and_then(|v| v.as_str())
                            .map(str::to_string),
                        stdout: None,
                        stderr: None,
                        full_result: Some(outcome.result.clone()),
                        trigger_message_id,
                    }) {
                        log::warn!("failed to persist tool log: {e}");
                    }

                    if outcome.status == "success" {
                        last_tool_called = Some(call.name.clone());
                        last_tool_result = Some(outcome.result.clone());
                        if call.name == "send_telegram_message" {
                            if let Some(text) = call.arguments.get("text").and_then(|v| v.as_str())
                            {
                                last_text_sent_via_tool = Some(text.to_string());
                            }
                        }
                    }

                    results.push(ToolResult {
                        tool_call_id: call.id.clone(),
                        content: outcome.result.to_string(),
                        is_error: outcome.status != "success",
                    });

                    if is_blocking {
                        blocking_triggered = true;
                        break;
                    }
                }

                for result in &results {
                    working_history.push(Message {
                        role: Role::Tool,
                        content: result.content.clone(),
                        tool_call_id: Some(result.tool_call_id.clone()),
                        tool_calls: None,
                    });
                }

                if blocking_triggered {
                    handle.cancel();
                    // Tie-break: the action was a blocking send, so the
                    // already-delivered message is the answer, not `content`.
                    return DriverOutcome {
                        final_history: working_history,
                        error: None,
                        last_tool_called,
                        last_text_sent_via_tool: last_text_sent_via_tool.clone(),
                        last_tool_result,
                        final_text: None,
                    };
                }

                if let Err(e) = handle.submit_tool_results(results) {
                    return DriverOutcome {
                        final_history: working_history,
                        error: Some(e.to_string()),
                        last_tool_called,
                        last_text_sent_via_tool,
                        last_tool_result,
                        final_text: None,
                    };
                }
                last_content.clear();
            }
            LoopStep::ToolResultsReceived { .. } => {}
            LoopStep::Done {
                content,
                finish_reason: _,
                total_usage: _,
                all_tool_calls: _,
            } => {
                let text = if !content.is_empty() {
                    content
                } else {
                    last_content.clone()
                };

                if !text.is_empty() {
                    working_history.push(Message {
                        role: Role::Assistant,
                        content: text.clone(),
                        tool_call_id: None,
                        tool_calls: None,
                    });
                }

                // Tie-break (spec.md §4.4.1): text survives alongside tool
                // calls in the same step, but only surfaces as the final
                // answer when the last successful action wasn't itself a
                // message delivery.
                let final_text = if last_tool_called.as_deref() == Some("send_telegram_message") {
                    None
                } else if text.is_empty() {
                    None
                } else {
                    Some(text)
                };

                return DriverOutcome {
                    final_history: working_history,
                    error: None,
                    last_tool_called,
                    last_text_sent_via_tool,
                    last_tool_result,
                    final_text,
                };
            }
        }
    }
}

/// Starts `chat_loop` against the rotator's current key, retrying on
/// `QuotaExceeded` by walking the pool forward from the starting index
/// without mutating the shared `current` until the retry walk ends
/// (spec.md §4.4.4). `advance()` is called exactly once, on completion.
///
/// Before each attempt, the driver's `DriverConfig` (system prompt,
/// temperature, max tokens) is pushed onto the handle's `ProviderConfig` —
/// this is where the configured Pro/Lite sampling knobs and system prompt
/// actually reach the wire request.
async fn start_with_rotation<P: LLMProvider>(
    rotator: &KeyRotator<P>,
    history: Vec<Message>,
    tools: Option<Vec<Tool>>,
    config: &DriverConfig,
) -> AgentResult<crate::llm::ChatLoopHandle> {
    let pool_size = rotator.pool_size();
    let start = rotator.current();
    let mut last_err: Option<ProviderError> = None;

    for offset in 0..pool_size {
        let idx = (start + offset) % pool_size;
        let provider = rotator.handle_at(idx);
        provider.update_config(|cfg| {
            cfg.system_prompt = config.system_prompt.clone();
            cfg.temperature = config.temperature;
            cfg.max_tokens = config.max_tokens;
        });
        match provider.chat_loop(history.clone(), tools.clone()).await {
            Ok(handle) => {
                rotator.advance();
                return Ok(handle);
            }
            Err(ProviderError::QuotaExceeded) => {
                log::warn!("quota exceeded on key index {idx}, rotating");
                last_err = Some(ProviderError::QuotaExceeded);
                tokio::time::sleep(QUOTA_BACKOFF).await;
            }
            Err(e) => {
                rotator.advance();
                return Err(AgentError::Provider(e));
            }
        }
    }

    rotator.advance();
    Err(AgentError::Provider(
        last_err.unwrap_or(ProviderError::QuotaExceeded),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::Stream;
    use std::pin::Pin;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    use crate::llm::{ProviderConfig, ProviderState, StreamChunk};
    use crate::tools::BashTool;

    /// Minimal scripted provider: replays a fixed sequence of `LoopStep`s
    /// regardless of what's sent to it, enough to exercise the driver's own
    /// bookkeeping without a network dependency.
    struct ScriptedProvider {
        script: StdMutex<Vec<Vec<Result<LoopStep, ProviderError>>>>,
    }

    #[async_trait::async_trait]
    impl LLMProvider for ScriptedProvider {
        fn create(_model: String, _api_key: String) -> Result<Self, ProviderError> {
            unimplemented!("not used in tests")
        }

        fn state(&self) -> ProviderState {
            ProviderState::default()
        }

        fn config(&self) -> ProviderConfig {
            ProviderConfig::default()
        }

        fn update_config(&self, _f: impl FnOnce(&mut ProviderConfig)) {}

        async fn chat(
            &self,
            _prompt: &str,
        ) -> Result<
            Pin<Box<dyn Stream<Item = Result<StreamChunk, ProviderError>> + Send>>,
            ProviderError,
        > {
            unimplemented!("not used in tests")
        }

        async fn chat_loop(
            &self,
            _history: Vec<Message>,
            _tools: Option<Vec<Tool>>,
        ) -> Result<crate::llm::ChatLoopHandle, ProviderError> {
            let mut script = self.script.lock().unwrap();
            let steps = script.remove(0);
            let (event_tx, event_rx) = mpsc::unbounded_channel();
            let (tool_result_tx, mut tool_result_rx) = mpsc::unbounded_channel();

            tokio::spawn(async move {
                for step in steps {
                    let is_tool_calls = matches!(step, Ok(LoopStep::ToolCallsRequested { .. }));
                    let _ = event_tx.send(step);
                    if is_tool_calls {
                        let _ = tool_result_rx.recv().await;
                    }
                }
            });

            Ok(crate::llm::ChatLoopHandle::new(event_rx, tool_result_tx))
        }

        async fn compact(&self, history: Vec<Message>) -> Result<Vec<Message>, ProviderError> {
            Ok(history)
        }

        fn get_history(&self) -> Vec<Message> {
            Vec::new()
        }

        fn prompt_cache(&mut self, _cache_prompt: String) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    fn user_history() -> Vec<Message> {
        vec![Message {
            role: Role::User,
            content: "hi".to_string(),
            tool_call_id: None,
            tool_calls: None,
        }]
    }

    #[tokio::test]
    async fn test_drive_surfaces_text_when_no_blocking_tool() {
        let provider = ScriptedProvider {
            script: StdMutex::new(vec![vec![Ok(LoopStep::Done {
                content: "hello there".to_string(),
                finish_reason: crate::llm::FinishReason::Stop,
                total_usage: Default::default(),
                all_tool_calls: vec![],
            })]]),
        };
        let rotator = KeyRotator::new(vec![provider]);
        let registry = ToolRegistry::new().register(BashTool::new());
        let store = HistoryStore::open_in_memory(1000).unwrap();
        let mut detector = LoopDetector::new();

        let outcome = drive(
            &rotator,
            &registry,
            &store,
            user_history(),
            1,
            None,
            None,
            &DriverConfig::default(),
            &mut detector,
        )
        .await;

        assert_eq!(outcome.final_text.as_deref(), Some("hello there"));
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_drive_runs_tool_and_surfaces_final_text() {
        let call = ToolCall {
            id: "call_1".to_string(),
            name: "bash".to_string(),
            arguments: serde_json::json!({"command": "echo hi"}),
        };
        let provider = ScriptedProvider {
            script: StdMutex::new(vec![vec![
                Ok(LoopStep::ToolCallsRequested {
                    tool_calls: vec![call],
                    content: String::new(),
                }),
                Ok(LoopStep::Done {
                    content: "done".to_string(),
                    finish_reason: crate::llm::FinishReason::Stop,
                    total_usage: Default::default(),
                    all_tool_calls: vec![],
                }),
            ]]),
        };
        let rotator = KeyRotator::new(vec![provider]);
        let registry = ToolRegistry::new().register(BashTool::new());
        let store = HistoryStore::open_in_memory(1000).unwrap();
        let mut detector = LoopDetector::new();

        let outcome = drive(
            &rotator,
            &registry,
            &store,
            user_history(),
            1,
            None,
            None,
            &DriverConfig::default(),
            &mut detector,
        )
        .await;

        assert_eq!(outcome.last_tool_called.as_deref(), Some("bash"));
        assert_eq!(outcome.final_text.as_deref(), Some("done"));
        let logs = store.read_recent_tool_logs(1, 10).unwrap();
        assert_eq!(logs.len(), 1);
    }
}
