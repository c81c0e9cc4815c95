//! Thin harness wiring config -> store -> registry -> agent loop.
//!
//! There is no real chat transport in this crate (SPEC_FULL.md §0); this
//! reads one message per stdin line instead, in the form
//! `chat_id user_id text...`, and prints whatever the agent loop sends back.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use agent_core::agent_loop::{AgentLoop, ChatContext, ChatType};
use agent_core::config::Config;
use agent_core::driver::DriverConfig;
use agent_core::llm::{GeminiProvider, KeyRotator, LLMProvider, OpenAIProvider};
use agent_core::logging;
use agent_core::store::HistoryStore;
use agent_core::tools::{
    BashTool, EditFileTool, RememberUserInfoTool, SendTelegramMessageTool, ToolRegistry,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init("agent_core.log", logging::level_from_env());

    let config = Config::from_env()?;
    let store = Arc::new(HistoryStore::open(&config.database_path, 10_000)?);

    let registry = ToolRegistry::new()
        .register(
            BashTool::new()
                .with_timeout(config.command_timeout_seconds)
                .with_max_output_len(config.max_command_output_len),
        )
        .register(
            EditFileTool::new()
                .with_max_read_size(config.max_read_size_bytes)
                .with_max_write_size(config.max_write_size_bytes),
        )
        .register(RememberUserInfoTool::new(store.clone()))
        .register(SendTelegramMessageTool::new());

    let driver_config = DriverConfig {
        max_steps: config.max_pro_fc_steps,
        system_prompt: Some(config.pro_prompt.clone()),
        ..Default::default()
    };

    if !config.google_api_keys.is_empty() {
        let mut handles = Vec::new();
        for key in &config.google_api_keys {
            handles.push(GeminiProvider::new(config.pro_model_name.clone(), key.clone())?);
        }
        let rotator = KeyRotator::new(handles);
        let lite_provider = config
            .google_api_keys
            .first()
            .map(|key| GeminiProvider::new(config.lite_model_name.clone(), key.clone()))
            .transpose()?;
        if let Some(lite) = &lite_provider {
            let lite_prompt = config.lite_prompt.clone();
            lite.update_config(|cfg| cfg.system_prompt = Some(lite_prompt));
        }

        run(&config, &store, &registry, &rotator, lite_provider.as_ref(), driver_config).await
    } else {
        let api_key = config
            .openai_api_key
            .clone()
            .expect("Config::from_env guarantees at least one provider key set");
        let rotator = KeyRotator::new(vec![OpenAIProvider::new(
            config.pro_model_name.clone(),
            api_key,
        )?]);

        run::<OpenAIProvider, OpenAIProvider>(&config, &store, &registry, &rotator, None, driver_config)
            .await
    }
}

async fn run<P: LLMProvider, L: LLMProvider>(
    config: &Config,
    store: &Arc<HistoryStore>,
    registry: &ToolRegistry,
    rotator: &KeyRotator<P>,
    lite_provider: Option<&L>,
    driver_config: DriverConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let agent = AgentLoop {
        store,
        registry,
        rotator,
        lite_provider,
        driver_config,
        max_history_length: config.max_history_length,
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    println!("agent-core ready. each line: `<chat_id> <user_id> <text>`");
    for line in stdin.lock().lines() {
        let line = line?;
        let Some((chat_id, user_id, text)) = parse_line(&line) else {
            writeln!(out, "could not parse line, expected: <chat_id> <user_id> <text>")?;
            continue;
        };
        if text.is_empty() {
            continue;
        }

        let ctx = ChatContext {
            chat_id,
            user_id,
            chat_type: ChatType::Private,
            force_pro: false,
            is_reply_to_bot: false,
            mentions_bot: false,
        };

        match agent.handle_user_request(&ctx, text).await {
            Ok(Some(reply)) => writeln!(out, "{reply}")?,
            Ok(None) => {}
            Err(e) => writeln!(out, "error: {e}")?,
        }
        out.flush()?;
    }

    Ok(())
}

fn parse_line(line: &str) -> Option<(i64, i64, &str)> {
    let mut parts = line.splitn(3, ' ');
    let chat_id = parts.next()?.parse().ok()?;
    let user_id = parts.next()?.parse().ok()?;
    let text = parts.next().unwrap_or("");
    Some((chat_id, user_id, text))
}
