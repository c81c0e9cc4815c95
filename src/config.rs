//! Process configuration loaded from the environment.
//!
//! Mirrors the donor crate's builder-style config structs
//! (`ProviderConfig`, `ChatLoopConfig`) rather than a generic settings bag:
//! one flat struct, one fallible loader, typed fields.

use std::fs;
use std::path::PathBuf;

use crate::error::AgentError;

/// Top-level process configuration, loaded once at startup from the
/// environment variables enumerated in spec.md §6.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub admin_ids: Vec<i64>,

    pub google_api_keys: Vec<String>,
    pub openai_api_key: Option<String>,
    pub openai_organization_id: Option<String>,

    pub lite_model_name: String,
    pub pro_model_name: String,

    pub lite_prompt: String,
    pub pro_prompt: String,
    pub pro_func_decls: serde_json::Value,

    pub max_pro_fc_steps: usize,
    pub max_history_length: usize,

    pub command_timeout_seconds: u64,
    pub max_read_size_bytes: usize,
    pub max_write_size_bytes: usize,
    pub max_command_output_len: usize,

    pub database_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Missing required variables are a startup error (`AgentError::Config`),
    /// never a panic: a misconfigured deployment should fail loudly before
    /// the store or any provider is touched.
    pub fn from_env() -> Result<Self, AgentError> {
        let bot_token = required_var("BOT_TOKEN")?;

        let admin_ids = optional_var("ADMIN_IDS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<i64>()
                    .map_err(|e| AgentError::Config(format!("ADMIN_IDS: invalid id '{}': {}", s, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let google_api_keys = optional_var("GOOGLE_API_KEYS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();

        let openai_api_key = optional_var("OPENAI_API_KEY");
        let openai_organization_id = optional_var("OPENAI_ORGANIZATION_ID");

        if google_api_keys.is_empty() && openai_api_key.is_none() {
            return Err(AgentError::Config(
                "at least one of GOOGLE_API_KEYS or OPENAI_API_KEY must be set".to_string(),
            ));
        }

        let lite_model_name =
            optional_var("LITE_MODEL_NAME").unwrap_or_else(|| "gemini-3-flash-preview".to_string());
        let pro_model_name =
            optional_var("PRO_MODEL_NAME").unwrap_or_else(|| "gemini-3-pro-preview".to_string());

        let lite_prompt = load_prompt_file("LITE_PROMPT_FILE")?;
        let pro_prompt = load_prompt_file("PRO_PROMPT_FILE")?;
        let pro_func_decls = load_func_decl_file("PRO_FUNC_DECL_FILE")?;

        let max_pro_fc_steps = parse_usize("MAX_PRO_FC_STEPS", 10)?;
        let max_history_length = parse_usize("MAX_HISTORY_LENGTH", 50)?;

        let command_timeout_seconds = parse_u64("COMMAND_TIMEOUT_SECONDS", 30)?;
        let max_read_size_bytes = parse_usize("MAX_READ_SIZE_BYTES", 1_000_000)?;
        let max_write_size_bytes = parse_usize("MAX_WRITE_SIZE_BYTES", 1_000_000)?;
        let max_command_output_len = parse_usize("MAX_COMMAND_OUTPUT_LEN", 4_000)?;

        let database_path = PathBuf::from(
            optional_var("DATABASE_PATH").unwrap_or_else(|| "agent_core.sqlite3".to_string()),
        );

        Ok(Self {
            bot_token,
            admin_ids,
            google_api_keys,
            openai_api_key,
            openai_organization_id,
            lite_model_name,
            pro_model_name,
            lite_prompt,
            pro_prompt,
            pro_func_decls,
            max_pro_fc_steps,
            max_history_length,
            command_timeout_seconds,
            max_read_size_bytes,
            max_write_size_bytes,
            max_command_output_len,
            database_path,
        })
    }
}

fn required_var(name: &str) -> Result<String, AgentError> {
    std::env::var(name).map_err(|_| AgentError::Config(format!("{} is required", name)))
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn parse_usize(name: &str, default: usize) -> Result<usize, AgentError> {
    match optional_var(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e| AgentError::Config(format!("{}: {}", name, e))),
        None => Ok(default),
    }
}

fn parse_u64(name: &str, default: u64) -> Result<u64, AgentError> {
    match optional_var(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e| AgentError::Config(format!("{}: {}", name, e))),
        None => Ok(default),
    }
}

fn load_prompt_file(var_name: &str) -> Result<String, AgentError> {
    match optional_var(var_name) {
        Some(path) => fs::read_to_string(&path)
            .map_err(|e| AgentError::Config(format!("{} ('{}'): {}", var_name, path, e))),
        None => Ok(String::new()),
    }
}

fn load_func_decl_file(var_name: &str) -> Result<serde_json::Value, AgentError> {
    match optional_var(var_name) {
        Some(path) => {
            let raw = fs::read_to_string(&path)
                .map_err(|e| AgentError::Config(format!("{} ('{}'): {}", var_name, path, e)))?;
            serde_json::from_str(&raw)
                .map_err(|e| AgentError::Config(format!("{} ('{}'): {}", var_name, path, e)))
        }
        None => Ok(serde_json::Value::Array(Vec::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_missing_bot_token_is_config_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("BOT_TOKEN");
        let result = Config::from_env();
        assert!(matches!(result, Err(AgentError::Config(_))));
    }

    #[test]
    fn test_admin_ids_parses_comma_separated_list() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("BOT_TOKEN", "test-token");
        std::env::set_var("GOOGLE_API_KEYS", "key-a,key-b");
        std::env::set_var("ADMIN_IDS", "1, 2,3");

        let cfg = Config::from_env().expect("config should load");
        assert_eq!(cfg.admin_ids, vec![1, 2, 3]);
        assert_eq!(cfg.google_api_keys, vec!["key-a", "key-b"]);

        std::env::remove_var("BOT_TOKEN");
        std::env::remove_var("GOOGLE_API_KEYS");
        std::env::remove_var("ADMIN_IDS");
    }

    #[test]
    fn test_requires_at_least_one_provider_credential() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("BOT_TOKEN", "test-token");
        std::env::remove_var("GOOGLE_API_KEYS");
        std::env::remove_var("OPENAI_API_KEY");

        let result = Config::from_env();
        assert!(matches!(result, Err(AgentError::Config(_))));

        std::env::remove_var("BOT_TOKEN");
    }
}
