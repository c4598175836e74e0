use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub execution: ExecutionConfig,
    pub runner: RunnerConfig,
    pub agent: AgentConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token
    pub bot_token: String,
    /// The single user id allowed to approve or reject trades
    pub allowed_user_id: String,
    /// Seconds to wait for an approval decision before denying
    #[serde(default = "default_approval_timeout")]
    pub approval_timeout_secs: u64,
    /// Bot API base URL (overridable for tests)
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Timeout for a single outbound Bot API request in seconds
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
}

fn default_approval_timeout() -> u64 {
    300
}

fn default_send_timeout() -> u64 {
    10
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Status polls before giving up and cancelling
    #[serde(default = "default_poll_budget")]
    pub poll_budget: u32,
    /// Interval between status polls in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_poll_budget() -> u32 {
    10
}

fn default_poll_interval() -> u64 {
    1000
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            poll_budget: 10,
            poll_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Total attempts per scheduled invocation (first try included)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between attempts in milliseconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1000
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Path to the agent CLI executable
    #[serde(default = "default_cli_path")]
    pub cli_path: String,
    /// Timeout for a single agent query in seconds
    #[serde(default = "default_agent_timeout")]
    pub timeout_secs: u64,
}

fn default_cli_path() -> String {
    "claude".to_string()
}

fn default_agent_timeout() -> u64 {
    120
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            cli_path: default_cli_path(),
            timeout_secs: default_agent_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("telegram.approval_timeout_secs", 300)?
            .set_default("telegram.send_timeout_secs", 10)?
            .set_default("execution.poll_budget", 10)?
            .set_default("execution.poll_interval_ms", 1000)?
            .set_default("runner.max_attempts", 3)?
            .set_default("runner.retry_delay_ms", 1000)?
            .set_default("agent.cli_path", "claude")?
            .set_default("agent.timeout_secs", 120)?
            .set_default("database.max_connections", 5)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("ORDERGATE_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (ORDERGATE_TELEGRAM__BOT_TOKEN, etc.)
            .add_source(
                Environment::with_prefix("ORDERGATE")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.telegram.bot_token.is_empty() {
            errors.push("telegram.bot_token must not be empty".to_string());
        }

        if self.telegram.allowed_user_id.is_empty() {
            errors.push("telegram.allowed_user_id must not be empty".to_string());
        }

        if self.telegram.approval_timeout_secs == 0 {
            errors.push("telegram.approval_timeout_secs must be positive".to_string());
        }

        if self.execution.poll_budget == 0 {
            errors.push("execution.poll_budget must be positive".to_string());
        }

        if self.runner.max_attempts == 0 {
            errors.push("runner.max_attempts must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
