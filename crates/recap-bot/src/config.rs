use config::{Config as ConfigLoader, ConfigError, Environment, File};
use recap_context::DigestSettings;
use recap_llm::{OpenAIConfig, ProviderConfig};
use recap_store::{ConversationId, RetentionPolicy};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub digest: DigestConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,

    // Secrets (from ENV only)
    #[serde(default)]
    pub telegram_token: String,
    #[serde(default)]
    pub openai_api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Long-poll timeout for inbound updates
    pub poll_timeout_secs: u64,
    /// Pause after a failed poll before trying again
    pub error_backoff_ms: u64,
    /// Conversation allowed to run administrative commands
    pub admin_chat_id: Option<ConversationId>,
    /// Override for the transport API endpoint
    pub api_base_url: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            poll_timeout_secs: 30,
            error_backoff_ms: 2000,
            admin_chat_id: None,
            api_base_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: recap_context::prompts::DEFAULT_MODEL.to_string(),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    pub bucket_tokens: u32,
    pub answer_tokens: u32,
    pub question_tokens: u32,
    pub call_delay_ms: u64,
    pub context_hours: i64,
    pub question_context_messages: usize,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            bucket_tokens: 200,
            answer_tokens: 500,
            question_tokens: 200,
            call_delay_ms: 1000,
            context_hours: 24,
            question_context_messages: 50,
        }
    }
}

impl DigestConfig {
    /// `None` unless `context_hours` is a positive, representable span
    pub fn context_window(&self) -> Option<chrono::Duration> {
        chrono::Duration::try_hours(self.context_hours).filter(|window| *window > chrono::Duration::zero())
    }
}

impl From<&DigestConfig> for DigestSettings {
    fn from(config: &DigestConfig) -> Self {
        let defaults = DigestSettings::default();
        Self {
            bucket_tokens: config.bucket_tokens,
            answer_tokens: config.answer_tokens,
            question_tokens: config.question_tokens,
            call_delay: Duration::from_millis(config.call_delay_ms),
            context_window: config.context_window().unwrap_or(defaults.context_window),
            question_context_messages: config.question_context_messages,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub message_hours: i64,
    pub summary_minutes: i64,
    pub sweep_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            message_hours: 24,
            summary_minutes: 60,
            sweep_interval_secs: 10,
        }
    }
}

impl RetentionConfig {
    pub fn policy(&self) -> Result<RetentionPolicy, ConfigError> {
        let messages = chrono::Duration::try_hours(self.message_hours).ok_or_else(|| {
            ConfigError::Message(format!("retention.message_hours out of range: {}", self.message_hours))
        })?;
        let summaries = chrono::Duration::try_minutes(self.summary_minutes).ok_or_else(|| {
            ConfigError::Message(format!("retention.summary_minutes out of range: {}", self.summary_minutes))
        })?;
        RetentionPolicy::new(messages, summaries).map_err(|e| ConfigError::Message(e.to_string()))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. Environment variables `RECAP_<SECTION>__<KEY>`, e.g. `RECAP_LLM__MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let builder = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("RECAP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut cfg: Config = builder.build()?.try_deserialize()?;

        // Secrets from ENV (not in TOML)
        cfg.telegram_token = std::env::var("TTOKEN")
            .map_err(|_| ConfigError::Message("TTOKEN environment variable is required".to_string()))?;
        cfg.openai_api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::Message("OPENAI_API_KEY environment variable is required".to_string()))?;

        if let Ok(admin) = std::env::var("ADMIN_CHAT_ID") {
            let admin = admin
                .trim()
                .parse()
                .map_err(|_| ConfigError::Message(format!("ADMIN_CHAT_ID is not a chat id: {}", admin)))?;
            cfg.bot.admin_chat_id = Some(admin);
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .add_source(File::from(path.as_ref()))
            .build()?;
        let cfg: Config = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retention.policy()?;
        if self.digest.bucket_tokens == 0 || self.digest.answer_tokens == 0 || self.digest.question_tokens == 0 {
            return Err(ConfigError::Message("token budgets must be positive".to_string()));
        }
        if self.digest.context_window().is_none() {
            return Err(ConfigError::Message(format!(
                "digest.context_hours must be a positive number of hours, got {}",
                self.digest.context_hours
            )));
        }
        if self.retention.sweep_interval_secs == 0 {
            return Err(ConfigError::Message("sweep interval must be positive".to_string()));
        }
        Ok(())
    }

    pub fn provider_config(&self) -> ProviderConfig {
        let mut openai = OpenAIConfig::new(self.openai_api_key.clone());
        if let Some(base_url) = &self.llm.base_url {
            openai = openai.with_base_url(base_url.clone());
        }
        ProviderConfig::OpenAI(openai)
    }

    pub fn digest_settings(&self) -> DigestSettings {
        DigestSettings::from(&self.digest)
    }
}
