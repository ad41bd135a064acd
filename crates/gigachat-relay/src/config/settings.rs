use base64::{engine::general_purpose::STANDARD, Engine as _};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::error::AppError;

pub const CLIENT_ID_VAR: &str = "GIGACHAT_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "GIGACHAT_CLIENT_SECRET";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub gigachat: GigaChatConfig,
    pub conversation: ConversationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub body_limit_bytes: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GigaChatConfig {
    pub auth_url: String,
    pub base_url: String,
    pub scope: String,
    pub model: String,
    pub timeout_seconds: u64,
    pub verify_ssl_certs: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConversationConfig {
    pub system_prompt: String,
    pub history_window: usize,
    /// Run turns of the same user one at a time
    pub serialize_user_turns: bool,
    /// 0 keeps sessions for the process lifetime
    pub session_idle_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub json: bool,
    pub directory: Option<String>,
}

impl Settings {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("server.body_limit_bytes", 64 * 1024)?
            .set_default("gigachat.auth_url", "https://ngw.devices.sberbank.ru:9443/api/v2/oauth")?
            .set_default("gigachat.base_url", "https://gigachat.devices.sberbank.ru/api/v1")?
            .set_default("gigachat.scope", "GIGACHAT_API_PERS")?
            .set_default("gigachat.model", "GigaChat")?
            .set_default("gigachat.timeout_seconds", 30)?
            .set_default("gigachat.verify_ssl_certs", false)?
            .set_default("conversation.system_prompt", "Отвечай кратко и полезно.")?
            .set_default("conversation.history_window", 10)?
            .set_default("conversation.serialize_user_turns", true)?
            .set_default("conversation.session_idle_ttl_secs", 0)?
            .set_default("conversation.sweep_interval_secs", 300)?
            .set_default("logging.json", true)?
            .add_source(File::with_name("config/settings").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.conversation.history_window == 0 {
            return Err(AppError::InvalidConfig(
                "conversation.history_window must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// GigaChat API client credentials.
///
/// Kept out of [`Settings`] so the secret never shows up in config dumps.
#[derive(Clone)]
pub struct GigaChatCredentials {
    client_id: String,
    client_secret: String,
}

impl GigaChatCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Read both variables from the environment; either one missing is fatal.
    pub fn from_env() -> Result<Self, AppError> {
        let client_id = require_env(CLIENT_ID_VAR)?;
        let client_secret = require_env(CLIENT_SECRET_VAR)?;
        Ok(Self::new(client_id, client_secret))
    }

    /// base64("client_id:client_secret"), used as the Basic auth token
    pub fn encode(&self) -> String {
        STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret))
    }
}

impl fmt::Debug for GigaChatCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GigaChatCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

fn require_env(name: &'static str) -> Result<String, AppError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AppError::MissingCredential(name)),
    }
}
