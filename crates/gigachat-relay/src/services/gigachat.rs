use chrono::Utc;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{GigaChatConfig, GigaChatCredentials};
use crate::models::chat::ChatMessage;
use crate::services::conversation::CompletionProvider;
use crate::utils::error::{AppError, CompletionError};

/// Refresh the token this long before the server-side expiry
const TOKEN_REFRESH_MARGIN_MS: i64 = 60_000;

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at_ms: i64,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Utc::now().timestamp_millis() + TOKEN_REFRESH_MARGIN_MS < self.expires_at_ms
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// epoch millis
    expires_at: i64,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    n: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// GigaChat REST client: OAuth token exchange plus chat completions.
///
/// Built once at startup and shared; the access token is cached inside.
pub struct GigaChatClient {
    client: Client,
    config: GigaChatConfig,
    credentials: GigaChatCredentials,
    token: Mutex<Option<AccessToken>>,
}

impl GigaChatClient {
    pub fn new(config: GigaChatConfig, credentials: GigaChatCredentials) -> Result<Self, AppError> {
        if !config.verify_ssl_certs {
            warn!("TLS certificate verification is disabled for GigaChat requests");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .danger_accept_invalid_certs(!config.verify_ssl_certs)
            .build()
            .map_err(|e| AppError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            config,
            credentials,
            token: Mutex::new(None),
        })
    }

    /// Cached token, or a fresh one from the auth endpoint
    async fn access_token(&self) -> Result<String, CompletionError> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        let token = self.fetch_token().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn fetch_token(&self) -> Result<AccessToken, CompletionError> {
        debug!("Requesting GigaChat access token (scope={})", self.config.scope);

        let response = self
            .client
            .post(&self.config.auth_url)
            .header(header::AUTHORIZATION, format!("Basic {}", self.credentials.encode()))
            .header("RqUID", Uuid::new_v4().to_string())
            .header(header::ACCEPT, "application/json")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(format!("scope={}", self.config.scope))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => CompletionError::RateLimited(body),
                _ => CompletionError::Auth(format!("token request failed: {} - {}", status, body)),
            });
        }

        let token: TokenResponse = response.json().await?;
        info!("✅ GigaChat access token acquired");

        Ok(AccessToken {
            value: token.access_token,
            expires_at_ms: token.expires_at,
        })
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    /// Single-choice chat completion
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        let token = self.access_token().await?;

        debug!("Calling GigaChat with {} messages", messages.len());

        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            n: 1,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url.trim_end_matches('/')))
            .bearer_auth(&token)
            .header(header::ACCEPT, "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::UNAUTHORIZED {
                // next turn re-authenticates
                self.invalidate_token().await;
            }
            return Err(status_error(status, body));
        }

        let completion: ChatCompletionResponse = response.json().await?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(CompletionError::EmptyChoices)
    }
}

fn status_error(status: StatusCode, body: String) -> CompletionError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CompletionError::Auth(format!("{} - {}", status, body))
        }
        StatusCode::TOO_MANY_REQUESTS => CompletionError::RateLimited(body),
        _ => CompletionError::Upstream {
            status: status.as_u16(),
            body,
        },
    }
}

#[async_trait::async_trait]
impl CompletionProvider for GigaChatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        self.chat(messages).await
    }
}
