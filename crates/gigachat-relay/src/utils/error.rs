use thiserror::Error;

/// Startup-time errors. All of them are fatal.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing GigaChat credentials: {0} is not set")]
    MissingCredential(&'static str),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Failure of a single chat-completion call.
///
/// The Display text is what ends up after the error prefix in the reply.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    #[error("timeout")]
    Timeout,

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("upstream error {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("no choices returned")]
    EmptyChoices,

    #[error("{0}")]
    Transport(String),
}

impl CompletionError {
    /// Short stable label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            CompletionError::Timeout => "timeout",
            CompletionError::Auth(_) => "auth",
            CompletionError::RateLimited(_) => "rate_limited",
            CompletionError::Upstream { .. } => "upstream",
            CompletionError::Malformed(_) => "malformed",
            CompletionError::EmptyChoices => "empty_choices",
            CompletionError::Transport(_) => "transport",
        }
    }
}

impl From<reqwest::Error> for CompletionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CompletionError::Timeout
        } else if e.is_decode() {
            CompletionError::Malformed(e.to_string())
        } else {
            CompletionError::Transport(e.to_string())
        }
    }
}
