pub mod settings;

pub use settings::{
    ConversationConfig, GigaChatConfig, GigaChatCredentials, LoggingConfig, ServerConfig, Settings,
};
