pub mod conversation;
pub mod gigachat;

pub use conversation::ConversationManager;
pub use gigachat::GigaChatClient;
