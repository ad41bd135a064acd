pub mod error;

pub use error::{AppError, CompletionError};
