//! Error types.

mod chat_error;

pub use chat_error::{ChatError, ChatResult};
