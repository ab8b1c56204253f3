//! Domain layer with core business entities and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{Channel, ChannelId, ChatSnapshot, ClientTag, Message, MessageId, UserIdentity};
pub use errors::{ChatError, ChatResult};
pub use ports::{ChatRequest, ServerEvent, TransportPort};
