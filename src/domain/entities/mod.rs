//! Domain entity definitions.

mod channel;
mod identity;
mod message;
mod snapshot;

pub use channel::{Channel, ChannelId};
pub use identity::UserIdentity;
pub use message::{ClientTag, Message, MessageId};
pub use snapshot::ChatSnapshot;
