//! Bootstrap snapshot used to seed a session.

use serde::{Deserialize, Serialize};

use super::{Channel, ChannelId, Message, UserIdentity};

/// Initial state handed to the client at startup.
///
/// Either supplied directly by the embedding application or materialized
/// from the server's hello frame by a transport adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatSnapshot {
    channels: Vec<Channel>,
    messages: Vec<Message>,
    current_channel_id: ChannelId,
    identity: UserIdentity,
}

impl ChatSnapshot {
    /// Creates a snapshot.
    #[must_use]
    pub fn new(
        channels: Vec<Channel>,
        messages: Vec<Message>,
        current_channel_id: impl Into<ChannelId>,
        identity: UserIdentity,
    ) -> Self {
        Self {
            channels,
            messages,
            current_channel_id: current_channel_id.into(),
            identity,
        }
    }

    /// Returns the seeded channels.
    #[must_use]
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Returns the seeded messages.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the initially active channel.
    #[must_use]
    pub const fn current_channel_id(&self) -> ChannelId {
        self.current_channel_id
    }

    /// Returns the session identity.
    #[must_use]
    pub const fn identity(&self) -> &UserIdentity {
        &self.identity
    }
}
