//! Chat message entity and its identifiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ChannelId, UserIdentity};

/// Client-generated correlation tag attached to an outgoing send request.
///
/// The server echoes the tag in the canonical `newMessage` event, which is
/// how an optimistic local record is matched with its authoritative
/// counterpart. Content matching is deliberately not used: it false-merges
/// duplicate rapid sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientTag(Uuid);

impl ClientTag {
    /// Generates a fresh random tag.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for ClientTag {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ClientTag {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// Identifier of a message record.
///
/// A locally-sent message starts out with a provisional client tag and is
/// rewritten in place to the server-assigned id once the echo arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageId {
    /// Provisional client-side identifier of a not-yet-acknowledged send.
    Local(ClientTag),
    /// Canonical server-assigned identifier.
    Server(u64),
}

impl MessageId {
    /// Returns true for a provisional identifier.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// Returns the server-assigned id, if reconciled.
    #[must_use]
    pub const fn server_id(&self) -> Option<u64> {
        if let Self::Server(id) = self {
            Some(*id)
        } else {
            None
        }
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(tag) => write!(f, "local:{tag}"),
            Self::Server(id) => write!(f, "{id}"),
        }
    }
}

impl From<u64> for MessageId {
    fn from(value: u64) -> Self {
        Self::Server(value)
    }
}

/// Chat message entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    id: MessageId,
    channel_id: ChannelId,
    author: UserIdentity,
    text: String,
    timestamp: DateTime<Utc>,
}

impl Message {
    /// Creates an optimistic local message awaiting server acknowledgement.
    #[must_use]
    pub fn local(
        tag: ClientTag,
        channel_id: impl Into<ChannelId>,
        author: UserIdentity,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MessageId::Local(tag),
            channel_id: channel_id.into(),
            author,
            text: text.into(),
            timestamp,
        }
    }

    /// Creates a message carrying a canonical server-assigned id.
    #[must_use]
    pub fn delivered(
        id: u64,
        channel_id: impl Into<ChannelId>,
        author: UserIdentity,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MessageId::Server(id),
            channel_id: channel_id.into(),
            author,
            text: text.into(),
            timestamp,
        }
    }

    /// Returns the message identifier.
    #[must_use]
    pub const fn id(&self) -> MessageId {
        self.id
    }

    /// Returns the provisional tag of a not-yet-reconciled message.
    #[must_use]
    pub const fn client_tag(&self) -> Option<ClientTag> {
        if let MessageId::Local(tag) = self.id {
            Some(tag)
        } else {
            None
        }
    }

    /// Returns the channel this message belongs to.
    #[must_use]
    pub const fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    /// Returns the author identity stamped on the message.
    #[must_use]
    pub const fn author(&self) -> &UserIdentity {
        &self.author
    }

    /// Returns the message text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the message timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns true while the message awaits server acknowledgement.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.id.is_local()
    }

    /// Replaces the provisional id and timestamp with the server-assigned
    /// ones, in place.
    pub fn confirm(&mut self, server_id: u64, timestamp: DateTime<Utc>) {
        self.id = MessageId::Server(server_id);
        self.timestamp = timestamp;
    }

    /// Returns the timestamp rendered for the feed.
    #[must_use]
    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format("%H:%M:%S").to_string()
    }
}
