//! Chat channel entity.

use serde::{Deserialize, Serialize};

/// Unique identifier for a chat channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub u64);

impl ChannelId {
    /// Returns the underlying u64 value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ChannelId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Chat channel information.
///
/// The id is server-assigned and immutable; the name may change through a
/// server-confirmed rename event. Channels marked non-removable are the
/// designated defaults that must always survive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Channel {
    id: ChannelId,
    name: String,
    removable: bool,
}

impl Channel {
    /// Creates a new removable channel with the given ID and name.
    #[must_use]
    pub fn new(id: impl Into<ChannelId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            removable: true,
        }
    }

    /// Sets whether this channel may be removed.
    #[must_use]
    pub const fn with_removable(mut self, removable: bool) -> Self {
        self.removable = removable;
        self
    }

    /// Returns the channel ID.
    #[must_use]
    pub const fn id(&self) -> ChannelId {
        self.id
    }

    /// Returns the channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns whether this channel may be removed.
    #[must_use]
    pub const fn is_removable(&self) -> bool {
        self.removable
    }

    /// Replaces the channel name.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Returns the display name with the channel prefix.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("#{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_creation() {
        let channel = Channel::new(1_u64, "general");

        assert_eq!(channel.id().as_u64(), 1);
        assert_eq!(channel.name(), "general");
        assert!(channel.is_removable());
        assert_eq!(channel.display_name(), "#general");
    }

    #[test]
    fn test_channel_non_removable() {
        let channel = Channel::new(1_u64, "general").with_removable(false);
        assert!(!channel.is_removable());
    }

    #[test]
    fn test_channel_rename() {
        let mut channel = Channel::new(2_u64, "random");
        channel.rename("offtopic");
        assert_eq!(channel.name(), "offtopic");
        assert_eq!(channel.id(), ChannelId(2));
    }
}
