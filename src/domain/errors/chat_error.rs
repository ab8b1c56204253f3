//! Chat core error types.

use thiserror::Error;

use crate::domain::entities::ChannelId;

/// Convenience alias for chat core results.
pub type ChatResult<T> = Result<T, ChatError>;

/// Chat core error variants.
///
/// No variant is fatal to the process: every failure degrades to "the
/// specific action did not take effect" with prior state intact.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ChatError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("request rejected by server: {message}")]
    RequestRejected { message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{event} event references unknown channel {channel_id}")]
    OrphanEvent {
        event: &'static str,
        channel_id: ChannelId,
    },

    #[error("transport failure: {message}")]
    Transport { message: String },
}

impl ChatError {
    /// Creates a validation error.
    #[must_use]
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Creates a request-rejected error.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::RequestRejected {
            message: message.into(),
        }
    }

    /// Creates a not-found error for a channel lookup.
    #[must_use]
    pub fn channel_not_found(id: ChannelId) -> Self {
        Self::NotFound {
            entity: "channel",
            id: id.to_string(),
        }
    }

    /// Creates an orphan-event error.
    #[must_use]
    pub const fn orphan(event: &'static str, channel_id: ChannelId) -> Self {
        Self::OrphanEvent { event, channel_id }
    }

    /// Creates a transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Returns whether the action can be retried as-is by the user.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::RequestRejected { .. } | Self::Transport { .. }
        )
    }

    /// Returns whether this is a local pre-network validation failure.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}
