//! Transport port definition.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::entities::{Channel, ChannelId, ClientTag, Message, UserIdentity};
use crate::domain::errors::ChatResult;

/// Request relayed to the server for acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatRequest {
    /// Deliver a message to a channel.
    SendMessage {
        /// Target channel.
        channel_id: ChannelId,
        /// Correlation tag echoed back in the canonical event.
        tag: ClientTag,
        /// Message body.
        text: String,
        /// Identity stamped on the message.
        author: UserIdentity,
    },
    /// Create a channel; the server assigns its identity.
    CreateChannel {
        /// Requested channel name.
        name: String,
    },
    /// Rename an existing channel.
    RenameChannel {
        /// Channel to rename.
        channel_id: ChannelId,
        /// New name.
        name: String,
    },
    /// Remove an existing channel.
    RemoveChannel {
        /// Channel to remove.
        channel_id: ChannelId,
    },
}

impl ChatRequest {
    /// Returns the wire kind of this request.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SendMessage { .. } => "sendMessage",
            Self::CreateChannel { .. } => "createChannel",
            Self::RenameChannel { .. } => "renameChannel",
            Self::RemoveChannel { .. } => "removeChannel",
        }
    }

    /// Returns the channel the request targets, if any.
    #[must_use]
    pub const fn channel_id(&self) -> Option<ChannelId> {
        match self {
            Self::SendMessage { channel_id, .. }
            | Self::RenameChannel { channel_id, .. }
            | Self::RemoveChannel { channel_id } => Some(*channel_id),
            Self::CreateChannel { .. } => None,
        }
    }
}

/// Positive server acknowledgement of a request.
///
/// Carries the id of the entity the server created, when there is one. The
/// canonical state change always arrives through the event stream; the ack
/// only settles the request future.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestAck {
    entity_id: Option<u64>,
}

impl RequestAck {
    /// Creates an ack carrying a created entity id.
    #[must_use]
    pub const fn with_entity(entity_id: u64) -> Self {
        Self {
            entity_id: Some(entity_id),
        }
    }

    /// Returns the created entity id, if any.
    #[must_use]
    pub const fn entity_id(&self) -> Option<u64> {
        self.entity_id
    }
}

/// Canonical event pushed by the server, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A message was accepted and broadcast to all clients.
    MessageAdded {
        /// The canonical message, with server-assigned id and timestamp.
        message: Message,
        /// Correlation tag of the originating send, when the sender is us.
        tag: Option<ClientTag>,
    },
    /// A channel was created.
    ChannelAdded {
        /// The canonical channel.
        channel: Channel,
    },
    /// A channel was renamed.
    ChannelRenamed {
        /// The renamed channel.
        channel_id: ChannelId,
        /// Its new name.
        name: String,
    },
    /// A channel was removed.
    ChannelRemoved {
        /// The removed channel.
        channel_id: ChannelId,
    },
}

impl ServerEvent {
    /// Returns the wire name of this event.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::MessageAdded { .. } => "newMessage",
            Self::ChannelAdded { .. } => "newChannel",
            Self::ChannelRenamed { .. } => "renameChannel",
            Self::ChannelRemoved { .. } => "removeChannel",
        }
    }

    /// Returns the channel the event refers to.
    #[must_use]
    pub const fn channel_id(&self) -> ChannelId {
        match self {
            Self::MessageAdded { message, .. } => message.channel_id(),
            Self::ChannelAdded { channel } => channel.id(),
            Self::ChannelRenamed { channel_id, .. } | Self::ChannelRemoved { channel_id } => {
                *channel_id
            }
        }
    }

    /// Returns true for channel lifecycle events.
    #[must_use]
    pub const fn is_channel_event(&self) -> bool {
        !matches!(self, Self::MessageAdded { .. })
    }
}

/// Port for the bidirectional server connection.
///
/// Implementations must deliver pushed events in arrival order and resolve
/// each request exactly once. No timeout is imposed here: a stalled request
/// leaves the caller suspended, by contract.
#[async_trait]
pub trait TransportPort: Send + Sync {
    /// Relays a request and awaits the server's acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::RequestRejected` when the server declines, or
    /// `ChatError::Transport` when the connection fails mid-flight.
    async fn request(&self, request: ChatRequest) -> ChatResult<RequestAck>;

    /// Registers a subscriber for pushed server events.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<ServerEvent>;
}

#[cfg(test)]
pub mod mock {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tokio::sync::Notify;

    use super::*;
    use crate::domain::errors::ChatError;

    /// Scripted outcome of the next mock request.
    #[derive(Clone)]
    pub enum MockBehavior {
        /// Resolve immediately with an ack.
        Accept,
        /// Resolve immediately with a rejection.
        Reject(String),
        /// Resolve with an ack once released.
        AcceptAfter(Arc<Notify>),
        /// Resolve with a rejection once released.
        RejectAfter(Arc<Notify>),
    }

    /// Mock transport recording requests and replaying scripted outcomes.
    pub struct MockTransport {
        behavior: Mutex<MockBehavior>,
        requests: Mutex<Vec<ChatRequest>>,
        subscribers: Mutex<Vec<mpsc::UnboundedSender<ServerEvent>>>,
    }

    impl MockTransport {
        /// Creates a mock accepting every request.
        pub fn new() -> Self {
            Self::with_behavior(MockBehavior::Accept)
        }

        /// Creates a mock rejecting every request with the given message.
        pub fn rejecting(message: impl Into<String>) -> Self {
            Self::with_behavior(MockBehavior::Reject(message.into()))
        }

        /// Creates a mock with an explicit behavior script.
        pub fn with_behavior(behavior: MockBehavior) -> Self {
            Self {
                behavior: Mutex::new(behavior),
                requests: Mutex::new(Vec::new()),
                subscribers: Mutex::new(Vec::new()),
            }
        }

        /// Returns the requests relayed so far.
        pub fn sent_requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().clone()
        }

        /// Pushes a server event to every subscriber.
        pub fn push_event(&self, event: ServerEvent) {
            self.subscribers
                .lock()
                .retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    impl Default for MockTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl TransportPort for MockTransport {
        async fn request(&self, request: ChatRequest) -> ChatResult<RequestAck> {
            self.requests.lock().push(request);

            let behavior = self.behavior.lock().clone();
            match behavior {
                MockBehavior::Accept => Ok(RequestAck::default()),
                MockBehavior::Reject(message) => Err(ChatError::rejected(message)),
                MockBehavior::AcceptAfter(gate) => {
                    gate.notified().await;
                    Ok(RequestAck::default())
                }
                MockBehavior::RejectAfter(gate) => {
                    gate.notified().await;
                    Err(ChatError::rejected("rejected after gate"))
                }
            }
        }

        fn subscribe(&self) -> mpsc::UnboundedReceiver<ServerEvent> {
            let (tx, rx) = mpsc::unbounded_channel();
            self.subscribers.lock().push(tx);
            rx
        }
    }
}
