//! In-process loopback transport.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::entities::{Channel, ChannelId, ChatSnapshot, Message, UserIdentity};
use crate::domain::errors::{ChatError, ChatResult};
use crate::domain::ports::{ChatRequest, RequestAck, ServerEvent, TransportPort};

struct ChannelRecord {
    name: String,
    removable: bool,
}

struct ServerState {
    channels: Mutex<BTreeMap<u64, ChannelRecord>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ServerEvent>>>,
    next_channel_id: AtomicU64,
    next_message_id: AtomicU64,
}

/// Transport backed by a toy authoritative server living in the same
/// process.
///
/// The server assigns entity ids, validates requests, and echoes every
/// accepted mutation as a canonical event to all subscribers, the sender
/// included — the same shape a remote chat server presents. Used by the
/// demo binary and by session-level tests.
pub struct LoopbackTransport {
    state: Arc<ServerState>,
}

impl LoopbackTransport {
    /// Creates a server seeded with the non-removable `general` channel.
    #[must_use]
    pub fn new() -> Self {
        let mut channels = BTreeMap::new();
        channels.insert(
            1,
            ChannelRecord {
                name: "general".to_string(),
                removable: false,
            },
        );

        Self {
            state: Arc::new(ServerState {
                channels: Mutex::new(channels),
                subscribers: Mutex::new(Vec::new()),
                next_channel_id: AtomicU64::new(2),
                next_message_id: AtomicU64::new(1),
            }),
        }
    }

    /// Seeds one extra removable channel.
    #[must_use]
    pub fn with_channel(self, name: impl Into<String>) -> Self {
        let id = self.state.next_channel_id.fetch_add(1, Ordering::Relaxed);
        self.state.channels.lock().insert(
            id,
            ChannelRecord {
                name: name.into(),
                removable: true,
            },
        );
        self
    }

    /// Materializes the bootstrap snapshot for a connecting client.
    #[must_use]
    pub fn snapshot(&self, identity: UserIdentity) -> ChatSnapshot {
        let channels: Vec<Channel> = self
            .state
            .channels
            .lock()
            .iter()
            .map(|(id, record)| {
                Channel::new(*id, record.name.clone()).with_removable(record.removable)
            })
            .collect();
        let current = channels.first().map_or(ChannelId(1), Channel::id);

        ChatSnapshot::new(channels, Vec::new(), current, identity)
    }

    fn broadcast(&self, event: ServerEvent) {
        debug!(event = event.event_name(), "Loopback broadcast");
        self.state
            .subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransportPort for LoopbackTransport {
    async fn request(&self, request: ChatRequest) -> ChatResult<RequestAck> {
        match request {
            ChatRequest::SendMessage {
                channel_id,
                tag,
                text,
                author,
            } => {
                if !self.state.channels.lock().contains_key(&channel_id.as_u64()) {
                    return Err(ChatError::rejected(format!(
                        "unknown channel {channel_id}"
                    )));
                }

                let id = self.state.next_message_id.fetch_add(1, Ordering::Relaxed);
                let message = Message::delivered(id, channel_id, author, text, Utc::now());
                self.broadcast(ServerEvent::MessageAdded {
                    message,
                    tag: Some(tag),
                });
                Ok(RequestAck::with_entity(id))
            }
            ChatRequest::CreateChannel { name } => {
                let mut channels = self.state.channels.lock();
                if channels.values().any(|record| record.name == name) {
                    return Err(ChatError::rejected(format!(
                        "channel {name} already exists"
                    )));
                }

                let id = self.state.next_channel_id.fetch_add(1, Ordering::Relaxed);
                channels.insert(
                    id,
                    ChannelRecord {
                        name: name.clone(),
                        removable: true,
                    },
                );
                drop(channels);

                self.broadcast(ServerEvent::ChannelAdded {
                    channel: Channel::new(id, name),
                });
                Ok(RequestAck::with_entity(id))
            }
            ChatRequest::RenameChannel { channel_id, name } => {
                let mut channels = self.state.channels.lock();
                let Some(record) = channels.get_mut(&channel_id.as_u64()) else {
                    return Err(ChatError::rejected(format!(
                        "unknown channel {channel_id}"
                    )));
                };
                record.name.clone_from(&name);
                drop(channels);

                self.broadcast(ServerEvent::ChannelRenamed { channel_id, name });
                Ok(RequestAck::default())
            }
            ChatRequest::RemoveChannel { channel_id } => {
                let mut channels = self.state.channels.lock();
                match channels.get(&channel_id.as_u64()) {
                    None => {
                        return Err(ChatError::rejected(format!(
                            "unknown channel {channel_id}"
                        )));
                    }
                    Some(record) if !record.removable => {
                        return Err(ChatError::rejected(format!(
                            "channel {} cannot be removed",
                            record.name
                        )));
                    }
                    Some(_) => {
                        channels.remove(&channel_id.as_u64());
                    }
                }
                drop(channels);

                self.broadcast(ServerEvent::ChannelRemoved { channel_id });
                Ok(RequestAck::default())
            }
        }
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.subscribers.lock().push(tx);
        rx
    }
}
