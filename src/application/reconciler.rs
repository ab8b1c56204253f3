//! Reconciliation of server push events against optimistic local state.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::application::store::StoreHandle;
use crate::domain::entities::ClientTag;
use crate::domain::errors::{ChatError, ChatResult};
use crate::domain::ports::ServerEvent;

/// Lifecycle of one optimistic send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    /// Inserted locally, awaiting the server's verdict.
    Pending,
    /// The canonical echo arrived; the record now carries the server id.
    Confirmed,
    /// The request was rejected while still pending; the record is gone.
    RolledBack,
}

/// Registry of in-flight optimistic sends, shared between the dispatcher and
/// the reconciler.
///
/// An entry lives for the duration of its request future. A confirmation
/// arriving first marks the entry `Confirmed`, which makes a later rejection
/// a no-op; once the request resolves the entry is dropped, since no verdict
/// can arrive after that and the echo path works off the store alone.
#[derive(Clone, Default)]
pub struct PendingSends {
    entries: Arc<Mutex<HashMap<ClientTag, SendState>>>,
}

impl PendingSends {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a send as pending.
    pub(crate) fn begin(&self, tag: ClientTag) {
        self.entries.lock().insert(tag, SendState::Pending);
    }

    /// Returns the current state of a send, if tracked.
    #[must_use]
    pub fn state(&self, tag: ClientTag) -> Option<SendState> {
        self.entries.lock().get(&tag).copied()
    }

    /// Marks a pending send confirmed. Returns the prior state, if tracked.
    pub(crate) fn confirm(&self, tag: ClientTag) -> Option<SendState> {
        let mut entries = self.entries.lock();
        entries
            .get_mut(&tag)
            .map(|state| std::mem::replace(state, SendState::Confirmed))
    }

    /// Settles a send whose request resolved successfully.
    pub(crate) fn resolve_delivered(&self, tag: ClientTag) -> Option<SendState> {
        self.entries.lock().remove(&tag)
    }

    /// Settles a send whose request was rejected. Returns the terminal
    /// state: `RolledBack` when the rejection caught the send still pending,
    /// `Confirmed` when the echo won the race.
    pub(crate) fn resolve_failed(&self, tag: ClientTag) -> SendState {
        match self.entries.lock().remove(&tag) {
            Some(SendState::Pending) | None => SendState::RolledBack,
            Some(state) => state,
        }
    }
}

/// Merges canonical server events into the entity store, deduplicating
/// against optimistic sends already applied.
///
/// Events are applied strictly in arrival order by a single caller; channel
/// mutations are never optimistic, so only `newMessage` needs correlation.
#[derive(Clone)]
pub struct EventReconciler {
    store: StoreHandle,
    pending: PendingSends,
}

impl EventReconciler {
    /// Creates a reconciler over the given store and send registry.
    #[must_use]
    pub const fn new(store: StoreHandle, pending: PendingSends) -> Self {
        Self { store, pending }
    }

    /// Applies one server event.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::OrphanEvent` when the event references a channel
    /// the store does not know; the event is dropped and nothing mutates.
    pub fn apply(&self, event: ServerEvent) -> ChatResult<()> {
        match event {
            ServerEvent::MessageAdded { message, tag } => {
                let channel_id = message.channel_id();
                if !self.store.has_channel(channel_id) {
                    return Err(ChatError::orphan("newMessage", channel_id));
                }

                let Some(server_id) = message.id().server_id() else {
                    // A canonical event must carry a server id; drop it.
                    warn!(channel = %channel_id, "Dropping newMessage without server id");
                    return Ok(());
                };

                if let Some(tag) = tag
                    && self
                        .store
                        .confirm_message(tag, server_id, message.timestamp())
                {
                    self.pending.confirm(tag);
                    debug!(tag = %tag, id = server_id, "Optimistic send confirmed");
                    return Ok(());
                }

                if self.store.apply_message_insert(message) {
                    debug!(id = server_id, channel = %channel_id, "Message applied");
                }
                Ok(())
            }
            ServerEvent::ChannelAdded { channel } => {
                let id = channel.id();
                if self.store.apply_channel_upsert(channel) {
                    debug!(channel = %id, "Channel applied");
                }
                Ok(())
            }
            ServerEvent::ChannelRenamed { channel_id, name } => {
                if self.store.apply_channel_rename(channel_id, &name) {
                    Ok(())
                } else {
                    Err(ChatError::orphan("renameChannel", channel_id))
                }
            }
            ServerEvent::ChannelRemoved { channel_id } => {
                if self.store.apply_channel_removal(channel_id) {
                    Ok(())
                } else {
                    Err(ChatError::orphan("removeChannel", channel_id))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::entities::{
        Channel, ChannelId, ChatSnapshot, Message, MessageId, UserIdentity,
    };

    fn author() -> UserIdentity {
        UserIdentity::new("bob", "a.png")
    }

    fn setup() -> (StoreHandle, PendingSends, EventReconciler) {
        let store = StoreHandle::from_snapshot(&ChatSnapshot::new(
            vec![Channel::new(1_u64, "general").with_removable(false)],
            Vec::new(),
            1_u64,
            author(),
        ));
        let pending = PendingSends::new();
        let reconciler = EventReconciler::new(store.clone(), pending.clone());
        (store, pending, reconciler)
    }

    fn echo(tag: Option<ClientTag>, id: u64, text: &str) -> ServerEvent {
        ServerEvent::MessageAdded {
            message: Message::delivered(id, 1_u64, author(), text, Utc::now()),
            tag,
        }
    }

    #[test]
    fn test_echo_confirms_optimistic_send() {
        let (store, pending, reconciler) = setup();
        let tag = ClientTag::new();
        pending.begin(tag);
        store.apply_message_insert(Message::local(tag, 1_u64, author(), "hi", Utc::now()));

        reconciler.apply(echo(Some(tag), 42, "hi")).unwrap();

        let feed = store.messages_in(ChannelId(1));
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].id(), MessageId::Server(42));
        assert_eq!(pending.state(tag), Some(SendState::Confirmed));
    }

    #[test]
    fn test_duplicate_echo_is_idempotent() {
        let (store, _, reconciler) = setup();

        reconciler.apply(echo(None, 42, "hi")).unwrap();
        reconciler.apply(echo(None, 42, "hi")).unwrap();

        assert_eq!(store.messages_in(ChannelId(1)).len(), 1);
    }

    #[test]
    fn test_foreign_message_inserts_directly() {
        let (store, _, reconciler) = setup();

        reconciler.apply(echo(None, 7, "from another client")).unwrap();

        let feed = store.messages_in(ChannelId(1));
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].text(), "from another client");
    }

    #[test]
    fn test_unmatched_tag_falls_back_to_insert() {
        let (store, _, reconciler) = setup();

        // Tag refers to a send rolled back before the echo arrived.
        reconciler.apply(echo(Some(ClientTag::new()), 8, "late")).unwrap();

        assert_eq!(store.messages_in(ChannelId(1)).len(), 1);
    }

    #[test]
    fn test_orphan_message_event_mutates_nothing() {
        let (store, _, reconciler) = setup();
        let orphan = ServerEvent::MessageAdded {
            message: Message::delivered(9, 99_u64, author(), "ghost", Utc::now()),
            tag: None,
        };

        let result = reconciler.apply(orphan);

        assert!(matches!(result, Err(ChatError::OrphanEvent { .. })));
        assert!(store.messages().is_empty());
    }

    #[test]
    fn test_channel_lifecycle_events() {
        let (store, _, reconciler) = setup();

        reconciler
            .apply(ServerEvent::ChannelAdded {
                channel: Channel::new(2_u64, "random"),
            })
            .unwrap();
        assert_eq!(store.channels().len(), 2);

        reconciler
            .apply(ServerEvent::ChannelRenamed {
                channel_id: ChannelId(2),
                name: "offtopic".to_string(),
            })
            .unwrap();
        assert_eq!(store.channel_id_named("offtopic"), Some(ChannelId(2)));

        reconciler
            .apply(ServerEvent::ChannelRemoved {
                channel_id: ChannelId(2),
            })
            .unwrap();
        assert!(!store.has_channel(ChannelId(2)));
    }

    #[test]
    fn test_orphan_channel_events() {
        let (_, _, reconciler) = setup();

        let rename = reconciler.apply(ServerEvent::ChannelRenamed {
            channel_id: ChannelId(5),
            name: "ghost".to_string(),
        });
        assert!(matches!(rename, Err(ChatError::OrphanEvent { .. })));

        let removal = reconciler.apply(ServerEvent::ChannelRemoved {
            channel_id: ChannelId(5),
        });
        assert!(matches!(removal, Err(ChatError::OrphanEvent { .. })));
    }

    #[test]
    fn test_confirmation_wins_over_late_rejection() {
        let (_, pending, _) = setup();
        let tag = ClientTag::new();
        pending.begin(tag);

        assert_eq!(pending.confirm(tag), Some(SendState::Pending));
        assert_eq!(pending.resolve_failed(tag), SendState::Confirmed);
    }

    #[test]
    fn test_rejection_of_pending_send_rolls_back() {
        let (_, pending, _) = setup();
        let tag = ClientTag::new();
        pending.begin(tag);

        assert_eq!(pending.resolve_failed(tag), SendState::RolledBack);
        assert_eq!(pending.state(tag), None);
    }
}
