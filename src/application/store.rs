//! Normalized in-memory chat state.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::debug;

use crate::domain::entities::{
    Channel, ChannelId, ChatSnapshot, ClientTag, Message, MessageId,
};
use crate::domain::errors::{ChatError, ChatResult};

/// Normalized tables for channels and messages, plus the active channel
/// pointer.
///
/// The store is the single owner of chat records. Writes are idempotent and
/// keyed by entity id; every effective write bumps a revision counter that
/// read views observe through [`EntityStore::subscribe`]. Re-applying an
/// identical record leaves the revision untouched.
pub struct EntityStore {
    channels: BTreeMap<ChannelId, Channel>,
    messages: Vec<Message>,
    active_channel: Option<ChannelId>,
    revision: u64,
    notifier: watch::Sender<u64>,
}

impl EntityStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (notifier, _) = watch::channel(0);
        Self {
            channels: BTreeMap::new(),
            messages: Vec::new(),
            active_channel: None,
            revision: 0,
            notifier,
        }
    }

    /// Creates a store seeded from a bootstrap snapshot.
    ///
    /// Messages referencing channels absent from the snapshot are dropped,
    /// and an unknown current-channel pointer falls back to the first
    /// surviving channel.
    #[must_use]
    pub fn from_snapshot(snapshot: &ChatSnapshot) -> Self {
        let mut store = Self::new();

        for channel in snapshot.channels() {
            store.channels.insert(channel.id(), channel.clone());
        }
        for message in snapshot.messages() {
            if store.channels.contains_key(&message.channel_id()) {
                store.messages.push(message.clone());
            }
        }

        let current = snapshot.current_channel_id();
        store.active_channel = if store.channels.contains_key(&current) {
            Some(current)
        } else {
            store.fallback_channel()
        };

        store
    }

    /// Returns all channels, ordered by id.
    #[must_use]
    pub fn channels(&self) -> Vec<Channel> {
        self.channels.values().cloned().collect()
    }

    /// Looks up a channel by id.
    #[must_use]
    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(&id)
    }

    /// Returns whether the channel exists.
    #[must_use]
    pub fn has_channel(&self, id: ChannelId) -> bool {
        self.channels.contains_key(&id)
    }

    /// Looks up a channel id by exact name.
    #[must_use]
    pub fn channel_id_named(&self, name: &str) -> Option<ChannelId> {
        self.channels
            .values()
            .find(|channel| channel.name() == name)
            .map(Channel::id)
    }

    /// Returns all messages in feed order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the messages of one channel in feed order.
    #[must_use]
    pub fn messages_in(&self, channel_id: ChannelId) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|message| message.channel_id() == channel_id)
            .cloned()
            .collect()
    }

    /// Returns the active channel pointer.
    #[must_use]
    pub const fn active_channel_id(&self) -> Option<ChannelId> {
        self.active_channel
    }

    /// Returns the current revision counter.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Registers a read view for change notification.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.notifier.subscribe()
    }

    /// Inserts or replaces a channel. Returns false for an identical record.
    pub fn apply_channel_upsert(&mut self, channel: Channel) -> bool {
        if self.channels.get(&channel.id()) == Some(&channel) {
            return false;
        }
        self.channels.insert(channel.id(), channel);
        if self.active_channel.is_none() {
            self.active_channel = self.fallback_channel();
        }
        self.touch();
        true
    }

    /// Renames a channel in place. Returns false if the channel is unknown.
    pub fn apply_channel_rename(&mut self, id: ChannelId, name: &str) -> bool {
        let Some(channel) = self.channels.get_mut(&id) else {
            return false;
        };
        if channel.name() != name {
            channel.rename(name);
            self.touch();
        }
        true
    }

    /// Removes a channel, cascading its messages and reassigning the active
    /// pointer when needed. Returns false if the channel was already absent.
    pub fn apply_channel_removal(&mut self, id: ChannelId) -> bool {
        if self.channels.remove(&id).is_none() {
            return false;
        }

        self.messages.retain(|message| message.channel_id() != id);

        if self.active_channel == Some(id) {
            self.active_channel = self.fallback_channel();
            debug!(
                removed = %id,
                fallback = ?self.active_channel,
                "Active channel removed, reassigned"
            );
        }

        self.touch();
        true
    }

    /// Appends a message. Returns false for a duplicate id.
    pub fn apply_message_insert(&mut self, message: Message) -> bool {
        if self.messages.iter().any(|m| m.id() == message.id()) {
            return false;
        }
        self.messages.push(message);
        self.touch();
        true
    }

    /// Replaces a provisional message id and timestamp with the
    /// server-assigned ones, in place. Returns false when no message carries
    /// the tag or the server id is already present.
    pub fn confirm_message(
        &mut self,
        tag: ClientTag,
        server_id: u64,
        timestamp: DateTime<Utc>,
    ) -> bool {
        if self
            .messages
            .iter()
            .any(|m| m.id() == MessageId::Server(server_id))
        {
            return false;
        }
        let Some(message) = self
            .messages
            .iter_mut()
            .find(|m| m.id() == MessageId::Local(tag))
        else {
            return false;
        };

        message.confirm(server_id, timestamp);
        self.touch();
        true
    }

    /// Removes a single message by id. Returns false if absent.
    pub fn remove_message(&mut self, id: MessageId) -> bool {
        let before = self.messages.len();
        self.messages.retain(|message| message.id() != id);
        if self.messages.len() == before {
            return false;
        }
        self.touch();
        true
    }

    /// Moves the active channel pointer.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::NotFound` for an unknown channel id.
    pub fn set_active_channel(&mut self, id: ChannelId) -> ChatResult<()> {
        if !self.channels.contains_key(&id) {
            return Err(ChatError::channel_not_found(id));
        }
        if self.active_channel != Some(id) {
            self.active_channel = Some(id);
            self.touch();
        }
        Ok(())
    }

    /// Lowest-id surviving non-removable channel, else lowest-id survivor.
    fn fallback_channel(&self) -> Option<ChannelId> {
        self.channels
            .values()
            .find(|channel| !channel.is_removable())
            .or_else(|| self.channels.values().next())
            .map(Channel::id)
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.notifier.send_replace(self.revision);
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable, thread-safe handle to the entity store.
///
/// Read accessors are public; writes are crate-private so that the action
/// dispatcher and event reconciler remain the only writers. The lock is
/// never held across an await point.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<RwLock<EntityStore>>,
}

impl StoreHandle {
    /// Creates a handle over an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(EntityStore::new())),
        }
    }

    /// Creates a handle over a snapshot-seeded store.
    #[must_use]
    pub fn from_snapshot(snapshot: &ChatSnapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(EntityStore::from_snapshot(snapshot))),
        }
    }

    /// Returns all channels, ordered by id.
    #[must_use]
    pub fn channels(&self) -> Vec<Channel> {
        self.inner.read().channels()
    }

    /// Looks up a channel by id.
    #[must_use]
    pub fn channel(&self, id: ChannelId) -> Option<Channel> {
        self.inner.read().channel(id).cloned()
    }

    /// Returns whether the channel exists.
    #[must_use]
    pub fn has_channel(&self, id: ChannelId) -> bool {
        self.inner.read().has_channel(id)
    }

    /// Looks up a channel id by exact name.
    #[must_use]
    pub fn channel_id_named(&self, name: &str) -> Option<ChannelId> {
        self.inner.read().channel_id_named(name)
    }

    /// Returns all messages in feed order.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.inner.read().messages().to_vec()
    }

    /// Returns the messages of one channel in feed order.
    #[must_use]
    pub fn messages_in(&self, channel_id: ChannelId) -> Vec<Message> {
        self.inner.read().messages_in(channel_id)
    }

    /// Returns the active channel pointer.
    #[must_use]
    pub fn active_channel_id(&self) -> Option<ChannelId> {
        self.inner.read().active_channel_id()
    }

    /// Returns the current revision counter.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.inner.read().revision()
    }

    /// Registers a read view for change notification.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.read().subscribe()
    }

    pub(crate) fn apply_channel_upsert(&self, channel: Channel) -> bool {
        self.inner.write().apply_channel_upsert(channel)
    }

    pub(crate) fn apply_channel_rename(&self, id: ChannelId, name: &str) -> bool {
        self.inner.write().apply_channel_rename(id, name)
    }

    pub(crate) fn apply_channel_removal(&self, id: ChannelId) -> bool {
        self.inner.write().apply_channel_removal(id)
    }

    pub(crate) fn apply_message_insert(&self, message: Message) -> bool {
        self.inner.write().apply_message_insert(message)
    }

    pub(crate) fn confirm_message(
        &self,
        tag: ClientTag,
        server_id: u64,
        timestamp: DateTime<Utc>,
    ) -> bool {
        self.inner.write().confirm_message(tag, server_id, timestamp)
    }

    pub(crate) fn remove_message(&self, id: MessageId) -> bool {
        self.inner.write().remove_message(id)
    }

    pub(crate) fn set_active_channel(&self, id: ChannelId) -> ChatResult<()> {
        self.inner.write().set_active_channel(id)
    }
}

impl Default for StoreHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::entities::UserIdentity;

    fn author() -> UserIdentity {
        UserIdentity::new("bob", "a.png")
    }

    fn seeded() -> EntityStore {
        let snapshot = ChatSnapshot::new(
            vec![
                Channel::new(1_u64, "general").with_removable(false),
                Channel::new(2_u64, "random"),
            ],
            vec![Message::delivered(10, 2_u64, author(), "old", Utc::now())],
            1_u64,
            author(),
        );
        EntityStore::from_snapshot(&snapshot)
    }

    #[test]
    fn test_snapshot_seeding() {
        let store = seeded();

        assert_eq!(store.channels().len(), 2);
        assert_eq!(store.active_channel_id(), Some(ChannelId(1)));
        assert_eq!(store.messages_in(ChannelId(2)).len(), 1);
    }

    #[test]
    fn test_snapshot_drops_orphan_messages_and_pointer() {
        let snapshot = ChatSnapshot::new(
            vec![Channel::new(1_u64, "general").with_removable(false)],
            vec![Message::delivered(10, 9_u64, author(), "orphan", Utc::now())],
            9_u64,
            author(),
        );
        let store = EntityStore::from_snapshot(&snapshot);

        assert!(store.messages().is_empty());
        assert_eq!(store.active_channel_id(), Some(ChannelId(1)));
    }

    #[test]
    fn test_channel_upsert_is_idempotent() {
        let mut store = seeded();
        let revision = store.revision();

        assert!(!store.apply_channel_upsert(Channel::new(2_u64, "random")));
        assert_eq!(store.revision(), revision);

        assert!(store.apply_channel_upsert(Channel::new(3_u64, "music")));
        assert_eq!(store.revision(), revision + 1);
    }

    #[test]
    fn test_message_insert_is_idempotent() {
        let mut store = seeded();
        let message = Message::delivered(11, 1_u64, author(), "hi", Utc::now());

        assert!(store.apply_message_insert(message.clone()));
        let revision = store.revision();
        assert!(!store.apply_message_insert(message));
        assert_eq!(store.revision(), revision);
        assert_eq!(store.messages_in(ChannelId(1)).len(), 1);
    }

    #[test]
    fn test_removing_active_channel_reassigns_and_cascades() {
        let mut store = seeded();
        store.set_active_channel(ChannelId(2)).unwrap();

        assert!(store.apply_channel_removal(ChannelId(2)));

        assert_eq!(store.active_channel_id(), Some(ChannelId(1)));
        assert!(!store.has_channel(ChannelId(2)));
        assert!(store.messages_in(ChannelId(2)).is_empty());
        assert!(store.messages().is_empty());
    }

    #[test]
    fn test_fallback_prefers_non_removable() {
        let mut store = EntityStore::new();
        store.apply_channel_upsert(Channel::new(1_u64, "early"));
        store.apply_channel_upsert(Channel::new(5_u64, "general").with_removable(false));
        store.set_active_channel(ChannelId(1)).unwrap();

        store.apply_channel_removal(ChannelId(1));

        assert_eq!(store.active_channel_id(), Some(ChannelId(5)));
    }

    #[test]
    fn test_removal_of_unknown_channel_is_noop() {
        let mut store = seeded();
        let revision = store.revision();

        assert!(!store.apply_channel_removal(ChannelId(42)));
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn test_rename_unknown_channel_reports_missing() {
        let mut store = seeded();
        assert!(!store.apply_channel_rename(ChannelId(42), "ghost"));
        assert!(store.apply_channel_rename(ChannelId(2), "offtopic"));
        assert_eq!(store.channel_id_named("offtopic"), Some(ChannelId(2)));
    }

    #[test]
    fn test_set_active_channel_unknown_is_not_found() {
        let mut store = seeded();
        let result = store.set_active_channel(ChannelId(42));
        assert!(matches!(result, Err(ChatError::NotFound { .. })));
        assert_eq!(store.active_channel_id(), Some(ChannelId(1)));
    }

    #[test]
    fn test_confirm_swaps_in_place() {
        let mut store = seeded();
        let tag = ClientTag::new();
        store.apply_message_insert(Message::local(tag, 1_u64, author(), "first", Utc::now()));
        store.apply_message_insert(Message::delivered(20, 1_u64, author(), "second", Utc::now()));

        let server_time = Utc::now();
        assert!(store.confirm_message(tag, 21, server_time));

        let feed = store.messages_in(ChannelId(1));
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].id(), MessageId::Server(21));
        assert_eq!(feed[0].timestamp(), server_time);
        assert_eq!(feed[1].id(), MessageId::Server(20));

        // Second confirmation of the same tag is a no-op.
        assert!(!store.confirm_message(tag, 21, server_time));
    }

    #[test]
    fn test_remove_message_rollback() {
        let mut store = seeded();
        let tag = ClientTag::new();
        store.apply_message_insert(Message::local(tag, 1_u64, author(), "oops", Utc::now()));

        assert!(store.remove_message(MessageId::Local(tag)));
        assert!(!store.remove_message(MessageId::Local(tag)));
        assert!(store.messages_in(ChannelId(1)).is_empty());
    }

    #[test]
    fn test_subscribe_observes_writes() {
        let mut store = seeded();
        let mut watcher = store.subscribe();
        let before = *watcher.borrow_and_update();

        store.apply_message_insert(Message::delivered(30, 1_u64, author(), "hi", Utc::now()));

        assert!(watcher.has_changed().unwrap());
        assert!(*watcher.borrow_and_update() > before);
    }

    #[test]
    fn test_handle_reads_and_writes() {
        let handle = StoreHandle::from_snapshot(&ChatSnapshot::new(
            vec![Channel::new(1_u64, "general").with_removable(false)],
            Vec::new(),
            1_u64,
            author(),
        ));

        assert_eq!(handle.channels().len(), 1);
        assert!(handle.apply_channel_upsert(Channel::new(2_u64, "random")));
        assert_eq!(handle.channel_id_named("random"), Some(ChannelId(2)));
        assert_eq!(handle.active_channel_id(), Some(ChannelId(1)));
    }
}
