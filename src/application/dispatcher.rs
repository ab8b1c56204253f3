//! User-intent actions with optimistic updates.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::application::reconciler::{PendingSends, SendState};
use crate::application::store::StoreHandle;
use crate::domain::entities::{ChannelId, ClientTag, Message, MessageId, UserIdentity};
use crate::domain::errors::{ChatError, ChatResult};
use crate::domain::ports::{ChatRequest, TransportPort};

/// Accepts user actions, applies optimistic local updates, and relays the
/// corresponding requests to the server.
///
/// Only message sends are optimistic. Channel mutations wait for the
/// server-confirmed event, since the server is authoritative for channel
/// identity.
#[derive(Clone)]
pub struct ActionDispatcher {
    store: StoreHandle,
    pending: PendingSends,
    transport: Arc<dyn TransportPort>,
    identity: UserIdentity,
}

impl ActionDispatcher {
    /// Creates a dispatcher stamping outgoing messages with `identity`.
    #[must_use]
    pub fn new(
        store: StoreHandle,
        pending: PendingSends,
        transport: Arc<dyn TransportPort>,
        identity: UserIdentity,
    ) -> Self {
        Self {
            store,
            pending,
            transport,
            identity,
        }
    }

    /// Returns the identity stamped on outgoing messages.
    #[must_use]
    pub const fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    /// Sends a message to the active channel.
    ///
    /// The message is inserted optimistically with a provisional tag before
    /// the request is relayed; the server echo later confirms it in place.
    /// A rejection rolls the optimistic record back, unless the echo won
    /// the race.
    ///
    /// # Errors
    ///
    /// `Validation` for empty text, `NotFound` when no channel is active,
    /// `RequestRejected`/`Transport` when the server declines the send.
    pub async fn send_message(&self, text: &str) -> ChatResult<ClientTag> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::validation("text", "must not be empty"));
        }

        let channel_id = self.store.active_channel_id().ok_or(ChatError::NotFound {
            entity: "channel",
            id: "active".to_string(),
        })?;

        let tag = ClientTag::new();
        let message = Message::local(tag, channel_id, self.identity.clone(), text, Utc::now());

        self.pending.begin(tag);
        self.store.apply_message_insert(message);
        debug!(tag = %tag, channel = %channel_id, "Optimistic message inserted");

        let request = ChatRequest::SendMessage {
            channel_id,
            tag,
            text: text.to_string(),
            author: self.identity.clone(),
        };

        match self.transport.request(request).await {
            Ok(_) => {
                self.pending.resolve_delivered(tag);
                Ok(tag)
            }
            Err(e) => {
                if self.pending.resolve_failed(tag) == SendState::RolledBack {
                    self.store.remove_message(MessageId::Local(tag));
                    warn!(tag = %tag, error = %e, "Send rejected, optimistic message rolled back");
                    Err(e)
                } else {
                    // The canonical echo confirmed the message before the
                    // rejection resolved; the confirmation wins.
                    info!(tag = %tag, "Rejection arrived after confirmation, ignored");
                    Ok(tag)
                }
            }
        }
    }

    /// Requests creation of a channel.
    ///
    /// There is no optimistic insert: the store changes only when the
    /// reconciler applies the resulting `newChannel` event.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty or duplicate name,
    /// `RequestRejected`/`Transport` when the server declines.
    pub async fn create_channel(&self, name: &str) -> ChatResult<()> {
        let name = Self::validated_name(&self.store, name)?;

        debug!(name = %name, "Requesting channel creation");
        self.transport
            .request(ChatRequest::CreateChannel { name })
            .await?;
        Ok(())
    }

    /// Moves the active channel pointer. Purely local, no network round-trip.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown channel id.
    pub fn switch_active_channel(&self, id: ChannelId) -> ChatResult<()> {
        self.store.set_active_channel(id)?;
        debug!(channel = %id, "Active channel switched");
        Ok(())
    }

    /// Requests renaming of a channel.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `Validation` for an empty or duplicate
    /// name, `RequestRejected`/`Transport` when the server declines.
    pub async fn rename_channel(&self, id: ChannelId, name: &str) -> ChatResult<()> {
        if !self.store.has_channel(id) {
            return Err(ChatError::channel_not_found(id));
        }
        let name = Self::validated_name(&self.store, name)?;

        debug!(channel = %id, name = %name, "Requesting channel rename");
        self.transport
            .request(ChatRequest::RenameChannel {
                channel_id: id,
                name,
            })
            .await?;
        Ok(())
    }

    /// Requests removal of a channel.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `Validation` for a channel marked
    /// non-removable, `RequestRejected`/`Transport` when the server
    /// declines.
    pub async fn remove_channel(&self, id: ChannelId) -> ChatResult<()> {
        let channel = self
            .store
            .channel(id)
            .ok_or_else(|| ChatError::channel_not_found(id))?;
        if !channel.is_removable() {
            return Err(ChatError::validation(
                "channel",
                format!("{} cannot be removed", channel.name()),
            ));
        }

        debug!(channel = %id, "Requesting channel removal");
        self.transport
            .request(ChatRequest::RemoveChannel { channel_id: id })
            .await?;
        Ok(())
    }

    fn validated_name(store: &StoreHandle, name: &str) -> ChatResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ChatError::validation("name", "must not be empty"));
        }
        if store.channel_id_named(name).is_some() {
            return Err(ChatError::validation(
                "name",
                format!("channel {name} already exists"),
            ));
        }
        Ok(name.to_string())
    }
}
