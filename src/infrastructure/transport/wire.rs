//! JSON wire frames exchanged with the chat server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::{Channel, ChannelId, ChatSnapshot, Message, UserIdentity};
use crate::domain::errors::{ChatError, ChatResult};
use crate::domain::ports::{ChatRequest, RequestAck, ServerEvent};

/// Client-to-server frame: a sequence-numbered request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientFrame {
    /// Correlates the server's ack with the originating request.
    pub seq: u64,
    /// The request body.
    #[serde(flatten)]
    pub request: RequestFrame,
}

/// Request body of a client frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "payload", rename_all = "camelCase")]
#[allow(missing_docs)]
pub enum RequestFrame {
    #[serde(rename_all = "camelCase")]
    SendMessage {
        channel_id: u64,
        tag: Uuid,
        text: String,
        name: String,
        avatar: String,
    },
    CreateChannel {
        name: String,
    },
    #[serde(rename_all = "camelCase")]
    RenameChannel {
        channel_id: u64,
        name: String,
    },
    #[serde(rename_all = "camelCase")]
    RemoveChannel {
        channel_id: u64,
    },
}

impl From<&ChatRequest> for RequestFrame {
    fn from(request: &ChatRequest) -> Self {
        match request {
            ChatRequest::SendMessage {
                channel_id,
                tag,
                text,
                author,
            } => Self::SendMessage {
                channel_id: channel_id.as_u64(),
                tag: tag.as_uuid(),
                text: text.clone(),
                name: author.name().to_string(),
                avatar: author.avatar().to_string(),
            },
            ChatRequest::CreateChannel { name } => Self::CreateChannel { name: name.clone() },
            ChatRequest::RenameChannel { channel_id, name } => Self::RenameChannel {
                channel_id: channel_id.as_u64(),
                name: name.clone(),
            },
            ChatRequest::RemoveChannel { channel_id } => Self::RemoveChannel {
                channel_id: channel_id.as_u64(),
            },
        }
    }
}

/// Server-to-client frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
#[allow(missing_docs)]
pub enum ServerFrame {
    /// Bootstrap snapshot sent once after connecting.
    Hello(SnapshotPayload),
    /// Acknowledgement of a sequence-numbered request.
    Ack(AckPayload),
    NewMessage(MessagePayload),
    NewChannel(ChannelPayload),
    RenameChannel(RenamePayload),
    RemoveChannel(RemovePayload),
}

impl ServerFrame {
    /// Converts an event frame into its domain event.
    ///
    /// Returns `None` for `hello` and `ack` frames.
    #[must_use]
    pub fn into_event(self) -> Option<ServerEvent> {
        match self {
            Self::Hello(_) | Self::Ack(_) => None,
            Self::NewMessage(payload) => Some(payload.into_event()),
            Self::NewChannel(payload) => Some(ServerEvent::ChannelAdded {
                channel: payload.into_channel(),
            }),
            Self::RenameChannel(payload) => Some(ServerEvent::ChannelRenamed {
                channel_id: ChannelId(payload.id),
                name: payload.name,
            }),
            Self::RemoveChannel(payload) => Some(ServerEvent::ChannelRemoved {
                channel_id: ChannelId(payload.id),
            }),
        }
    }
}

/// Acknowledgement status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum AckStatus {
    Ok,
    Error,
}

/// Acknowledgement payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AckPayload {
    /// Sequence number of the acknowledged request.
    pub seq: u64,
    /// Outcome.
    pub status: AckStatus,
    /// Id of the entity the server created, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<u64>,
    /// Rejection reason when status is `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AckPayload {
    /// Resolves the payload into the request outcome.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::RequestRejected` for an error status.
    pub fn into_result(self) -> ChatResult<RequestAck> {
        match self.status {
            AckStatus::Ok => Ok(self
                .entity
                .map_or_else(RequestAck::default, RequestAck::with_entity)),
            AckStatus::Error => Err(ChatError::rejected(
                self.message.unwrap_or_else(|| "request declined".to_string()),
            )),
        }
    }
}

/// Message payload of `newMessage` frames and hello snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct MessagePayload {
    pub id: u64,
    pub channel_id: u64,
    /// Echo of the sender's correlation tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<Uuid>,
    pub name: String,
    pub avatar: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl MessagePayload {
    fn into_message(self) -> Message {
        Message::delivered(
            self.id,
            self.channel_id,
            UserIdentity::new(self.name, self.avatar),
            self.text,
            self.timestamp,
        )
    }

    /// Converts the payload into a `newMessage` domain event.
    #[must_use]
    pub fn into_event(self) -> ServerEvent {
        let tag = self.tag.map(Into::into);
        ServerEvent::MessageAdded {
            message: self.into_message(),
            tag,
        }
    }
}

/// Channel payload of `newChannel` frames and hello snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct ChannelPayload {
    pub id: u64,
    pub name: String,
    #[serde(default = "default_removable")]
    pub removable: bool,
}

impl ChannelPayload {
    /// Converts the payload into the domain entity.
    #[must_use]
    pub fn into_channel(self) -> Channel {
        Channel::new(self.id, self.name).with_removable(self.removable)
    }
}

/// Payload of `renameChannel` frames.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct RenamePayload {
    pub id: u64,
    pub name: String,
}

/// Payload of `removeChannel` frames.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct RemovePayload {
    pub id: u64,
}

/// Identity block of the hello snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct IdentityPayload {
    pub name: String,
    pub avatar: String,
}

/// Bootstrap snapshot carried by the hello frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct SnapshotPayload {
    pub channels: Vec<ChannelPayload>,
    #[serde(default)]
    pub messages: Vec<MessagePayload>,
    pub current_channel_id: u64,
    pub identity: IdentityPayload,
}

impl SnapshotPayload {
    /// Converts the payload into the domain snapshot.
    #[must_use]
    pub fn into_snapshot(self) -> ChatSnapshot {
        let channels = self
            .channels
            .into_iter()
            .map(ChannelPayload::into_channel)
            .collect();
        let messages = self
            .messages
            .into_iter()
            .map(MessagePayload::into_message)
            .collect();
        ChatSnapshot::new(
            channels,
            messages,
            self.current_channel_id,
            UserIdentity::new(self.identity.name, self.identity.avatar),
        )
    }
}

fn default_removable() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ClientTag;

    #[test]
    fn test_request_frame_encoding() {
        let tag = ClientTag::new();
        let request = ChatRequest::SendMessage {
            channel_id: ChannelId(1),
            tag,
            text: "hi".to_string(),
            author: UserIdentity::new("bob", "a.png"),
        };
        let frame = ClientFrame {
            seq: 3,
            request: RequestFrame::from(&request),
        };

        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&frame).unwrap()).unwrap();
        assert_eq!(json["seq"], 3);
        assert_eq!(json["kind"], "sendMessage");
        assert_eq!(json["payload"]["channelId"], 1);
        assert_eq!(json["payload"]["text"], "hi");
        assert_eq!(json["payload"]["tag"], tag.to_string());
    }

    #[test]
    fn test_new_message_frame_decoding() {
        let json = r#"{
            "type": "newMessage",
            "payload": {
                "id": 42,
                "channelId": 1,
                "name": "alice",
                "avatar": "b.png",
                "text": "hello",
                "timestamp": "2024-05-01T12:00:00Z"
            }
        }"#;

        let frame: ServerFrame = serde_json::from_str(json).unwrap();
        let event = frame.into_event().unwrap();

        match event {
            ServerEvent::MessageAdded { message, tag } => {
                assert_eq!(message.id().server_id(), Some(42));
                assert_eq!(message.channel_id(), ChannelId(1));
                assert_eq!(message.author().name(), "alice");
                assert_eq!(tag, None);
            }
            other => panic!("expected MessageAdded, got {other:?}"),
        }
    }

    #[test]
    fn test_ack_frame_outcomes() {
        let ok: ServerFrame = serde_json::from_str(
            r#"{"type": "ack", "payload": {"seq": 1, "status": "ok", "entity": 7}}"#,
        )
        .unwrap();
        let ServerFrame::Ack(payload) = ok else {
            panic!("expected ack frame");
        };
        assert_eq!(payload.into_result().unwrap().entity_id(), Some(7));

        let rejected: ServerFrame = serde_json::from_str(
            r#"{"type": "ack", "payload": {"seq": 2, "status": "error", "message": "duplicate"}}"#,
        )
        .unwrap();
        let ServerFrame::Ack(payload) = rejected else {
            panic!("expected ack frame");
        };
        let err = payload.into_result().unwrap_err();
        assert_eq!(err.to_string(), "request rejected by server: duplicate");
    }

    #[test]
    fn test_hello_frame_decoding() {
        let json = r#"{
            "type": "hello",
            "payload": {
                "channels": [
                    {"id": 1, "name": "general", "removable": false},
                    {"id": 2, "name": "random"}
                ],
                "currentChannelId": 1,
                "identity": {"name": "bob", "avatar": "a.png"}
            }
        }"#;

        let frame: ServerFrame = serde_json::from_str(json).unwrap();
        let ServerFrame::Hello(payload) = frame else {
            panic!("expected hello frame");
        };
        let snapshot = payload.into_snapshot();

        assert_eq!(snapshot.channels().len(), 2);
        assert!(!snapshot.channels()[0].is_removable());
        assert!(snapshot.channels()[1].is_removable());
        assert_eq!(snapshot.current_channel_id(), ChannelId(1));
        assert_eq!(snapshot.identity().name(), "bob");
    }

    #[test]
    fn test_channel_event_frames_round_trip() {
        let rename: ServerFrame =
            serde_json::from_str(r#"{"type": "renameChannel", "payload": {"id": 2, "name": "x"}}"#)
                .unwrap();
        assert_eq!(
            rename.into_event(),
            Some(ServerEvent::ChannelRenamed {
                channel_id: ChannelId(2),
                name: "x".to_string(),
            })
        );

        let removal: ServerFrame =
            serde_json::from_str(r#"{"type": "removeChannel", "payload": {"id": 2}}"#).unwrap();
        assert_eq!(
            removal.into_event(),
            Some(ServerEvent::ChannelRemoved {
                channel_id: ChannelId(2),
            })
        );
    }
}
