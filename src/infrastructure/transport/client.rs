//! WebSocket transport adapter.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use super::codec::FrameCodec;
use super::error::{TransportError, TransportResult};
use super::wire::{ClientFrame, RequestFrame, ServerFrame};
use crate::domain::entities::ChatSnapshot;
use crate::domain::errors::{ChatError, ChatResult};
use crate::domain::ports::{ChatRequest, RequestAck, ServerEvent, TransportPort};

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);
const HELLO_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, WsMessage>;
type WsReader = SplitStream<WsStream>;

struct Shared {
    writer: tokio::sync::Mutex<WsWriter>,
    pending: parking_lot::Mutex<HashMap<u64, oneshot::Sender<ChatResult<RequestAck>>>>,
    subscribers: parking_lot::Mutex<Vec<mpsc::UnboundedSender<ServerEvent>>>,
    next_seq: AtomicU64,
}

/// WebSocket implementation of the transport port.
///
/// Requests ride sequence-numbered frames; the server's `ack` frame settles
/// the matching oneshot. A reader task fans pushed event frames out to
/// subscribers in arrival order. Requests carry no timeout: a stalled
/// request stays pending until the connection drops, by contract.
pub struct WsTransport {
    shared: Arc<Shared>,
    reader_task: JoinHandle<()>,
}

impl WsTransport {
    /// Connects to the chat server and consumes its hello frame.
    ///
    /// Returns the transport together with the bootstrap snapshot the
    /// server announced.
    ///
    /// # Errors
    ///
    /// Returns an error when the connection cannot be established or the
    /// server does not open with a hello frame.
    pub async fn connect(url: &str) -> TransportResult<(Self, ChatSnapshot)> {
        let (ws_stream, _) = timeout(CONNECTION_TIMEOUT, connect_async(url))
            .await
            .map_err(|_| TransportError::timeout("connection"))?
            .map_err(|e| TransportError::connection_failed(e.to_string()))?;

        let (writer, mut reader) = ws_stream.split();

        let snapshot = timeout(HELLO_TIMEOUT, Self::await_hello(&mut reader))
            .await
            .map_err(|_| TransportError::timeout("hello"))??;

        debug!(channels = snapshot.channels().len(), "Received hello snapshot");

        let shared = Arc::new(Shared {
            writer: tokio::sync::Mutex::new(writer),
            pending: parking_lot::Mutex::new(HashMap::new()),
            subscribers: parking_lot::Mutex::new(Vec::new()),
            next_seq: AtomicU64::new(1),
        });

        let reader_task = tokio::spawn(read_loop(shared.clone(), reader));

        Ok((
            Self {
                shared,
                reader_task,
            },
            snapshot,
        ))
    }

    async fn await_hello(reader: &mut WsReader) -> TransportResult<ChatSnapshot> {
        loop {
            match reader.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    return match FrameCodec::decode_server(&text)? {
                        ServerFrame::Hello(payload) => Ok(payload.into_snapshot()),
                        other => Err(TransportError::protocol(format!(
                            "expected hello frame, got {other:?}"
                        ))),
                    };
                }
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => {}
                Some(Ok(WsMessage::Binary(_))) => {
                    return Err(TransportError::protocol("unexpected binary frame"));
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    let (code, reason) = frame.map_or_else(
                        || (1000, "closed before hello".to_string()),
                        |f| (f.code.into(), f.reason.to_string()),
                    );
                    return Err(TransportError::ConnectionClosed { code, reason });
                }
                Some(Err(e)) => return Err(TransportError::websocket(e.to_string())),
                None => {
                    return Err(TransportError::ConnectionClosed {
                        code: 1000,
                        reason: "stream ended".to_string(),
                    });
                }
            }
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

async fn read_loop(shared: Arc<Shared>, mut reader: WsReader) {
    loop {
        match reader.next().await {
            Some(Ok(WsMessage::Text(text))) => match FrameCodec::decode_server(&text) {
                Ok(frame) => handle_frame(&shared, frame),
                Err(e) => warn!(error = %e, "Failed to decode server frame"),
            },
            Some(Ok(WsMessage::Ping(data))) => {
                let mut writer = shared.writer.lock().await;
                let _ = writer.send(WsMessage::Pong(data)).await;
            }
            Some(Ok(WsMessage::Pong(_) | WsMessage::Frame(_))) => {}
            Some(Ok(WsMessage::Binary(_))) => {
                warn!("Ignoring unexpected binary frame");
            }
            Some(Ok(WsMessage::Close(frame))) => {
                let reason = frame.map_or_else(
                    || "connection closed".to_string(),
                    |f| format!("connection closed with code {}: {}", f.code, f.reason),
                );
                fail_pending(&shared, &reason);
                break;
            }
            Some(Err(e)) => {
                fail_pending(&shared, &e.to_string());
                break;
            }
            None => {
                fail_pending(&shared, "stream ended");
                break;
            }
        }
    }
    debug!("Reader task finished");
}

fn handle_frame(shared: &Shared, frame: ServerFrame) {
    match frame {
        ServerFrame::Ack(payload) => {
            let seq = payload.seq;
            let Some(sender) = shared.pending.lock().remove(&seq) else {
                warn!(seq, "Ack for unknown request sequence");
                return;
            };
            let _ = sender.send(payload.into_result());
        }
        ServerFrame::Hello(_) => {
            warn!("Ignoring repeated hello frame");
        }
        event_frame => {
            if let Some(event) = event_frame.into_event() {
                shared
                    .subscribers
                    .lock()
                    .retain(|tx| tx.send(event.clone()).is_ok());
            }
        }
    }
}

fn fail_pending(shared: &Shared, reason: &str) {
    let senders: Vec<_> = {
        let mut pending = shared.pending.lock();
        pending.drain().map(|(_, sender)| sender).collect()
    };
    for sender in senders {
        let _ = sender.send(Err(ChatError::transport(reason)));
    }
}

#[async_trait]
impl TransportPort for WsTransport {
    async fn request(&self, request: ChatRequest) -> ChatResult<RequestAck> {
        let seq = self.shared.next_seq.fetch_add(1, Ordering::Relaxed);
        let frame = ClientFrame {
            seq,
            request: RequestFrame::from(&request),
        };
        let text = FrameCodec::encode_request(&frame).map_err(ChatError::from)?;

        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().insert(seq, tx);

        let sent = {
            let mut writer = self.shared.writer.lock().await;
            writer.send(WsMessage::Text(text.into())).await
        };
        if let Err(e) = sent {
            self.shared.pending.lock().remove(&seq);
            return Err(ChatError::transport(e.to_string()));
        }
        debug!(seq, kind = request.kind(), "Request relayed");

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(ChatError::transport("connection closed before acknowledgement")),
        }
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.subscribers.lock().push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    use super::*;
    use crate::domain::entities::ChannelId;

    const HELLO: &str = r#"{
        "type": "hello",
        "payload": {
            "channels": [{"id": 1, "name": "general", "removable": false}],
            "currentChannelId": 1,
            "identity": {"name": "bob", "avatar": "a.png"}
        }
    }"#;

    /// One-shot server: sends hello, acks the first request, pushes an
    /// event, then idles until the client disconnects.
    async fn spawn_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();

            ws.send(WsMessage::Text(HELLO.into())).await.unwrap();

            while let Some(Ok(message)) = ws.next().await {
                if let WsMessage::Text(text) = message {
                    let frame: serde_json::Value = serde_json::from_str(&text).unwrap();
                    let seq = frame["seq"].as_u64().unwrap();

                    let ack = format!(
                        r#"{{"type": "ack", "payload": {{"seq": {seq}, "status": "ok", "entity": 2}}}}"#
                    );
                    ws.send(WsMessage::Text(ack.into())).await.unwrap();

                    let event = r#"{"type": "newChannel", "payload": {"id": 2, "name": "random"}}"#;
                    ws.send(WsMessage::Text(event.into())).await.unwrap();
                }
            }
        });

        format!("ws://{addr}")
    }

    #[tokio::test]
    async fn test_connect_receives_hello_snapshot() {
        let url = spawn_server().await;
        let (_transport, snapshot) = WsTransport::connect(&url).await.unwrap();

        assert_eq!(snapshot.channels().len(), 1);
        assert_eq!(snapshot.current_channel_id(), ChannelId(1));
        assert_eq!(snapshot.identity().name(), "bob");
    }

    #[tokio::test]
    async fn test_request_ack_and_event_fan_out() {
        let url = spawn_server().await;
        let (transport, _) = WsTransport::connect(&url).await.unwrap();
        let mut events = transport.subscribe();

        let ack = transport
            .request(ChatRequest::CreateChannel {
                name: "random".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(ack.entity_id(), Some(2));

        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.event_name(), "newChannel");
        assert_eq!(event.channel_id(), ChannelId(2));
    }
}
