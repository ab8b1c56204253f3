//! Encoding and decoding of wire frames.

use super::error::{TransportError, TransportResult};
use super::wire::{ClientFrame, ServerFrame};

/// Stateless JSON frame codec.
pub struct FrameCodec;

impl FrameCodec {
    /// Encodes a client request frame.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the frame cannot be encoded.
    pub fn encode_request(frame: &ClientFrame) -> TransportResult<String> {
        serde_json::to_string(frame).map_err(|e| TransportError::serialization(e.to_string()))
    }

    /// Decodes a server frame from a text payload.
    ///
    /// # Errors
    ///
    /// Returns a serialization error for malformed or unknown frames.
    pub fn decode_server(text: &str) -> TransportResult<ServerFrame> {
        serde_json::from_str(text).map_err(|e| TransportError::serialization(e.to_string()))
    }
}
