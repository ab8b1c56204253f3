//! Transport adapters implementing the transport port.

mod client;
mod codec;
mod error;
mod local;
/// Wire frame definitions.
pub mod wire;

pub use client::WsTransport;
pub use codec::FrameCodec;
pub use error::{TransportError, TransportResult};
pub use local::LoopbackTransport;
