//! Infrastructure layer containing adapters for external services.

/// Configuration loading.
pub mod config;
/// Transport adapters.
pub mod transport;

pub use config::{AppConfig, LogLevel};
pub use transport::{LoopbackTransport, TransportError, WsTransport};
