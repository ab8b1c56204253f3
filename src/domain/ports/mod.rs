mod transport_port;

pub use transport_port::{ChatRequest, RequestAck, ServerEvent, TransportPort};

#[cfg(test)]
pub mod mocks {
    pub use super::transport_port::mock::{MockBehavior, MockTransport};
}
