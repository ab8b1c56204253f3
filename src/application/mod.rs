//! Application layer: the chat state core.

/// User-intent actions with optimistic updates.
pub mod dispatcher;
/// Reconciliation of server events against optimistic state.
pub mod reconciler;
/// Session wiring and the event pump.
pub mod session;
/// Normalized in-memory chat state.
pub mod store;

pub use dispatcher::ActionDispatcher;
pub use reconciler::{EventReconciler, PendingSends, SendState};
pub use session::ChatSession;
pub use store::{EntityStore, StoreHandle};
