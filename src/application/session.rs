//! Session wiring: store, dispatcher, reconciler, and the event pump.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::dispatcher::ActionDispatcher;
use crate::application::reconciler::{EventReconciler, PendingSends};
use crate::application::store::StoreHandle;
use crate::domain::entities::ChatSnapshot;
use crate::domain::ports::TransportPort;

/// A running chat session.
///
/// Owns the entity store, the action dispatcher, and a spawned pump task
/// that applies pushed server events strictly in arrival order. UI
/// collaborators read state through [`ChatSession::store`] and re-render on
/// its change notifications; all mutations go through
/// [`ChatSession::actions`] or the pump.
pub struct ChatSession {
    store: StoreHandle,
    dispatcher: ActionDispatcher,
    pump: JoinHandle<()>,
}

impl ChatSession {
    /// Seeds the store from the snapshot and starts the event pump.
    #[must_use]
    pub fn start(transport: Arc<dyn TransportPort>, snapshot: &ChatSnapshot) -> Self {
        let store = StoreHandle::from_snapshot(snapshot);
        let pending = PendingSends::new();

        let dispatcher = ActionDispatcher::new(
            store.clone(),
            pending.clone(),
            transport.clone(),
            snapshot.identity().clone(),
        );
        let reconciler = EventReconciler::new(store.clone(), pending);

        let mut events = transport.subscribe();
        let pump = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let name = event.event_name();
                if let Err(e) = reconciler.apply(event) {
                    warn!(event = name, error = %e, "Dropped server event");
                }
            }
            debug!("Server event stream closed");
        });

        info!(
            channels = snapshot.channels().len(),
            user = %snapshot.identity(),
            "Chat session started"
        );

        Self {
            store,
            dispatcher,
            pump,
        }
    }

    /// Returns the read-only store handle.
    #[must_use]
    pub const fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Returns the action dispatcher.
    #[must_use]
    pub const fn actions(&self) -> &ActionDispatcher {
        &self.dispatcher
    }

    /// Stops the event pump.
    pub fn shutdown(&self) {
        self.pump.abort();
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.pump.abort();
    }
}
