pub mod bridge;
pub mod dispatcher;
pub mod events;
pub mod membership;
pub mod registry;
pub mod render;
pub mod session;
pub mod store;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use bridge::EventBridge;
use dispatcher::{DispatchReport, Dispatcher};
use events::{Event, SessionId};
use membership::MembershipAuthority;
use registry::RoomRegistry;
use session::{ConnectRequest, GatewaySession};
use store::EventStore;
use transport::Transport;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub authorize_timeout: Duration,
    pub outbound_capacity: usize,
    // Zero disables replay.
    pub history_limit: usize,
    pub persist_events: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            authorize_timeout: Duration::from_secs(5),
            outbound_capacity: 256,
            history_limit: 50,
            persist_events: true,
        }
    }
}

pub struct Gateway {
    dispatcher: Dispatcher,
    authority: Arc<dyn MembershipAuthority>,
    store: Option<Arc<dyn EventStore>>,
    config: GatewayConfig,
}

impl Gateway {
    pub fn new(authority: Arc<dyn MembershipAuthority>, config: GatewayConfig) -> Self {
        Self::with_registry(Arc::new(RoomRegistry::new()), authority, config)
    }

    pub fn with_registry(
        registry: Arc<RoomRegistry>,
        authority: Arc<dyn MembershipAuthority>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            dispatcher: Dispatcher::new(registry),
            authority,
            store: None,
            config,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn EventStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        self.dispatcher.registry()
    }

    pub fn authority(&self) -> &dyn MembershipAuthority {
        self.authority.as_ref()
    }

    pub fn store(&self) -> Option<&Arc<dyn EventStore>> {
        self.store.as_ref()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Persist `event` (when a store is configured) and fan it out to its
    /// room. A failed save is logged; delivery goes ahead regardless.
    pub async fn submit(&self, event: Event) -> DispatchReport {
        if self.config.persist_events {
            if let Some(store) = &self.store {
                if let Err(e) = store.save(&event).await {
                    tracing::error!(
                        room = %event.room(),
                        event_id = event.id(),
                        "failed to persist {}: {e:?}",
                        event.kind()
                    );
                }
            }
        }

        self.dispatcher.dispatch(event.room(), &event)
    }

    pub fn bridge(self: &Arc<Self>) -> EventBridge {
        EventBridge::new(Arc::clone(self))
    }

    pub fn connect<T: Transport>(
        self: &Arc<Self>,
        transport: T,
        request: ConnectRequest,
    ) -> GatewaySession<T> {
        GatewaySession::new(Arc::clone(self), transport, request)
    }

    /// Returns false if no such session is registered.
    pub fn disconnect(&self, session_id: SessionId) -> bool {
        match self.registry().handle(session_id) {
            Some(handle) => {
                tracing::info!(session_id = %session_id, "disconnect requested");
                handle.request_close();
                true
            }
            None => false,
        }
    }
}
