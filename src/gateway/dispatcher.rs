use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;

use super::events::{Event, RoomId, SessionId};
use super::registry::{Outbound, RoomRegistry};
use super::render::{self, WireFormat};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: Vec<SessionId>,
}

impl DispatchReport {
    pub fn recipients(&self) -> usize {
        self.delivered + self.failed.len()
    }
}

/// Dispatches to one room pass through that room's gate one at a time, so
/// every recipient sees them in the same order.
pub struct Dispatcher {
    registry: Arc<RoomRegistry>,
    gates: DashMap<RoomId, Arc<Mutex<()>>>,
}

impl Dispatcher {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self {
            registry,
            gates: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// A recipient whose queue is closed or full is logged and skipped.
    pub fn dispatch(&self, room: &RoomId, event: &Event) -> DispatchReport {
        let gate = Arc::clone(self.gates.entry(room.clone()).or_default().value());

        let report = {
            let _serial = gate.lock().unwrap_or_else(PoisonError::into_inner);
            self.fan_out(room, event)
        };

        drop(gate);
        self.gates
            .remove_if(room, |_, gate| Arc::strong_count(gate) == 1);

        report
    }

    fn fan_out(&self, room: &RoomId, event: &Event) -> DispatchReport {
        let members = self.registry.members(room);
        let mut report = DispatchReport::default();

        if members.is_empty() {
            tracing::trace!(room = %room, event_id = event.id(), "no members to dispatch to");
            return report;
        }

        // At most one render per (format, role) pair.
        let mut rendered: HashMap<(WireFormat, bool), String> = HashMap::new();

        for member in &members {
            let is_own = event.sender() == Some(&member.identity);
            let payload = rendered
                .entry((member.format, is_own))
                .or_insert_with(|| render::render(event, member.format, is_own))
                .clone();

            let outbound = Outbound {
                event_id: event.id().to_string(),
                payload,
            };
            match member.deliver(outbound) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        room = %room,
                        session_id = %member.session_id,
                        identity = %member.identity,
                        event_id = event.id(),
                        "dropping event for recipient: {e}"
                    );
                    report.failed.push(member.session_id);
                }
            }
        }

        tracing::debug!(
            room = %room,
            event_id = event.id(),
            delivered = report.delivered,
            failed = report.failed.len(),
            "dispatched {}",
            event.event_type()
        );

        report
    }
}
