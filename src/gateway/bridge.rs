use std::sync::Arc;

use super::dispatcher::DispatchReport;
use super::events::{Event, RoomId};
use super::Gateway;
use crate::error::AppError;

/// Publishes events that originate outside any connection, such as a
/// background job or an HTTP call.
#[derive(Clone)]
pub struct EventBridge {
    gateway: Arc<Gateway>,
}

impl EventBridge {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    pub async fn publish(&self, room: &RoomId, event: Event) -> Result<DispatchReport, AppError> {
        if event.room() != room {
            return Err(AppError::BadRequest(format!(
                "event belongs to room {}, not {room}",
                event.room()
            )));
        }

        let report = self.gateway.submit(event).await;
        tracing::debug!(
            room = %room,
            delivered = report.delivered,
            "bridge event published"
        );
        Ok(report)
    }

    pub async fn publish_status(&self, room: &RoomId, status: impl Into<String>) -> DispatchReport {
        self.gateway.submit(Event::status(room.clone(), status)).await
    }
}
