use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{mpsc, Notify};

use super::events::{ClientMessage, Event, Identity, RoomId, SessionId};
use super::registry::{Outbound, Registration, SessionHandle};
use super::render::{self, WireFormat};
use super::transport::{CloseReason, Transport};
use super::Gateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Authorizing,
    Joined,
    Closing,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Membership was denied, failed or timed out. Nothing was exchanged.
    Refused,
    Closed(CloseCause),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCause {
    Disconnected,
    /// `Gateway::disconnect` was called for this session.
    Requested,
    TransportFailed,
}

#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub identity: Identity,
    pub room: RoomId,
    pub format: WireFormat,
}

/// One live client connection, run as a single task. It only talks to its
/// own transport and to `Gateway::submit`.
pub struct GatewaySession<T: Transport> {
    session_id: SessionId,
    identity: Identity,
    room: RoomId,
    format: WireFormat,
    state: SessionState,
    transport: T,
    gateway: Arc<Gateway>,
}

impl<T: Transport> GatewaySession<T> {
    pub fn new(gateway: Arc<Gateway>, transport: T, request: ConnectRequest) -> Self {
        Self {
            session_id: SessionId::generate(),
            identity: request.identity,
            room: request.room,
            format: request.format,
            state: SessionState::Connecting,
            transport,
            gateway,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(
            session_id = %self.session_id,
            room = %self.room,
            "session {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }

    pub async fn run(mut self) -> SessionEnd {
        self.transition(SessionState::Authorizing);

        if !authorize(&self.gateway, self.session_id, &self.identity, &self.room).await {
            self.transition(SessionState::Closed);
            self.transport.close(CloseReason::PolicyViolation).await;
            return SessionEnd::Refused;
        }

        let (tx, mut rx) = mpsc::channel(self.gateway.config().outbound_capacity.max(1));
        let closer = Arc::new(Notify::new());
        let handle = SessionHandle::new(
            self.session_id,
            self.identity.clone(),
            self.format,
            tx,
            Arc::clone(&closer),
        );
        let registration = Registration::join(self.gateway.registry(), &self.room, handle);
        self.transition(SessionState::Joined);
        tracing::info!(
            session_id = %self.session_id,
            room = %self.room,
            identity = %self.identity,
            "session joined room"
        );

        // Loaded after joining so nothing falls between replay and live
        // delivery; overlaps are filtered in `serve`.
        let history = load_history(&self.gateway, self.session_id, &self.room).await;

        let cause = self.serve(&mut rx, &closer, history).await;

        self.transition(SessionState::Closing);
        drop(registration);
        rx.close();
        let mut discarded = 0usize;
        while rx.try_recv().is_ok() {
            discarded += 1;
        }

        let reason = match cause {
            CloseCause::Requested => CloseReason::Requested,
            CloseCause::Disconnected | CloseCause::TransportFailed => CloseReason::Normal,
        };
        self.transport.close(reason).await;
        self.transition(SessionState::Closed);

        tracing::info!(
            session_id = %self.session_id,
            room = %self.room,
            identity = %self.identity,
            discarded,
            "session left room ({cause:?})"
        );

        SessionEnd::Closed(cause)
    }

    async fn serve(
        &mut self,
        rx: &mut mpsc::Receiver<Outbound>,
        closer: &Notify,
        history: Vec<Event>,
    ) -> CloseCause {
        let mut replayed: HashSet<String> = HashSet::with_capacity(history.len());
        for event in &history {
            let is_own = event.sender() == Some(&self.identity);
            let payload = render::render(event, self.format, is_own);
            if self.transport.send(payload).await.is_err() {
                return CloseCause::TransportFailed;
            }
            replayed.insert(event.id().to_string());
        }

        let ready = render::render_ready(self.format, self.session_id, &self.room, &self.identity);
        if self.transport.send(ready).await.is_err() {
            return CloseCause::TransportFailed;
        }

        loop {
            tokio::select! {
                _ = closer.notified() => return CloseCause::Requested,
                Some(outbound) = rx.recv() => {
                    if replayed.remove(&outbound.event_id) {
                        tracing::debug!(
                            session_id = %self.session_id,
                            event_id = %outbound.event_id,
                            "skipping event already sent as history"
                        );
                    } else if let Err(e) = self.transport.send(outbound.payload).await {
                        tracing::debug!(session_id = %self.session_id, "{e}");
                        return CloseCause::TransportFailed;
                    }
                }
                inbound = self.transport.recv() => match inbound {
                    Some(text) => {
                        let event = self.decode_inbound(&text);
                        if let Some(event) = event {
                            self.gateway.submit(event).await;
                        }
                    }
                    None => return CloseCause::Disconnected,
                },
            }
        }
    }

    /// Malformed payloads are logged and dropped; they never end the session.
    fn decode_inbound(&self, text: &str) -> Option<Event> {
        let message: ClientMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    room = %self.room,
                    "dropping malformed payload: {e}"
                );
                return None;
            }
        };

        let Some(body) = message.chat_message.filter(|b| !b.trim().is_empty()) else {
            tracing::debug!(session_id = %self.session_id, "ignoring payload without chat_message");
            return None;
        };

        Some(Event::chat(self.room.clone(), self.identity.clone(), body))
    }
}

async fn authorize(
    gateway: &Gateway,
    session_id: SessionId,
    identity: &Identity,
    room: &RoomId,
) -> bool {
    let timeout = gateway.config().authorize_timeout;
    let check = gateway.authority().is_authorized(identity, room);

    match tokio::time::timeout(timeout, check).await {
        Ok(Ok(true)) => true,
        Ok(Ok(false)) => {
            tracing::info!(
                session_id = %session_id,
                room = %room,
                identity = %identity,
                "membership denied"
            );
            false
        }
        Ok(Err(e)) => {
            tracing::warn!(
                session_id = %session_id,
                room = %room,
                "membership check failed: {e:?}"
            );
            false
        }
        Err(_) => {
            tracing::warn!(
                session_id = %session_id,
                room = %room,
                "membership check timed out after {timeout:?}"
            );
            false
        }
    }
}

/// A store failure costs the history, never the session.
async fn load_history(gateway: &Gateway, session_id: SessionId, room: &RoomId) -> Vec<Event> {
    let limit = gateway.config().history_limit;
    let Some(store) = gateway.store() else {
        return Vec::new();
    };
    if limit == 0 {
        return Vec::new();
    }

    match store.recent(room, limit).await {
        Ok(events) => events,
        Err(e) => {
            tracing::error!(
                session_id = %session_id,
                room = %room,
                "failed to load history: {e:?}"
            );
            Vec::new()
        }
    }
}
