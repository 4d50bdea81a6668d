use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use serde::Deserialize;

use crate::gateway::events::RoomId;
use crate::gateway::render::WireFormat;
use crate::gateway::session::{ConnectRequest, SessionEnd};
use crate::gateway::transport::{CloseReason, Transport, TransportError};
use crate::middleware::auth::{bearer_token, resolve_token};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    /// Browsers cannot set headers on a WebSocket handshake, so the token may
    /// ride in the query string instead.
    pub token: Option<String>,
    #[serde(default)]
    pub format: WireFormat,
}

/// `GET /ws/rooms/{room_id}`
///
/// The identity is resolved before the upgrade completes; a missing or
/// invalid token still upgrades but is closed at once with
/// `NOT_AUTHENTICATED` and never reaches the gateway.
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let token = params
        .token
        .filter(|t| !t.is_empty())
        .or_else(|| bearer_token(&headers).map(str::to_string));
    let user = match token {
        Some(token) => resolve_token(&state.db, &token).await,
        None => None,
    };
    let format = params.format;

    ws.on_upgrade(move |socket| async move {
        let mut transport = WsTransport::new(socket);

        let Some(user) = user else {
            tracing::debug!(room = %room_id, "refusing unauthenticated connection");
            transport.close(CloseReason::NotAuthenticated).await;
            return;
        };

        let request = ConnectRequest {
            identity: user.identity(),
            room: RoomId::new(room_id),
            format,
        };
        let session = state.gateway.connect(transport, request);
        let session_id = session.session_id();

        match session.run().await {
            SessionEnd::Refused => {
                tracing::debug!(session_id = %session_id, user_id = %user.user_id, "session refused")
            }
            SessionEnd::Closed(cause) => {
                tracing::debug!(session_id = %session_id, "session ended: {cause:?}")
            }
        }
    })
}

/// [`Transport`] over an axum WebSocket.
pub struct WsTransport {
    socket: WebSocket,
}

impl WsTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

impl Transport for WsTransport {
    async fn recv(&mut self) -> Option<String> {
        loop {
            match self.socket.recv().await {
                Some(Ok(Message::Text(text))) => return Some(text.to_string()),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some(text),
                    Err(_) => tracing::warn!("dropping non-utf8 binary frame"),
                },
                // Pings are answered by axum itself.
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => return None,
                Some(Err(e)) => {
                    tracing::debug!("websocket read error: {e}");
                    return None;
                }
            }
        }
    }

    async fn send(&mut self, payload: String) -> Result<(), TransportError> {
        self.socket
            .send(Message::Text(payload.into()))
            .await
            .map_err(|e| TransportError(e.to_string()))
    }

    async fn close(&mut self, reason: CloseReason) {
        let frame = CloseFrame {
            code: reason.code(),
            reason: reason.as_str().into(),
        };
        if let Err(e) = self.socket.send(Message::Close(Some(frame))).await {
            tracing::trace!("close frame not sent: {e}");
        }
    }
}
