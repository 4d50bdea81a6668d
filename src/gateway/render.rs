use maud::html;
use serde::Deserialize;
use serde_json::json;

use super::events::{opcode, Event, Identity, RoomId, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    #[default]
    Json,
    Html,
}

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `is_own_message` is true when the recipient is the event's sender.
pub fn render(event: &Event, format: WireFormat, is_own_message: bool) -> String {
    match format {
        WireFormat::Json => render_json(event, is_own_message),
        WireFormat::Html => render_html(event, is_own_message),
    }
}

fn render_json(event: &Event, is_own_message: bool) -> String {
    let data = match event {
        Event::ChatMessage {
            id,
            room,
            sender,
            body,
            timestamp,
        } => json!({
            "id": id,
            "room": room,
            "sender": sender,
            "body": body,
            "timestamp": timestamp.to_rfc3339(),
            "own": is_own_message,
        }),
        Event::StatusUpdate {
            id,
            room,
            status,
            timestamp,
        } => json!({
            "id": id,
            "room": room,
            "status": status,
            "timestamp": timestamp.to_rfc3339(),
        }),
    };

    json!({
        "op": opcode::EVENT,
        "type": event.event_type(),
        "data": data,
    })
    .to_string()
}

/// Out-of-band swap fragments for htmx's WebSocket extension.
fn render_html(event: &Event, is_own_message: bool) -> String {
    let markup = match event {
        Event::ChatMessage {
            id,
            sender,
            body,
            timestamp,
            ..
        } => {
            let class = if is_own_message {
                "message message--sent"
            } else {
                "message message--received"
            };
            html! {
                div id="chat_messages" hx-swap-oob="beforeend" {
                    div class=(class) data-id=(id) {
                        @if !is_own_message {
                            span class="message__sender" { (sender.as_str()) }
                        }
                        p class="message__body" { (body) }
                        time datetime=(timestamp.to_rfc3339()) {
                            (timestamp.format(TIME_FORMAT).to_string())
                        }
                    }
                }
            }
        }
        Event::StatusUpdate { status, .. } => html! {
            div id="current_status" hx-swap-oob="true" { (status) }
        },
    };
    markup.into_string()
}

/// Frame sent once a session is registered and live.
pub fn render_ready(
    format: WireFormat,
    session_id: SessionId,
    room: &RoomId,
    identity: &Identity,
) -> String {
    match format {
        WireFormat::Json => json!({
            "op": opcode::EVENT,
            "type": "ready",
            "data": {
                "session_id": session_id,
                "room": room,
                "identity": identity,
            }
        })
        .to_string(),
        WireFormat::Html => html! {
            div id="connection" hx-swap-oob="true"
                data-session=(session_id.to_string()) data-room=(room.as_str()) {
                "connected"
            }
        }
        .into_string(),
    }
}
