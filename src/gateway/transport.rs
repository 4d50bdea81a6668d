use std::fmt;
use std::future::Future;

use super::events::close_code;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Normal,
    PolicyViolation,
    NotAuthenticated,
    /// Closed through `Gateway::disconnect`.
    Requested,
}

impl CloseReason {
    pub fn code(self) -> u16 {
        match self {
            CloseReason::Normal => close_code::NORMAL,
            CloseReason::PolicyViolation => close_code::POLICY_VIOLATION,
            CloseReason::NotAuthenticated => close_code::NOT_AUTHENTICATED,
            CloseReason::Requested => close_code::CLOSED_BY_SERVER,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CloseReason::Normal => "",
            CloseReason::PolicyViolation => "not a member of this room",
            CloseReason::NotAuthenticated => "authentication required",
            CloseReason::Requested => "closed by server",
        }
    }
}

#[derive(Debug)]
pub struct TransportError(pub String);

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport error: {}", self.0)
    }
}

impl std::error::Error for TransportError {}

/// `recv` must be cancel-safe; the session polls it inside `tokio::select!`.
pub trait Transport: Send {
    /// `None` once the peer has disconnected.
    fn recv(&mut self) -> impl Future<Output = Option<String>> + Send;

    fn send(&mut self, payload: String) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn close(&mut self, reason: CloseReason) -> impl Future<Output = ()> + Send;
}
