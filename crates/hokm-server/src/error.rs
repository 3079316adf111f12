//! Unified error type for the server binary.

use hokm_protocol::ProtocolError;
use hokm_session::SessionError;

use crate::room::RoomError;

/// Top-level error wrapping every layer's error type.
///
/// The `#[from]` attributes generate `From` impls so `?` converts
/// lower-layer errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Socket-level I/O (bind, accept).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// WebSocket handshake or framing failure.
    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Encode/decode failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Session lookup, reconnection, or store failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Room-level failure (full, gone, no active game).
    #[error(transparent)]
    Room(#[from] RoomError),
}

#[cfg(test)]
mod tests {
    use hokm_engine::PlayerId;
    use hokm_protocol::RoomCode;

    use super::*;

    #[test]
    fn test_from_session_error() {
        let err = SessionError::NotFound(PlayerId::new("p-1"));
        let server_err: ServerError = err.into();
        assert!(matches!(server_err, ServerError::Session(_)));
        assert!(server_err.to_string().contains("p-1"));
    }

    #[test]
    fn test_from_room_error() {
        let err = RoomError::Full(RoomCode::new("4217"));
        let server_err: ServerError = err.into();
        assert!(matches!(server_err, ServerError::Room(_)));
    }
}
