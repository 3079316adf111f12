//! Error types for the session layer.

use hokm_engine::PlayerId;

use crate::store::StoreError;

/// Errors that can occur managing sessions.
///
/// The reconnection-refusal variants are deliberately distinct — the
/// server maps each to its own wire error code so clients can react
/// appropriately instead of treating every refusal the same way.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the given player (or the presented room
    /// code doesn't match the one on record).
    #[error("session not found for player {0}")]
    NotFound(PlayerId),

    /// The session outlived both reconnection windows and has been
    /// deleted.
    #[error("session expired for player {0}")]
    SessionExpired(PlayerId),

    /// The player already has a live connection claiming this identity.
    #[error("player {0} already has an active connection")]
    AlreadyConnected(PlayerId),

    /// The stored record could not be parsed. Treated as fatal for that
    /// session; the record is deleted.
    #[error("corrupt session record for player {0}")]
    Corrupt(PlayerId),

    /// The store backend failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
