//! Error taxonomy for the match state machine.
//!
//! Every variant except [`GameError::MalformedTrickState`] is a
//! caller-correctable rejection: the operation leaves the match untouched
//! and the client may retry with corrected input. `MalformedTrickState`
//! is a programming-invariant violation and must be treated as fatal by
//! callers, never defaulted around.

use crate::state::MatchPhase;
use crate::types::{Card, PlayerId, Suit};

/// What can go wrong when operating on a [`MatchState`](crate::MatchState).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// The operation is not legal in the match's current phase.
    #[error("expected phase {expected}, but match is in {actual}")]
    PhaseMismatch {
        expected: MatchPhase,
        actual: MatchPhase,
    },

    /// A player acted out of turn.
    #[error("it is not {0}'s turn")]
    TurnViolation(PlayerId),

    /// The player tried to play a card they do not hold.
    #[error("{player} does not hold {card}")]
    CardNotOwned { player: PlayerId, card: Card },

    /// The player must follow the led suit and failed to.
    /// Names the required suit so the client can re-prompt.
    #[error("{player} must follow suit: {required} was led")]
    SuitViolation { player: PlayerId, required: Suit },

    /// Someone other than the hakem tried to choose the trump suit.
    #[error("{0} is not the hakem")]
    NotHakem(PlayerId),

    /// Trick resolution ran without exactly 4 plays on the table.
    /// This is an internal invariant violation, not a player mistake.
    #[error("trick resolution requires exactly 4 plays, found {found}")]
    MalformedTrickState { found: usize },

    /// A match needs exactly 4 players.
    #[error("a match requires exactly 4 players, got {0}")]
    WrongPlayerCount(usize),
}

impl GameError {
    /// `true` for the one non-recoverable variant. Recoverable errors
    /// never mutate state and are safe to surface to the acting player.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GameError::MalformedTrickState { .. })
    }
}
