//! Card model and match state machine for Hokm.
//!
//! This crate is pure domain logic — no I/O, no async, no clocks. The
//! server layers above feed it player actions and fan out the results.
//!
//! # Key types
//!
//! - [`MatchState`] — one room's full game state and every legal operation
//!   on it (dealing, trump selection, play validation, trick resolution)
//! - [`Card`], [`Suit`], [`Rank`], [`Deck`] — value types for the 52-card
//!   deck
//! - [`Team`] / [`TeamScores`] — the canonical two-valued team encoding
//! - [`PlayerView`] — the per-recipient projection (own hand only)
//! - [`GameError`] — the validation/invariant error taxonomy
//!
//! # State machine
//!
//! ```text
//! Lobby → TeamAssignment → InitialDeal → HokmSelection → FinalDeal
//!       → Gameplay → HandComplete ──→ InitialDeal (next hand)
//!                                 └─→ Completed (win threshold reached)
//! ```
//!
//! All randomness (shuffles, team/hakem draws) comes through an injected
//! `rand::Rng`, so callers — and tests — control determinism.

mod deck;
mod error;
mod state;
mod types;
mod view;

#[cfg(test)]
mod tests_props;

pub use deck::Deck;
pub use error::GameError;
pub use state::{
    HandResult, MatchConfig, MatchPhase, MatchState, PlayOutcome,
    TeamRoster, TrickResolution, HAND_SIZE, PLAYER_COUNT,
    TRICKS_PER_HAND, TRICKS_TO_WIN_HAND,
};
pub use types::{Card, PlayerId, Rank, Suit, Team, TeamScores};
pub use view::PlayerView;
