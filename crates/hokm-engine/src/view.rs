//! Per-recipient projection of match state.
//!
//! The full [`MatchState`] never leaves the server. What a client sees is
//! built here, one projection per recipient, with every other player's
//! hand redacted down to a card count.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::state::{MatchPhase, MatchState, TeamRoster};
use crate::types::{Card, PlayerId, Suit, TeamScores};

/// Everything one player is allowed to know about the match.
///
/// Serializable so the state broadcaster can persist it as a reconnection
/// snapshot before delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    /// Who this projection is for.
    pub player_id: PlayerId,
    pub phase: MatchPhase,
    /// Seating order, hakem-first.
    pub players: Vec<PlayerId>,
    pub teams: TeamRoster,
    pub hakem: Option<PlayerId>,
    pub trump: Option<Suit>,
    /// The recipient's own cards, sorted by suit then rank for display.
    pub hand: Vec<Card>,
    /// Card counts for every player, the recipient included.
    pub hand_sizes: HashMap<PlayerId, usize>,
    /// Plays on the table, in play order.
    pub current_trick: Vec<(PlayerId, Card)>,
    pub led_suit: Option<Suit>,
    pub team_tricks: TeamScores,
    pub round_scores: TeamScores,
    /// Whoever acts next, during gameplay only.
    pub current_player: Option<PlayerId>,
}

impl PlayerView {
    /// Projects the match as seen by `player_id`.
    pub fn project(state: &MatchState, player_id: &PlayerId) -> Self {
        let mut hand = state
            .hand(player_id)
            .map(<[Card]>::to_vec)
            .unwrap_or_default();
        hand.sort_by_key(|c| (c.suit as u8, c.rank));

        let hand_sizes = state
            .players()
            .iter()
            .map(|p| {
                let size =
                    state.hand(p).map(<[Card]>::len).unwrap_or_default();
                (p.clone(), size)
            })
            .collect();

        Self {
            player_id: player_id.clone(),
            phase: state.phase(),
            players: state.players().to_vec(),
            teams: state.roster(),
            hakem: state.hakem().cloned(),
            trump: state.trump(),
            hand,
            hand_sizes,
            current_trick: state.current_trick().to_vec(),
            led_suit: state.led_suit(),
            team_tricks: state.team_tricks(),
            round_scores: state.round_scores(),
            current_player: state.current_player().cloned(),
        }
    }
}
