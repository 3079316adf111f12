//! The client/server message set.
//!
//! Every message is internally tagged: `#[serde(tag = "type")]` produces
//! `{ "type": "play_card", "player_id": "...", ... }` rather than an
//! outer wrapper object, which is what browser clients expect.
//!
//! Domain payloads ([`Card`], [`Suit`], [`PlayerView`], ...) are the
//! engine's own serde forms, embedded directly — there is no second
//! definition of a card anywhere in the protocol.

use serde::{Deserialize, Serialize};
use std::fmt;

use hokm_engine::{
    Card, MatchPhase, PlayerId, PlayerView, Suit, Team, TeamRoster,
    TeamScores,
};

use crate::types::RoomCode;

// ---------------------------------------------------------------------------
// ClientMessage
// ---------------------------------------------------------------------------

/// Everything a client can send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Create a new room and take the first seat.
    CreateRoom { username: String },

    /// Join an existing room by code.
    Join {
        username: String,
        room_code: RoomCode,
    },

    /// Resume a previous identity after a dropped socket.
    ///
    /// Carries both the player id and the room code so the server can
    /// validate the pair instead of trusting either alone.
    Reconnect {
        player_id: PlayerId,
        room_code: RoomCode,
    },

    /// The hakem's trump choice.
    HokmSelected { suit: Suit },

    /// Play a card into the current trick. `player_id` must match the
    /// connection's authenticated identity; a mismatch is rejected.
    PlayCard { player_id: PlayerId, card: Card },

    /// Tear down a finished room.
    ClearRoom { room_code: RoomCode },

    /// Keep-alive; refreshes the sender's session heartbeat.
    Heartbeat,
}

// ---------------------------------------------------------------------------
// ServerMessage
// ---------------------------------------------------------------------------

/// Everything the server can send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Join/create acknowledged; carries the server-assigned identity.
    JoinSuccess {
        player_id: PlayerId,
        room_code: RoomCode,
        /// Seated players so far, in join order.
        players: Vec<PlayerId>,
    },

    /// Reconnection acknowledged. `recovered` is `false` for a fresh
    /// resume (within the heartbeat window) and `true` for a recovered
    /// one (expired heartbeat but within the grace window).
    ReconnectSuccess {
        player_id: PlayerId,
        room_code: RoomCode,
        recovered: bool,
    },

    /// Teams and the first hakem have been drawn.
    TeamAssignment {
        teams: TeamRoster,
        hakem: PlayerId,
        /// Seating order, hakem first.
        players: Vec<PlayerId>,
    },

    /// The match moved to a new phase.
    PhaseChange { phase: MatchPhase },

    /// The recipient's first 5 cards.
    InitialDeal { hand: Vec<Card> },

    /// Sent to the hakem only: choose the trump suit.
    HokmRequest,

    /// The hakem chose trump.
    HokmSelected { suit: Suit, hakem: PlayerId },

    /// The recipient's full 13-card hand, sorted for display.
    FinalDeal { hand: Vec<Card> },

    /// It is now this player's turn to play.
    TurnStart { player_id: PlayerId },

    /// A card landed in the current trick.
    CardPlayed {
        player_id: PlayerId,
        card: Card,
        led_suit: Suit,
    },

    /// Four cards down; the trick is decided. Both teams' counts are
    /// always present.
    TrickResult {
        winner: PlayerId,
        winning_card: Card,
        winning_team: Team,
        team_tricks: TeamScores,
    },

    /// A hand finished (7 tricks taken, or all 13 played).
    HandComplete {
        winning_team: Team,
        final_tricks: TeamScores,
        round_scores: TeamScores,
        /// `None` when the game ended with this hand.
        next_hakem: Option<PlayerId>,
    },

    /// A team took the hand and its round score moved.
    RoundResult {
        winning_team: Team,
        round_scores: TeamScores,
    },

    /// The whole match is over.
    GameOver {
        winning_team: Team,
        round_scores: TeamScores,
    },

    /// A full redacted snapshot of the match for the recipient. Sent on
    /// reconnection and whenever a client needs to resynchronize.
    GameState { view: PlayerView },

    /// Another player's socket dropped.
    PlayerDisconnected {
        player_id: PlayerId,
        /// How many of the four seats still have a live connection.
        connected_players: usize,
    },

    /// A previously disconnected player is back.
    PlayerReconnected { player_id: PlayerId },

    /// Heartbeat echo.
    HeartbeatAck,

    /// A request was rejected. `code` is machine-readable; `message` is
    /// for humans and logs.
    Error { code: ErrorCode, message: String },
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable rejection reasons.
///
/// Reconnection failures get distinct codes so clients can react
/// differently: re-join fresh on `SessionNotFound`/`SessionExpired`,
/// back off on `AlreadyConnected`, drop to the lobby on `RoomGone`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// No session exists for the presented player id.
    SessionNotFound,
    /// The session outlived both reconnection windows and was deleted.
    SessionExpired,
    /// The player already has a live connection.
    AlreadyConnected,
    /// The session is valid but its room no longer exists.
    RoomGone,
    /// The room exists but has no game to rejoin.
    NoActiveGame,
    /// The room code doesn't match any room.
    RoomNotFound,
    /// The room already has four seated players.
    RoomFull,
    /// A game-rule rejection (out of turn, wrong card, wrong phase).
    InvalidAction,
    /// The message couldn't be parsed at all.
    MalformedMessage,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            ErrorCode::SessionNotFound => "session_not_found",
            ErrorCode::SessionExpired => "session_expired",
            ErrorCode::AlreadyConnected => "already_connected",
            ErrorCode::RoomGone => "room_gone",
            ErrorCode::NoActiveGame => "no_active_game",
            ErrorCode::RoomNotFound => "room_not_found",
            ErrorCode::RoomFull => "room_full",
            ErrorCode::InvalidAction => "invalid_action",
            ErrorCode::MalformedMessage => "malformed_message",
        };
        f.write_str(code)
    }
}

// =========================================================================
// Tests
// =========================================================================
