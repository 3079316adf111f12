//! Value types shared across the match engine: player identity, cards,
//! and the canonical team encoding.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PlayerId
// ---------------------------------------------------------------------------

/// An opaque identifier for a player.
///
/// Assigned by the server at first join and carried through the session
/// store, so it survives socket loss. `#[serde(transparent)]` keeps the
/// wire form a plain string.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Creates a player id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Suit and Rank
// ---------------------------------------------------------------------------

/// The four suits. Serialized lowercase (`"hearts"`, ...), matching the
/// wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Hearts,
    Diamonds,
    Clubs,
    Spades,
}

impl Suit {
    /// All four suits, in a fixed order (used for deck construction).
    pub const ALL: [Suit; 4] = [
        Suit::Hearts,
        Suit::Diamonds,
        Suit::Clubs,
        Suit::Spades,
    ];

    /// Lowercase name, as it appears on the wire.
    pub fn name(self) -> &'static str {
        match self {
            Suit::Hearts => "hearts",
            Suit::Diamonds => "diamonds",
            Suit::Clubs => "clubs",
            Suit::Spades => "spades",
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Card rank, ordinal 2 (Two) through 14 (Ace).
///
/// The derived `Ord` follows declaration order, so `Rank::Ace` is the
/// highest — trick resolution relies on this. Serialized as the short
/// label (`"2"`..`"10"`, `"J"`, `"Q"`, `"K"`, `"A"`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
    Serialize, Deserialize,
)]
#[serde(into = "String", try_from = "String")]
pub enum Rank {
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

impl Rank {
    /// All thirteen ranks, lowest first.
    pub const ALL: [Rank; 13] = [
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
        Rank::Ace,
    ];

    /// Numeric ordinal: 2 for Two up to 14 for Ace.
    pub fn ordinal(self) -> u8 {
        match self {
            Rank::Two => 2,
            Rank::Three => 3,
            Rank::Four => 4,
            Rank::Five => 5,
            Rank::Six => 6,
            Rank::Seven => 7,
            Rank::Eight => 8,
            Rank::Nine => 9,
            Rank::Ten => 10,
            Rank::Jack => 11,
            Rank::Queen => 12,
            Rank::King => 13,
            Rank::Ace => 14,
        }
    }

    /// Short label used on the wire and in logs.
    pub fn label(self) -> &'static str {
        match self {
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
            Rank::Ace => "A",
        }
    }
}

impl From<Rank> for String {
    fn from(rank: Rank) -> String {
        rank.label().to_string()
    }
}

impl TryFrom<String> for Rank {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Rank::ALL
            .into_iter()
            .find(|r| r.label() == value)
            .ok_or_else(|| format!("unknown rank: {value:?}"))
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Card
// ---------------------------------------------------------------------------

/// An immutable playing card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {}", self.rank, self.suit)
    }
}

// ---------------------------------------------------------------------------
// Team and TeamScores
// ---------------------------------------------------------------------------

/// One of the two partnerships.
///
/// This is the single canonical team encoding: serialized as `"A"` / `"B"`
/// everywhere — scores, assignments, results — with no alternative integer
/// or string-key form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    A,
    B,
}

impl Team {
    /// The opposing team.
    pub fn opponent(self) -> Team {
        match self {
            Team::A => Team::B,
            Team::B => Team::A,
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Team::A => f.write_str("Team A"),
            Team::B => f.write_str("Team B"),
        }
    }
}

/// A pair of per-team counters (trick counts within a hand, or round
/// scores across hands).
///
/// Always fully populated — both fields exist from construction, so no
/// caller ever needs a fallback default.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct TeamScores {
    pub team_a: u32,
    pub team_b: u32,
}

impl TeamScores {
    /// Returns the counter for one team.
    pub fn get(&self, team: Team) -> u32 {
        match team {
            Team::A => self.team_a,
            Team::B => self.team_b,
        }
    }

    /// Increments one team's counter.
    pub fn add(&mut self, team: Team) {
        match team {
            Team::A => self.team_a += 1,
            Team::B => self.team_b += 1,
        }
    }

    /// The team currently ahead, or `None` on a tie.
    pub fn leader(&self) -> Option<Team> {
        match self.team_a.cmp(&self.team_b) {
            std::cmp::Ordering::Greater => Some(Team::A),
            std::cmp::Ordering::Less => Some(Team::B),
            std::cmp::Ordering::Equal => None,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
