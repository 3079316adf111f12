//! The match state machine: one room's full game state and every phase
//! transition, from team assignment through trick, hand, and round
//! resolution.
//!
//! All operations follow the same discipline: validate first, mutate only
//! after every check has passed. A rejected operation leaves the match
//! exactly as it was.

use std::collections::HashMap;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::deck::Deck;
use crate::error::GameError;
use crate::types::{Card, PlayerId, Suit, Team, TeamScores};

/// Players per match. Hokm is strictly a 4-player game.
pub const PLAYER_COUNT: usize = 4;

/// Cards each player holds after both deals.
pub const HAND_SIZE: usize = 13;

/// Tricks a team must take to win the hand outright.
pub const TRICKS_TO_WIN_HAND: u32 = 7;

/// Total tricks in a hand (13 cards per player, one card per trick).
pub const TRICKS_PER_HAND: u32 = 13;

/// Cards dealt before trump selection.
const INITIAL_DEAL_SIZE: usize = 5;

/// Cards dealt after trump selection.
const FINAL_DEAL_SIZE: usize = 8;

// ---------------------------------------------------------------------------
// MatchPhase
// ---------------------------------------------------------------------------

/// The lifecycle phase of a match.
///
/// Transitions are strictly forward, with one loop: completing a hand
/// without ending the game returns to `InitialDeal` for the next hand.
///
/// ```text
/// Lobby → TeamAssignment → InitialDeal → HokmSelection → FinalDeal
///       → Gameplay → HandComplete ──→ InitialDeal
///                                 └─→ Completed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    Lobby,
    TeamAssignment,
    InitialDeal,
    HokmSelection,
    FinalDeal,
    Gameplay,
    HandComplete,
    Completed,
}

impl MatchPhase {
    /// Returns `true` once the match has finished for good.
    pub fn is_terminal(self) -> bool {
        matches!(self, MatchPhase::Completed)
    }

    /// Returns `true` while card play is legal.
    pub fn is_gameplay(self) -> bool {
        matches!(self, MatchPhase::Gameplay)
    }
}

impl fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchPhase::Lobby => "lobby",
            MatchPhase::TeamAssignment => "team_assignment",
            MatchPhase::InitialDeal => "initial_deal",
            MatchPhase::HokmSelection => "hokm_selection",
            MatchPhase::FinalDeal => "final_deal",
            MatchPhase::Gameplay => "gameplay",
            MatchPhase::HandComplete => "hand_complete",
            MatchPhase::Completed => "completed",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Config and result types
// ---------------------------------------------------------------------------

/// Tunable match settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Round wins needed to take the match. Standard Hokm plays to 7.
    pub round_win_threshold: u32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            round_win_threshold: 7,
        }
    }
}

/// Both teams' membership, in seating order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRoster {
    pub team_a: Vec<PlayerId>,
    pub team_b: Vec<PlayerId>,
}

/// Everything that happened as a result of one legal card play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayOutcome {
    /// The acting player.
    pub player: PlayerId,
    /// The card they played.
    pub card: Card,
    /// The suit led in the trick this card joined (the card's own suit
    /// if it opened the trick).
    pub led_suit: Suit,
    /// Present when this was the trick's 4th card.
    pub resolution: Option<TrickResolution>,
}

/// The result of resolving a completed trick.
///
/// Every field is populated from real state — both teams' counts are
/// always present, so callers never patch in defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrickResolution {
    /// The player whose card took the trick.
    pub winner: PlayerId,
    pub winning_card: Card,
    pub winning_team: Team,
    /// The four plays, in play order.
    pub plays: Vec<(PlayerId, Card)>,
    /// Per-team trick counts after this trick.
    pub team_tricks: TeamScores,
    /// Present when this trick completed the hand.
    pub hand: Option<HandResult>,
}

/// The result of a completed hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandResult {
    pub winning_team: Team,
    /// Final trick counts for the hand.
    pub final_tricks: TeamScores,
    /// Round scores after crediting this hand.
    pub round_scores: TeamScores,
    /// `true` when the round-win threshold was reached.
    pub game_over: bool,
    /// The hakem for the next hand; `None` when the game is over.
    pub next_hakem: Option<PlayerId>,
}

// ---------------------------------------------------------------------------
// MatchState
// ---------------------------------------------------------------------------

/// One room's complete game state.
///
/// Owned by exactly one writer (the room actor); none of these methods
/// are safe under concurrent mutation and none need to be.
#[derive(Debug, Clone)]
pub struct MatchState {
    config: MatchConfig,
    phase: MatchPhase,
    /// Seating order, clockwise. Rotated hakem-first at team assignment.
    players: Vec<PlayerId>,
    teams: HashMap<PlayerId, Team>,
    hakem: Option<PlayerId>,
    trump: Option<Suit>,
    deck: Deck,
    hands: HashMap<PlayerId, Vec<Card>>,
    current_trick: Vec<(PlayerId, Card)>,
    led_suit: Option<Suit>,
    /// Cards retired from completed tricks this hand.
    played: Vec<Card>,
    team_tricks: TeamScores,
    round_scores: TeamScores,
    player_tricks: HashMap<PlayerId, u32>,
    completed_tricks: u32,
    /// Index into `players` of whoever acts next.
    current_turn: usize,
}

impl MatchState {
    /// Creates a match in `Lobby` for exactly 4 seated players.
    pub fn new(
        players: Vec<PlayerId>,
        config: MatchConfig,
    ) -> Result<Self, GameError> {
        if players.len() != PLAYER_COUNT {
            return Err(GameError::WrongPlayerCount(players.len()));
        }
        let hands = players.iter().map(|p| (p.clone(), Vec::new())).collect();
        let player_tricks =
            players.iter().map(|p| (p.clone(), 0)).collect();
        Ok(Self {
            config,
            phase: MatchPhase::Lobby,
            players,
            teams: HashMap::new(),
            hakem: None,
            trump: None,
            deck: Deck::empty(),
            hands,
            current_trick: Vec::new(),
            led_suit: None,
            played: Vec::new(),
            team_tricks: TeamScores::default(),
            round_scores: TeamScores::default(),
            player_tricks,
            completed_tricks: 0,
            current_turn: 0,
        })
    }

    // -- Phase operations ---------------------------------------------------

    /// Draws teams and the first hakem, both uniformly at random, then
    /// rotates the seating so the hakem sits first (clockwise order
    /// preserved). Transitions `Lobby → InitialDeal`.
    pub fn assign_teams_and_hakem(
        &mut self,
        rng: &mut impl Rng,
    ) -> Result<(), GameError> {
        self.require_phase(MatchPhase::Lobby)?;
        self.phase = MatchPhase::TeamAssignment;

        // First Team A member from all 4, second from the remaining 3.
        let mut pool: Vec<PlayerId> = self.players.clone();
        let first = pool.remove(rng.random_range(0..pool.len()));
        let second = pool.remove(rng.random_range(0..pool.len()));

        self.teams.clear();
        self.teams.insert(first, Team::A);
        self.teams.insert(second, Team::A);
        for leftover in pool {
            self.teams.insert(leftover, Team::B);
        }

        // The hakem draw is independent of the team draw.
        let hakem_seat = rng.random_range(0..self.players.len());
        self.players.rotate_left(hakem_seat);
        self.hakem = Some(self.players[0].clone());
        self.current_turn = 0;

        self.phase = MatchPhase::InitialDeal;
        Ok(())
    }

    /// Shuffles a fresh deck and deals 5 cards to each player in seating
    /// order. Transitions `InitialDeal → HokmSelection`.
    pub fn initial_deal(
        &mut self,
        rng: &mut impl Rng,
    ) -> Result<(), GameError> {
        self.require_phase(MatchPhase::InitialDeal)?;

        self.deck = Deck::shuffled(rng);
        for player in self.players.clone() {
            let cards = self.deck.deal(INITIAL_DEAL_SIZE);
            if let Some(hand) = self.hands.get_mut(&player) {
                hand.extend(cards);
            }
        }

        self.phase = MatchPhase::HokmSelection;
        Ok(())
    }

    /// The hakem names the trump suit. Transitions
    /// `HokmSelection → FinalDeal`.
    pub fn set_hokm(
        &mut self,
        player: &PlayerId,
        suit: Suit,
    ) -> Result<(), GameError> {
        self.require_phase(MatchPhase::HokmSelection)?;
        if self.hakem.as_ref() != Some(player) {
            return Err(GameError::NotHakem(player.clone()));
        }

        self.trump = Some(suit);
        self.phase = MatchPhase::FinalDeal;
        Ok(())
    }

    /// Deals the remaining 8 cards per player, hakem first, bringing every
    /// hand to 13. Transitions `FinalDeal → Gameplay`; the hakem leads the
    /// first trick.
    pub fn final_deal(&mut self) -> Result<(), GameError> {
        self.require_phase(MatchPhase::FinalDeal)?;

        let start = self.hakem_seat();
        for offset in 0..PLAYER_COUNT {
            let player =
                self.players[(start + offset) % PLAYER_COUNT].clone();
            let cards = self.deck.deal(FINAL_DEAL_SIZE);
            if let Some(hand) = self.hands.get_mut(&player) {
                hand.extend(cards);
            }
        }

        self.current_turn = start;
        self.phase = MatchPhase::Gameplay;
        Ok(())
    }

    /// Checks whether `player` may legally play `card` right now.
    ///
    /// Never mutates state. Failure reasons, in check order: wrong phase,
    /// not the player's turn, card not held, follow-suit violation.
    pub fn validate_play(
        &self,
        player: &PlayerId,
        card: Card,
    ) -> Result<(), GameError> {
        self.require_phase(MatchPhase::Gameplay)?;

        if self.players[self.current_turn] != *player {
            return Err(GameError::TurnViolation(player.clone()));
        }

        let hand = self
            .hands
            .get(player)
            .map(Vec::as_slice)
            .unwrap_or_default();
        if !hand.contains(&card) {
            return Err(GameError::CardNotOwned {
                player: player.clone(),
                card,
            });
        }

        if let Some(led) = self.led_suit {
            let holds_led = hand.iter().any(|c| c.suit == led);
            if holds_led && card.suit != led {
                return Err(GameError::SuitViolation {
                    player: player.clone(),
                    required: led,
                });
            }
        }

        Ok(())
    }

    /// Plays a card into the current trick. When the 4th card lands, the
    /// trick is resolved inline and the outcome carries the resolution
    /// (and, where applicable, hand and game results).
    pub fn play_card(
        &mut self,
        player: &PlayerId,
        card: Card,
    ) -> Result<PlayOutcome, GameError> {
        self.validate_play(player, card)?;

        let hand = self
            .hands
            .get_mut(player)
            .expect("validated player has a hand");
        let pos = hand
            .iter()
            .position(|c| *c == card)
            .expect("validated card is in hand");
        hand.remove(pos);

        let led = *self.led_suit.get_or_insert(card.suit);
        self.current_trick.push((player.clone(), card));
        self.current_turn = (self.current_turn + 1) % PLAYER_COUNT;

        let resolution = if self.current_trick.len() == PLAYER_COUNT {
            Some(self.resolve_trick()?)
        } else {
            None
        };

        Ok(PlayOutcome {
            player: player.clone(),
            card,
            led_suit: led,
            resolution,
        })
    }

    /// Resolves the trick on the table.
    ///
    /// Precondition: exactly 4 plays. Anything else returns
    /// [`GameError::MalformedTrickState`] before touching any state —
    /// there is no silent fallback for a half-played trick.
    pub fn resolve_trick(&mut self) -> Result<TrickResolution, GameError> {
        if self.current_trick.len() != PLAYER_COUNT {
            return Err(GameError::MalformedTrickState {
                found: self.current_trick.len(),
            });
        }

        let led = self.current_trick[0].1.suit;
        let trump = self.trump;

        // Trump beats non-trump regardless of play order; ties within a
        // category go to the higher rank; off-suit non-trump never wins.
        let (winner, winning_card) = self
            .current_trick
            .iter()
            .skip(1)
            .fold(&self.current_trick[0], |best, play| {
                if beats(play.1, best.1, trump, led) {
                    play
                } else {
                    best
                }
            })
            .clone();

        let winning_team = self.teams[&winner];
        self.team_tricks.add(winning_team);
        *self
            .player_tricks
            .get_mut(&winner)
            .expect("winner is seated") += 1;
        self.completed_tricks += 1;

        let plays = std::mem::take(&mut self.current_trick);
        self.played.extend(plays.iter().map(|(_, c)| *c));
        self.led_suit = None;
        self.current_turn = self.seat_of(&winner);

        let hand = if self.team_tricks.get(winning_team)
            >= TRICKS_TO_WIN_HAND
            || self.completed_tricks >= TRICKS_PER_HAND
        {
            Some(self.complete_hand())
        } else {
            None
        };

        Ok(TrickResolution {
            winner,
            winning_card,
            winning_team,
            plays,
            team_tricks: self.team_tricks,
            hand,
        })
    }

    // -- Hand and round resolution ------------------------------------------

    /// Credits the hand to its winner, ends the game at the round-win
    /// threshold, and otherwise prepares the next hand.
    fn complete_hand(&mut self) -> HandResult {
        self.phase = MatchPhase::HandComplete;

        // Either one team reached 7, or all 13 tricks played; 13 tricks
        // split between two teams can never tie.
        let winning_team = if self.team_tricks.get(Team::A)
            >= TRICKS_TO_WIN_HAND
        {
            Team::A
        } else if self.team_tricks.get(Team::B) >= TRICKS_TO_WIN_HAND {
            Team::B
        } else {
            self.team_tricks
                .leader()
                .expect("13 tricks cannot split evenly")
        };

        let final_tricks = self.team_tricks;
        self.round_scores.add(winning_team);
        let round_scores = self.round_scores;

        let game_over = self.round_scores.get(winning_team)
            >= self.config.round_win_threshold;

        let next_hakem = if game_over {
            self.phase = MatchPhase::Completed;
            None
        } else {
            Some(self.prepare_new_hand(winning_team))
        };

        HandResult {
            winning_team,
            final_tricks,
            round_scores,
            game_over,
            next_hakem,
        }
    }

    /// Resets per-hand state for the next hand. The new hakem is the
    /// hand-winning team's player with the most personal tricks, ties
    /// broken by seating order. Transitions `HandComplete → InitialDeal`.
    fn prepare_new_hand(&mut self, winning_team: Team) -> PlayerId {
        let next_hakem = self
            .players
            .iter()
            .filter(|p| self.teams[*p] == winning_team)
            .max_by_key(|p| {
                // Ties on trick count break toward the earlier seat.
                (self.player_tricks[*p], std::cmp::Reverse(self.seat_of(p)))
            })
            .expect("winning team has players")
            .clone();

        self.hakem = Some(next_hakem.clone());
        self.trump = None;
        self.deck = Deck::empty();
        for hand in self.hands.values_mut() {
            hand.clear();
        }
        self.current_trick.clear();
        self.led_suit = None;
        self.played.clear();
        self.team_tricks = TeamScores::default();
        for count in self.player_tricks.values_mut() {
            *count = 0;
        }
        self.completed_tricks = 0;
        self.current_turn = self.seat_of(&next_hakem);
        self.phase = MatchPhase::InitialDeal;

        next_hakem
    }

    // -- Accessors ----------------------------------------------------------

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn config(&self) -> MatchConfig {
        self.config
    }

    /// Seating order, hakem-first after assignment.
    pub fn players(&self) -> &[PlayerId] {
        &self.players
    }

    pub fn hakem(&self) -> Option<&PlayerId> {
        self.hakem.as_ref()
    }

    pub fn trump(&self) -> Option<Suit> {
        self.trump
    }

    pub fn team_of(&self, player: &PlayerId) -> Option<Team> {
        self.teams.get(player).copied()
    }

    /// Both rosters in seating order. Empty before team assignment.
    pub fn roster(&self) -> TeamRoster {
        let members = |team: Team| {
            self.players
                .iter()
                .filter(|p| self.teams.get(*p) == Some(&team))
                .cloned()
                .collect()
        };
        TeamRoster {
            team_a: members(Team::A),
            team_b: members(Team::B),
        }
    }

    pub fn hand(&self, player: &PlayerId) -> Option<&[Card]> {
        self.hands.get(player).map(Vec::as_slice)
    }

    pub fn current_trick(&self) -> &[(PlayerId, Card)] {
        &self.current_trick
    }

    pub fn led_suit(&self) -> Option<Suit> {
        self.led_suit
    }

    pub fn team_tricks(&self) -> TeamScores {
        self.team_tricks
    }

    pub fn round_scores(&self) -> TeamScores {
        self.round_scores
    }

    pub fn player_tricks(&self, player: &PlayerId) -> u32 {
        self.player_tricks.get(player).copied().unwrap_or(0)
    }

    pub fn completed_tricks(&self) -> u32 {
        self.completed_tricks
    }

    /// Whoever acts next, during gameplay only.
    pub fn current_player(&self) -> Option<&PlayerId> {
        self.phase
            .is_gameplay()
            .then(|| &self.players[self.current_turn])
    }

    /// Every card currently accounted for: undealt deck, all hands, the
    /// trick on the table, and cards retired from completed tricks.
    /// Between a deal and the end of its hand this is the full 52-card
    /// set — the conservation invariant the tests assert.
    pub fn card_census(&self) -> Vec<Card> {
        let mut cards: Vec<Card> = self.deck.cards().to_vec();
        for hand in self.hands.values() {
            cards.extend(hand.iter().copied());
        }
        cards.extend(self.current_trick.iter().map(|(_, c)| *c));
        cards.extend(self.played.iter().copied());
        cards
    }

    // -- Internals ----------------------------------------------------------

    fn require_phase(&self, expected: MatchPhase) -> Result<(), GameError> {
        if self.phase != expected {
            return Err(GameError::PhaseMismatch {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    fn hakem_seat(&self) -> usize {
        self.hakem
            .as_ref()
            .map(|h| self.seat_of(h))
            .unwrap_or(0)
    }

    fn seat_of(&self, player: &PlayerId) -> usize {
        self.players
            .iter()
            .position(|p| p == player)
            .expect("player is seated")
    }
}

/// Whether `candidate` beats the current `best` card, given the trump and
/// led suits.
fn beats(candidate: Card, best: Card, trump: Option<Suit>, led: Suit) -> bool {
    let is_trump = |c: Card| Some(c.suit) == trump;

    match (is_trump(candidate), is_trump(best)) {
        (true, false) => true,
        (false, true) => false,
        (true, true) => candidate.rank > best.rank,
        (false, false) => {
            candidate.suit == led
                && best.suit == led
                && candidate.rank > best.rank
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    use super::*;
    use crate::types::Rank;

    // -- Helpers ----------------------------------------------------------

    fn pid(name: &str) -> PlayerId {
        PlayerId::new(name)
    }

    fn four_players() -> Vec<PlayerId> {
        vec![pid("p1"), pid("p2"), pid("p3"), pid("p4")]
    }

    fn new_match() -> MatchState {
        MatchState::new(four_players(), MatchConfig::default()).unwrap()
    }

    /// Drives a fresh match up to Gameplay with a seeded rng.
    fn setup_gameplay(seed: u64) -> MatchState {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut m = new_match();
        m.assign_teams_and_hakem(&mut rng).unwrap();
        m.initial_deal(&mut rng).unwrap();
        let hakem = m.hakem().unwrap().clone();
        m.set_hokm(&hakem, Suit::Hearts).unwrap();
        m.final_deal().unwrap();
        m
    }

    /// The first card the current player may legally play.
    fn first_legal(m: &MatchState) -> (PlayerId, Card) {
        let player = m.current_player().unwrap().clone();
        let card = m
            .hand(&player)
            .unwrap()
            .iter()
            .copied()
            .find(|c| m.validate_play(&player, *c).is_ok())
            .expect("some card is always legal");
        (player, card)
    }

    /// Plays legal cards until a trick resolves; returns the resolution.
    fn play_one_trick(m: &mut MatchState) -> TrickResolution {
        loop {
            let (player, card) = first_legal(m);
            let outcome = m.play_card(&player, card).unwrap();
            if let Some(resolution) = outcome.resolution {
                return resolution;
            }
        }
    }

    fn assert_conserved(m: &MatchState) {
        let census = m.card_census();
        assert_eq!(census.len(), 52, "card count drifted");
        let unique: HashSet<Card> = census.into_iter().collect();
        assert_eq!(unique.len(), 52, "duplicate card in census");
    }

    // =====================================================================
    // new()
    // =====================================================================

    #[test]
    fn test_new_requires_exactly_four_players() {
        let short = vec![pid("a"), pid("b"), pid("c")];
        let result = MatchState::new(short, MatchConfig::default());
        assert_eq!(result.unwrap_err(), GameError::WrongPlayerCount(3));
    }

    #[test]
    fn test_new_starts_in_lobby() {
        let m = new_match();
        assert_eq!(m.phase(), MatchPhase::Lobby);
        assert!(m.hakem().is_none());
        assert!(m.trump().is_none());
    }

    // =====================================================================
    // assign_teams_and_hakem()
    // =====================================================================

    #[test]
    fn test_assign_produces_two_teams_of_two() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut m = new_match();
        m.assign_teams_and_hakem(&mut rng).unwrap();

        let roster = m.roster();
        assert_eq!(roster.team_a.len(), 2);
        assert_eq!(roster.team_b.len(), 2);
        assert_eq!(m.phase(), MatchPhase::InitialDeal);
    }

    #[test]
    fn test_assign_puts_hakem_first_preserving_clockwise_order() {
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut m = new_match();
            m.assign_teams_and_hakem(&mut rng).unwrap();

            assert_eq!(m.players()[0], *m.hakem().unwrap());

            // The new order must be a rotation of the original seating.
            let original = four_players();
            let start = original
                .iter()
                .position(|p| p == &m.players()[0])
                .unwrap();
            for (i, player) in m.players().iter().enumerate() {
                assert_eq!(*player, original[(start + i) % 4]);
            }
        }
    }

    #[test]
    fn test_assign_rejected_outside_lobby() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut m = new_match();
        m.assign_teams_and_hakem(&mut rng).unwrap();

        let result = m.assign_teams_and_hakem(&mut rng);
        assert!(matches!(
            result,
            Err(GameError::PhaseMismatch { .. })
        ));
    }

    #[test]
    fn test_assign_hakem_draw_covers_all_seats() {
        // Uniform draws over enough seeds should land on every seat.
        let mut seen = HashSet::new();
        for seed in 0..64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut m = new_match();
            m.assign_teams_and_hakem(&mut rng).unwrap();
            seen.insert(m.hakem().unwrap().clone());
        }
        assert_eq!(seen.len(), 4, "hakem draw never hit some seat");
    }

    // =====================================================================
    // initial_deal() / set_hokm() / final_deal()
    // =====================================================================

    #[test]
    fn test_initial_deal_gives_each_player_five_cards() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut m = new_match();
        m.assign_teams_and_hakem(&mut rng).unwrap();
        m.initial_deal(&mut rng).unwrap();

        for player in m.players().to_vec() {
            assert_eq!(m.hand(&player).unwrap().len(), 5);
        }
        assert_eq!(m.phase(), MatchPhase::HokmSelection);
        assert_conserved(&m);
    }

    #[test]
    fn test_initial_deal_rejected_in_lobby() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut m = new_match();
        assert!(matches!(
            m.initial_deal(&mut rng),
            Err(GameError::PhaseMismatch { .. })
        ));
    }

    #[test]
    fn test_set_hokm_rejects_non_hakem() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut m = new_match();
        m.assign_teams_and_hakem(&mut rng).unwrap();
        m.initial_deal(&mut rng).unwrap();

        let not_hakem = m
            .players()
            .iter()
            .find(|p| Some(*p) != m.hakem())
            .unwrap()
            .clone();
        assert_eq!(
            m.set_hokm(&not_hakem, Suit::Spades).unwrap_err(),
            GameError::NotHakem(not_hakem)
        );
        // State untouched: still awaiting selection.
        assert_eq!(m.phase(), MatchPhase::HokmSelection);
        assert!(m.trump().is_none());
    }

    #[test]
    fn test_set_hokm_sets_trump_and_advances() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut m = new_match();
        m.assign_teams_and_hakem(&mut rng).unwrap();
        m.initial_deal(&mut rng).unwrap();
        let hakem = m.hakem().unwrap().clone();

        m.set_hokm(&hakem, Suit::Diamonds).unwrap();
        assert_eq!(m.trump(), Some(Suit::Diamonds));
        assert_eq!(m.phase(), MatchPhase::FinalDeal);
    }

    #[test]
    fn test_final_deal_brings_every_hand_to_thirteen() {
        let m = setup_gameplay(4);
        for player in m.players().to_vec() {
            assert_eq!(m.hand(&player).unwrap().len(), 13);
        }
        assert_eq!(m.phase(), MatchPhase::Gameplay);
        // Hakem leads the first trick.
        assert_eq!(m.current_player(), m.hakem());
        assert_conserved(&m);
    }

    // =====================================================================
    // validate_play()
    // =====================================================================

    #[test]
    fn test_validate_play_rejects_wrong_phase() {
        let m = new_match();
        let card = Card::new(Rank::Ace, Suit::Hearts);
        assert!(matches!(
            m.validate_play(&pid("p1"), card),
            Err(GameError::PhaseMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_play_rejects_out_of_turn() {
        let m = setup_gameplay(5);
        let waiting = m
            .players()
            .iter()
            .find(|p| Some(*p) != m.current_player())
            .unwrap()
            .clone();
        let card = m.hand(&waiting).unwrap()[0];
        assert_eq!(
            m.validate_play(&waiting, card).unwrap_err(),
            GameError::TurnViolation(waiting)
        );
    }

    #[test]
    fn test_validate_play_rejects_card_not_owned() {
        let m = setup_gameplay(6);
        let player = m.current_player().unwrap().clone();
        let foreign = *Deck::standard()
            .cards()
            .iter()
            .find(|c| !m.hand(&player).unwrap().contains(c))
            .unwrap();
        assert_eq!(
            m.validate_play(&player, foreign).unwrap_err(),
            GameError::CardNotOwned {
                player,
                card: foreign
            }
        );
    }

    #[test]
    fn test_validate_play_names_required_suit_on_violation() {
        // Search seeds until the second player both holds the led suit
        // and holds an off-suit card, then check the rejection.
        for seed in 0..50 {
            let mut m = setup_gameplay(seed);
            let (leader, lead_card) = first_legal(&m);
            m.play_card(&leader, lead_card).unwrap();
            let led = m.led_suit().unwrap();

            let follower = m.current_player().unwrap().clone();
            let hand = m.hand(&follower).unwrap();
            let holds_led = hand.iter().any(|c| c.suit == led);
            let off_suit =
                hand.iter().copied().find(|c| c.suit != led);

            if let (true, Some(bad)) = (holds_led, off_suit) {
                assert_eq!(
                    m.validate_play(&follower, bad).unwrap_err(),
                    GameError::SuitViolation {
                        player: follower,
                        required: led
                    }
                );
                return;
            }
        }
        panic!("no seed produced a follow-suit scenario");
    }

    #[test]
    fn test_rejected_play_never_mutates_state() {
        let mut m = setup_gameplay(7);
        let waiting = m
            .players()
            .iter()
            .find(|p| Some(*p) != m.current_player())
            .unwrap()
            .clone();
        let card = m.hand(&waiting).unwrap()[0];
        let hand_before = m.hand(&waiting).unwrap().to_vec();

        assert!(m.play_card(&waiting, card).is_err());

        assert_eq!(m.hand(&waiting).unwrap(), hand_before.as_slice());
        assert!(m.current_trick().is_empty());
        assert_conserved(&m);
    }

    // =====================================================================
    // play_card() / resolve_trick()
    // =====================================================================

    #[test]
    fn test_play_card_sets_led_suit_and_advances_turn() {
        let mut m = setup_gameplay(8);
        let (leader, card) = first_legal(&m);

        let outcome = m.play_card(&leader, card).unwrap();

        assert_eq!(outcome.led_suit, card.suit);
        assert_eq!(m.led_suit(), Some(card.suit));
        assert_eq!(m.current_trick().len(), 1);
        assert!(outcome.resolution.is_none());
        assert_ne!(m.current_player().unwrap(), &leader);
        assert_conserved(&m);
    }

    #[test]
    fn test_trick_winner_is_a_participant_holding_best_card() {
        let mut m = setup_gameplay(9);
        let trump = m.trump().unwrap();

        let resolution = play_one_trick(&mut m);

        let participants: Vec<&PlayerId> =
            resolution.plays.iter().map(|(p, _)| p).collect();
        assert!(participants.contains(&&resolution.winner));

        let led = resolution.plays[0].1.suit;
        let trumps: Vec<Card> = resolution
            .plays
            .iter()
            .map(|(_, c)| *c)
            .filter(|c| c.suit == trump)
            .collect();
        if trumps.is_empty() {
            let best_led = resolution
                .plays
                .iter()
                .map(|(_, c)| *c)
                .filter(|c| c.suit == led)
                .max_by_key(|c| c.rank)
                .unwrap();
            assert_eq!(resolution.winning_card, best_led);
        } else {
            let best_trump =
                trumps.into_iter().max_by_key(|c| c.rank).unwrap();
            assert_eq!(resolution.winning_card, best_trump);
        }
    }

    #[test]
    fn test_trick_winner_leads_next_trick() {
        let mut m = setup_gameplay(10);
        let resolution = play_one_trick(&mut m);
        assert_eq!(m.current_player().unwrap(), &resolution.winner);
        assert!(m.current_trick().is_empty());
        assert!(m.led_suit().is_none());
    }

    #[test]
    fn test_trick_resolution_counts_are_always_populated() {
        let mut m = setup_gameplay(11);
        let resolution = play_one_trick(&mut m);
        let total = resolution.team_tricks.get(Team::A)
            + resolution.team_tricks.get(Team::B);
        assert_eq!(total, 1);
        assert_eq!(m.player_tricks(&resolution.winner), 1);
        assert_eq!(m.completed_tricks(), 1);
    }

    #[test]
    fn test_resolve_trick_with_partial_trick_is_fatal_and_inert() {
        let mut m = setup_gameplay(12);
        let (leader, card) = first_legal(&m);
        m.play_card(&leader, card).unwrap();

        let err = m.resolve_trick().unwrap_err();
        assert_eq!(err, GameError::MalformedTrickState { found: 1 });
        assert!(err.is_fatal());
        // The half-played trick is untouched.
        assert_eq!(m.current_trick().len(), 1);
        assert_eq!(m.completed_tricks(), 0);
    }

    // =====================================================================
    // Hand and game completion
    // =====================================================================

    /// Plays full hands until one resolves, asserting conservation after
    /// every play. Returns the hand result.
    fn play_full_hand(m: &mut MatchState) -> HandResult {
        loop {
            let (player, card) = first_legal(m);
            let outcome = m.play_card(&player, card).unwrap();
            if let Some(resolution) = &outcome.resolution {
                if let Some(hand) = &resolution.hand {
                    return hand.clone();
                }
            }
            assert_conserved(m);
        }
    }

    #[test]
    fn test_hand_ends_at_seven_tricks_or_thirteen() {
        for seed in 0..8 {
            let mut m = setup_gameplay(100 + seed);
            let result = play_full_hand(&mut m);

            let a = result.final_tricks.get(Team::A);
            let b = result.final_tricks.get(Team::B);
            assert!(
                a.max(b) >= TRICKS_TO_WIN_HAND || a + b == TRICKS_PER_HAND,
                "hand ended early: {a} vs {b}"
            );
            assert!(a.max(b) <= TRICKS_PER_HAND);
            assert_eq!(result.winning_team, if a > b { Team::A } else { Team::B });
        }
    }

    #[test]
    fn test_hand_completion_credits_round_score_once() {
        let mut m = setup_gameplay(13);
        let result = play_full_hand(&mut m);
        let total = result.round_scores.get(Team::A)
            + result.round_scores.get(Team::B);
        assert_eq!(total, 1);
        assert_eq!(result.round_scores.get(result.winning_team), 1);
    }

    #[test]
    fn test_new_hand_resets_state_and_seats_new_hakem() {
        let mut m = setup_gameplay(14);
        let result = play_full_hand(&mut m);
        assert!(!result.game_over);

        let next_hakem = result.next_hakem.clone().unwrap();
        assert_eq!(m.hakem(), Some(&next_hakem));
        assert_eq!(m.team_of(&next_hakem), Some(result.winning_team));
        assert_eq!(m.phase(), MatchPhase::InitialDeal);
        assert!(m.trump().is_none());
        assert_eq!(m.completed_tricks(), 0);
        assert_eq!(m.team_tricks(), TeamScores::default());
        for p in m.players().to_vec() {
            assert!(m.hand(&p).unwrap().is_empty());
            assert_eq!(m.player_tricks(&p), 0);
        }
        // Round scores persist across hands.
        assert_eq!(m.round_scores(), result.round_scores);
    }

    #[test]
    fn test_next_hakem_has_most_personal_tricks_on_winning_team() {
        let mut m = setup_gameplay(15);

        // Track personal tricks ourselves while the hand plays out.
        let mut personal: HashMap<PlayerId, u32> = m
            .players()
            .iter()
            .map(|p| (p.clone(), 0))
            .collect();
        let result = loop {
            let (player, card) = first_legal(&m);
            let outcome = m.play_card(&player, card).unwrap();
            if let Some(resolution) = &outcome.resolution {
                *personal.get_mut(&resolution.winner).unwrap() += 1;
                if let Some(hand) = &resolution.hand {
                    break hand.clone();
                }
            }
        };

        let next_hakem = result.next_hakem.unwrap();
        let winners: Vec<&PlayerId> = m
            .players()
            .iter()
            .filter(|p| m.team_of(p) == Some(result.winning_team))
            .collect();
        let best = winners.iter().map(|p| personal[*p]).max().unwrap();
        assert_eq!(personal[&next_hakem], best);
        // Ties break toward the earlier seat.
        let first_best = winners
            .iter()
            .find(|p| personal[**p] == best)
            .unwrap();
        assert_eq!(&&next_hakem, first_best);
    }

    #[test]
    fn test_game_ends_exactly_at_round_win_threshold() {
        // A threshold of 2 keeps the simulated game short.
        let config = MatchConfig {
            round_win_threshold: 2,
        };
        let mut rng = StdRng::seed_from_u64(16);
        let mut m = MatchState::new(four_players(), config).unwrap();
        m.assign_teams_and_hakem(&mut rng).unwrap();

        let mut hands_played = 0;
        loop {
            m.initial_deal(&mut rng).unwrap();
            let hakem = m.hakem().unwrap().clone();
            m.set_hokm(&hakem, Suit::Spades).unwrap();
            m.final_deal().unwrap();

            let result = play_full_hand(&mut m);
            hands_played += 1;
            assert!(hands_played <= 3, "game overshot the threshold");

            if result.game_over {
                assert_eq!(
                    result.round_scores.get(result.winning_team),
                    2
                );
                assert_eq!(m.phase(), MatchPhase::Completed);
                assert!(result.next_hakem.is_none());
                break;
            }
            assert!(
                result.round_scores.get(result.winning_team) < 2,
                "game should have ended at the threshold"
            );
        }

        // Nothing is playable after completion.
        let someone = m.players()[0].clone();
        let any_card = Card::new(Rank::Ace, Suit::Hearts);
        assert!(matches!(
            m.validate_play(&someone, any_card),
            Err(GameError::PhaseMismatch { .. })
        ));
        let mut rng2 = StdRng::seed_from_u64(17);
        assert!(m.initial_deal(&mut rng2).is_err());
    }
}
