//! Property tests driving whole hands and games from random seeds.
//!
//! Each property seeds a deterministic rng, plays legal cards chosen by a
//! simple strategy, and asserts a structural invariant at every step.

use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashSet;

use crate::state::{
    MatchConfig, MatchPhase, MatchState, TRICKS_PER_HAND,
    TRICKS_TO_WIN_HAND,
};
use crate::types::{Card, PlayerId, Suit, Team};

fn seated_players() -> Vec<PlayerId> {
    (1..=4).map(|n| PlayerId::new(format!("p{n}"))).collect()
}

/// Drives a fresh match to Gameplay; trump suit picked by the rng seed.
fn gameplay_match(seed: u64) -> MatchState {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut m =
        MatchState::new(seated_players(), MatchConfig::default())
            .expect("4 players");
    m.assign_teams_and_hakem(&mut rng).expect("lobby");
    m.initial_deal(&mut rng).expect("deal");
    let hakem = m.hakem().expect("assigned").clone();
    let trump = Suit::ALL[(seed % 4) as usize];
    m.set_hokm(&hakem, trump).expect("hakem selects");
    m.final_deal().expect("final deal");
    m
}

/// Picks a legal card for the current player: `nth` indexes into the
/// legal subset so different seeds explore different lines of play.
fn pick_legal(m: &MatchState, nth: usize) -> (PlayerId, Card) {
    let player = m.current_player().expect("gameplay").clone();
    let legal: Vec<Card> = m
        .hand(&player)
        .expect("seated")
        .iter()
        .copied()
        .filter(|c| m.validate_play(&player, *c).is_ok())
        .collect();
    assert!(!legal.is_empty(), "player has no legal card");
    (player, legal[nth % legal.len()])
}

fn assert_full_census(m: &MatchState) {
    let census = m.card_census();
    assert_eq!(census.len(), 52, "card count drifted");
    let unique: HashSet<Card> = census.into_iter().collect();
    assert_eq!(unique.len(), 52, "duplicate card in census");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Every card stays accounted for, from deal through hand completion.
    #[test]
    fn prop_card_conservation_holds_through_a_hand(
        seed in 0u64..10_000,
        line in 0usize..64,
    ) {
        let mut m = gameplay_match(seed);
        assert_full_census(&m);

        let mut step = 0usize;
        loop {
            let (player, card) = pick_legal(&m, line.wrapping_add(step));
            let outcome = m.play_card(&player, card)
                .expect("picked card is legal");
            step += 1;

            match &outcome.resolution {
                Some(r) if r.hand.is_some() => break,
                _ => assert_full_census(&m),
            }
        }
    }

    /// The trick winner always played either the highest trump, or the
    /// highest card of the led suit when no trump was played.
    #[test]
    fn prop_trick_winner_played_the_best_card(
        seed in 0u64..10_000,
        line in 0usize..64,
    ) {
        let mut m = gameplay_match(seed);
        let trump = m.trump().expect("selected");

        let mut step = 0usize;
        let resolution = loop {
            let (player, card) = pick_legal(&m, line.wrapping_add(step));
            let outcome = m.play_card(&player, card)
                .expect("picked card is legal");
            step += 1;
            if let Some(r) = outcome.resolution {
                break r;
            }
        };

        let led = resolution.plays[0].1.suit;
        let cards: Vec<Card> =
            resolution.plays.iter().map(|(_, c)| *c).collect();
        let best = cards
            .iter()
            .copied()
            .filter(|c| c.suit == trump)
            .max_by_key(|c| c.rank)
            .or_else(|| {
                cards
                    .iter()
                    .copied()
                    .filter(|c| c.suit == led)
                    .max_by_key(|c| c.rank)
            })
            .expect("the led card always qualifies");
        prop_assert_eq!(resolution.winning_card, best);

        let winner_played = resolution
            .plays
            .iter()
            .any(|(p, c)| *p == resolution.winner && *c == best);
        prop_assert!(winner_played);
    }

    /// A player holding the led suit can never legally discard off-suit,
    /// and a void player can always play anything they hold.
    #[test]
    fn prop_follow_suit_is_enforced_exactly(
        seed in 0u64..10_000,
        line in 0usize..64,
    ) {
        let mut m = gameplay_match(seed);

        for step in 0..8usize {
            let player = m.current_player().expect("gameplay").clone();
            let hand: Vec<Card> =
                m.hand(&player).expect("seated").to_vec();

            if let Some(led) = m.led_suit() {
                let holds_led = hand.iter().any(|c| c.suit == led);
                for card in &hand {
                    let legal = m.validate_play(&player, *card).is_ok();
                    let expected = !holds_led || card.suit == led;
                    prop_assert_eq!(legal, expected);
                }
            } else {
                // Leading: every held card is legal.
                for card in &hand {
                    prop_assert!(
                        m.validate_play(&player, *card).is_ok()
                    );
                }
            }

            let (player, card) = pick_legal(&m, line.wrapping_add(step));
            m.play_card(&player, card).expect("picked card is legal");
        }
    }

    /// A hand always terminates: at most 13 tricks, ending the moment a
    /// team reaches 7, and the winner's count is the maximum.
    #[test]
    fn prop_hand_terminates_within_bounds(
        seed in 0u64..10_000,
        line in 0usize..64,
    ) {
        let mut m = gameplay_match(seed);

        let mut step = 0usize;
        let result = loop {
            prop_assert!(m.completed_tricks() < TRICKS_PER_HAND);
            prop_assert!(
                m.team_tricks().get(Team::A) < TRICKS_TO_WIN_HAND
            );
            prop_assert!(
                m.team_tricks().get(Team::B) < TRICKS_TO_WIN_HAND
            );

            let (player, card) = pick_legal(&m, line.wrapping_add(step));
            let outcome = m.play_card(&player, card)
                .expect("picked card is legal");
            step += 1;
            if let Some(r) = outcome.resolution {
                if let Some(hand) = r.hand {
                    break hand;
                }
            }
        };

        let a = result.final_tricks.get(Team::A);
        let b = result.final_tricks.get(Team::B);
        prop_assert!(
            a.max(b) >= TRICKS_TO_WIN_HAND || a + b == TRICKS_PER_HAND
        );
        prop_assert_eq!(
            result.winning_team,
            if a > b { Team::A } else { Team::B }
        );

        // Either the game ended or the next hand is staged.
        if result.game_over {
            prop_assert_eq!(m.phase(), MatchPhase::Completed);
            prop_assert!(result.next_hakem.is_none());
        } else {
            prop_assert_eq!(m.phase(), MatchPhase::InitialDeal);
            let next = result.next_hakem.expect("game continues");
            prop_assert_eq!(
                m.team_of(&next),
                Some(result.winning_team)
            );
        }
    }
}
