//! Deck construction and shuffling.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::types::{Card, Rank, Suit};

/// The undealt portion of a standard 52-card deck.
#[derive(Debug, Clone, Default)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// Number of cards in a full deck.
    pub const SIZE: usize = 52;

    /// A full, unshuffled deck: every rank of every suit exactly once.
    pub fn standard() -> Self {
        let mut cards = Vec::with_capacity(Self::SIZE);
        for suit in Suit::ALL {
            for rank in Rank::ALL {
                cards.push(Card::new(rank, suit));
            }
        }
        Self { cards }
    }

    /// A full deck shuffled with the given source of randomness.
    pub fn shuffled(rng: &mut impl Rng) -> Self {
        let mut deck = Self::standard();
        deck.cards.shuffle(rng);
        deck
    }

    /// An empty deck (all cards dealt or not yet created).
    pub fn empty() -> Self {
        Self { cards: Vec::new() }
    }

    /// Removes and returns `n` cards from the top of the deck.
    ///
    /// Callers must not ask for more cards than remain; the deal sizes
    /// (5 + 8 per player) are fixed by the game, so running short means a
    /// broken deck invariant.
    pub fn deal(&mut self, n: usize) -> Vec<Card> {
        debug_assert!(n <= self.cards.len(), "dealing from a short deck");
        self.cards.split_off(self.cards.len() - n)
    }

    /// Number of undealt cards.
    pub fn remaining(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// The undealt cards (used by invariant checks).
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }
}
