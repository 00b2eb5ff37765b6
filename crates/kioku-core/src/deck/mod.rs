//! Deck and flashcard model types.
//!
//! A [`Deck`] owns the authoritative card records; every other part of the
//! system (session queues, the CLI) refers to cards by [`CardId`] and looks
//! them up here. Queues never hold independent copies of a card, so there is
//! exactly one scheduling state per card at all times.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scheduler::grader::DEFAULT_EASINESS;

/// Stable card identity, assigned at creation and never reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(Uuid);

impl CardId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for CardId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Stable deck identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeckId(Uuid);

impl DeckId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for DeckId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A unit of knowledge to be reviewed.
///
/// `question`/`answer`/`tags` are free-form user content; the scheduling
/// fields are mutated only by the grader
/// ([`grade_card`](crate::scheduler::grader::grade_card)).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: CardId,
    pub question: String,
    pub answer: String,
    /// Free-form labels for browsing; not consulted by scheduling.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// The card is due when `next_review_date <= now`.
    pub next_review_date: DateTime<Utc>,
    /// Consecutive successful reviews since the last failure.
    pub repetitions: u32,
    /// Interval growth multiplier, always >= 1.3.
    pub easiness_factor: f64,
    /// Days until the next review, derived at each grading.
    pub interval: u32,
}

impl Flashcard {
    /// Create a card with default scheduling state: due immediately, zero
    /// repetitions, easiness 2.5.
    pub fn new(question: impl Into<String>, answer: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: CardId::new(),
            question: question.into(),
            answer: answer.into(),
            tags: BTreeSet::new(),
            next_review_date: now,
            repetitions: 0,
            easiness_factor: DEFAULT_EASINESS,
            interval: 0,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_date <= now
    }

    /// A card that has not passed since its last reset. Note a lapsed card
    /// (failed after earlier passes) is indistinguishable from a
    /// never-reviewed one here; selection treats both as new.
    pub fn is_new(&self) -> bool {
        self.repetitions == 0
    }
}

/// An ordered, named collection of flashcards plus per-session counters.
///
/// Card order in `cards` is the storage order and serves as the stable
/// tie-break when sorting by due date. The counters track how many
/// review/new cards the current session has already served; only
/// [`record_review`](crate::scheduler::session::record_review) increments
/// them and only [`begin_session`](crate::scheduler::session::begin_session)
/// resets them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deck {
    pub id: DeckId,
    pub name: String,
    pub cards: Vec<Flashcard>,
    #[serde(default)]
    pub session_review_cards: u32,
    #[serde(default)]
    pub session_new_cards: u32,
}

impl Deck {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: DeckId::new(),
            name: name.into(),
            cards: Vec::new(),
            session_review_cards: 0,
            session_new_cards: 0,
        }
    }

    pub fn card(&self, id: CardId) -> Option<&Flashcard> {
        self.cards.iter().find(|c| c.id == id)
    }

    pub fn card_mut(&mut self, id: CardId) -> Option<&mut Flashcard> {
        self.cards.iter_mut().find(|c| c.id == id)
    }

    pub fn add_card(&mut self, card: Flashcard) -> CardId {
        let id = card.id;
        self.cards.push(card);
        id
    }

    /// Remove a card by id. Returns the card if it was present.
    pub fn remove_card(&mut self, id: CardId) -> Option<Flashcard> {
        let idx = self.cards.iter().position(|c| c.id == id)?;
        Some(self.cards.remove(idx))
    }

    /// Cards due at `now`, in storage order.
    pub fn due_cards(&self, now: DateTime<Utc>) -> impl Iterator<Item = &Flashcard> {
        self.cards.iter().filter(move |c| c.is_due(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn new_card_is_due_and_new() {
        let now = Utc::now();
        let card = Flashcard::new("犬", "dog", now);
        assert!(card.is_due(now));
        assert!(card.is_new());
        assert_eq!(card.repetitions, 0);
        assert_eq!(card.interval, 0);
        assert!((card.easiness_factor - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn card_lookup_by_id_survives_reordering() {
        let now = Utc::now();
        let mut deck = Deck::new("JLPT N5");
        let a = deck.add_card(Flashcard::new("犬", "dog", now));
        let b = deck.add_card(Flashcard::new("猫", "cat", now));
        deck.cards.reverse();
        assert_eq!(deck.card(a).unwrap().question, "犬");
        assert_eq!(deck.card(b).unwrap().question, "猫");
    }

    #[test]
    fn remove_card_returns_removed() {
        let now = Utc::now();
        let mut deck = Deck::new("JLPT N5");
        let id = deck.add_card(Flashcard::new("犬", "dog", now));
        let removed = deck.remove_card(id).unwrap();
        assert_eq!(removed.id, id);
        assert!(deck.card(id).is_none());
        assert!(deck.remove_card(id).is_none());
    }

    #[test]
    fn due_cards_filters_future_cards() {
        let now = Utc::now();
        let mut deck = Deck::new("JLPT N5");
        deck.add_card(Flashcard::new("犬", "dog", now));
        let mut future = Flashcard::new("猫", "cat", now);
        future.next_review_date = now + Duration::days(3);
        deck.add_card(future);
        assert_eq!(deck.due_cards(now).count(), 1);
    }
}
