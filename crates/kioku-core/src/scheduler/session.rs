//! Session planning: which cards a review session presents, in what order,
//! and the state machine that drives one session.
//!
//! The planning functions are pure over an in-memory [`Deck`]. The
//! [`ReviewSession`] itself follows the caller-driven state machine
//! pattern: no internal threads or timeouts, every transition happens on an
//! explicit call and returns the events it produced. The session is
//! serializable so a CLI invocation can park it in the kv store and the
//! next invocation can pick it up.
//!
//! ## State transitions
//!
//! ```text
//! AwaitingAnswer -> AnswerShown -> (AwaitingAnswer | Complete)
//! ```
//!
//! The front of the queue is always the card currently being reviewed.
//! Abandoning a session (dropping it) leaves unreviewed cards due and
//! untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::deck::{CardId, Deck, DeckId};
use crate::error::{CoreError, ValidationError};
use crate::events::Event;
use crate::scheduler::grader::grade_card;

/// Per-session caps on how many review/new cards may be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLimits {
    pub max_reviews: u32,
    pub max_new: u32,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_reviews: 100,
            max_new: 20,
        }
    }
}

/// Result of [`select_session_cards`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Review cards first, then new cards, each partition earliest-due
    /// first.
    pub cards: Vec<CardId>,
    pub total: usize,
}

/// Select and order the cards a session should present.
///
/// Due cards are partitioned into review cards (`repetitions > 0`) and new
/// cards (`repetitions == 0`); a lapsed card counts as new here. Each
/// partition is sorted earliest-due first, with deck storage order as the
/// stable tie-break, and capped by whatever remains of the session budget
/// (`limit - counter`, never below zero). No state is modified; with no
/// intervening grading or counter change the same selection comes back
/// every time.
pub fn select_session_cards(deck: &Deck, limits: SessionLimits, now: DateTime<Utc>) -> Selection {
    let mut reviews: Vec<_> = deck.due_cards(now).filter(|c| !c.is_new()).collect();
    let mut new: Vec<_> = deck.due_cards(now).filter(|c| c.is_new()).collect();
    reviews.sort_by_key(|c| c.next_review_date);
    new.sort_by_key(|c| c.next_review_date);

    let review_budget = limits.max_reviews.saturating_sub(deck.session_review_cards) as usize;
    let new_budget = limits.max_new.saturating_sub(deck.session_new_cards) as usize;

    let cards: Vec<CardId> = reviews
        .into_iter()
        .take(review_budget)
        .chain(new.into_iter().take(new_budget))
        .map(|c| c.id)
        .collect();
    let total = cards.len();
    Selection { cards, total }
}

/// Re-filter and re-order a working queue after a grading.
///
/// Drops ids that are no longer in the deck or no longer due (the card that
/// was just passed has been pushed forward), then orders the remainder
/// earliest-due first with deck storage order as the tie-break. A failed
/// card stays due and so stays in the queue.
pub fn advance_queue(deck: &Deck, queue: &[CardId], now: DateTime<Utc>) -> Vec<CardId> {
    let mut remaining: Vec<_> = deck
        .cards
        .iter()
        .filter(|c| queue.contains(&c.id) && c.is_due(now))
        .collect();
    remaining.sort_by_key(|c| c.next_review_date);
    remaining.into_iter().map(|c| c.id).collect()
}

/// Count one completed review against the session budget.
///
/// The sole mutator of the session counters; call exactly once per
/// completed review, after grading.
pub fn record_review(deck: &mut Deck, was_new_card: bool) {
    if was_new_card {
        deck.session_new_cards += 1;
    } else {
        deck.session_review_cards += 1;
    }
}

/// Reset the session counters at a session boundary.
///
/// The deck never resets its own counters; whoever starts a new session
/// owns this call.
pub fn begin_session(deck: &mut Deck) {
    deck.session_review_cards = 0;
    deck.session_new_cards = 0;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Question shown, answer hidden.
    AwaitingAnswer,
    /// Answer revealed, grading enabled.
    AnswerShown,
    /// Terminal: no due cards remain in the queue.
    Complete,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::AwaitingAnswer => "awaiting_answer",
            SessionState::AnswerShown => "answer_shown",
            SessionState::Complete => "complete",
        }
    }
}

/// One bounded run of reviews against a deck.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewSession {
    deck_id: DeckId,
    state: SessionState,
    /// Remaining due cards, front first. Ids only; the deck keeps the
    /// authoritative card records.
    queue: Vec<CardId>,
    limits: SessionLimits,
    reviewed: u32,
}

impl ReviewSession {
    /// Begin a session: reset the deck's session counters and build the
    /// working queue. An empty selection starts directly in `Complete`.
    pub fn start(deck: &mut Deck, limits: SessionLimits, now: DateTime<Utc>) -> (Self, Event) {
        begin_session(deck);
        let selection = select_session_cards(deck, limits, now);
        let state = if selection.cards.is_empty() {
            SessionState::Complete
        } else {
            SessionState::AwaitingAnswer
        };
        let event = Event::SessionStarted {
            deck: deck.name.clone(),
            queued: selection.total,
            at: Utc::now(),
        };
        (
            Self {
                deck_id: deck.id,
                state,
                queue: selection.cards,
                limits,
                reviewed: 0,
            },
            event,
        )
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn deck_id(&self) -> DeckId {
        self.deck_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The card currently being reviewed (front of the queue).
    pub fn current_card(&self) -> Option<CardId> {
        self.queue.first().copied()
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub fn reviewed(&self) -> u32 {
        self.reviewed
    }

    pub fn is_complete(&self) -> bool {
        self.state == SessionState::Complete
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Reveal the current card's answer, enabling grading.
    pub fn reveal(&mut self) -> Result<Event, ValidationError> {
        match (self.state, self.current_card()) {
            (SessionState::AwaitingAnswer, Some(card_id)) => {
                self.state = SessionState::AnswerShown;
                Ok(Event::AnswerRevealed {
                    card_id,
                    at: Utc::now(),
                })
            }
            (other, _) => Err(ValidationError::InvalidSessionState {
                action: "reveal",
                state: other.as_str(),
            }),
        }
    }

    /// Grade the current card and advance the queue.
    ///
    /// Only legal once the answer is shown. Grades the card, counts it
    /// against the new/review budget (decided by its pre-grading
    /// repetitions), re-filters the queue and transitions to the next card
    /// or to `Complete`. Returns one event per transition; grading the last
    /// due card yields both the grade and the completion.
    pub fn grade(
        &mut self,
        deck: &mut Deck,
        grade: u8,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>, CoreError> {
        let card_id = match (self.state, self.current_card()) {
            (SessionState::AnswerShown, Some(card_id)) => card_id,
            (other, _) => {
                return Err(ValidationError::InvalidSessionState {
                    action: "grade",
                    state: other.as_str(),
                }
                .into())
            }
        };
        let (was_new, next) = match deck.card_mut(card_id) {
            Some(card) => {
                let was_new = card.is_new();
                (was_new, grade_card(card, grade, now)?)
            }
            None => {
                return Err(ValidationError::UnknownCard {
                    deck: deck.name.clone(),
                    card_id: card_id.to_string(),
                }
                .into())
            }
        };

        record_review(deck, was_new);
        self.reviewed += 1;
        self.queue = advance_queue(deck, &self.queue, now);

        let mut events = vec![Event::CardGraded {
            card_id,
            grade,
            passed: next.interval > 0,
            repetitions: next.repetitions,
            interval_days: next.interval,
            next_review_date: next.next_review_date,
            remaining: self.queue.len(),
            at: Utc::now(),
        }];

        if self.queue.is_empty() {
            self.state = SessionState::Complete;
            events.push(Event::SessionCompleted {
                deck: deck.name.clone(),
                reviewed: self.reviewed,
                at: Utc::now(),
            });
        } else {
            self.state = SessionState::AwaitingAnswer;
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::Flashcard;
    use crate::scheduler::grader::{GRADE_FAIL, GRADE_PASS};
    use chrono::Duration;
    use proptest::prelude::*;

    fn due_review(now: DateTime<Utc>, days_overdue: i64, reps: u32) -> Flashcard {
        let mut card = Flashcard::new("質問", "answer", now);
        card.repetitions = reps;
        card.next_review_date = now - Duration::days(days_overdue);
        card
    }

    fn deck_with(cards: Vec<Flashcard>) -> Deck {
        let mut deck = Deck::new("JLPT N5");
        for card in cards {
            deck.add_card(card);
        }
        deck
    }

    #[test]
    fn selection_puts_reviews_before_new_and_respects_caps() {
        let now = Utc::now();
        // 5 due review cards, 3 due new cards.
        let mut cards = Vec::new();
        for i in 0..5 {
            cards.push(due_review(now, 5 - i, 2));
        }
        for _ in 0..3 {
            cards.push(Flashcard::new("新", "new", now));
        }
        let deck = deck_with(cards);

        let limits = SessionLimits {
            max_reviews: 2,
            max_new: 1,
        };
        let selection = select_session_cards(&deck, limits, now);
        assert_eq!(selection.total, 3);

        // Earliest-due reviews first: the two most overdue.
        assert_eq!(selection.cards[0], deck.cards[0].id);
        assert_eq!(selection.cards[1], deck.cards[1].id);
        // Then the first new card in storage order.
        assert_eq!(selection.cards[2], deck.cards[5].id);
    }

    #[test]
    fn selection_is_idempotent_without_state_change() {
        let now = Utc::now();
        let deck = deck_with(vec![
            due_review(now, 2, 3),
            Flashcard::new("新", "new", now),
            due_review(now, 1, 1),
        ]);
        let limits = SessionLimits::default();
        let first = select_session_cards(&deck, limits, now);
        let second = select_session_cards(&deck, limits, now);
        assert_eq!(first, second);
    }

    #[test]
    fn equal_due_dates_keep_deck_storage_order() {
        let now = Utc::now();
        let deck = deck_with(vec![
            due_review(now, 1, 2),
            due_review(now, 1, 2),
            due_review(now, 1, 2),
        ]);
        let selection = select_session_cards(&deck, SessionLimits::default(), now);
        let expected: Vec<CardId> = deck.cards.iter().map(|c| c.id).collect();
        assert_eq!(selection.cards, expected);
    }

    #[test]
    fn exhausted_caps_contribute_zero_cards_never_negative() {
        let now = Utc::now();
        let mut deck = deck_with(vec![due_review(now, 1, 2), Flashcard::new("新", "n", now)]);
        // Prior activity already over the caps.
        deck.session_review_cards = 7;
        deck.session_new_cards = 3;
        let limits = SessionLimits {
            max_reviews: 5,
            max_new: 2,
        };
        let selection = select_session_cards(&deck, limits, now);
        assert_eq!(selection.total, 0);
        assert!(selection.cards.is_empty());
    }

    #[test]
    fn empty_deck_selects_nothing() {
        let now = Utc::now();
        let deck = Deck::new("empty");
        let selection = select_session_cards(&deck, SessionLimits::default(), now);
        assert_eq!(selection.total, 0);
    }

    #[test]
    fn lapsed_card_counts_against_new_cap() {
        // A card failed back to repetitions == 0 is indistinguishable from
        // a never-reviewed card: it consumes the new-card budget.
        let now = Utc::now();
        let mut lapsed = Flashcard::new("失", "lapsed", now);
        lapsed.repetitions = 0;
        lapsed.easiness_factor = 1.7; // history left a mark, selection ignores it
        let deck = deck_with(vec![lapsed]);
        let limits = SessionLimits {
            max_reviews: 10,
            max_new: 0,
        };
        let selection = select_session_cards(&deck, limits, now);
        assert_eq!(selection.total, 0);

        let limits = SessionLimits {
            max_reviews: 0,
            max_new: 1,
        };
        let selection = select_session_cards(&deck, limits, now);
        assert_eq!(selection.total, 1);
    }

    #[test]
    fn advance_drops_graded_cards_and_keeps_failed_ones() {
        let now = Utc::now();
        let mut deck = deck_with(vec![due_review(now, 2, 2), due_review(now, 1, 2)]);
        let queue: Vec<CardId> = deck.cards.iter().map(|c| c.id).collect();

        // Pass the front card: it moves days into the future and drops out.
        let front = queue[0];
        grade_card(deck.card_mut(front).unwrap(), GRADE_PASS, now).unwrap();
        let advanced = advance_queue(&deck, &queue, now);
        assert_eq!(advanced, vec![queue[1]]);

        // Fail the remaining card: it stays due and stays queued.
        grade_card(deck.card_mut(queue[1]).unwrap(), GRADE_FAIL, now).unwrap();
        let advanced = advance_queue(&deck, &advanced, now);
        assert_eq!(advanced, vec![queue[1]]);
    }

    #[test]
    fn record_review_increments_the_right_counter() {
        let mut deck = Deck::new("JLPT N5");
        record_review(&mut deck, true);
        record_review(&mut deck, false);
        record_review(&mut deck, false);
        assert_eq!(deck.session_new_cards, 1);
        assert_eq!(deck.session_review_cards, 2);

        begin_session(&mut deck);
        assert_eq!(deck.session_new_cards, 0);
        assert_eq!(deck.session_review_cards, 0);
    }

    #[test]
    fn session_walks_reveal_grade_to_completion() {
        let now = Utc::now();
        let mut deck = deck_with(vec![due_review(now, 1, 2), Flashcard::new("新", "n", now)]);
        let (mut session, event) = ReviewSession::start(&mut deck, SessionLimits::default(), now);
        assert!(matches!(event, Event::SessionStarted { queued: 2, .. }));
        assert_eq!(session.state(), SessionState::AwaitingAnswer);
        assert_eq!(session.remaining(), 2);

        // Grading before revealing is rejected.
        assert!(session.grade(&mut deck, GRADE_PASS, now).is_err());

        session.reveal().unwrap();
        let events = session.grade(&mut deck, GRADE_PASS, now).unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Event::CardGraded { remaining: 1, .. }));
        assert_eq!(session.state(), SessionState::AwaitingAnswer);

        session.reveal().unwrap();
        let events = session.grade(&mut deck, GRADE_PASS, now).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], Event::SessionCompleted { reviewed: 2, .. }));
        assert!(session.is_complete());

        // The terminal state accepts no further commands.
        assert!(session.reveal().is_err());
        assert!(session.grade(&mut deck, GRADE_PASS, now).is_err());

        // One review card and one new card were served.
        assert_eq!(deck.session_review_cards, 1);
        assert_eq!(deck.session_new_cards, 1);
    }

    #[test]
    fn failed_card_comes_back_within_the_same_session() {
        let now = Utc::now();
        let mut deck = deck_with(vec![due_review(now, 1, 3)]);
        let card_id = deck.cards[0].id;
        let (mut session, _) = ReviewSession::start(&mut deck, SessionLimits::default(), now);

        session.reveal().unwrap();
        let events = session.grade(&mut deck, GRADE_FAIL, now).unwrap();
        // Failing makes the card due again immediately: still queued.
        assert_eq!(events.len(), 1);
        assert!(!session.is_complete());
        assert_eq!(session.current_card(), Some(card_id));

        session.reveal().unwrap();
        session.grade(&mut deck, GRADE_PASS, now).unwrap();
        assert!(session.is_complete());
        // The lapsed retry consumed the new-card budget.
        assert_eq!(deck.session_review_cards, 1);
        assert_eq!(deck.session_new_cards, 1);
    }

    #[test]
    fn starting_with_nothing_due_completes_immediately() {
        let now = Utc::now();
        let mut card = Flashcard::new("未", "later", now);
        card.next_review_date = now + Duration::days(2);
        let mut deck = deck_with(vec![card]);
        let (session, _) = ReviewSession::start(&mut deck, SessionLimits::default(), now);
        assert!(session.is_complete());
        assert_eq!(session.current_card(), None);
    }

    #[test]
    fn start_resets_stale_counters_from_the_previous_session() {
        let now = Utc::now();
        let mut deck = deck_with(vec![Flashcard::new("新", "n", now)]);
        deck.session_new_cards = 20;
        let limits = SessionLimits {
            max_reviews: 100,
            max_new: 20,
        };
        let (session, _) = ReviewSession::start(&mut deck, limits, now);
        // Without the reset the cap would already be exhausted.
        assert_eq!(session.remaining(), 1);
    }

    #[test]
    fn session_round_trips_through_json() {
        let now = Utc::now();
        let mut deck = deck_with(vec![due_review(now, 1, 2)]);
        let (session, _) = ReviewSession::start(&mut deck, SessionLimits::default(), now);
        let json = serde_json::to_string(&session).unwrap();
        let restored: ReviewSession = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.state(), session.state());
        assert_eq!(restored.current_card(), session.current_card());
    }

    proptest! {
        #[test]
        fn selection_never_exceeds_remaining_budget(
            n_review in 0usize..30,
            n_new in 0usize..30,
            max_reviews in 0u32..25,
            max_new in 0u32..25,
            served_reviews in 0u32..25,
            served_new in 0u32..25,
        ) {
            let now = Utc::now();
            let mut cards = Vec::new();
            for _ in 0..n_review {
                cards.push(due_review(now, 1, 2));
            }
            for _ in 0..n_new {
                cards.push(Flashcard::new("新", "n", now));
            }
            let mut deck = deck_with(cards);
            deck.session_review_cards = served_reviews;
            deck.session_new_cards = served_new;

            let limits = SessionLimits { max_reviews, max_new };
            let selection = select_session_cards(&deck, limits, now);

            let review_budget = max_reviews.saturating_sub(served_reviews) as usize;
            let new_budget = max_new.saturating_sub(served_new) as usize;
            let n_selected_review = selection.cards.iter()
                .filter(|id| deck.card(**id).map(|c| !c.is_new()).unwrap_or(false))
                .count();
            let n_selected_new = selection.total - n_selected_review;

            // Exact minimum of (available, remaining budget) per partition.
            prop_assert_eq!(n_selected_review, n_review.min(review_budget));
            prop_assert_eq!(n_selected_new, n_new.min(new_budget));
        }
    }
}
