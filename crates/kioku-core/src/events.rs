use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::deck::CardId;

/// Every session transition produces an Event, returned by value from the
/// call that caused it. There is no broadcast mechanism; the caller decides
/// what to do with each event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        deck: String,
        queued: usize,
        at: DateTime<Utc>,
    },
    AnswerRevealed {
        card_id: CardId,
        at: DateTime<Utc>,
    },
    CardGraded {
        card_id: CardId,
        grade: u8,
        passed: bool,
        repetitions: u32,
        interval_days: u32,
        next_review_date: DateTime<Utc>,
        remaining: usize,
        at: DateTime<Utc>,
    },
    SessionCompleted {
        deck: String,
        reviewed: u32,
        at: DateTime<Utc>,
    },
}
