//! Review grading: the scheduling state machine for a single card.
//!
//! `grade_state` is a pure function from (current state, grade, now) to the
//! next state. The scheme is a simplified SM-2 variant:
//!
//! - grade >= 3 is a pass, grade < 3 is a fail;
//! - the first two consecutive passes pin the interval to 1 and 6 days;
//!   after that the interval is `round(repetitions * easiness_factor)`,
//!   taking `repetitions` before the increment and the easiness factor
//!   before this review's adjustment;
//! - a fail resets repetitions and makes the card due immediately
//!   (interval 0, same-day re-review);
//! - the easiness factor is adjusted on every review, pass or fail, and
//!   never drops below [`MIN_EASINESS`].
//!
//! Rounding is `f64::round`: ties round away from zero, so
//! `5 * 1.3 = 6.5` becomes a 7-day interval.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::deck::Flashcard;
use crate::error::ValidationError;

/// Lower bound for the easiness factor.
pub const MIN_EASINESS: f64 = 1.3;

/// Easiness factor assigned to freshly created cards.
pub const DEFAULT_EASINESS: f64 = 2.5;

/// Grades are integers in `0..=5`; `>= 3` is a pass.
pub const MAX_GRADE: u8 = 5;

/// The grade the "Fail" action emits.
pub const GRADE_FAIL: u8 = 0;

/// The grade the "Pass" action emits.
pub const GRADE_PASS: u8 = 3;

/// The scheduling fields of a card, detached from its content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchedulingState {
    pub next_review_date: DateTime<Utc>,
    pub repetitions: u32,
    pub easiness_factor: f64,
    /// Days until the next review.
    pub interval: u32,
}

impl SchedulingState {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_date <= now
    }
}

/// Compute the next scheduling state for a review with the given grade.
///
/// Grades outside `0..=5` are rejected with
/// [`ValidationError::InvalidGrade`] and no state is produced.
pub fn grade_state(
    state: &SchedulingState,
    grade: u8,
    now: DateTime<Utc>,
) -> Result<SchedulingState, ValidationError> {
    if grade > MAX_GRADE {
        return Err(ValidationError::InvalidGrade { grade });
    }

    let (repetitions, interval) = if grade >= GRADE_PASS {
        let interval = match state.repetitions {
            0 => 1,
            1 => 6,
            r => (f64::from(r) * state.easiness_factor).round() as u32,
        };
        (state.repetitions + 1, interval)
    } else {
        (0, 0)
    };

    // EF' = EF + (0.1 - (5 - q) * (0.08 + (5 - q) * 0.02)), from the
    // pre-review easiness factor, applied on pass and fail alike.
    let q = f64::from(grade);
    let easiness_factor =
        (state.easiness_factor + (0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02))).max(MIN_EASINESS);

    Ok(SchedulingState {
        next_review_date: now + Duration::days(i64::from(interval)),
        repetitions,
        easiness_factor,
        interval,
    })
}

/// Grade a card in place. Mutates only this card's scheduling fields.
pub fn grade_card(
    card: &mut Flashcard,
    grade: u8,
    now: DateTime<Utc>,
) -> Result<SchedulingState, ValidationError> {
    let state = SchedulingState {
        next_review_date: card.next_review_date,
        repetitions: card.repetitions,
        easiness_factor: card.easiness_factor,
        interval: card.interval,
    };
    let next = grade_state(&state, grade, now)?;
    card.next_review_date = next.next_review_date;
    card.repetitions = next.repetitions;
    card.easiness_factor = next.easiness_factor;
    card.interval = next.interval;
    Ok(next)
}
