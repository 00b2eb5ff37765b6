//! Spaced-repetition scheduling: grading and session planning.

pub mod grader;
pub mod session;

pub use grader::{grade_card, grade_state, SchedulingState, DEFAULT_EASINESS, MIN_EASINESS};
pub use session::{
    advance_queue, begin_session, record_review, select_session_cards, ReviewSession, Selection,
    SessionLimits, SessionState,
};
