//! # Kioku Core Library
//!
//! Core business logic for Kioku, a spaced-repetition vocabulary trainer.
//! All operations live here and are exposed through a standalone CLI binary;
//! any richer frontend is expected to be a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Scheduler**: the grading state machine (a simplified SM-2 variant)
//!   and the session planner that selects, orders and caps the cards one
//!   review session presents
//! - **Deck model**: decks own the authoritative card records; sessions
//!   refer to cards by id
//! - **Storage**: SQLite-based deck persistence and TOML-based
//!   configuration
//!
//! ## Key Components
//!
//! - [`grade_card`] / [`grade_state`]: compute a card's next scheduling
//!   state from a review grade
//! - [`ReviewSession`]: caller-driven review session state machine
//! - [`Database`]: deck persistence
//! - [`Config`]: session capacity configuration

pub mod deck;
pub mod error;
pub mod events;
pub mod scheduler;
pub mod storage;

pub use deck::{CardId, Deck, DeckId, Flashcard};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::Event;
pub use scheduler::{
    advance_queue, begin_session, grade_card, grade_state, record_review, select_session_cards,
    ReviewSession, SchedulingState, Selection, SessionLimits, SessionState,
};
pub use storage::{Config, Database};
