//! SQLite-backed deck storage.
//!
//! Persists decks and their cards (including the scheduling fields the
//! scheduler resumes from) plus a small kv store the CLI uses to park the
//! active review session between invocations.
//!
//! Loading validates every persisted scheduling field and surfaces bad data
//! as [`DatabaseError::Corrupted`] instead of substituting defaults: a
//! silently-defaulted `next_review_date` would corrupt the earliest-due
//! ordering for the whole deck.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::data_dir;
use crate::deck::{CardId, Deck, DeckId, Flashcard};
use crate::error::DatabaseError;
use crate::scheduler::MIN_EASINESS;

/// SQLite database for decks, cards and CLI state.
pub struct Database {
    conn: Connection,
}

/// Raw card row before scheduling-field validation.
struct CardRow {
    id: String,
    question: String,
    answer: String,
    tags: String,
    next_review_date: String,
    repetitions: i64,
    easiness_factor: f64,
    interval: i64,
}

impl Database {
    /// Open the database at `~/.config/kioku/kioku.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, DatabaseError> {
        let dir = data_dir().map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        let path = dir.join("kioku.db");
        let conn = Connection::open(&path)
            .map_err(|source| DatabaseError::OpenFailed { path, source })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS decks (
                    id                   TEXT PRIMARY KEY,
                    name                 TEXT NOT NULL UNIQUE,
                    session_review_cards INTEGER NOT NULL DEFAULT 0,
                    session_new_cards    INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS cards (
                    id               TEXT PRIMARY KEY,
                    deck_id          TEXT NOT NULL REFERENCES decks(id) ON DELETE CASCADE,
                    position         INTEGER NOT NULL,
                    question         TEXT NOT NULL,
                    answer           TEXT NOT NULL,
                    tags             TEXT NOT NULL DEFAULT '[]',
                    next_review_date TEXT NOT NULL,
                    repetitions      INTEGER NOT NULL,
                    easiness_factor  REAL NOT NULL,
                    interval         INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_cards_deck_id ON cards(deck_id);
                CREATE INDEX IF NOT EXISTS idx_cards_next_review ON cards(deck_id, next_review_date);",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    /// Persist a deck and all its cards, replacing any previous state.
    ///
    /// # Errors
    /// Returns an error if any statement fails.
    pub fn save_deck(&mut self, deck: &Deck) -> Result<(), DatabaseError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO decks (id, name, session_review_cards, session_new_cards)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                session_review_cards = excluded.session_review_cards,
                session_new_cards = excluded.session_new_cards",
            params![
                deck.id.to_string(),
                deck.name,
                deck.session_review_cards,
                deck.session_new_cards,
            ],
        )?;
        tx.execute(
            "DELETE FROM cards WHERE deck_id = ?1",
            params![deck.id.to_string()],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO cards (id, deck_id, position, question, answer, tags,
                                    next_review_date, repetitions, easiness_factor, interval)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for (position, card) in deck.cards.iter().enumerate() {
                let tags = serde_json::to_string(&card.tags)
                    .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
                stmt.execute(params![
                    card.id.to_string(),
                    deck.id.to_string(),
                    position as i64,
                    card.question,
                    card.answer,
                    tags,
                    card.next_review_date.to_rfc3339(),
                    card.repetitions,
                    card.easiness_factor,
                    card.interval,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Load a deck by id.
    ///
    /// # Errors
    /// Returns [`DatabaseError::QueryFailed`] if the deck does not exist
    /// and [`DatabaseError::Corrupted`] if a persisted scheduling field
    /// cannot be reconstructed.
    pub fn load_deck(&self, id: DeckId) -> Result<Deck, DatabaseError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, session_review_cards, session_new_cards
                 FROM decks WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, u32>(2)?,
                        row.get::<_, u32>(3)?,
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| DatabaseError::QueryFailed(format!("no deck with id {id}")))?;
        self.deck_from_row(row)
    }

    /// Load a deck by name, `None` if absent.
    ///
    /// # Errors
    /// Returns an error on query failure or corrupted card data.
    pub fn load_deck_by_name(&self, name: &str) -> Result<Option<Deck>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, session_review_cards, session_new_cards
                 FROM decks WHERE name = ?1",
                params![name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, u32>(2)?,
                        row.get::<_, u32>(3)?,
                    ))
                },
            )
            .optional()?;
        row.map(|row| self.deck_from_row(row)).transpose()
    }

    /// Load every deck, ordered by name.
    ///
    /// # Errors
    /// Returns an error on query failure or corrupted card data.
    pub fn list_decks(&self) -> Result<Vec<Deck>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, session_review_cards, session_new_cards
             FROM decks ORDER BY name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, u32>(3)?,
            ))
        })?;
        let mut decks = Vec::new();
        for row in rows {
            decks.push(self.deck_from_row(row?)?);
        }
        Ok(decks)
    }

    /// Delete a deck and its cards. Returns whether a deck was removed.
    pub fn delete_deck(&self, id: DeckId) -> Result<bool, DatabaseError> {
        self.conn.execute(
            "DELETE FROM cards WHERE deck_id = ?1",
            params![id.to_string()],
        )?;
        let n = self
            .conn
            .execute("DELETE FROM decks WHERE id = ?1", params![id.to_string()])?;
        Ok(n > 0)
    }

    fn deck_from_row(&self, row: (String, String, u32, u32)) -> Result<Deck, DatabaseError> {
        let (id, name, session_review_cards, session_new_cards) = row;
        let deck_id = DeckId::parse(&id).ok_or_else(|| DatabaseError::Corrupted {
            card_id: id.clone(),
            field: "deck_id",
            message: "not a valid uuid".into(),
        })?;

        let mut stmt = self.conn.prepare(
            "SELECT id, question, answer, tags, next_review_date,
                    repetitions, easiness_factor, interval
             FROM cards WHERE deck_id = ?1 ORDER BY position",
        )?;
        let rows = stmt.query_map(params![id], |row| {
            Ok(CardRow {
                id: row.get(0)?,
                question: row.get(1)?,
                answer: row.get(2)?,
                tags: row.get(3)?,
                next_review_date: row.get(4)?,
                repetitions: row.get(5)?,
                easiness_factor: row.get(6)?,
                interval: row.get(7)?,
            })
        })?;

        let mut cards = Vec::new();
        for row in rows {
            cards.push(card_from_row(row?)?);
        }
        Ok(Deck {
            id: deck_id,
            name,
            cards,
            session_review_cards,
            session_new_cards,
        })
    }

    // ── kv store ─────────────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt
            .query_row(params![key], |row| row.get::<_, String>(0))
            .optional()?;
        Ok(result)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove a value from the kv store.
    pub fn kv_delete(&self, key: &str) -> Result<(), DatabaseError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// Reconstruct a card, validating every scheduling field.
fn card_from_row(row: CardRow) -> Result<Flashcard, DatabaseError> {
    let corrupted = |field: &'static str, message: String| DatabaseError::Corrupted {
        card_id: row.id.clone(),
        field,
        message,
    };

    let id = CardId::parse(&row.id)
        .ok_or_else(|| corrupted("id", "not a valid uuid".into()))?;
    let next_review_date = DateTime::parse_from_rfc3339(&row.next_review_date)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| corrupted("next_review_date", e.to_string()))?;
    let repetitions = u32::try_from(row.repetitions)
        .map_err(|_| corrupted("repetitions", format!("negative count {}", row.repetitions)))?;
    if !row.easiness_factor.is_finite() || row.easiness_factor < MIN_EASINESS {
        return Err(corrupted(
            "easiness_factor",
            format!("{} is below the {MIN_EASINESS} floor", row.easiness_factor),
        ));
    }
    let interval = u32::try_from(row.interval)
        .map_err(|_| corrupted("interval", format!("negative interval {}", row.interval)))?;
    let tags: BTreeSet<String> =
        serde_json::from_str(&row.tags).map_err(|e| corrupted("tags", e.to_string()))?;

    Ok(Flashcard {
        id,
        question: row.question,
        answer: row.answer,
        tags,
        next_review_date,
        repetitions,
        easiness_factor: row.easiness_factor,
        interval,
    })
}
