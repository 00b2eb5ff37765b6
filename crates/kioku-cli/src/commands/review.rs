//! Review session commands.
//!
//! One CLI invocation per user action: the active [`ReviewSession`] is
//! serialized into the database's kv store between invocations, so
//! `review start`, `review answer` and `review pass` compose into the
//! reveal/grade loop a GUI would drive in-process.

use chrono::Utc;
use clap::Subcommand;
use kioku_core::scheduler::grader::{GRADE_FAIL, GRADE_PASS};
use kioku_core::{Config, Database, Deck, Event, ReviewSession};

const SESSION_KEY: &str = "review_session";

#[derive(Subcommand)]
pub enum ReviewAction {
    /// Start a session for a deck (resets its session counters)
    Start {
        /// Deck name
        deck: String,
    },
    /// Show the current card's question
    Show,
    /// Reveal the current card's answer
    Answer,
    /// Grade the current card as a pass
    Pass,
    /// Grade the current card as a fail
    Fail,
    /// Grade the current card with an explicit grade (0-5)
    Grade {
        /// Review grade, 0-5; 3 and above is a pass
        grade: u8,
    },
    /// Print session state as JSON
    Status,
    /// Abandon the session (unreviewed cards stay due)
    Abort,
}

fn load_session(db: &Database) -> Result<ReviewSession, Box<dyn std::error::Error>> {
    match db.kv_get(SESSION_KEY)? {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => {
            eprintln!("no active session; run 'review start <deck>' first");
            std::process::exit(1);
        }
    }
}

fn save_session(db: &Database, session: &ReviewSession) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string(session)?;
    db.kv_set(SESSION_KEY, &json)?;
    Ok(())
}

fn print_question(deck: &Deck, session: &ReviewSession) {
    if let Some(card_id) = session.current_card() {
        if let Some(card) = deck.card(card_id) {
            println!("Q: {}", card.question);
        }
    }
}

fn print_events(events: &[Event]) {
    for event in events {
        match event {
            Event::CardGraded {
                passed,
                interval_days,
                remaining,
                ..
            } => {
                if *passed {
                    println!("pass: next review in {interval_days} day(s), {remaining} card(s) left");
                } else {
                    println!("fail: card stays in the queue, {remaining} card(s) left");
                }
            }
            Event::SessionCompleted { reviewed, .. } => {
                println!("session complete: {reviewed} review(s)");
            }
            _ => {}
        }
    }
}

fn grade_current(db: &mut Database, grade: u8) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = load_session(db)?;
    let mut deck = db.load_deck(session.deck_id())?;
    let events = session.grade(&mut deck, grade, Utc::now())?;
    db.save_deck(&deck)?;
    print_events(&events);
    if session.is_complete() {
        db.kv_delete(SESSION_KEY)?;
    } else {
        save_session(db, &session)?;
        print_question(&deck, &session);
    }
    Ok(())
}

pub fn run(action: ReviewAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut db = Database::open()?;
    match action {
        ReviewAction::Start { deck: name } => {
            let Some(mut deck) = db.load_deck_by_name(&name)? else {
                eprintln!("no deck named '{name}'");
                std::process::exit(1);
            };
            let limits = Config::load_or_default().limits();
            let (session, event) = ReviewSession::start(&mut deck, limits, Utc::now());
            db.save_deck(&deck)?;
            if let Event::SessionStarted { queued, .. } = event {
                println!("session started: {queued} card(s) queued");
            }
            if session.is_complete() {
                db.kv_delete(SESSION_KEY)?;
                println!("nothing due in '{name}'");
            } else {
                save_session(&db, &session)?;
                print_question(&deck, &session);
            }
        }
        ReviewAction::Show => {
            let session = load_session(&db)?;
            let deck = db.load_deck(session.deck_id())?;
            print_question(&deck, &session);
        }
        ReviewAction::Answer => {
            let mut session = load_session(&db)?;
            let deck = db.load_deck(session.deck_id())?;
            session.reveal()?;
            if let Some(card) = session.current_card().and_then(|id| deck.card(id)) {
                println!("A: {}", card.answer);
            }
            save_session(&db, &session)?;
        }
        ReviewAction::Pass => grade_current(&mut db, GRADE_PASS)?,
        ReviewAction::Fail => grade_current(&mut db, GRADE_FAIL)?,
        ReviewAction::Grade { grade } => grade_current(&mut db, grade)?,
        ReviewAction::Status => {
            let session = load_session(&db)?;
            let summary = serde_json::json!({
                "deck_id": session.deck_id().to_string(),
                "state": session.state(),
                "current_card": session.current_card().map(|id| id.to_string()),
                "remaining": session.remaining(),
                "reviewed": session.reviewed(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        ReviewAction::Abort => {
            db.kv_delete(SESSION_KEY)?;
            println!("session abandoned");
        }
    }
    Ok(())
}
