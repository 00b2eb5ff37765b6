use chrono::Utc;
use clap::Subcommand;
use kioku_core::{CardId, Database, Deck, Flashcard};

#[derive(Subcommand)]
pub enum CardAction {
    /// Add a card to a deck
    Add {
        /// Deck name
        deck: String,
        /// Front text
        question: String,
        /// Back text
        answer: String,
        /// Free-form tag (repeatable)
        #[arg(long)]
        tag: Vec<String>,
    },
    /// List a deck's cards
    List {
        /// Deck name
        deck: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit a card's content
    Edit {
        /// Deck name
        deck: String,
        /// Card id
        card_id: String,
        /// New front text
        #[arg(long)]
        question: Option<String>,
        /// New back text
        #[arg(long)]
        answer: Option<String>,
    },
    /// Remove a card from a deck
    Remove {
        /// Deck name
        deck: String,
        /// Card id
        card_id: String,
    },
}

fn load_deck(db: &Database, name: &str) -> Result<Deck, Box<dyn std::error::Error>> {
    match db.load_deck_by_name(name)? {
        Some(deck) => Ok(deck),
        None => {
            eprintln!("no deck named '{name}'");
            std::process::exit(1);
        }
    }
}

fn parse_card_id(s: &str) -> CardId {
    match CardId::parse(s) {
        Some(id) => id,
        None => {
            eprintln!("'{s}' is not a valid card id");
            std::process::exit(1);
        }
    }
}

pub fn run(action: CardAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut db = Database::open()?;
    match action {
        CardAction::Add {
            deck,
            question,
            answer,
            tag,
        } => {
            let mut deck = load_deck(&db, &deck)?;
            let mut card = Flashcard::new(question, answer, Utc::now());
            card.tags.extend(tag);
            let id = deck.add_card(card);
            db.save_deck(&deck)?;
            println!("card added: {id}");
        }
        CardAction::List { deck, json } => {
            let deck = load_deck(&db, &deck)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&deck.cards)?);
            } else {
                let now = Utc::now();
                for card in &deck.cards {
                    let due = if card.is_due(now) { "due" } else { "scheduled" };
                    println!(
                        "{}  {} -> {}  [reps {}, ef {:.2}, {}]",
                        card.id, card.question, card.answer, card.repetitions,
                        card.easiness_factor, due,
                    );
                }
            }
        }
        CardAction::Edit {
            deck,
            card_id,
            question,
            answer,
        } => {
            let mut deck = load_deck(&db, &deck)?;
            let id = parse_card_id(&card_id);
            let Some(card) = deck.card_mut(id) else {
                eprintln!("no card {card_id} in deck '{}'", deck.name);
                std::process::exit(1);
            };
            if let Some(q) = question {
                card.question = q;
            }
            if let Some(a) = answer {
                card.answer = a;
            }
            db.save_deck(&deck)?;
            println!("card updated: {id}");
        }
        CardAction::Remove { deck, card_id } => {
            let mut deck = load_deck(&db, &deck)?;
            let id = parse_card_id(&card_id);
            if deck.remove_card(id).is_none() {
                eprintln!("no card {card_id} in deck '{}'", deck.name);
                std::process::exit(1);
            }
            db.save_deck(&deck)?;
            println!("card removed: {id}");
        }
    }
    Ok(())
}
