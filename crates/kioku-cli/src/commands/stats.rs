use chrono::Utc;
use clap::Subcommand;
use kioku_core::{Database, Deck};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Due/new counts for every deck
    All,
    /// Detailed counts for one deck
    Deck {
        /// Deck name
        name: String,
    },
}

struct DeckCounts {
    total: usize,
    due_review: usize,
    due_new: usize,
}

fn count(deck: &Deck) -> DeckCounts {
    let now = Utc::now();
    let due_review = deck.due_cards(now).filter(|c| !c.is_new()).count();
    let due_new = deck.due_cards(now).filter(|c| c.is_new()).count();
    DeckCounts {
        total: deck.cards.len(),
        due_review,
        due_new,
    }
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    match action {
        StatsAction::All => {
            for deck in db.list_decks()? {
                let c = count(&deck);
                println!(
                    "{}: {} cards, {} review due, {} new due",
                    deck.name, c.total, c.due_review, c.due_new,
                );
            }
        }
        StatsAction::Deck { name } => {
            let Some(deck) = db.load_deck_by_name(&name)? else {
                eprintln!("no deck named '{name}'");
                std::process::exit(1);
            };
            let c = count(&deck);
            let next_due = deck
                .cards
                .iter()
                .map(|card| card.next_review_date)
                .min();
            println!("deck: {}", deck.name);
            println!("cards: {}", c.total);
            println!("review due: {}", c.due_review);
            println!("new due: {}", c.due_new);
            println!(
                "served this session: {} review, {} new",
                deck.session_review_cards, deck.session_new_cards,
            );
            if let Some(next) = next_due {
                println!("earliest due: {}", next.to_rfc3339());
            }
        }
    }
    Ok(())
}
