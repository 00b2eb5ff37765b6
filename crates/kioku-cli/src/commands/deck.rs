use clap::Subcommand;
use kioku_core::{Database, Deck};

#[derive(Subcommand)]
pub enum DeckAction {
    /// Create a new deck
    Add {
        /// Deck name (unique)
        name: String,
    },
    /// List all decks
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a deck and all its cards
    Remove {
        /// Deck name
        name: String,
    },
}

pub fn run(action: DeckAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut db = Database::open()?;
    match action {
        DeckAction::Add { name } => {
            if db.load_deck_by_name(&name)?.is_some() {
                eprintln!("deck '{name}' already exists");
                std::process::exit(1);
            }
            let deck = Deck::new(&name);
            db.save_deck(&deck)?;
            println!("deck created: {} ({})", deck.name, deck.id);
        }
        DeckAction::List { json } => {
            let decks = db.list_decks()?;
            if json {
                let rows: Vec<serde_json::Value> = decks
                    .iter()
                    .map(|d| {
                        serde_json::json!({
                            "id": d.id.to_string(),
                            "name": d.name,
                            "cards": d.cards.len(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for deck in decks {
                    println!("{}  ({} cards)", deck.name, deck.cards.len());
                }
            }
        }
        DeckAction::Remove { name } => {
            match db.load_deck_by_name(&name)? {
                Some(deck) => {
                    db.delete_deck(deck.id)?;
                    println!("deck removed: {name}");
                }
                None => {
                    eprintln!("no deck named '{name}'");
                    std::process::exit(1);
                }
            }
        }
    }
    Ok(())
}
