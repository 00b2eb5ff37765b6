use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "kioku-cli", version, about = "Kioku spaced-repetition CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deck management
    Deck {
        #[command(subcommand)]
        action: commands::deck::DeckAction,
    },
    /// Card management
    Card {
        #[command(subcommand)]
        action: commands::card::CardAction,
    },
    /// Drive a review session
    Review {
        #[command(subcommand)]
        action: commands::review::ReviewAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Deck statistics
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Deck { action } => commands::deck::run(action),
        Commands::Card { action } => commands::card::run(action),
        Commands::Review { action } => commands::review::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Stats { action } => commands::stats::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
