pub mod card;
pub mod config;
pub mod deck;
pub mod review;
pub mod stats;
