//! Price-level order book for binary-outcome markets.
//!
//! [`engine`] holds the book itself. [`market_data`] is the feed side: frame
//! decoding, the task that owns a book, and recorded-feed replay.

pub mod config;
pub mod engine;
pub mod market_data;
pub mod telemetry;

pub use engine::{ApplyOutcome, Book, OccupancyIndex, Side};
