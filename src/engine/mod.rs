// Price-level book core: occupancy bitset, per-side arrays, update records.
pub mod book;
pub mod error;
pub mod messages;
pub mod occupancy;
pub mod types;

pub use book::{Book, SideBook, PRICE_LEVELS};
pub use error::{BookError, MessageError};
pub use messages::{
    DeltaMessage, MarketMessage, MessageType, SnapshotMessage, TradeMessage, MAX_BOOK_LEVELS,
};
pub use occupancy::OccupancyIndex;
pub use types::{ApplyOutcome, BookLevel, IgnoreReason, Price, Qty, Side, SnapshotStats, TopOfBook};
