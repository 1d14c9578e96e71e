// Market data module entrypoint
pub mod book_task; // single task owning a book, fed over a channel
pub mod replay;    // recorded feed -> book, with stats
pub mod shared;    // lock-wrapped book for multi-reader access
pub mod wire;      // JSON frames -> message records
