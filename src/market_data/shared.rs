use std::sync::Arc;

use parking_lot::RwLock;

use crate::engine::book::Book;
use crate::engine::messages::MarketMessage;
use crate::engine::types::{ApplyOutcome, Price, Qty, TopOfBook};

/// Book behind a reader/writer lock, for callers that poll it from several threads.
///
/// Meant for one writer applying updates in feed order. Readers either take the
/// lock per query or copy the whole book with [`snapshot`](Self::snapshot).
#[derive(Debug, Clone, Default)]
pub struct SharedBook {
    inner: Arc<RwLock<Book>>,
}

impl SharedBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, msg: &MarketMessage<'_>) -> ApplyOutcome {
        self.inner.write().apply(msg)
    }

    pub fn top_of_book(&self) -> TopOfBook {
        self.inner.read().top_of_book()
    }

    pub fn top_n_bids(&self, n: usize) -> Vec<(Price, Qty)> {
        self.inner.read().top_n_bids(n)
    }

    pub fn top_n_asks(&self, n: usize) -> Vec<(Price, Qty)> {
        self.inner.read().top_n_asks(n)
    }

    /// Copy taken under the read lock.
    pub fn snapshot(&self) -> Book {
        self.inner.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::messages::DeltaMessage;
    use crate::engine::types::Side;
    use std::thread;

    #[test]
    fn test_readers_see_writer_updates() {
        let shared = SharedBook::new();
        let writer = shared.clone();

        let handle = thread::spawn(move || {
            for price in 0..50 {
                writer.apply(&DeltaMessage::new(Side::Yes, price, 1).into());
            }
        });
        handle.join().unwrap();

        assert_eq!(shared.top_of_book().bid.price, 49);
        assert_eq!(shared.top_n_bids(3), vec![(49, 1), (48, 1), (47, 1)]);
        assert!(shared.top_n_asks(3).is_empty());

        let copy = shared.snapshot();
        shared.apply(&DeltaMessage::new(Side::Yes, 49, -1).into());
        assert_eq!(copy.best_bid(), (49, 1));
        assert_eq!(shared.top_of_book().bid.price, 48);
    }
}
