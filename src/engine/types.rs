use serde::{Deserialize, Serialize};

/// Price level index, `0..PRICE_LEVELS`.
pub type Price = u32;

/// Resting quantity at a level. Zero means the level is absent.
pub type Qty = u32;

/// Book side. `Yes` is the bid-equivalent side, `No` the ask-equivalent side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
    /// Anything the feed sends that is not `yes` or `no`.
    #[default]
    #[serde(other)]
    Undefined,
}

impl Side {
    pub const BID: Side = Side::Yes;
    pub const ASK: Side = Side::No;

    /// The side whose resting liquidity a taker on `self` consumes.
    pub fn opposite(self) -> Side {
        match self {
            Side::Yes => Side::No,
            Side::No => Side::Yes,
            Side::Undefined => Side::Undefined,
        }
    }
}

/// One (price, quantity) pair. Decodes from a two element `[price, qty]` array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(Price, Qty)", into = "(Price, Qty)")]
pub struct BookLevel {
    pub price: Price,
    pub quantity: Qty,
}

impl BookLevel {
    pub const fn new(price: Price, quantity: Qty) -> Self {
        Self { price, quantity }
    }
}

impl From<(Price, Qty)> for BookLevel {
    fn from((price, quantity): (Price, Qty)) -> Self {
        Self { price, quantity }
    }
}

impl From<BookLevel> for (Price, Qty) {
    fn from(level: BookLevel) -> Self {
        (level.price, level.quantity)
    }
}

/// Best bid and best ask. An empty side reads as `(0, 0)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TopOfBook {
    pub bid: BookLevel,
    pub ask: BookLevel,
}

impl TopOfBook {
    /// Returns `true` if there is *no* bid and *no* ask.
    pub fn is_empty(&self) -> bool {
        self.bid.quantity == 0 && self.ask.quantity == 0
    }
}

/// Why an update left the book untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    PriceOutOfRange { price: Price },
    UndefinedSide,
    NonPositiveCount { count: i32 },
    UnknownMessage,
}

/// Result of a snapshot load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotStats {
    /// Entries written into the book (zero quantities included).
    pub loaded: usize,
    /// Entries whose price was outside the level range.
    pub dropped: usize,
}

/// What a mutation did to the book.
///
/// None of these are failures: the book is always left consistent. Callers that
/// want to treat anything but a clean apply as an error use [`into_result`](Self::into_result).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Snapshot(SnapshotStats),
    Ignored(IgnoreReason),
    /// A removal exceeded the resting quantity; the level was zeroed and
    /// `shortfall` units could not be removed.
    Clamped { side: Side, price: Price, shortfall: u64 },
    /// An addition overflowed `Qty`; the level was pinned at `Qty::MAX`.
    Saturated { side: Side, price: Price },
}

impl ApplyOutcome {
    pub fn is_clean(&self) -> bool {
        match self {
            ApplyOutcome::Applied => true,
            ApplyOutcome::Snapshot(stats) => stats.dropped == 0,
            _ => false,
        }
    }
}
