use tracing::{debug, instrument, trace, warn};

use crate::engine::messages::{MarketMessage, SnapshotMessage, MAX_BOOK_LEVELS};
use crate::engine::occupancy::OccupancyIndex;
use crate::engine::types::{
    ApplyOutcome, BookLevel, IgnoreReason, Price, Qty, Side, SnapshotStats, TopOfBook,
};

/// Number of price levels tracked per side.
pub const PRICE_LEVELS: usize = MAX_BOOK_LEVELS;

const _: () = assert!(PRICE_LEVELS <= OccupancyIndex::WIDTH as usize);

/// Result of adjusting a single level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Adjust {
    Exact,
    Clamped { shortfall: u64 },
    Saturated,
}

/// One side of the book: quantity by price plus the matching occupancy bits.
///
/// Bit `p` of `occupancy` is set iff `levels[p] != 0`. Every write goes through
/// [`SideBook::store`] so the two never disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideBook {
    levels: [Qty; PRICE_LEVELS],
    occupancy: OccupancyIndex,
}

impl SideBook {
    pub const fn new() -> Self {
        Self { levels: [0; PRICE_LEVELS], occupancy: OccupancyIndex::new() }
    }

    #[inline]
    fn slot(price: Price) -> Option<usize> {
        let idx = price as usize;
        (idx < PRICE_LEVELS).then_some(idx)
    }

    #[inline]
    fn store(&mut self, idx: usize, qty: Qty) {
        self.levels[idx] = qty;
        if qty > 0 {
            self.occupancy.set_bit(idx as u32);
        } else {
            self.occupancy.clear_bit(idx as u32);
        }
    }

    /// Adds `delta` to the level, clamping to `0..=Qty::MAX`.
    fn adjust(&mut self, idx: usize, delta: i64) -> Adjust {
        let next = i64::from(self.levels[idx]) + delta;
        let (qty, result) = if next < 0 {
            (0, Adjust::Clamped { shortfall: next.unsigned_abs() })
        } else if next > i64::from(Qty::MAX) {
            (Qty::MAX, Adjust::Saturated)
        } else {
            (next as Qty, Adjust::Exact)
        };
        self.store(idx, qty);
        result
    }

    /// Quantity at `price`, 0 when absent or out of range.
    pub fn quantity(&self, price: Price) -> Qty {
        Self::slot(price).map_or(0, |idx| self.levels[idx])
    }

    pub fn is_occupied(&self, price: Price) -> bool {
        self.occupancy.test_bit(price)
    }

    /// Number of occupied levels.
    pub fn depth(&self) -> usize {
        self.occupancy.count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.occupancy.is_empty()
    }

    pub fn occupancy(&self) -> &OccupancyIndex {
        &self.occupancy
    }

    pub fn clear(&mut self) {
        self.levels = [0; PRICE_LEVELS];
        self.occupancy.clear();
    }

    pub fn highest(&self) -> Option<(Price, Qty)> {
        let price = self.occupancy.highest_set_bit()?;
        Some((price, self.levels[price as usize]))
    }

    pub fn lowest(&self) -> Option<(Price, Qty)> {
        let price = self.occupancy.lowest_set_bit()?;
        Some((price, self.levels[price as usize]))
    }

    /// Up to `n` occupied levels, highest price first.
    pub fn top_descending(&self, n: usize) -> Vec<(Price, Qty)> {
        self.occupancy
            .iter_descending()
            .take(n)
            .map(|price| (price, self.levels[price as usize]))
            .collect()
    }

    /// Up to `n` occupied levels, lowest price first.
    pub fn top_ascending(&self, n: usize) -> Vec<(Price, Qty)> {
        self.occupancy
            .iter_ascending()
            .take(n)
            .map(|price| (price, self.levels[price as usize]))
            .collect()
    }

    /// Checks the occupancy bits against the quantities.
    pub fn is_consistent(&self) -> bool {
        self.levels
            .iter()
            .enumerate()
            .all(|(price, &qty)| self.occupancy.test_bit(price as u32) == (qty != 0))
            && self.occupancy.iter_ascending().all(|price| (price as usize) < PRICE_LEVELS)
    }
}

impl Default for SideBook {
    fn default() -> Self {
        Self::new()
    }
}

/// Price-level book for a single market.
///
/// `bids` is the yes side, `asks` the no side. The two sides are independent:
/// nothing stops a price from being occupied on both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Book {
    bids: SideBook,
    asks: SideBook,
}

impl Book {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bids(&self) -> &SideBook {
        &self.bids
    }

    pub fn asks(&self) -> &SideBook {
        &self.asks
    }

    fn side_mut(&mut self, side: Side) -> Option<&mut SideBook> {
        match side {
            Side::Yes => Some(&mut self.bids),
            Side::No => Some(&mut self.asks),
            Side::Undefined => None,
        }
    }

    pub fn side(&self, side: Side) -> Option<&SideBook> {
        match side {
            Side::Yes => Some(&self.bids),
            Side::No => Some(&self.asks),
            Side::Undefined => None,
        }
    }

    /// Dispatches a decoded message to the matching mutator.
    pub fn apply(&mut self, msg: &MarketMessage<'_>) -> ApplyOutcome {
        match msg {
            MarketMessage::Snapshot(snap) => self.apply_snapshot(snap),
            MarketMessage::Delta(d) => self.apply_delta(d.side, d.price, d.delta),
            MarketMessage::Trade(t) => {
                self.apply_trade(t.taker_side, t.yes_price, t.no_price, t.count)
            }
            MarketMessage::Unknown => {
                trace!("ignoring message of unknown kind");
                ApplyOutcome::Ignored(IgnoreReason::UnknownMessage)
            }
        }
    }

    /// Replaces both sides with the snapshot's levels.
    ///
    /// Levels priced outside the book are dropped and counted. When a price
    /// repeats, the last entry wins.
    #[instrument(level = "debug", skip_all, fields(ticker = %snap.market_ticker))]
    pub fn apply_snapshot(&mut self, snap: &SnapshotMessage<'_>) -> ApplyOutcome {
        self.bids.clear();
        self.asks.clear();

        let mut stats = SnapshotStats::default();
        for (book_side, levels) in [(&mut self.bids, &snap.yes), (&mut self.asks, &snap.no)] {
            for level in levels.iter() {
                match SideBook::slot(level.price) {
                    Some(idx) => {
                        book_side.store(idx, level.quantity);
                        stats.loaded += 1;
                    }
                    None => stats.dropped += 1,
                }
            }
        }

        if stats.dropped > 0 {
            debug!(loaded = stats.loaded, dropped = stats.dropped, "Snapshot dropped out-of-range levels");
        }
        debug!(
            bid_depth = self.bids.depth(),
            ask_depth = self.asks.depth(),
            "Snapshot applied"
        );
        ApplyOutcome::Snapshot(stats)
    }

    /// Adds `delta` to the level at `price` on `side`.
    pub fn apply_delta(&mut self, side: Side, price: Price, delta: i32) -> ApplyOutcome {
        let Some(idx) = SideBook::slot(price) else {
            debug!(?side, price, delta, "Delta price out of range");
            return ApplyOutcome::Ignored(IgnoreReason::PriceOutOfRange { price });
        };
        let Some(book_side) = self.side_mut(side) else {
            debug!(price, delta, "Delta with undefined side");
            return ApplyOutcome::Ignored(IgnoreReason::UndefinedSide);
        };

        let result = book_side.adjust(idx, i64::from(delta));
        trace!(?side, price, delta, qty = book_side.levels[idx], "Delta applied");
        Self::outcome(side, price, result)
    }

    /// Removes `count` from the resting side a taker on `taker_side` trades against.
    ///
    /// A yes taker lifts the no side at `no_price`; a no taker hits the yes side
    /// at `yes_price`.
    pub fn apply_trade(
        &mut self,
        taker_side: Side,
        yes_price: Price,
        no_price: Price,
        count: i32,
    ) -> ApplyOutcome {
        if count <= 0 {
            debug!(count, "Trade with non-positive count");
            return ApplyOutcome::Ignored(IgnoreReason::NonPositiveCount { count });
        }

        let resting = taker_side.opposite();
        let price = match resting {
            Side::No => no_price,
            Side::Yes => yes_price,
            Side::Undefined => {
                debug!(count, "Trade with undefined taker side");
                return ApplyOutcome::Ignored(IgnoreReason::UndefinedSide);
            }
        };
        let Some(idx) = SideBook::slot(price) else {
            debug!(?taker_side, price, count, "Trade price out of range");
            return ApplyOutcome::Ignored(IgnoreReason::PriceOutOfRange { price });
        };
        let Some(book_side) = self.side_mut(resting) else {
            return ApplyOutcome::Ignored(IgnoreReason::UndefinedSide);
        };

        let result = book_side.adjust(idx, -i64::from(count));
        trace!(?taker_side, price, count, qty = book_side.levels[idx], "Trade applied");
        Self::outcome(resting, price, result)
    }

    fn outcome(side: Side, price: Price, result: Adjust) -> ApplyOutcome {
        match result {
            Adjust::Exact => ApplyOutcome::Applied,
            Adjust::Clamped { shortfall } => {
                warn!(?side, price, shortfall, "Removal exceeded resting quantity, level clamped to zero");
                ApplyOutcome::Clamped { side, price, shortfall }
            }
            Adjust::Saturated => {
                warn!(?side, price, "Quantity overflow, level pinned at max");
                ApplyOutcome::Saturated { side, price }
            }
        }
    }

    /// Highest occupied bid as `(price, qty)`, `(0, 0)` when there is none.
    pub fn best_bid(&self) -> (Price, Qty) {
        self.bids.highest().unwrap_or((0, 0))
    }

    /// Lowest occupied ask as `(price, qty)`, `(0, 0)` when there is none.
    pub fn best_ask(&self) -> (Price, Qty) {
        self.asks.lowest().unwrap_or((0, 0))
    }

    pub fn top_of_book(&self) -> TopOfBook {
        TopOfBook {
            bid: BookLevel::from(self.best_bid()),
            ask: BookLevel::from(self.best_ask()),
        }
    }

    /// Up to `n` bid levels in strictly descending price order.
    pub fn top_n_bids(&self, n: usize) -> Vec<(Price, Qty)> {
        self.bids.top_descending(n)
    }

    /// Up to `n` ask levels in strictly ascending price order.
    pub fn top_n_asks(&self, n: usize) -> Vec<(Price, Qty)> {
        self.asks.top_ascending(n)
    }

    /// Quantity at `price` on `side`; 0 for absent levels and the undefined side.
    pub fn quantity(&self, side: Side, price: Price) -> Qty {
        self.side(side).map_or(0, |s| s.quantity(price))
    }

    pub fn depth(&self, side: Side) -> usize {
        self.side(side).map_or(0, SideBook::depth)
    }

    /// Best ask minus best bid, when both sides have liquidity.
    pub fn spread(&self) -> Option<i64> {
        let (bid, _) = self.bids.highest()?;
        let (ask, _) = self.asks.lowest()?;
        Some(i64::from(ask) - i64::from(bid))
    }

    /// True when the best bid is at or above the best ask.
    pub fn is_crossed(&self) -> bool {
        self.spread().is_some_and(|s| s <= 0)
    }

    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
    }

    pub fn is_consistent(&self) -> bool {
        self.bids.is_consistent() && self.asks.is_consistent()
    }
}
