//! Update records handed to the book by the feed layer.
//!
//! String fields borrow from the decoded frame where possible. The book never
//! reads them; they ride along for logging and routing at the call site.
//! `into_owned` detaches a record from its frame so it can cross a channel.

use std::borrow::Cow;

use serde::{Deserialize, Deserializer, Serialize};
use smallvec::SmallVec;

use crate::engine::error::MessageError;
use crate::engine::types::{BookLevel, Price, Qty, Side};

/// Most levels one side of a snapshot may carry.
pub const MAX_BOOK_LEVELS: usize = 100;

pub type SideLevels = SmallVec<[BookLevel; MAX_BOOK_LEVELS]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Unknown,
    Snapshot,
    Delta,
    Trade,
}

/// Full replacement of both sides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMessage<'a> {
    #[serde(borrow)]
    pub market_ticker: Cow<'a, str>,
    #[serde(borrow, default)]
    pub market_id: Cow<'a, str>,
    #[serde(default, deserialize_with = "bounded_levels")]
    pub yes: SideLevels,
    #[serde(default, deserialize_with = "bounded_levels")]
    pub no: SideLevels,
}

impl<'a> SnapshotMessage<'a> {
    pub fn new(market_ticker: impl Into<Cow<'a, str>>) -> Self {
        Self { market_ticker: market_ticker.into(), ..Default::default() }
    }

    pub fn push_yes(&mut self, price: Price, quantity: Qty) -> Result<(), MessageError> {
        push_bounded(&mut self.yes, BookLevel::new(price, quantity))
    }

    pub fn push_no(&mut self, price: Price, quantity: Qty) -> Result<(), MessageError> {
        push_bounded(&mut self.no, BookLevel::new(price, quantity))
    }

    pub fn into_owned(self) -> SnapshotMessage<'static> {
        SnapshotMessage {
            market_ticker: Cow::Owned(self.market_ticker.into_owned()),
            market_id: Cow::Owned(self.market_id.into_owned()),
            yes: self.yes,
            no: self.no,
        }
    }
}

/// Signed adjustment of one level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaMessage<'a> {
    #[serde(borrow)]
    pub market_ticker: Cow<'a, str>,
    #[serde(borrow, default)]
    pub market_id: Cow<'a, str>,
    pub price: Price,
    pub delta: i32,
    pub side: Side,
}

impl<'a> DeltaMessage<'a> {
    pub fn new(side: Side, price: Price, delta: i32) -> Self {
        Self { side, price, delta, ..Default::default() }
    }

    pub fn into_owned(self) -> DeltaMessage<'static> {
        DeltaMessage {
            market_ticker: Cow::Owned(self.market_ticker.into_owned()),
            market_id: Cow::Owned(self.market_id.into_owned()),
            price: self.price,
            delta: self.delta,
            side: self.side,
        }
    }
}

/// Execution against resting liquidity on the side opposite `taker_side`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeMessage<'a> {
    #[serde(borrow, default)]
    pub trade_id: Cow<'a, str>,
    #[serde(borrow)]
    pub market_ticker: Cow<'a, str>,
    pub yes_price: Price,
    pub no_price: Price,
    pub count: i32,
    pub taker_side: Side,
    #[serde(default)]
    pub ts: i64,
}

impl<'a> TradeMessage<'a> {
    pub fn new(taker_side: Side, yes_price: Price, no_price: Price, count: i32) -> Self {
        Self { taker_side, yes_price, no_price, count, ..Default::default() }
    }

    pub fn into_owned(self) -> TradeMessage<'static> {
        TradeMessage {
            trade_id: Cow::Owned(self.trade_id.into_owned()),
            market_ticker: Cow::Owned(self.market_ticker.into_owned()),
            yes_price: self.yes_price,
            no_price: self.no_price,
            count: self.count,
            taker_side: self.taker_side,
            ts: self.ts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketMessage<'a> {
    Snapshot(SnapshotMessage<'a>),
    Delta(DeltaMessage<'a>),
    Trade(TradeMessage<'a>),
    /// A frame type the book does not consume (heartbeats, fills, ...).
    Unknown,
}

impl<'a> MarketMessage<'a> {
    pub fn kind(&self) -> MessageType {
        match self {
            MarketMessage::Snapshot(_) => MessageType::Snapshot,
            MarketMessage::Delta(_) => MessageType::Delta,
            MarketMessage::Trade(_) => MessageType::Trade,
            MarketMessage::Unknown => MessageType::Unknown,
        }
    }

    pub fn market_ticker(&self) -> Option<&str> {
        match self {
            MarketMessage::Snapshot(m) => Some(&m.market_ticker),
            MarketMessage::Delta(m) => Some(&m.market_ticker),
            MarketMessage::Trade(m) => Some(&m.market_ticker),
            MarketMessage::Unknown => None,
        }
    }

    pub fn into_owned(self) -> MarketMessage<'static> {
        match self {
            MarketMessage::Snapshot(m) => MarketMessage::Snapshot(m.into_owned()),
            MarketMessage::Delta(m) => MarketMessage::Delta(m.into_owned()),
            MarketMessage::Trade(m) => MarketMessage::Trade(m.into_owned()),
            MarketMessage::Unknown => MarketMessage::Unknown,
        }
    }
}

impl<'a> From<SnapshotMessage<'a>> for MarketMessage<'a> {
    fn from(msg: SnapshotMessage<'a>) -> Self {
        MarketMessage::Snapshot(msg)
    }
}

impl<'a> From<DeltaMessage<'a>> for MarketMessage<'a> {
    fn from(msg: DeltaMessage<'a>) -> Self {
        MarketMessage::Delta(msg)
    }
}

impl<'a> From<TradeMessage<'a>> for MarketMessage<'a> {
    fn from(msg: TradeMessage<'a>) -> Self {
        MarketMessage::Trade(msg)
    }
}

fn push_bounded(levels: &mut SideLevels, level: BookLevel) -> Result<(), MessageError> {
    if levels.len() >= MAX_BOOK_LEVELS {
        return Err(MessageError::TooManyLevels);
    }
    levels.push(level);
    Ok(())
}

fn bounded_levels<'de, D>(de: D) -> Result<SideLevels, D::Error>
where
    D: Deserializer<'de>,
{
    let levels = Vec::<BookLevel>::deserialize(de)?;
    if levels.len() > MAX_BOOK_LEVELS {
        return Err(serde::de::Error::custom(MessageError::TooManyLevels));
    }
    Ok(levels.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_respects_capacity() {
        let mut snap = SnapshotMessage::new("KXTEST");
        for price in 0..MAX_BOOK_LEVELS as Price {
            snap.push_yes(price, 1).unwrap();
        }
        assert_eq!(snap.push_yes(0, 1), Err(MessageError::TooManyLevels));
        assert_eq!(snap.yes.len(), MAX_BOOK_LEVELS);
        assert!(snap.no.is_empty());
    }

    #[test]
    fn test_snapshot_decodes_level_pairs_and_borrows() {
        let raw = r#"{"market_ticker":"KXTEST","market_id":"m-1","yes":[[10,5],[20,3]],"no":[[50,7]]}"#;
        let snap: SnapshotMessage<'_> = serde_json::from_str(raw).unwrap();
        assert!(matches!(snap.market_ticker, Cow::Borrowed("KXTEST")));
        assert_eq!(snap.yes.as_slice(), &[BookLevel::new(10, 5), BookLevel::new(20, 3)]);
        assert_eq!(snap.no.as_slice(), &[BookLevel::new(50, 7)]);
    }

    #[test]
    fn test_snapshot_rejects_oversized_side() {
        let levels: Vec<String> = (0..=MAX_BOOK_LEVELS).map(|p| format!("[{p},1]")).collect();
        let raw = format!(r#"{{"market_ticker":"KXTEST","yes":[{}]}}"#, levels.join(","));
        let err = serde_json::from_str::<SnapshotMessage<'_>>(&raw).unwrap_err();
        assert!(err.to_string().contains("more than 100 levels"));
    }

    #[test]
    fn test_unknown_side_decodes_as_undefined() {
        let raw = r#"{"market_ticker":"KXTEST","price":4,"delta":2,"side":"maybe"}"#;
        let delta: DeltaMessage<'_> = serde_json::from_str(raw).unwrap();
        assert_eq!(delta.side, Side::Undefined);

        let raw = r#"{"market_ticker":"KXTEST","price":4,"delta":2,"side":"no"}"#;
        let delta: DeltaMessage<'_> = serde_json::from_str(raw).unwrap();
        assert_eq!(delta.side, Side::No);
    }

    #[test]
    fn test_into_owned_keeps_fields() {
        let text = String::from("KXTEST");
        let msg: MarketMessage<'static> = {
            let mut trade = TradeMessage::new(Side::Yes, 40, 60, 2);
            trade.market_ticker = Cow::Borrowed(text.as_str());
            MarketMessage::from(trade).into_owned()
        };
        drop(text);
        assert_eq!(msg.kind(), MessageType::Trade);
        assert_eq!(msg.market_ticker(), Some("KXTEST"));
    }
}
