// JSON feed frames -> borrowed message records.
//
// Frame shape: {"type": "<kind>", "seq": 12, "msg": {...}}
// The body is held as a raw slice of the input line and decoded only once the
// kind is known, so identifiers borrow straight from the line.

use std::borrow::Cow;

use serde::Deserialize;
use serde_json::value::RawValue;
use thiserror::Error;

use crate::engine::messages::{DeltaMessage, MarketMessage, SnapshotMessage, TradeMessage};

pub const SNAPSHOT_TYPE: &str = "orderbook_snapshot";
pub const DELTA_TYPE: &str = "orderbook_delta";
pub const TRADE_TYPE: &str = "trade";

#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("`{kind}` frame has no `msg` body")]
    MissingBody { kind: String },
}

#[derive(Deserialize)]
struct Envelope<'a> {
    #[serde(rename = "type", borrow)]
    kind: Cow<'a, str>,
    #[serde(default)]
    seq: Option<u64>,
    #[serde(borrow, default)]
    msg: Option<&'a RawValue>,
}

/// A decoded frame. `message` borrows from the input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<'a> {
    pub seq: Option<u64>,
    pub message: MarketMessage<'a>,
}

/// Decodes one frame. Unrecognised frame types become [`MarketMessage::Unknown`].
pub fn decode_frame(line: &str) -> Result<Frame<'_>, WireError> {
    let envelope: Envelope<'_> = serde_json::from_str(line)?;

    let body = |kind: &str| {
        envelope
            .msg
            .map(RawValue::get)
            .ok_or_else(|| WireError::MissingBody { kind: kind.to_string() })
    };

    let message = match envelope.kind.as_ref() {
        SNAPSHOT_TYPE => MarketMessage::Snapshot(serde_json::from_str::<SnapshotMessage<'_>>(body(SNAPSHOT_TYPE)?)?),
        DELTA_TYPE => MarketMessage::Delta(serde_json::from_str::<DeltaMessage<'_>>(body(DELTA_TYPE)?)?),
        TRADE_TYPE => MarketMessage::Trade(serde_json::from_str::<TradeMessage<'_>>(body(TRADE_TYPE)?)?),
        _ => MarketMessage::Unknown,
    };

    Ok(Frame { seq: envelope.seq, message })
}

/// Encodes a message in the frame shape [`decode_frame`] reads.
pub fn encode_frame(message: &MarketMessage<'_>, seq: Option<u64>) -> Result<String, WireError> {
    let (kind, body) = match message {
        MarketMessage::Snapshot(m) => (SNAPSHOT_TYPE, Some(serde_json::to_value(m)?)),
        MarketMessage::Delta(m) => (DELTA_TYPE, Some(serde_json::to_value(m)?)),
        MarketMessage::Trade(m) => (TRADE_TYPE, Some(serde_json::to_value(m)?)),
        MarketMessage::Unknown => ("unknown", None),
    };

    let mut frame = serde_json::json!({ "type": kind });
    if let Some(seq) = seq {
        frame["seq"] = seq.into();
    }
    if let Some(body) = body {
        frame["msg"] = body;
    }
    Ok(serde_json::to_string(&frame)?)
}
