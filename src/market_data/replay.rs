//! Drives a recorded feed (one JSON frame per line) through a book.

use std::io::BufRead;
use std::time::{Duration, Instant};

use hdrhistogram::Histogram;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, instrument, warn};

use crate::engine::book::Book;
use crate::engine::error::BookError;
use crate::engine::messages::MessageType;
use crate::engine::types::ApplyOutcome;
use crate::market_data::book_task::{BookHandle, BookTaskError};
use crate::market_data::wire::{decode_frame, Frame};
use crate::telemetry;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("reading feed: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {source}")]
    Inconsistent {
        line: usize,
        #[source]
        source: BookError,
    },

    #[error(transparent)]
    Task(#[from] BookTaskError),

    #[error("latency histogram: {0}")]
    Histogram(#[from] hdrhistogram::CreationError),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayOptions {
    /// Abort on the first update that does not apply cleanly.
    pub strict: bool,
}

/// Counters collected over one replay.
#[derive(Debug, Clone)]
pub struct ReplayStats {
    pub frames: u64,
    pub snapshots: u64,
    pub deltas: u64,
    pub trades: u64,
    pub unknown: u64,
    pub decode_errors: u64,
    pub ignored: u64,
    pub clamped: u64,
    pub saturated: u64,
    pub dropped_levels: u64,
    pub sequence_gaps: u64,
    /// Per-update apply time in nanoseconds.
    pub latency: Histogram<u64>,
}

impl ReplayStats {
    pub fn new() -> Result<Self, ReplayError> {
        Ok(Self {
            frames: 0,
            snapshots: 0,
            deltas: 0,
            trades: 0,
            unknown: 0,
            decode_errors: 0,
            ignored: 0,
            clamped: 0,
            saturated: 0,
            dropped_levels: 0,
            sequence_gaps: 0,
            latency: Histogram::new(3)?,
        })
    }

    fn record(&mut self, kind: MessageType, outcome: &ApplyOutcome, elapsed: Duration) {
        match kind {
            MessageType::Snapshot => self.snapshots += 1,
            MessageType::Delta => self.deltas += 1,
            MessageType::Trade => self.trades += 1,
            MessageType::Unknown => self.unknown += 1,
        }
        match outcome {
            ApplyOutcome::Applied => {}
            ApplyOutcome::Snapshot(stats) => self.dropped_levels += stats.dropped as u64,
            ApplyOutcome::Ignored(_) => self.ignored += 1,
            ApplyOutcome::Clamped { .. } => self.clamped += 1,
            ApplyOutcome::Saturated { .. } => self.saturated += 1,
        }
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        if let Err(e) = self.latency.record(nanos) {
            warn!(nanos, error = ?e, "Latency sample not recorded");
        }
    }
}

/// Tracks frame sequence numbers and counts gaps. Frames without a number are
/// not checked.
#[derive(Debug, Default)]
struct SequenceTracker {
    last: Option<u64>,
}

impl SequenceTracker {
    fn observe(&mut self, seq: Option<u64>) -> Option<(u64, u64)> {
        let seq = seq?;
        let gap = match self.last {
            Some(last) if seq != last + 1 => Some((last + 1, seq)),
            _ => None,
        };
        self.last = Some(seq);
        gap
    }
}

/// Per-line bookkeeping shared by the sync and async drivers.
struct Replayer {
    options: ReplayOptions,
    stats: ReplayStats,
    sequence: SequenceTracker,
}

impl Replayer {
    fn new(options: ReplayOptions) -> Result<Self, ReplayError> {
        Ok(Self { options, stats: ReplayStats::new()?, sequence: SequenceTracker::default() })
    }

    fn decode<'l>(&mut self, line_no: usize, line: &'l str) -> Option<Frame<'l>> {
        if line.trim().is_empty() {
            return None;
        }
        self.stats.frames += 1;
        match decode_frame(line) {
            Ok(frame) => {
                if let Some((expected, got)) = self.sequence.observe(frame.seq) {
                    self.stats.sequence_gaps += 1;
                    warn!(line = line_no, expected, got, "Sequence gap in feed");
                }
                Some(frame)
            }
            Err(e) => {
                self.stats.decode_errors += 1;
                warn!(line = line_no, error = %e, "Skipping undecodable frame");
                None
            }
        }
    }

    fn observe(
        &mut self,
        line_no: usize,
        kind: MessageType,
        outcome: ApplyOutcome,
        elapsed: Duration,
    ) -> Result<(), ReplayError> {
        self.stats.record(kind, &outcome, elapsed);
        if self.options.strict && kind != MessageType::Unknown {
            outcome
                .into_result()
                .map_err(|source| ReplayError::Inconsistent { line: line_no, source })?;
        }
        Ok(())
    }
}

/// Replays every frame from `reader` into `book`, in order.
#[instrument(level = "info", skip_all, fields(strict = options.strict))]
pub fn replay_reader<R: BufRead>(
    reader: R,
    book: &mut Book,
    options: ReplayOptions,
) -> Result<ReplayStats, ReplayError> {
    let mut replayer = Replayer::new(options)?;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = idx + 1;
        let Some(frame) = replayer.decode(line_no, &line) else {
            continue;
        };

        let kind = frame.message.kind();
        let start = Instant::now();
        let outcome = book.apply(&frame.message);
        let elapsed = start.elapsed();

        telemetry::record_apply(kind, &outcome);
        replayer.observe(line_no, kind, outcome, elapsed)?;
    }

    info!(frames = replayer.stats.frames, "Replay finished");
    Ok(replayer.stats)
}

/// Replays every frame from `reader` through a book task.
///
/// Latency here is the full round trip to the task and back.
#[instrument(level = "info", skip_all, fields(strict = options.strict))]
pub async fn replay_to_task<R>(
    reader: R,
    handle: &BookHandle,
    options: ReplayOptions,
) -> Result<ReplayStats, ReplayError>
where
    R: AsyncBufRead + Unpin,
{
    let mut replayer = Replayer::new(options)?;
    let mut lines = reader.lines();
    let mut line_no = 0;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let Some(frame) = replayer.decode(line_no, &line) else {
            continue;
        };

        let kind = frame.message.kind();
        let start = Instant::now();
        let outcome = handle.apply(frame.message.into_owned()).await?;
        let elapsed = start.elapsed();

        replayer.observe(line_no, kind, outcome, elapsed)?;
    }

    debug!(frames = replayer.stats.frames, "Replay finished");
    Ok(replayer.stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::book_task::spawn_book_task;
    use std::io::Cursor;

    const FEED: &str = r#"{"type":"orderbook_snapshot","seq":1,"msg":{"market_ticker":"KXTEST","yes":[[10,5],[20,3]],"no":[[50,7]]}}
{"type":"orderbook_delta","seq":2,"msg":{"market_ticker":"KXTEST","price":20,"delta":-3,"side":"yes"}}

{"type":"heartbeat","seq":3}
{"type":"trade","seq":5,"msg":{"trade_id":"t1","market_ticker":"KXTEST","yes_price":50,"no_price":50,"count":7,"taker_side":"yes","ts":1}}
garbage
{"type":"orderbook_delta","seq":6,"msg":{"market_ticker":"KXTEST","price":999,"delta":1,"side":"no"}}
"#;

    #[test]
    fn test_replay_counts_frames() {
        let mut book = Book::new();
        let stats = replay_reader(Cursor::new(FEED), &mut book, ReplayOptions::default()).unwrap();

        assert_eq!(stats.frames, 6);
        assert_eq!(stats.snapshots, 1);
        assert_eq!(stats.deltas, 2);
        assert_eq!(stats.trades, 1);
        assert_eq!(stats.unknown, 1);
        assert_eq!(stats.decode_errors, 1);
        assert_eq!(stats.ignored, 2);
        assert_eq!(stats.sequence_gaps, 1);
        assert_eq!(stats.latency.len(), 5);

        assert_eq!(book.best_bid(), (10, 5));
        assert_eq!(book.best_ask(), (0, 0));
    }

    #[test]
    fn test_strict_replay_stops_at_bad_update() {
        let mut book = Book::new();
        let err = replay_reader(Cursor::new(FEED), &mut book, ReplayOptions { strict: true }).unwrap_err();
        match err {
            ReplayError::Inconsistent { line, source } => {
                assert_eq!(line, 7);
                assert_eq!(source, BookError::PriceOutOfRange { price: 999 });
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_latency_keeps_recorded_magnitude() {
        let mut stats = ReplayStats::new().unwrap();
        stats.record(MessageType::Delta, &ApplyOutcome::Applied, Duration::from_micros(50));
        stats.record(MessageType::Trade, &ApplyOutcome::Applied, Duration::from_millis(2));

        assert_eq!(stats.latency.len(), 2);
        let max = stats.latency.max();
        assert!((1_990_000..=2_010_000).contains(&max), "max = {max}");
        let min = stats.latency.min();
        assert!((49_000..=51_000).contains(&min), "min = {min}");
    }

    #[test]
    fn test_sequence_tracker() {
        let mut tracker = SequenceTracker::default();
        assert_eq!(tracker.observe(Some(4)), None);
        assert_eq!(tracker.observe(Some(5)), None);
        assert_eq!(tracker.observe(None), None);
        assert_eq!(tracker.observe(Some(9)), Some((6, 9)));
    }

    #[tokio::test]
    async fn test_replay_through_task_matches_direct() {
        let (handle, task) = spawn_book_task("KXTEST", 8);
        let stats = replay_to_task(FEED.as_bytes(), &handle, ReplayOptions::default()).await.unwrap();
        drop(handle);
        let via_task = task.await.unwrap();

        let mut direct = Book::new();
        replay_reader(Cursor::new(FEED), &mut direct, ReplayOptions::default()).unwrap();

        assert_eq!(via_task, direct);
        assert_eq!(stats.trades, 1);
        assert_eq!(stats.decode_errors, 1);
    }
}
