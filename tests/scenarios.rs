// Walks the book through a snapshot -> delta -> trade sequence and checks the
// state after each step.

use binlob::engine::{
    ApplyOutcome, Book, DeltaMessage, IgnoreReason, MarketMessage, Price, Qty, Side,
    SnapshotMessage, TradeMessage,
};

fn snapshot(yes: &[(Price, Qty)], no: &[(Price, Qty)]) -> MarketMessage<'static> {
    let mut snap = SnapshotMessage::new("KXELECTION-24");
    for &(p, q) in yes {
        snap.push_yes(p, q).unwrap();
    }
    for &(p, q) in no {
        snap.push_no(p, q).unwrap();
    }
    snap.into()
}

fn book_after_snapshot() -> Book {
    let mut book = Book::new();
    book.apply(&snapshot(&[(10, 5), (20, 3)], &[(50, 7)]));
    book
}

fn book_after_delta() -> Book {
    let mut book = book_after_snapshot();
    book.apply(&DeltaMessage::new(Side::BID, 20, -3).into());
    book
}

fn book_after_trade() -> Book {
    let mut book = book_after_delta();
    book.apply(&TradeMessage::new(Side::BID, 0, 50, 7).into());
    book
}

#[test]
fn snapshot_sets_best_bid_and_ask() {
    let book = book_after_snapshot();
    assert_eq!(book.best_bid(), (20, 3));
    assert_eq!(book.best_ask(), (50, 7));
}

#[test]
fn delta_to_zero_clears_level() {
    let book = book_after_delta();
    assert_eq!(book.quantity(Side::BID, 20), 0);
    assert!(!book.bids().is_occupied(20));
    assert_eq!(book.best_bid(), (10, 5));
}

#[test]
fn trade_consumes_resting_ask() {
    let book = book_after_trade();
    assert_eq!(book.quantity(Side::ASK, 50), 0);
    assert!(!book.asks().is_occupied(50));
    assert_eq!(book.best_ask(), (0, 0));
}

#[test]
fn top_bids_after_sequence() {
    let book = book_after_trade();
    assert_eq!(book.top_n_bids(5), vec![(10, 5)]);
}

#[test]
fn out_of_range_delta_changes_nothing() {
    let mut book = book_after_trade();
    let before = book.clone();
    let outcome = book.apply(&DeltaMessage::new(Side::BID, 999, 4).into());
    assert_eq!(outcome, ApplyOutcome::Ignored(IgnoreReason::PriceOutOfRange { price: 999 }));
    assert_eq!(book, before);
}

#[test]
fn zero_count_trade_changes_nothing() {
    let mut book = book_after_snapshot();
    let before = book.clone();
    let outcome = book.apply(&TradeMessage::new(Side::ASK, 20, 50, 0).into());
    assert_eq!(outcome, ApplyOutcome::Ignored(IgnoreReason::NonPositiveCount { count: 0 }));
    assert_eq!(book, before);
}

#[test]
fn repeated_snapshot_is_idempotent() {
    let msg = snapshot(&[(1, 1), (64, 2), (99, 3)], &[(63, 4), (0, 5)]);
    let mut once = Book::new();
    once.apply(&msg);
    let mut twice = Book::new();
    twice.apply(&msg);
    twice.apply(&msg);
    assert_eq!(once, twice);
}

#[test]
fn new_snapshot_discards_old_levels() {
    let mut book = book_after_snapshot();
    book.apply(&snapshot(&[(30, 1)], &[(70, 2)]));
    assert_eq!(book.top_n_bids(10), vec![(30, 1)]);
    assert_eq!(book.top_n_asks(10), vec![(70, 2)]);
}

#[test]
fn empty_sides_report_zero_sentinel() {
    let mut book = book_after_snapshot();
    book.clear();
    assert_eq!(book.best_bid(), (0, 0));
    assert_eq!(book.best_ask(), (0, 0));
    assert!(book.top_of_book().is_empty());
}
