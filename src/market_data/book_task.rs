//! Task that owns a [`Book`] and serialises every update and query.
//!
//! All access goes through one bounded channel, so updates are applied in the
//! order they were sent and queries observe every update sent before them.
//! Dropping the last [`BookHandle`] ends the task, which hands back the book.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::engine::book::Book;
use crate::engine::messages::MarketMessage;
use crate::engine::types::{ApplyOutcome, Price, Qty, Side, TopOfBook};
use crate::telemetry;

#[derive(Debug, Error)]
pub enum BookTaskError {
    #[error("book task has stopped")]
    Closed,
}

impl<T> From<mpsc::error::SendError<T>> for BookTaskError {
    fn from(_: mpsc::error::SendError<T>) -> Self {
        BookTaskError::Closed
    }
}

impl From<oneshot::error::RecvError> for BookTaskError {
    fn from(_: oneshot::error::RecvError) -> Self {
        BookTaskError::Closed
    }
}

pub enum BookCommand {
    Apply {
        msg: MarketMessage<'static>,
        reply: Option<oneshot::Sender<ApplyOutcome>>,
    },
    TopOfBook(oneshot::Sender<TopOfBook>),
    TopN {
        side: Side,
        n: usize,
        reply: oneshot::Sender<Vec<(Price, Qty)>>,
    },
    Copy(oneshot::Sender<Book>),
}

/// Cloneable sender side of a book task.
#[derive(Debug, Clone)]
pub struct BookHandle {
    tx: mpsc::Sender<BookCommand>,
}

impl BookHandle {
    /// Applies `msg` and waits for the outcome.
    pub async fn apply(&self, msg: MarketMessage<'static>) -> Result<ApplyOutcome, BookTaskError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(BookCommand::Apply { msg, reply: Some(reply) }).await?;
        Ok(rx.await?)
    }

    /// Queues `msg` without waiting for it to be applied.
    pub async fn submit(&self, msg: MarketMessage<'static>) -> Result<(), BookTaskError> {
        self.tx.send(BookCommand::Apply { msg, reply: None }).await?;
        Ok(())
    }

    pub async fn top_of_book(&self) -> Result<TopOfBook, BookTaskError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(BookCommand::TopOfBook(reply)).await?;
        Ok(rx.await?)
    }

    /// Top `n` levels of `side`: bids descending, asks ascending.
    pub async fn top_n(&self, side: Side, n: usize) -> Result<Vec<(Price, Qty)>, BookTaskError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(BookCommand::TopN { side, n, reply }).await?;
        Ok(rx.await?)
    }

    /// Copy of the book as of every command sent before this one.
    pub async fn snapshot(&self) -> Result<Book, BookTaskError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(BookCommand::Copy(reply)).await?;
        Ok(rx.await?)
    }
}

/// Spawns the owning task for `market` on the current runtime.
pub fn spawn_book_task(market: impl Into<String>, capacity: usize) -> (BookHandle, JoinHandle<Book>) {
    let (tx, rx) = mpsc::channel(capacity);
    let task = tokio::spawn(run_book_loop(market.into(), rx));
    (BookHandle { tx }, task)
}

async fn run_book_loop(market: String, mut rx: mpsc::Receiver<BookCommand>) -> Book {
    let mut book = Book::new();
    info!(%market, "Book task started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            BookCommand::Apply { msg, reply } => {
                let outcome = book.apply(&msg);
                telemetry::record_apply(msg.kind(), &outcome);
                if let Some(reply) = reply {
                    // Caller may have stopped waiting; the update stands either way.
                    let _ = reply.send(outcome);
                }
            }
            BookCommand::TopOfBook(reply) => {
                let _ = reply.send(book.top_of_book());
            }
            BookCommand::TopN { side, n, reply } => {
                let levels = match side {
                    Side::Yes => book.top_n_bids(n),
                    Side::No => book.top_n_asks(n),
                    Side::Undefined => Vec::new(),
                };
                let _ = reply.send(levels);
            }
            BookCommand::Copy(reply) => {
                let _ = reply.send(book.clone());
            }
        }
    }

    debug!(%market, bid_depth = book.depth(Side::BID), ask_depth = book.depth(Side::ASK), "Book task stopping");
    book
}
