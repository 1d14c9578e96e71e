use thiserror::Error;

use crate::engine::messages::MAX_BOOK_LEVELS;
use crate::engine::types::{ApplyOutcome, IgnoreReason, Price, Side};

/// A book update that was not applied cleanly.
///
/// The book never produces these by itself; they come from
/// [`ApplyOutcome::into_result`] for callers running in strict mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BookError {
    #[error("price {price} is outside the book's level range")]
    PriceOutOfRange { price: Price },

    #[error("update carries an undefined side")]
    UndefinedSide,

    #[error("trade count {count} is not positive")]
    NonPositiveCount { count: i32 },

    #[error("message kind is not understood by the book")]
    UnknownMessage,

    #[error("snapshot dropped {dropped} out-of-range levels")]
    SnapshotLevelsDropped { dropped: usize },

    #[error("removal at {side:?}@{price} exceeded resting quantity by {shortfall}")]
    InconsistentRemoval { side: Side, price: Price, shortfall: u64 },

    #[error("quantity at {side:?}@{price} overflowed")]
    QuantityOverflow { side: Side, price: Price },
}

impl From<IgnoreReason> for BookError {
    fn from(reason: IgnoreReason) -> Self {
        match reason {
            IgnoreReason::PriceOutOfRange { price } => BookError::PriceOutOfRange { price },
            IgnoreReason::UndefinedSide => BookError::UndefinedSide,
            IgnoreReason::NonPositiveCount { count } => BookError::NonPositiveCount { count },
            IgnoreReason::UnknownMessage => BookError::UnknownMessage,
        }
    }
}

impl ApplyOutcome {
    /// `Ok(())` for a clean apply, the matching [`BookError`] otherwise.
    pub fn into_result(self) -> Result<(), BookError> {
        match self {
            ApplyOutcome::Applied => Ok(()),
            ApplyOutcome::Snapshot(stats) if stats.dropped == 0 => Ok(()),
            ApplyOutcome::Snapshot(stats) => {
                Err(BookError::SnapshotLevelsDropped { dropped: stats.dropped })
            }
            ApplyOutcome::Ignored(reason) => Err(reason.into()),
            ApplyOutcome::Clamped { side, price, shortfall } => {
                Err(BookError::InconsistentRemoval { side, price, shortfall })
            }
            ApplyOutcome::Saturated { side, price } => {
                Err(BookError::QuantityOverflow { side, price })
            }
        }
    }
}

/// Errors building a message record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("snapshot side holds more than {max} levels", max = MAX_BOOK_LEVELS)]
    TooManyLevels,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::SnapshotStats;

    #[test]
    fn test_clean_outcomes_are_ok() {
        assert_eq!(ApplyOutcome::Applied.into_result(), Ok(()));
        let stats = SnapshotStats { loaded: 3, dropped: 0 };
        assert_eq!(ApplyOutcome::Snapshot(stats).into_result(), Ok(()));
    }

    #[test]
    fn test_clamped_maps_to_inconsistent_removal() {
        let outcome = ApplyOutcome::Clamped { side: Side::No, price: 50, shortfall: 3 };
        let err = outcome.into_result().unwrap_err();
        assert_eq!(err, BookError::InconsistentRemoval { side: Side::No, price: 50, shortfall: 3 });
        assert_eq!(err.to_string(), "removal at No@50 exceeded resting quantity by 3");
    }

    #[test]
    fn test_ignored_maps_through_reason() {
        let outcome = ApplyOutcome::Ignored(IgnoreReason::PriceOutOfRange { price: 999 });
        assert_eq!(outcome.into_result(), Err(BookError::PriceOutOfRange { price: 999 }));
    }
}
