//! Stock domain errors.

use thiserror::Error;

use lotparty_core::DomainError;

/// Result type for stock operations.
pub type StockResult<T> = Result<T, StockError>;

/// Stock-level error.
///
/// `ConflictingLotParty` is the one user-facing domain error this module
/// raises; everything else is a generic domain failure delegated to the host.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    /// A move's effective party disagrees with its lot's assigned party.
    ///
    /// Non-retryable; surfaced verbatim to the end user with display names.
    #[error("cannot use lot \"{lot}\" of party \"{lot_party}\" on a move for party \"{move_party}\"")]
    ConflictingLotParty {
        lot: String,
        lot_party: String,
        move_party: String,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Failure of one entry in an ordered change batch.
///
/// `index` is the zero-based position of the offending change request; the
/// whole batch is rolled back, so results stay aligned by index.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("change request {index} failed: {error}")]
pub struct BatchError {
    pub index: usize,
    pub error: StockError,
}

impl BatchError {
    pub fn new(index: usize, error: impl Into<StockError>) -> Self {
        Self {
            index,
            error: error.into(),
        }
    }
}
