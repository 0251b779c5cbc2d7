//! Typed error hierarchy for the roadmap board.
//!
//! Four groups cover the moving parts:
//! - `InvalidMoveError`: a move gesture that does not match the local collection
//! - `ReconciliationError` / `StaleAuthorityError`: the remote authority round-trip
//! - `MoveError`: what the controller reports synchronously for a gesture
//! - `BoardError`: board store and API failures on the authority side

use std::time::Duration;

use thiserror::Error;

/// A move that references an out-of-range index or an item that is not where
/// the gesture says it is. Indicates a UI-state defect, never user input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidMoveError {
    #[error("Index {index} is out of range for a collection of {len} items")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Item {item_id} is not in the collection")]
    UnknownItem { item_id: String },

    #[error("Item {item_id} is at index {actual}, not {expected}")]
    ItemNotAtIndex {
        item_id: String,
        expected: usize,
        actual: usize,
    },
}

/// The persistence endpoint could not be reached or refused the new order.
#[derive(Debug, Error)]
pub enum ReconciliationError {
    #[error("Failed to reach the board authority: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Board authority did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Board authority rejected the update ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Failed to decode board authority response: {0}")]
    Decode(String),
}

impl ReconciliationError {
    /// Classify a reqwest failure, separating timeouts from other transport errors.
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err)
        }
    }
}

/// The authority answered with an ordering that does not describe the items
/// this view holds, which means the board changed structurally underneath it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StaleAuthorityError {
    #[error("Authority returned {authoritative} positions for a collection of {local} items")]
    LengthMismatch { local: usize, authoritative: usize },

    #[error("Authority returned unknown item {item_id}")]
    UnknownItem { item_id: String },

    #[error("Authority returned item {item_id} more than once")]
    DuplicateItem { item_id: String },

    #[error("Authority positions are not dense: position {position} is missing")]
    PositionGap { position: usize },
}

/// Synchronous failure of a move gesture in the controller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error(transparent)]
    Invalid(#[from] InvalidMoveError),

    #[error("Board view has been unmounted")]
    Unmounted,
}

/// Errors from the board store and API.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Board {id} not found")]
    BoardNotFound { id: i64 },

    #[error("Card {id} not found")]
    CardNotFound { id: i64 },

    #[error("Card {card_id} does not belong to board {board_id}")]
    CardNotOnBoard { card_id: i64, board_id: i64 },

    #[error("Position update for board {board_id} conflicts with current order: {message}")]
    PositionConflict { board_id: i64, message: String },

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Invalid request: {0}")]
    BadRequest(String),
}
