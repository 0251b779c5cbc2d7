//! Reorderable collections with optimistic moves.
//!
//! ## Overview
//!
//! A board view holds its cards in an [`OrderedCollection`]. When the user
//! drops a card somewhere else the [`OptimisticMoveController`] applies the
//! move locally straight away, sends the changed positions to the remote
//! authority in one batch, and then either adopts the authority's ordering or
//! puts the pre-move snapshot back.
//!
//! ```text
//!  drag gesture ─> MoveIntent
//!                     │
//!                     v
//!  controller.rs   begin_move()  ── OrderedCollection::move_item()   (Applied)
//!                     │             snapshot kept for rollback
//!                     v
//!  reconcile.rs    ReconciliationRequest::between() ─> persist()     (Pending)
//!                     │
//!          ┌──────────┴──────────┐
//!          v                     v
//!     apply_positions()     restore snapshot
//!       (Confirmed)          (RolledBack)
//! ```
//!
//! | Module       | Responsibility                                              |
//! |--------------|-------------------------------------------------------------|
//! | `collection` | `OrderedCollection`, `Identified`, `PositionUpdate`, `MoveIntent` |
//! | `reconcile`  | `ReconciliationRequest` diffing, `ReconciliationClient` trait |
//! | `controller` | `OptimisticMoveController`, `MoveState`, `MoveOutcome`      |

pub mod collection;
pub mod controller;
pub mod reconcile;

pub use collection::{Identified, MoveIntent, OrderedCollection, PositionUpdate, PositionedItem};
pub use controller::{
    ControllerConfig, MoveNotification, MoveOutcome, MoveState, OptimisticMoveController,
    PendingMove,
};
pub use reconcile::{ReconciliationClient, ReconciliationRequest};
