//! Roadmap board authority and its HTTP client.
//!
//! ## Overview
//!
//! The board server owns the authoritative card order in SQLite. Views reorder
//! cards optimistically through [`crate::reorder`] and persist each move with a
//! single `PATCH /api/boards/{id}/positions`; the answer is the board's full
//! ordering, which the view adopts.
//!
//! ```text
//! ┌────────────────────┐  PATCH positions  ┌───────────────────────────────────┐
//! │ client.rs          │ ────────────────> │ server.rs (Router, ServerConfig)  │
//! │  HttpBoardClient   │ <──────────────── │   └─ api.rs (handlers, sessions)  │
//! │  BoardReconciler   │   {positions}     │         │                         │
//! └────────────────────┘                   │         v                         │
//!           ^                              │  db.rs (BoardDb, DbHandle)        │
//!           │ BoardEvent (WebSocket)       │         │                         │
//!           └───────────────────────────── │  ws.rs (BoardEvent, /ws)          │
//!                                          └───────────────────────────────────┘
//! ```
//!
//! | Module   | Responsibility                                           |
//! |----------|----------------------------------------------------------|
//! | `models` | `Board`, `Card`, `PositionsResponse`, `ErrorBody`         |
//! | `db`     | SQLite store, dense positions per board                  |
//! | `api`    | axum handlers, session gating, `ApiError`                |
//! | `ws`     | `BoardEvent` broadcast and WebSocket forwarding          |
//! | `server` | Router assembly, bind, graceful shutdown                 |
//! | `client` | reqwest client, `ReconciliationClient` for one board     |

pub mod api;
pub mod client;
pub mod db;
pub mod models;
pub mod server;
pub mod ws;

pub use client::{BoardReconciler, HttpBoardClient};
pub use db::{BoardDb, DbHandle};
pub use models::{Board, Card, ErrorBody, PositionsResponse};
pub use server::{ServerConfig, build_router, start_server};
pub use ws::BoardEvent;
