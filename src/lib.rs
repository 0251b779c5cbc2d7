//! Reorderable roadmap board.
//!
//! | Module    | Responsibility                                                  |
//! |-----------|-----------------------------------------------------------------|
//! | `reorder` | Ordered collections, reconciliation diffs, optimistic controller |
//! | `board`   | SQLite-backed board server, HTTP API, reqwest client            |
//! | `session` | Caller identity and board permissions                           |
//! | `config`  | `.roadmap/roadmap.toml` loading and layering                    |
//! | `errors`  | Typed error enums                                               |

pub mod board;
pub mod config;
pub mod errors;
pub mod reorder;
pub mod session;
