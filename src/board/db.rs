use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use super::models::*;
use crate::errors::BoardError;
use crate::reorder::PositionUpdate;

/// Async-safe handle to the board database.
///
/// Wraps `BoardDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O never
/// ties up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<BoardDb>>,
}

impl DbHandle {
    pub fn new(db: BoardDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&BoardDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|_| BoardError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

pub struct BoardDb {
    conn: Connection,
}

impl BoardDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS boards (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS cards (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    board_id INTEGER NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    position INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE INDEX IF NOT EXISTS idx_cards_board ON cards(board_id, position);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Board CRUD ────────────────────────────────────────────────────

    pub fn create_board(&self, name: &str) -> Result<Board> {
        self.conn
            .execute("INSERT INTO boards (name) VALUES (?1)", params![name])
            .context("Failed to insert board")?;
        let id = self.conn.last_insert_rowid();
        self.get_board(id)?.context("Board not found after insert")
    }

    pub fn list_boards(&self) -> Result<Vec<Board>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, created_at FROM boards ORDER BY id")
            .context("Failed to prepare list_boards")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Board {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })
            .context("Failed to query boards")?;
        let mut boards = Vec::new();
        for row in rows {
            boards.push(row.context("Failed to read board row")?);
        }
        Ok(boards)
    }

    pub fn get_board(&self, id: i64) -> Result<Option<Board>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, created_at FROM boards WHERE id = ?1")
            .context("Failed to prepare get_board")?;
        let mut rows = stmt
            .query_map(params![id], |row| {
                Ok(Board {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })
            .context("Failed to query board")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read board row")?)),
            None => Ok(None),
        }
    }

    fn require_board(&self, id: i64) -> Result<Board> {
        self.get_board(id)?
            .ok_or_else(|| BoardError::BoardNotFound { id }.into())
    }

    // ── Card CRUD ─────────────────────────────────────────────────────

    /// Append a card at the end of its board.
    pub fn create_card(&self, board_id: i64, title: &str, description: &str) -> Result<Card> {
        self.require_board(board_id)?;
        let max_pos: i64 = self
            .conn
            .query_row(
                "SELECT COALESCE(MAX(position), -1) FROM cards WHERE board_id = ?1",
                params![board_id],
                |row| row.get(0),
            )
            .context("Failed to get max position")?;
        self.conn
            .execute(
                "INSERT INTO cards (board_id, title, description, position) VALUES (?1, ?2, ?3, ?4)",
                params![board_id, title, description, max_pos + 1],
            )
            .context("Failed to insert card")?;
        let id = self.conn.last_insert_rowid();
        self.get_card(id)?.context("Card not found after insert")
    }

    /// Cards of a board in display order.
    pub fn list_cards(&self, board_id: i64) -> Result<Vec<Card>> {
        self.require_board(board_id)?;
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, board_id, title, description, position, created_at, updated_at
                 FROM cards WHERE board_id = ?1 ORDER BY position, id",
            )
            .context("Failed to prepare list_cards")?;
        let rows = stmt
            .query_map(params![board_id], card_from_row)
            .context("Failed to query cards")?;
        let mut cards = Vec::new();
        for row in rows {
            cards.push(row.context("Failed to read card row")?);
        }
        Ok(cards)
    }

    pub fn get_card(&self, id: i64) -> Result<Option<Card>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, board_id, title, description, position, created_at, updated_at
                 FROM cards WHERE id = ?1",
            )
            .context("Failed to prepare get_card")?;
        let mut rows = stmt
            .query_map(params![id], card_from_row)
            .context("Failed to query card")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read card row")?)),
            None => Ok(None),
        }
    }

    /// Delete a card and close the gap it leaves. Returns the deleted card.
    pub fn delete_card(&self, id: i64) -> Result<Option<Card>> {
        let Some(card) = self.get_card(id)? else {
            return Ok(None);
        };
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        tx.execute("DELETE FROM cards WHERE id = ?1", params![id])
            .context("Failed to delete card")?;
        self.reindex_board(card.board_id)?;
        tx.commit().context("Failed to commit card deletion")?;
        Ok(Some(card))
    }

    /// Rewrite positions of a board to `0..N` keeping the current order.
    fn reindex_board(&self, board_id: i64) -> Result<()> {
        let ids = self.ordered_ids(board_id)?;
        for (position, id) in (0_i64..).zip(ids.iter()) {
            self.conn
                .execute(
                    "UPDATE cards SET position = ?1 WHERE id = ?2 AND position != ?1",
                    params![position, id],
                )
                .context("Failed to reindex card")?;
        }
        Ok(())
    }

    fn ordered_ids(&self, board_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM cards WHERE board_id = ?1 ORDER BY position, id")
            .context("Failed to prepare ordered_ids")?;
        let rows = stmt
            .query_map(params![board_id], |row| row.get(0))
            .context("Failed to query card ids")?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row.context("Failed to read card id")?);
        }
        Ok(ids)
    }

    // ── Positions ─────────────────────────────────────────────────────

    /// Full `{itemId, position}` list of a board in display order.
    pub fn board_positions(&self, board_id: i64) -> Result<Vec<PositionUpdate<i64>>> {
        self.require_board(board_id)?;
        let mut stmt = self
            .conn
            .prepare("SELECT id, position FROM cards WHERE board_id = ?1 ORDER BY position, id")
            .context("Failed to prepare board_positions")?;
        let rows = stmt
            .query_map(params![board_id], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })
            .context("Failed to query positions")?;
        let mut positions = Vec::new();
        for row in rows {
            let (item_id, position) = row.context("Failed to read position row")?;
            let position = usize::try_from(position)
                .with_context(|| format!("Card {} has negative position {}", item_id, position))?;
            positions.push(PositionUpdate { item_id, position });
        }
        Ok(positions)
    }

    /// Apply one batch of position changes atomically.
    ///
    /// Every card must belong to the board, and after merging the batch into
    /// the stored order the positions must be exactly `0..N`. Otherwise
    /// nothing is written. Returns the board's full ordering.
    pub fn apply_positions(
        &self,
        board_id: i64,
        updates: &[PositionUpdate<i64>],
    ) -> Result<Vec<PositionUpdate<i64>>> {
        if updates.is_empty() {
            return Err(BoardError::BadRequest("No position updates supplied".into()).into());
        }
        self.require_board(board_id)?;

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;

        let mut merged: HashMap<i64, i64> = HashMap::new();
        {
            let mut stmt = tx
                .prepare("SELECT id, position FROM cards WHERE board_id = ?1")
                .context("Failed to prepare position lookup")?;
            let rows = stmt
                .query_map(params![board_id], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
                })
                .context("Failed to query positions")?;
            for row in rows {
                let (id, position) = row.context("Failed to read position row")?;
                merged.insert(id, position);
            }
        }

        let mut changes = Vec::with_capacity(updates.len());
        for update in updates {
            let position = i64::try_from(update.position).map_err(|_| {
                BoardError::BadRequest(format!(
                    "Position {} of card {} is out of range",
                    update.position, update.item_id
                ))
            })?;
            changes.push((update.item_id, position));
        }

        let mut seen = HashSet::new();
        for &(item_id, position) in &changes {
            if !seen.insert(item_id) {
                return Err(BoardError::BadRequest(format!(
                    "Card {} appears more than once",
                    item_id
                ))
                .into());
            }
            match merged.get_mut(&item_id) {
                Some(stored) => *stored = position,
                None => {
                    return Err(BoardError::CardNotOnBoard {
                        card_id: item_id,
                        board_id,
                    }
                    .into());
                }
            }
        }

        let mut positions: Vec<i64> = merged.values().copied().collect();
        positions.sort_unstable();
        if let Some((_, expected)) = positions.iter().zip(0_i64..).find(|(p, i)| **p != *i) {
            return Err(BoardError::PositionConflict {
                board_id,
                message: format!("position {} is missing or duplicated", expected),
            }
            .into());
        }

        for (item_id, position) in changes {
            tx.execute(
                "UPDATE cards SET position = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![position, item_id],
            )
            .context("Failed to update card position")?;
        }
        tx.commit().context("Failed to commit position update")?;

        self.board_positions(board_id)
    }
}

fn card_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Card> {
    Ok(Card {
        id: row.get(0)?,
        board_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        position: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────
