//! Optimistic card move: `roadmap move`.
//!
//! Mounts the board in an `OptimisticMoveController`, applies the move
//! locally, waits for the server's answer and prints the settled order.

use anyhow::{Context, Result, anyhow, bail};
use roadmap::board::Card;
use roadmap::config::RoadmapConfig;
use roadmap::reorder::{ControllerConfig, MoveIntent, MoveOutcome, OptimisticMoveController, OrderedCollection};

pub async fn cmd_move(config: &RoadmapConfig, board_id: i64, card_id: i64, to: usize) -> Result<()> {
    let client = super::board_client(config)?;
    let controller = OptimisticMoveController::load(
        client.for_board(board_id),
        ControllerConfig {
            timeout: config.request_timeout(),
            ..ControllerConfig::default()
        },
    )
    .await
    .with_context(|| format!("Failed to load board {}", board_id))?;

    let collection = controller
        .collection()
        .context("Board view is not mounted")?;
    let from = collection
        .position_of(&card_id)
        .ok_or_else(|| anyhow!("Card {} is not on board {}", card_id, board_id))?;
    if to >= collection.len() {
        bail!(
            "Target index {} is out of range: board {} has {} cards",
            to,
            board_id,
            collection.len()
        );
    }

    let outcome = controller
        .move_item(MoveIntent::new(card_id, from, to))
        .await?;

    match &outcome {
        MoveOutcome::Noop => println!("Card {} is already at index {}", card_id, to),
        MoveOutcome::Confirmed => println!(
            "{} card {} from {} to {}",
            console::style("Moved").green().bold(),
            card_id,
            from,
            to
        ),
        MoveOutcome::Resynced(stale) => println!(
            "{} board changed underneath this move ({}); showing the server's order",
            console::style("Resynced:").yellow().bold(),
            stale
        ),
        MoveOutcome::RolledBack(err) => println!(
            "{} {}",
            console::style("Rolled back:").red().bold(),
            err
        ),
        MoveOutcome::Discarded => {}
    }

    if let Some(collection) = controller.collection() {
        print_order(&collection);
    }

    match outcome {
        MoveOutcome::RolledBack(err) => Err(err).context("Move was not persisted"),
        _ => Ok(()),
    }
}

fn print_order(collection: &OrderedCollection<Card>) {
    for entry in collection.iter() {
        println!(
            "  {:>3}. {} {}",
            entry.position,
            console::style(format!("#{}", entry.item.id)).dim(),
            entry.item.title
        );
    }
}
