//! Board listing and creation: `roadmap boards`.

use anyhow::Result;

use super::super::BoardsCommands;
use roadmap::config::RoadmapConfig;

pub async fn cmd_boards(config: &RoadmapConfig, command: BoardsCommands) -> Result<()> {
    let client = super::board_client(config)?;

    match command {
        BoardsCommands::List => {
            let boards = client.list_boards().await?;
            if boards.is_empty() {
                println!("No boards yet. Create one with 'roadmap boards create <name>'.");
                return Ok(());
            }
            println!("{}", console::style("Boards").bold().cyan());
            for board in boards {
                println!(
                    "  {:>4}  {}  {}",
                    board.id,
                    board.name,
                    console::style(format!("created {}", board.created_at)).dim()
                );
            }
        }
        BoardsCommands::Create { name } => {
            let board = client.create_board(&name).await?;
            println!("Created board {} '{}'", board.id, board.name);
        }
    }

    Ok(())
}
