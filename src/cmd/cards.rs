//! Card listing, creation and removal: `roadmap cards`.

use anyhow::Result;

use super::super::CardsCommands;
use roadmap::board::Card;
use roadmap::config::RoadmapConfig;

pub async fn cmd_cards(config: &RoadmapConfig, command: CardsCommands) -> Result<()> {
    let client = super::board_client(config)?;

    match command {
        CardsCommands::List { board } => {
            let cards = client.list_cards(board).await?;
            if cards.is_empty() {
                println!("Board {} has no cards.", board);
                return Ok(());
            }
            for card in &cards {
                print_card(card);
            }
        }
        CardsCommands::Add {
            board,
            title,
            description,
        } => {
            let card = client
                .create_card(board, &title, description.as_deref())
                .await?;
            println!(
                "Added card {} '{}' at position {}",
                card.id, card.title, card.position
            );
        }
        CardsCommands::Remove { card } => {
            client.delete_card(card).await?;
            println!("Removed card {}", card);
        }
    }

    Ok(())
}

pub(crate) fn print_card(card: &Card) {
    println!(
        "  {:>3}. {} {}",
        card.position,
        console::style(format!("#{}", card.id)).dim(),
        card.title
    );
}
