use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "roadmap")]
#[command(version, about = "Reorderable roadmap board with optimistic card moves")]
pub struct Cli {
    /// Log at debug level (RUST_LOG still wins when set)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Board server URL. Overrides ROADMAP_SERVER_URL and roadmap.toml.
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// Email to act as. Overrides ROADMAP_USER and roadmap.toml.
    #[arg(long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the board server
    Serve {
        /// Port to serve on (defaults to roadmap.toml, then 3142)
        #[arg(short, long)]
        port: Option<u16>,

        /// Database path (defaults to roadmap.toml, then .roadmap/board.db)
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Enable dev mode (permissive CORS for a local UI dev server)
        #[arg(long)]
        dev: bool,

        /// Initialize the database only (don't start the server)
        #[arg(long)]
        init: bool,
    },
    /// List or create boards
    Boards {
        #[command(subcommand)]
        command: BoardsCommands,
    },
    /// List, add or remove cards
    Cards {
        #[command(subcommand)]
        command: CardsCommands,
    },
    /// Move a card to a new index on its board
    Move {
        /// Board id
        board: i64,
        /// Card id
        card: i64,
        /// Target index (0 is the top of the board)
        #[arg(long)]
        to: usize,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum BoardsCommands {
    /// List all boards
    List,
    /// Create a board
    Create { name: String },
}

#[derive(Subcommand, Clone)]
pub enum CardsCommands {
    /// List the cards of a board in order
    List { board: i64 },
    /// Append a card to a board
    Add {
        board: i64,
        title: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Remove a card
    Remove { card: i64 },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default roadmap.toml file
    Init,
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "roadmap=debug" } else { "roadmap=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Serve {
            port,
            db_path,
            dev,
            init,
        } => {
            let config = cmd::load_config(&cli, project_dir)?;
            cmd::cmd_serve(&config, *port, db_path.clone(), *dev, *init).await?;
        }
        Commands::Boards { command } => {
            let config = cmd::load_config(&cli, project_dir)?;
            cmd::cmd_boards(&config, command.clone()).await?;
        }
        Commands::Cards { command } => {
            let config = cmd::load_config(&cli, project_dir)?;
            cmd::cmd_cards(&config, command.clone()).await?;
        }
        Commands::Move { board, card, to } => {
            let config = cmd::load_config(&cli, project_dir)?;
            cmd::cmd_move(&config, *board, *card, *to).await?;
        }
        Commands::Config { command } => {
            cmd::cmd_config(&cli, &project_dir, command.clone())?;
        }
    }

    Ok(())
}
