//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module       | Commands handled              |
//! |--------------|-------------------------------|
//! | `serve`      | `Serve`                       |
//! | `boards`     | `Boards`                      |
//! | `cards`      | `Cards`                       |
//! | `move_card`  | `Move`                        |
//! | `config`     | `Config`                      |

pub mod boards;
pub mod cards;
pub mod config;
pub mod move_card;
pub mod serve;

pub use boards::cmd_boards;
pub use cards::cmd_cards;
pub use config::cmd_config;
pub use move_card::cmd_move;
pub use serve::cmd_serve;

use std::path::PathBuf;

use anyhow::{Context, Result};
use roadmap::board::HttpBoardClient;
use roadmap::config::RoadmapConfig;

use crate::Cli;

/// Resolve configuration from roadmap.toml, the environment and global flags.
pub fn load_config(cli: &Cli, project_dir: PathBuf) -> Result<RoadmapConfig> {
    RoadmapConfig::with_cli_args(project_dir, cli.server.clone(), cli.user.clone())
}

/// HTTP client for the configured board server.
pub fn board_client(config: &RoadmapConfig) -> Result<HttpBoardClient> {
    let url = config.server_url();
    HttpBoardClient::new(&url, config.user(), config.request_timeout())
        .with_context(|| format!("Failed to create client for {}", url))
}
