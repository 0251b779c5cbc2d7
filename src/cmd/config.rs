//! Configuration view and validation commands: `roadmap config`.

use std::path::Path;

use anyhow::{Context, Result};
use roadmap::config::{CONFIG_DIR, CONFIG_FILE, RoadmapToml};

use super::super::{Cli, ConfigCommands};

pub fn cmd_config(cli: &Cli, project_dir: &Path, command: Option<ConfigCommands>) -> Result<()> {
    let roadmap_dir = project_dir.join(CONFIG_DIR);
    let config_path = roadmap_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Roadmap Configuration");
            println!("=====================");
            println!();

            let toml = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                RoadmapToml::load(&config_path)?
            } else {
                println!("No roadmap.toml found at {}", config_path.display());
                println!("Using default configuration.");
                RoadmapToml::default()
            };
            println!();

            println!("[server]");
            println!("  host = \"{}\"", toml.server.host);
            println!("  port = {}", toml.server.port);
            println!("  db_path = \"{}\"", toml.server.db_path.display());
            println!();

            println!("[client]");
            println!("  base_url = \"{}\"", toml.client.base_url);
            println!("  request_timeout_ms = {}", toml.client.request_timeout_ms);
            if let Some(user) = &toml.client.user {
                println!("  user = \"{}\"", user);
            }
            println!();

            println!("[access]");
            println!("  open = {}", toml.access.open);
            for user in &toml.access.users {
                println!(
                    "  {} (access: {}, edit: {})",
                    user.email, user.can_access_roadmap_board, user.can_edit_roadmap_board
                );
            }
            println!();

            if project_dir.exists() {
                let config = super::load_config(cli, project_dir.to_path_buf())?;
                println!("Effective values (with env/CLI overrides):");
                println!("  server_url = \"{}\"", config.server_url());
                match config.user() {
                    Some(user) => println!("  user = \"{}\"", user),
                    None => println!("  user = (anonymous)"),
                }
                println!("  db_path = \"{}\"", config.db_path().display());
                println!();
            }

            if !config_path.exists() {
                println!("Run 'roadmap config init' to create a roadmap.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No roadmap.toml found. Using defaults (valid).");
                return Ok(());
            }

            let toml = RoadmapToml::load(&config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("roadmap.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            std::fs::create_dir_all(&roadmap_dir)
                .with_context(|| format!("Failed to create {}", roadmap_dir.display()))?;
            RoadmapToml::default().save(&config_path)?;

            println!("Created roadmap.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [server] host, port, db_path");
            println!("  - [client] base_url, request_timeout_ms, user");
            println!("  - [access] open, [[access.users]] permissions");
            println!();
        }
    }

    Ok(())
}

