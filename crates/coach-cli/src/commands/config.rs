/// Configuration management command handlers
use anyhow::{Context, Result};
use clap::Subcommand;

use coach_core::CoachConfig;

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the default configuration file (keeps an existing one unless forced)
    Init {
        #[arg(short, long)]
        force: bool,
    },
}

pub fn handle_config_command(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => show_config(),
        ConfigAction::Init { force } => init_config(force),
    }
}

fn show_config() -> Result<()> {
    let path = CoachConfig::config_path()?;
    let config = CoachConfig::load()?;

    if path.exists() {
        println!("# {}", path.display());
    } else {
        println!("# {} (not found, showing defaults)", path.display());
    }
    println!("{}", render(&config)?);
    Ok(())
}

fn init_config(force: bool) -> Result<()> {
    let path = CoachConfig::config_path()?;
    if path.exists() && !force {
        println!("Config already exists at {}", path.display());
        println!("Use --force to overwrite it with defaults.");
        return Ok(());
    }

    let written = CoachConfig::default().save()?;
    println!("Wrote default config to {}", written.display());
    Ok(())
}

fn render(config: &CoachConfig) -> Result<String> {
    let mut shown = config.clone();
    if let Some(key) = shown.ai.api_key.as_mut() {
        let visible: String = key.chars().take(4).collect();
        *key = format!("{visible}***");
    }
    toml::to_string_pretty(&shown).context("Failed to render config")
}
