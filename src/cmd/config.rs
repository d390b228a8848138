//! Configuration view and validation commands: `bookflip config`.

use anyhow::Result;
use bookflip::config::{BookflipConfig, BookflipToml, CONFIG_FILE, TransitionTimings};
use std::path::Path;

use super::super::ConfigCommands;

fn print_timings(timings: &TransitionTimings) {
    println!(
        "  scale_transition_duration_ms = {}",
        timings.scale_transition_duration_ms
    );
    println!("  cover_flip_duration_ms = {}", timings.cover_flip_duration_ms);
    println!(
        "  minimum_wait_after_lift_ms = {}",
        timings.minimum_wait_after_lift_ms
    );
    println!(
        "  result_display_duration_ms = {}",
        timings.result_display_duration_ms
    );
}

pub fn cmd_config(config_dir: &Path, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = config_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Bookflip Configuration");
            println!("======================");
            println!();

            let toml = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                BookflipToml::load(&config_path)?
            } else {
                println!("No {} found at {}", CONFIG_FILE, config_path.display());
                println!("Using default configuration.");
                BookflipToml::default()
            };
            println!();

            println!("[timings]");
            print_timings(&toml.timings);
            println!();

            println!("[demo]");
            println!("  rotation_ms = {}", toml.demo.rotation_ms);
            println!("  lift_ms = {}", toml.demo.lift_ms);
            println!("  save_delay_ms = {}", toml.demo.save_delay_ms);
            println!();

            println!("Effective timings (with env overrides):");
            let config = BookflipConfig::new(config_dir.to_path_buf())?;
            print_timings(&config.timings()?);
            println!();

            if !config_path.exists() {
                println!("Run 'bookflip config init' to create a {} file.", CONFIG_FILE);
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No {} found. Using defaults (valid).", CONFIG_FILE);
                return Ok(());
            }

            let toml = BookflipToml::load(&config_path)?;
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
                println!("{} already exists at {}", CONFIG_FILE, config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if !config_dir.exists() {
                std::fs::create_dir_all(config_dir)?;
            }

            BookflipToml::default().save(&config_path)?;

            println!("Created {} at {}", CONFIG_FILE, config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [timings] scale, cover flip, minimum wait, result display");
            println!("  - [demo] rotation, lift, simulated save delay");
            println!();
        }
    }

    Ok(())
}
