//! Phase graph listing: `bookflip phases`.

use anyhow::Result;
use bookflip::config::BookflipConfig;
use bookflip::machine::{Trigger, exit_trigger};
use bookflip::phase::Phase;
use serde_json::json;
use std::path::Path;

pub fn cmd_phases(config_dir: &Path, as_json: bool) -> Result<()> {
    let config = BookflipConfig::new(config_dir.to_path_buf())?;
    let timings = config.timings()?;

    if as_json {
        let phases: Vec<_> = Phase::ALL
            .iter()
            .map(|phase| {
                let trigger = exit_trigger(*phase);
                let dwell_ms = match trigger {
                    Trigger::Dwell { dwell } => Some(timings.dwell(dwell).as_millis() as u64),
                    _ => None,
                };
                json!({
                    "phase": phase,
                    "exit": trigger,
                    "dwell_ms": dwell_ms,
                    "mirror": phase.mirror(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&phases)?);
        return Ok(());
    }

    println!();
    println!("{:<20} {:<28} Mirror", "Phase", "Leaves on");
    println!("{:<20} {:<28} ------", "-".repeat(20), "-".repeat(28));
    for phase in Phase::ALL {
        let trigger = exit_trigger(phase);
        let leaves_on = match trigger {
            Trigger::Dwell { dwell } => {
                format!("{} ({}ms)", trigger, timings.dwell(dwell).as_millis())
            }
            _ => trigger.to_string(),
        };
        let mirror = phase
            .mirror()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<20} {:<28} {}", phase.as_str(), leaves_on, mirror);
    }
    println!();
    Ok(())
}
