//! Demo sequence runner: `bookflip run`.

use anyhow::{Context, Result};
use bookflip::config::{BookflipConfig, TimingOverrides};
use bookflip::observer::{BookLayer, CoverLayer, ObserverHost};
use bookflip::orchestrator::{Orchestrator, SequenceHandle};
use bookflip::phase::Phase;
use bookflip::save;
use bookflip::store::PhaseStore;
use bookflip::ui::TransitionUI;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use super::super::Cli;

/// Flags of the `run` subcommand.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub cycles: u32,
    pub save_delay_ms: Option<u64>,
    pub fail: bool,
    pub late_failure: bool,
    pub save_timeout_ms: Option<u64>,
    pub overrides: TimingOverrides,
    pub rotation_ms: Option<u64>,
    pub lift_ms: Option<u64>,
    pub json: bool,
}

async fn simulated_save(delay: Duration, fail: bool) -> Result<()> {
    tokio::time::sleep(delay).await;
    if fail {
        anyhow::bail!("simulated save failure");
    }
    Ok(())
}

pub async fn cmd_run(config_dir: &Path, cli: &Cli, options: RunOptions) -> Result<()> {
    if options.cycles == 0 {
        anyhow::bail!("--cycles must be at least 1");
    }

    let config = BookflipConfig::with_overrides(config_dir.to_path_buf(), options.overrides)?;
    let timings = config.timings()?;
    let mut demo = config.demo();
    if let Some(ms) = options.rotation_ms {
        demo.rotation_ms = ms;
    }
    if let Some(ms) = options.lift_ms {
        demo.lift_ms = ms;
    }
    if let Some(ms) = options.save_delay_ms {
        demo.save_delay_ms = ms;
    }
    for warning in timings.validate().into_iter().chain(demo.validate()) {
        warn!("{}", warning);
    }
    info!(
        scale_ms = timings.scale_transition_duration_ms,
        cover_ms = timings.cover_flip_duration_ms,
        wait_ms = timings.minimum_wait_after_lift_ms,
        result_ms = timings.result_display_duration_ms,
        "effective timings"
    );

    let store = PhaseStore::new();
    let orchestrator = Orchestrator::spawn(store.clone(), timings);
    let settle = orchestrator.settle_handle();
    let book = ObserverHost::mount(
        &store,
        settle.clone(),
        BookLayer::new(demo.rotation(), demo.lift()),
    );
    let cover = ObserverHost::mount(&store, settle, CoverLayer::new());

    let ui = Arc::new(if options.json {
        TransitionUI::hidden()
    } else {
        TransitionUI::new(cli.verbose)
    });
    let mut updates = store.subscribe();
    let renderer = {
        let ui = ui.clone();
        tokio::spawn(async move {
            loop {
                match updates.recv().await {
                    Ok(snapshot) => ui.render(&snapshot),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        })
    };

    let mut completed = 0;
    let mut failed = 0;
    let mut last_error = None;

    for cycle in 1..=options.cycles {
        let delay = demo.save_delay();
        let fail = options.fail;
        let action = move || simulated_save(delay, fail);
        let handle = match options.save_timeout_ms {
            Some(ms) => {
                orchestrator
                    .start(save::with_timeout(action, Duration::from_millis(ms)))
                    .await?
            }
            None => orchestrator.start(action).await?,
        };
        let sequence = handle.id();
        ui.sequence_started(sequence, cycle, options.cycles);

        if options.late_failure {
            report_late_failure(&orchestrator, &handle).await?;
        }

        match handle.outcome().await {
            Ok(report) => {
                completed += 1;
                ui.sequence_complete(&report);
                if options.json {
                    println!("{}", serde_json::to_string(&report)?);
                }
            }
            Err(e) => {
                failed += 1;
                ui.sequence_failed(sequence, &e);
                if options.json {
                    println!(
                        "{}",
                        json!({ "sequence": sequence, "error": e.to_string() })
                    );
                }
                last_error = Some(e);
            }
        }
    }

    ui.finish(completed, failed);
    renderer.abort();
    book.unmount();
    cover.unmount();

    if let Some(e) = last_error {
        anyhow::bail!("{} of {} sequences failed: {}", failed, options.cycles, e);
    }
    Ok(())
}

/// Wait for the sequence to reach its wait window and report a failure there.
async fn report_late_failure(orchestrator: &Orchestrator, handle: &SequenceHandle) -> Result<()> {
    let sequence = handle.id();
    let mut watch = orchestrator.store().watch();
    let reached = watch
        .wait_for(|s| {
            s.sequence != sequence || s.phase == Phase::WaitingForResult || s.phase.is_idle()
        })
        .await
        .context("Phase store closed while waiting for the wait window")?
        .phase;
    if reached != Phase::WaitingForResult {
        warn!(sequence = %sequence, phase = %reached, "sequence never reached the wait window");
        return Ok(());
    }
    orchestrator
        .report_failure(anyhow::anyhow!("simulated late save failure"))
        .await?;
    Ok(())
}
