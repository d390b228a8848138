use crate::errors::TransitionError;
use crate::machine;
use crate::orchestrator::SequenceReport;
use crate::phase::{Phase, SequenceId};
use crate::store::PhaseSnapshot;
use crate::ui::icons::{BOOK, CHECK, CLOCK, CROSS, FLIP, SAVE, SPARKLE, WARN};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// Terminal UI for a run of transition sequences, rendered via `indicatif`.
///
/// Two bars are stacked vertically:
/// - Phase bar: position along the success walk of the current sequence
/// - Visual bar: spinner with the requested scale and cover direction
pub struct TransitionUI {
    multi: MultiProgress,
    phase_bar: ProgressBar,
    visual_bar: ProgressBar,
    verbose: bool,
    path: Vec<Phase>,
}

impl TransitionUI {
    /// Create the UI with the phase bar sized to one full sequence.
    ///
    /// When `verbose` is set every phase change is also printed as a line.
    pub fn new(verbose: bool) -> Self {
        let multi = MultiProgress::new();
        let path = machine::happy_path();

        let phase_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let phase_bar = multi.add(ProgressBar::new(path.len() as u64));
        phase_bar.set_style(phase_style);
        phase_bar.set_prefix("Phases");

        let visual_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .expect("progress bar template is a valid static string");

        let visual_bar = multi.add(ProgressBar::new_spinner());
        visual_bar.set_style(visual_style);
        visual_bar.set_prefix("  Book");

        Self {
            multi,
            phase_bar,
            visual_bar,
            verbose,
            path,
        }
    }

    /// A UI that draws nothing, for `--json` output and non-interactive runs.
    pub fn hidden() -> Self {
        let ui = Self::new(false);
        ui.multi
            .set_draw_target(indicatif::ProgressDrawTarget::hidden());
        ui
    }

    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    /// Reset the bars for a new sequence.
    pub fn sequence_started(&self, sequence: SequenceId, cycle: u32, cycles: u32) {
        self.phase_bar.reset();
        self.phase_bar.set_message(format!(
            "{} {} {}",
            SAVE,
            style(sequence).cyan(),
            style(format!("(cycle {}/{})", cycle, cycles)).dim()
        ));
        self.visual_bar
            .enable_steady_tick(Duration::from_millis(100));
    }

    /// Position of `phase` along the success walk, counted from 1.
    pub fn progress_of(&self, phase: Phase) -> u64 {
        if phase.is_idle() {
            return 0;
        }
        self.path
            .iter()
            .position(|p| *p == phase)
            .map(|i| i as u64 + 1)
            .unwrap_or(0)
    }

    /// Render one store update.
    pub fn render(&self, snapshot: &PhaseSnapshot) {
        if !snapshot.phase.is_idle() {
            self.phase_bar.set_position(self.progress_of(snapshot.phase));
            self.phase_bar.set_message(format!(
                "{} {}",
                style(snapshot.sequence).cyan(),
                style(snapshot.phase).yellow()
            ));
        }
        self.visual_bar.set_message(format!(
            "{}scale {} {}cover {} {}",
            BOOK,
            style(snapshot.scale).cyan(),
            FLIP,
            style(snapshot.direction).cyan(),
            style(format!("(flip #{})", snapshot.direction_trigger)).dim()
        ));
        if self.verbose {
            self.print_line(format!(
                "    {} {} {}",
                style("→").dim(),
                style(snapshot.sequence).dim(),
                style(snapshot.phase).dim()
            ));
        }
    }

    /// Print a completion line with the time spent in each phase.
    pub fn sequence_complete(&self, report: &SequenceReport) {
        self.phase_bar.set_position(self.path.len() as u64);
        self.print_line(format!(
            "{} Sequence {} complete in {}",
            SPARKLE,
            style(report.sequence).green().bold(),
            style(format!("{}ms", report.elapsed.as_millis())).cyan()
        ));
        if self.verbose {
            for stamp in &report.trail {
                self.print_line(format!(
                    "    {} {:>6}ms {}",
                    CLOCK,
                    stamp.at.as_millis(),
                    stamp.phase
                ));
            }
        }
    }

    /// Print a failure banner without advancing the phase bar.
    pub fn sequence_failed(&self, sequence: SequenceId, error: &TransitionError) {
        let icon = if error.is_save_failure() { CROSS } else { WARN };
        self.print_line(format!(
            "{} Sequence {} failed: {}",
            icon,
            style(sequence).red().bold(),
            error
        ));
    }

    /// Stop the spinners and print the run summary.
    pub fn finish(&self, completed: u32, failed: u32) {
        self.visual_bar.finish_and_clear();
        let summary = format!(
            "{} completed, {} failed",
            style(completed).green(),
            style(failed).red()
        );
        if failed == 0 {
            self.phase_bar
                .finish_with_message(format!("{} {}", CHECK, summary));
        } else {
            self.phase_bar
                .finish_with_message(format!("{} {}", CROSS, summary));
        }
    }
}
