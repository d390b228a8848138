use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "bookflip")]
#[command(version, about = "Staged close, flip, save, flip back, open transition runner")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Directory holding bookflip.toml (defaults to the current directory)
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one or more transition sequences against the reference visual layers
    Run {
        /// Number of sequences to run back to back
        #[arg(short = 'n', long, default_value = "1")]
        cycles: u32,

        /// How long the simulated save takes (overrides [demo] save_delay_ms)
        #[arg(long)]
        save_delay_ms: Option<u64>,

        /// Make the simulated save fail
        #[arg(long)]
        fail: bool,

        /// Report a failure during the wait window after the save succeeded
        #[arg(long, conflicts_with = "fail")]
        late_failure: bool,

        /// Give up on a save that has not settled after this many milliseconds
        #[arg(long)]
        save_timeout_ms: Option<u64>,

        #[arg(long)]
        scale_transition_ms: Option<u64>,

        #[arg(long)]
        cover_flip_ms: Option<u64>,

        #[arg(long)]
        minimum_wait_ms: Option<u64>,

        #[arg(long)]
        result_display_ms: Option<u64>,

        /// Rotation animation length for the book layer
        #[arg(long)]
        rotation_ms: Option<u64>,

        /// Lift animation length for the book layer
        #[arg(long)]
        lift_ms: Option<u64>,

        /// Print sequence reports as JSON instead of drawing progress bars
        #[arg(long)]
        json: bool,
    },
    /// List the phases of one sequence with their exit triggers
    Phases {
        #[arg(long)]
        json: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default bookflip.toml file
    Init,
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let default = if verbose { "bookflip=debug" } else { "bookflip=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(e) = installed {
        eprintln!("Failed to install log subscriber: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    let config_dir = match cli.config_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Run {
            cycles,
            save_delay_ms,
            fail,
            late_failure,
            save_timeout_ms,
            scale_transition_ms,
            cover_flip_ms,
            minimum_wait_ms,
            result_display_ms,
            rotation_ms,
            lift_ms,
            json,
        } => {
            let options = cmd::RunOptions {
                cycles: *cycles,
                save_delay_ms: *save_delay_ms,
                fail: *fail,
                late_failure: *late_failure,
                save_timeout_ms: *save_timeout_ms,
                overrides: bookflip::config::TimingOverrides {
                    scale_transition_ms: *scale_transition_ms,
                    cover_flip_ms: *cover_flip_ms,
                    minimum_wait_ms: *minimum_wait_ms,
                    result_display_ms: *result_display_ms,
                },
                rotation_ms: *rotation_ms,
                lift_ms: *lift_ms,
                json: *json,
            };
            cmd::cmd_run(&config_dir, &cli, options).await?;
        }
        Commands::Phases { json } => cmd::cmd_phases(&config_dir, *json)?,
        Commands::Config { command } => cmd::cmd_config(&config_dir, command.clone())?,
    }

    Ok(())
}
