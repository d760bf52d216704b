use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use simstore::commands::{self, ArrangeArgs, ExperimentArgs};
use simstore::{Config, init_logging};

#[derive(Parser, Debug)]
#[command(name = "simstore")]
#[command(about = "Inspect and arrange saved simulation experiments")]
struct Args {
    /// Path to the config file (default: {config_dir}/simstore/simstore.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the experiments (default: ap_output)
    #[arg(short, long, global = true)]
    path: Option<PathBuf>,

    /// Log level (debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List saved experiments
    List,
    /// Summarize the contents of an experiment
    Inspect(ExperimentArgs),
    /// Arrange an experiment into one table and write it as CSV
    Arrange(ArrangeArgs),
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?.with_overrides(args.path, args.log_level);

    init_logging(&config.log_level, args.log_file.as_deref())?;
    tracing::debug!(?config, "Starting simstore");

    let stdout = io::stdout();
    match &args.command {
        Command::List => commands::list(&config, stdout.lock()),
        Command::Inspect(experiment) => commands::inspect(&config, experiment, stdout.lock()),
        Command::Arrange(arrange) => commands::arrange(&config, arrange, stdout.lock()),
    }
}
