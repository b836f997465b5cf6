mod app;
mod assets;
mod keys;

use std::path::PathBuf;

use clap::Parser;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use app::{App, AppOptions};

/// Breaking continuous flash suppression trial runner
#[derive(Parser, Debug)]
#[command(name = "bcfs")]
#[command(author, version, about = "Breaking continuous flash suppression trial runner", long_about = None)]
struct Cli {
    /// Experiment configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Logging verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Practice transcript to estimate the suppressor side from; skips
    /// straight to the main block
    #[arg(long)]
    resume_from: Option<PathBuf>,

    /// Run in a window instead of fullscreen
    #[arg(long)]
    windowed: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("bcfs v{}", env!("CARGO_PKG_VERSION"));
    info!(platform = std::env::consts::OS, arch = std::env::consts::ARCH);

    let app = App::new(AppOptions {
        config_path: cli.config,
        resume_from: cli.resume_from,
        windowed: cli.windowed,
    })?;
    app.run()?;

    Ok(())
}
