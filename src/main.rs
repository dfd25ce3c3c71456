//! Replays a recorded landmark trace through the proctoring signal engine.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use proctor_signals::{
    config::Config,
    replay::{read_trace, replay_trace, write_reports},
    Error,
};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON-lines trace of recorded frames
    #[arg(required_unless_present = "print_config")]
    trace: Option<PathBuf>,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Print the example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    if args.print_config {
        print!("{}", proctor_signals::config::EXAMPLE_CONFIG);
        return Ok(());
    }

    let config = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {}", config_path.display());
        match Config::from_file(config_path) {
            Ok(cfg) => cfg,
            Err(Error::Io(e)) => {
                log::warn!("Cannot read config file: {}. Using defaults.", e);
                Config::default()
            }
            Err(e) => return Err(e).context("Invalid configuration"),
        }
    } else {
        Config::default()
    };

    let mut session = config.create_session().context("Invalid configuration")?;

    let Some(trace) = args.trace else {
        anyhow::bail!("No trace file given");
    };
    let file = File::open(&trace).with_context(|| format!("Cannot open trace {}", trace.display()))?;
    let records = read_trace(BufReader::new(file))?;
    info!("Replaying {} frames from {}", records.len(), trace.display());

    let reports = replay_trace(&mut session, &records, Instant::now())?;
    write_reports(&reports, io::stdout().lock())?;

    let alert_frames = reports.iter().filter(|r| !r.alerts.is_empty()).count();
    let pose_failures = reports
        .iter()
        .filter(|r| r.landmarks_present && r.head_pose.is_none())
        .count();
    info!(
        "Replay finished: {} frames, {} gaze movements, {} alert frames, {} unsolved poses",
        reports.len(),
        session.gaze().total_movements(),
        alert_frames,
        pose_failures
    );

    Ok(())
}
