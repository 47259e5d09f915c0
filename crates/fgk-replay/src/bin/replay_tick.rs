use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use fgk_replay::{run_payload, ReplayPayload};

/// Replay one serialized tick and print its event stream.
#[derive(Parser)]
#[command(name = "replay_tick")]
struct Cli {
    /// Path to the serialized tick payload (JSON).
    payload: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    // clap exits with code 2 on usage errors.
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("replay_tick: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&cli.payload)?;
    let payload: ReplayPayload = serde_json::from_str(&raw)?;

    let result = run_payload(&payload)?;

    println!("correlation_id: {}", result.correlation_id);
    println!("snapshot_hash: {}", result.snapshot_hash);
    println!("events:");
    for event in &result.events {
        println!("  {}", serde_json::to_string(event)?);
    }
    if !result.execution_records.is_empty() {
        println!("execution_records:");
        for record in &result.execution_records {
            println!("  {}", serde_json::to_string(record)?);
        }
    }

    Ok(())
}
