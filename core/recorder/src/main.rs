//! match-recorder entrypoint.
//!
//! Resolves configuration, then runs the poll chain until Ctrl-C. A recording
//! in progress at that point is written as an incomplete artifact.

use clap::Parser;
use tracing::{error, info, warn};

use match_recorder::artifacts::{load_resumption_cache, ArtifactWriter};
use match_recorder::client::HttpGameApi;
use match_recorder::config::{Cli, RecorderConfig};
use match_recorder::error::RecorderError;
use match_recorder::logging;
use match_recorder::machine::SessionMachine;
use match_recorder::recorder::Recorder;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let logging_guard = logging::init(&cli.output_dir);
    info!("Recorder started");

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(err) => {
            error!(error = %err, "Recorder failed to start");
            1
        }
    };

    drop(logging_guard);
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<(), RecorderError> {
    fs_err::create_dir_all(&cli.output_dir).map_err(|source| RecorderError::OutputDir {
        path: cli.output_dir.clone(),
        source,
    })?;

    let cache = load_resumption_cache(&cli.output_dir)?;
    let config = RecorderConfig::resolve(&cli, cache);
    let api = HttpGameApi::new(&config.host, config.port, config.request_timeout)?;

    info!(
        url = api.base_url(),
        last_game_id = config.last_game_id,
        output_dir = %config.output_dir.display(),
        resumed = cache.is_some(),
        "Polling game client"
    );

    let recorder = Recorder::new(
        api,
        SessionMachine::new(config.last_game_id, config.intervals),
        ArtifactWriter::new(&config.output_dir, config.port),
    );

    let report = recorder.run(interrupted()).await;
    info!(
        game_id = report.game_id,
        artifact = ?report.artifact,
        cache_saved = report.cache_saved,
        "Recorder stopped"
    );
    Ok(())
}

async fn interrupted() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        // Without a signal handler the recorder can only be killed; keep recording.
        warn!(error = %err, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Interrupt received");
}
