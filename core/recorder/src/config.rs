//! Startup configuration.
//!
//! Precedence for the port: CLI argument, then the resumption cache, then
//! [`DEFAULT_PORT`]. The starting game ID only ever comes from the cache.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use match_recorder_protocol::{ResumptionCache, DEFAULT_HOST, DEFAULT_PORT};
use tracing::warn;

use crate::machine::Intervals;

#[derive(Debug, Parser)]
#[command(name = "match-recorder")]
#[command(about = "Records card game sessions from the game client's local API")]
#[command(version)]
pub struct Cli {
    /// Port the game client API listens on
    #[arg(value_name = "PORT")]
    pub port: Option<u16>,

    /// Host the game client API listens on
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Directory for session artifacts, cache.json and log.txt
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Seconds between game-result polls while waiting for a game
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub game_result_interval_secs: u64,

    /// Seconds between position polls while recording
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub position_interval_secs: u64,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 5)]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderConfig {
    pub host: String,
    pub port: u16,
    /// Last game ID handed out by a previous run.
    pub last_game_id: u64,
    pub output_dir: PathBuf,
    pub intervals: Intervals,
    pub request_timeout: Duration,
}

impl RecorderConfig {
    pub fn resolve(cli: &Cli, cache: Option<ResumptionCache>) -> Self {
        let port = match (cli.port, cache) {
            (Some(port), _) => port,
            (None, cached) => {
                warn!("No port provided");
                cached.map(|cache| cache.port).unwrap_or(DEFAULT_PORT)
            }
        };

        Self {
            host: cli.host.clone(),
            port,
            last_game_id: cache.map(|cache| cache.game_id).unwrap_or(0),
            output_dir: cli.output_dir.clone(),
            intervals: Intervals {
                game_result: Duration::from_secs(cli.game_result_interval_secs),
                positions: Duration::from_secs(cli.position_interval_secs),
            },
            request_timeout: Duration::from_secs(cli.request_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["match-recorder"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).expect("parse cli")
    }

    #[test]
    fn defaults_without_argument_or_cache() {
        let config = RecorderConfig::resolve(&parse(&[]), None);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 21337);
        assert_eq!(config.last_game_id, 0);
        assert_eq!(config.output_dir, PathBuf::from("."));
        assert_eq!(config.intervals, Intervals::default());
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn cache_supplies_port_and_game_id() {
        let cache = ResumptionCache {
            game_id: 7,
            port: 9000,
        };
        let config = RecorderConfig::resolve(&parse(&[]), Some(cache));
        assert_eq!(config.port, 9000);
        assert_eq!(config.last_game_id, 7);
    }

    #[test]
    fn cli_port_overrides_cache() {
        let cache = ResumptionCache {
            game_id: 7,
            port: 9000,
        };
        let config = RecorderConfig::resolve(&parse(&["4242"]), Some(cache));
        assert_eq!(config.port, 4242);
        assert_eq!(config.last_game_id, 7);
    }

    #[test]
    fn non_numeric_port_is_rejected() {
        assert!(Cli::try_parse_from(["match-recorder", "abc"]).is_err());
    }

    #[test]
    fn zero_intervals_are_rejected() {
        assert!(Cli::try_parse_from(["match-recorder", "--game-result-interval-secs", "0"]).is_err());
        assert!(Cli::try_parse_from(["match-recorder", "--position-interval-secs", "0"]).is_err());
    }

    #[test]
    fn interval_flags_are_applied() {
        let cli = parse(&[
            "--game-result-interval-secs",
            "2",
            "--position-interval-secs",
            "1",
            "--output-dir",
            "/tmp/games",
        ]);
        let config = RecorderConfig::resolve(&cli, None);
        assert_eq!(config.intervals.game_result, Duration::from_secs(2));
        assert_eq!(config.intervals.positions, Duration::from_secs(1));
        assert_eq!(config.output_dir, PathBuf::from("/tmp/games"));
    }
}
