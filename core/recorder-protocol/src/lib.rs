//! Wire and document types for match-recorder.
//!
//! Covers both sides of the recorder: the JSON the game client's local API
//! serves, and the JSON documents the recorder writes to disk. Keeping them in
//! one crate prevents the artifact schema from drifting between the writer and
//! anything that reads artifacts back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_PORT: u16 = 21337;
pub const DEFAULT_HOST: &str = "localhost";

pub const CACHE_FILE_NAME: &str = "cache.json";
pub const LOG_FILE_NAME: &str = "log.txt";

/// File name prefix for artifacts flushed by an interrupt instead of a game end.
pub const INTERRUPT_TAG: &str = "IncompleteByShutdown";

/// The parameterless GET endpoints exposed by the game client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    GameResult,
    PositionalRectangles,
    StaticDecklist,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::GameResult => "game-result",
            Endpoint::PositionalRectangles => "positional-rectangles",
            Endpoint::StaticDecklist => "static-decklist",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// `GET /game-result`. `LocalPlayerWon` stays null until a game is on record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct GameResult {
    #[serde(rename = "GameID", default)]
    pub game_id: Option<i64>,
    #[serde(rename = "LocalPlayerWon", default)]
    pub local_player_won: Option<bool>,
}

impl GameResult {
    pub fn is_decided(&self) -> bool {
        self.local_player_won.is_some()
    }
}

/// `GET /positional-rectangles`. `PlayerName` is null outside of a match.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PositionalRectangles {
    #[serde(default)]
    pub player_name: Option<String>,
    #[serde(default)]
    pub opponent_name: Option<String>,
    #[serde(default)]
    pub screen: Option<Value>,
    #[serde(default)]
    pub rectangles: Option<Value>,
}

/// One finished (or interrupted) game, as written to `<tag><gameID>.json`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionArtifact {
    pub player_name: Option<String>,
    pub opponent_name: Option<String>,
    pub screen: Option<Value>,
    pub active_deck: Option<Value>,
    pub card_positions: Vec<Value>,
}

/// `cache.json`: lets a restarted recorder continue game numbering.
///
/// `game_id` is the last ID handed out, so the next game found is `game_id + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResumptionCache {
    #[serde(rename = "gameID")]
    pub game_id: u64,
    pub port: u16,
}

/// File name for a session artifact. An empty tag marks a normal game end.
pub fn artifact_file_name(tag: Option<&str>, game_id: u64) -> String {
    format!("{}{}.json", tag.unwrap_or_default(), game_id)
}
