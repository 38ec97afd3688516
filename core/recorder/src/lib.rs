//! match-recorder: records card game sessions from the game client's local API.
//!
//! The recorder polls `game-result` until a game is on record, captures the
//! players and a deduplicated series of card-rectangle frames from
//! `positional-rectangles`, and writes each finished game to
//! `<gameID>.json`. `cache.json` carries game numbering across restarts.

pub mod artifacts;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod machine;
pub mod recorder;

pub use error::{RecorderError, Result};
