//! Session state machine.
//!
//! Owns the phase, the live session and the sample buffer. It never touches
//! the network, the filesystem or a clock: each operation consumes one settled
//! fetch result and answers with a [`Directive`] telling the driver what to
//! fetch next and how long to wait first.
//!
//! ```text
//! Inactive     ── game-result decided ─────────→ Acknowledged  (game_id += 1)
//! Acknowledged ── player name present ─────────→ Recording
//! Acknowledged ── player name null ────────────→ Inactive      (discard, restart)
//! Recording    ── new rectangles ──────────────→ Recording     (append unless duplicate)
//! Recording    ── positions unreachable ───────→ Recording     (retry after interval)
//! Recording    ── re-entry / interrupt ────────→ Inactive      (flush, restart)
//! Acknowledged ── re-entry ────────────────────→ Inactive      (no flush, restart)
//! ```

use std::time::Duration;

use match_recorder_protocol::{GameResult, PositionalRectangles, SessionArtifact};
use serde_json::Value;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Inactive,
    Acknowledged,
    Recording,
}

/// Fixed delays between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intervals {
    pub game_result: Duration,
    pub positions: Duration,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            game_result: Duration::from_secs(10),
            positions: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    FetchDeck,
    PollGameResult,
    PollPositions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Directive {
    pub action: Action,
    pub delay: Option<Duration>,
}

impl Directive {
    pub fn now(action: Action) -> Self {
        Self {
            action,
            delay: None,
        }
    }

    pub fn after(delay: Duration, action: Action) -> Self {
        Self {
            action,
            delay: Some(delay),
        }
    }
}

/// The live session. Cleared wholesale whenever the phase returns to Inactive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub player_name: Option<String>,
    pub opponent_name: Option<String>,
    pub screen: Option<Value>,
    pub active_deck: Option<Value>,
    pub samples: Vec<Value>,
}

impl Session {
    /// Appends `rectangles` unless it repeats the last stored sample.
    pub fn push_sample(&mut self, rectangles: Value) -> bool {
        if self.samples.last() == Some(&rectangles) {
            return false;
        }
        self.samples.push(rectangles);
        true
    }

    fn into_artifact(self) -> SessionArtifact {
        SessionArtifact {
            player_name: self.player_name,
            opponent_name: self.opponent_name,
            screen: self.screen,
            active_deck: self.active_deck,
            card_positions: self.samples,
        }
    }
}

/// A session taken out of the machine, ready for the artifact writer.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedSession {
    pub game_id: u64,
    pub artifact: SessionArtifact,
}

/// What re-entering the game-result poll found.
#[derive(Debug, Clone, PartialEq)]
pub enum Reentry {
    /// Nothing in flight; go ahead and poll.
    Ready,
    /// An acknowledgment never turned into a recording. Restart the cycle.
    Abandoned,
    /// A recording was in progress. Flush it, then restart the cycle.
    Finished(CompletedSession),
}

#[derive(Debug)]
pub struct SessionMachine {
    phase: Phase,
    game_id: u64,
    session: Session,
    intervals: Intervals,
}

impl SessionMachine {
    /// `last_game_id` is the last ID handed out; the next game found gets `last_game_id + 1`.
    pub fn new(last_game_id: u64, intervals: Intervals) -> Self {
        Self {
            phase: Phase::Inactive,
            game_id: last_game_id,
            session: Session::default(),
            intervals,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn game_id(&self) -> u64 {
        self.game_id
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// First directive of a fresh process.
    pub fn start(&self) -> Directive {
        Directive::now(Action::FetchDeck)
    }

    pub fn on_deck(&mut self, deck: Option<Value>) -> Directive {
        match deck {
            Some(deck) => {
                info!("Retrieved active deck");
                self.session.active_deck = Some(deck);
                Directive::now(Action::PollGameResult)
            }
            None => {
                debug!("Active deck unavailable, retrying");
                Directive::after(self.intervals.game_result, Action::FetchDeck)
            }
        }
    }

    pub fn reenter(&mut self) -> Reentry {
        match self.phase {
            Phase::Inactive => Reentry::Ready,
            Phase::Acknowledged => {
                info!(game_id = self.game_id, "Game lost, resetting game state");
                self.reset();
                Reentry::Abandoned
            }
            Phase::Recording => {
                info!(
                    game_id = self.game_id,
                    samples = self.session.samples.len(),
                    "Game ended, writing session and starting search again"
                );
                Reentry::Finished(self.finish())
            }
        }
    }

    pub fn on_game_result(&mut self, result: Option<GameResult>) -> Directive {
        debug_assert_eq!(self.phase, Phase::Inactive, "reenter runs before every game-result poll");

        if !result.is_some_and(|result| result.is_decided()) {
            return Directive::after(self.intervals.game_result, Action::PollGameResult);
        }

        self.game_id += 1;
        self.phase = Phase::Acknowledged;
        info!(game_id = self.game_id, "Game found");
        Directive::now(Action::PollPositions)
    }

    pub fn on_positions(&mut self, snapshot: Option<PositionalRectangles>) -> Directive {
        let snapshot = match snapshot {
            Some(snapshot) => snapshot,
            // An unreachable endpoint mid-game is not the end of the game.
            None if self.phase == Phase::Recording => {
                debug!(game_id = self.game_id, "Positions unavailable, retrying");
                return Directive::after(self.intervals.positions, Action::PollPositions);
            }
            None => PositionalRectangles::default(),
        };

        let Some(player_name) = snapshot.player_name else {
            return match self.phase {
                Phase::Acknowledged => {
                    info!(
                        game_id = self.game_id,
                        "No active match behind acknowledgment, restarting cycle"
                    );
                    self.reset();
                    Directive::after(self.intervals.game_result, Action::FetchDeck)
                }
                // Session end is handled when the chain re-enters the game-result poll.
                Phase::Recording => Directive::now(Action::PollGameResult),
                Phase::Inactive => Directive::after(self.intervals.game_result, Action::FetchDeck),
            };
        };

        match self.phase {
            Phase::Inactive => {
                warn!("Position poll arrived while Inactive; restarting cycle");
                return Directive::after(self.intervals.game_result, Action::FetchDeck);
            }
            Phase::Acknowledged => {
                info!(
                    game_id = self.game_id,
                    player = %player_name,
                    opponent = ?snapshot.opponent_name,
                    "Game acknowledged, player information recorded, starting rectangle gathering"
                );
                self.session.player_name = Some(player_name);
                self.session.opponent_name = snapshot.opponent_name;
                self.session.screen = snapshot.screen;
                self.phase = Phase::Recording;
            }
            Phase::Recording => {}
        }

        if let Some(rectangles) = snapshot.rectangles {
            if !self.session.push_sample(rectangles) {
                debug!(game_id = self.game_id, "Skipping duplicate rectangle frame");
            }
        }

        Directive::after(self.intervals.positions, Action::PollPositions)
    }

    /// Forced end of session for the shutdown path. Only a recording yields a session.
    pub fn interrupt(&mut self) -> Option<CompletedSession> {
        match self.phase {
            Phase::Recording => Some(self.finish()),
            Phase::Acknowledged | Phase::Inactive => {
                self.reset();
                None
            }
        }
    }

    fn finish(&mut self) -> CompletedSession {
        let session = std::mem::take(&mut self.session);
        self.phase = Phase::Inactive;
        CompletedSession {
            game_id: self.game_id,
            artifact: session.into_artifact(),
        }
    }

    fn reset(&mut self) {
        self.session = Session::default();
        self.phase = Phase::Inactive;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decided(won: bool) -> Option<GameResult> {
        Some(GameResult {
            game_id: Some(1),
            local_player_won: Some(won),
        })
    }

    fn undecided() -> Option<GameResult> {
        Some(GameResult {
            game_id: Some(-1),
            local_player_won: None,
        })
    }

    fn in_match(rectangles: Value) -> Option<PositionalRectangles> {
        Some(PositionalRectangles {
            player_name: Some("alice".to_string()),
            opponent_name: Some("bob".to_string()),
            screen: Some(json!({ "ScreenWidth": 1920, "ScreenHeight": 1080 })),
            rectangles: Some(rectangles),
        })
    }

    fn no_match() -> Option<PositionalRectangles> {
        Some(PositionalRectangles::default())
    }

    fn recording_machine() -> SessionMachine {
        let mut machine = SessionMachine::new(0, Intervals::default());
        machine.on_deck(Some(json!({ "DeckCode": "CEBAI" })));
        machine.on_game_result(decided(true));
        machine.on_positions(in_match(json!([{ "CardID": 1 }])));
        assert_eq!(machine.phase(), Phase::Recording);
        machine
    }

    #[test]
    fn undecided_result_waits_game_result_interval() {
        let mut machine = SessionMachine::new(0, Intervals::default());
        let directive = machine.on_game_result(undecided());
        assert_eq!(
            directive,
            Directive::after(Duration::from_secs(10), Action::PollGameResult)
        );
        assert_eq!(machine.phase(), Phase::Inactive);
        assert_eq!(machine.game_id(), 0);
    }

    #[test]
    fn unreachable_endpoint_behaves_like_null_result() {
        let mut machine = SessionMachine::new(0, Intervals::default());
        assert_eq!(
            machine.on_game_result(None),
            machine.on_game_result(undecided())
        );
        assert_eq!(machine.phase(), Phase::Inactive);
    }

    #[test]
    fn decided_result_acknowledges_and_increments_game_id() {
        let mut machine = SessionMachine::new(0, Intervals::default());
        let directive = machine.on_game_result(decided(false));
        assert_eq!(directive, Directive::now(Action::PollPositions));
        assert_eq!(machine.phase(), Phase::Acknowledged);
        assert_eq!(machine.game_id(), 1);
        assert!(machine.session().player_name.is_none());
    }

    #[test]
    fn player_name_moves_acknowledged_to_recording() {
        let mut machine = SessionMachine::new(0, Intervals::default());
        machine.on_game_result(decided(true));
        let directive = machine.on_positions(in_match(json!([{ "CardID": 1 }])));

        assert_eq!(
            directive,
            Directive::after(Duration::from_secs(5), Action::PollPositions)
        );
        assert_eq!(machine.phase(), Phase::Recording);
        let session = machine.session();
        assert_eq!(session.player_name.as_deref(), Some("alice"));
        assert_eq!(session.opponent_name.as_deref(), Some("bob"));
        assert_eq!(session.screen, Some(json!({ "ScreenWidth": 1920, "ScreenHeight": 1080 })));
        assert_eq!(session.samples.len(), 1);
    }

    #[test]
    fn null_player_while_acknowledged_discards_and_restarts() {
        let mut machine = SessionMachine::new(0, Intervals::default());
        machine.on_deck(Some(json!({ "DeckCode": "CEBAI" })));
        machine.on_game_result(decided(true));

        let directive = machine.on_positions(no_match());
        assert_eq!(
            directive,
            Directive::after(Duration::from_secs(10), Action::FetchDeck)
        );
        assert_eq!(machine.phase(), Phase::Inactive);
        assert_eq!(machine.session(), &Session::default());
        assert_eq!(machine.game_id(), 1);
    }

    #[test]
    fn consecutive_identical_frames_are_stored_once() {
        let mut machine = recording_machine();
        let frame = json!([{ "CardID": 2, "TopLeftX": 40 }]);
        machine.on_positions(in_match(frame.clone()));
        machine.on_positions(in_match(frame.clone()));
        assert_eq!(machine.session().samples.len(), 2);
        assert_eq!(machine.session().samples.last(), Some(&frame));
    }

    #[test]
    fn duplicate_check_only_compares_last_sample() {
        let mut session = Session::default();
        assert!(session.push_sample(json!("a")));
        assert!(session.push_sample(json!("b")));
        assert!(session.push_sample(json!("a")));
        assert!(!session.push_sample(json!("a")));
        assert_eq!(session.samples, vec![json!("a"), json!("b"), json!("a")]);
    }

    #[test]
    fn player_leaving_during_recording_returns_to_game_result_poll() {
        let mut machine = recording_machine();
        let directive = machine.on_positions(no_match());
        assert_eq!(directive, Directive::now(Action::PollGameResult));
        assert_eq!(machine.phase(), Phase::Recording);
        assert_eq!(machine.session().samples.len(), 1);
    }

    #[test]
    fn reentry_while_recording_finishes_session() {
        let mut machine = recording_machine();
        machine.on_positions(in_match(json!([{ "CardID": 2 }])));

        let Reentry::Finished(completed) = machine.reenter() else {
            panic!("expected finished session");
        };
        assert_eq!(completed.game_id, 1);
        assert_eq!(completed.artifact.player_name.as_deref(), Some("alice"));
        assert_eq!(
            completed.artifact.active_deck,
            Some(json!({ "DeckCode": "CEBAI" }))
        );
        assert_eq!(completed.artifact.card_positions.len(), 2);

        assert_eq!(machine.phase(), Phase::Inactive);
        assert_eq!(machine.session(), &Session::default());
    }

    #[test]
    fn reentry_while_acknowledged_resets_without_session() {
        let mut machine = SessionMachine::new(0, Intervals::default());
        machine.on_game_result(decided(true));
        assert_eq!(machine.reenter(), Reentry::Abandoned);
        assert_eq!(machine.phase(), Phase::Inactive);
        assert_eq!(machine.reenter(), Reentry::Ready);
    }

    #[test]
    fn game_id_increments_once_per_game_and_resumes_from_cache() {
        let mut machine = SessionMachine::new(7, Intervals::default());
        for expected in 8..=10 {
            machine.on_deck(Some(json!({})));
            assert_eq!(machine.reenter(), Reentry::Ready);
            machine.on_game_result(undecided());
            machine.on_game_result(decided(true));
            assert_eq!(machine.game_id(), expected);
            machine.on_positions(in_match(json!([expected])));
            assert!(matches!(machine.reenter(), Reentry::Finished(done) if done.game_id == expected));
        }
    }

    #[test]
    fn interrupt_only_yields_recording_sessions() {
        let mut machine = SessionMachine::new(0, Intervals::default());
        assert!(machine.interrupt().is_none());

        machine.on_game_result(decided(true));
        assert!(machine.interrupt().is_none());
        assert_eq!(machine.phase(), Phase::Inactive);

        let mut machine = recording_machine();
        let completed = machine.interrupt().expect("recording session");
        assert_eq!(completed.artifact.card_positions.len(), 1);
        assert_eq!(machine.phase(), Phase::Inactive);
    }

    #[test]
    fn unreachable_positions_while_recording_keeps_session() {
        let mut machine = recording_machine();
        let directive = machine.on_positions(None);
        assert_eq!(
            directive,
            Directive::after(Duration::from_secs(5), Action::PollPositions)
        );
        assert_eq!(machine.phase(), Phase::Recording);
        assert_eq!(machine.session().samples.len(), 1);
        assert_eq!(machine.game_id(), 1);
    }

    #[test]
    fn unreachable_positions_while_acknowledged_restarts_after_delay() {
        let mut machine = SessionMachine::new(0, Intervals::default());
        machine.on_game_result(decided(true));
        assert_eq!(
            machine.on_positions(None),
            Directive::after(Duration::from_secs(10), Action::FetchDeck)
        );
        assert_eq!(machine.phase(), Phase::Inactive);
    }

    #[test]
    fn missing_deck_retries_after_game_result_interval() {
        let mut machine = SessionMachine::new(0, Intervals::default());
        assert_eq!(
            machine.on_deck(None),
            Directive::after(Duration::from_secs(10), Action::FetchDeck)
        );
    }
}
