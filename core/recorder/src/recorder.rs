//! Poll chain driver.
//!
//! Executes the state machine's directives one at a time: wait if asked,
//! run the fetch, hand the settled result back to the machine. The next tick
//! is only scheduled once the current one has completed. The whole chain is
//! raced against a shutdown future; when that wins, whatever timer or request
//! was pending is dropped and the live session is flushed once.

use std::future::Future;
use std::path::PathBuf;

use match_recorder_protocol::INTERRUPT_TAG;
use tracing::info;

use crate::artifacts::ArtifactWriter;
use crate::client::{fetch_deck, fetch_game_result, fetch_positions, GameApi};
use crate::machine::{Action, Directive, Phase, Reentry, SessionMachine};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub phase: Phase,
    pub game_id: u64,
    pub artifact: Option<PathBuf>,
    pub cache_saved: bool,
}

pub struct Recorder<A: GameApi> {
    api: A,
    machine: SessionMachine,
    writer: ArtifactWriter,
}

impl<A: GameApi> Recorder<A> {
    pub fn new(api: A, machine: SessionMachine, writer: ArtifactWriter) -> Self {
        Self {
            api,
            machine,
            writer,
        }
    }

    /// Runs until `shutdown` resolves, then performs the interrupt flush.
    pub async fn run<S>(mut self, shutdown: S) -> ShutdownReport
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut directive = self.machine.start();

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => return self.shutdown(),
                next = self.advance(directive) => directive = next,
            }
        }
    }

    async fn advance(&mut self, directive: Directive) -> Directive {
        if let Some(delay) = directive.delay {
            tokio::time::sleep(delay).await;
        }

        match directive.action {
            Action::FetchDeck => {
                let deck = fetch_deck(&self.api).await;
                self.machine.on_deck(deck)
            }
            Action::PollGameResult => match self.machine.reenter() {
                Reentry::Ready => {
                    let result = fetch_game_result(&self.api).await;
                    self.machine.on_game_result(result)
                }
                Reentry::Abandoned => Directive::now(Action::FetchDeck),
                Reentry::Finished(session) => {
                    self.writer.flush(&session, None);
                    Directive::now(Action::FetchDeck)
                }
            },
            Action::PollPositions => {
                let snapshot = fetch_positions(&self.api).await;
                self.machine.on_positions(snapshot)
            }
        }
    }

    fn shutdown(mut self) -> ShutdownReport {
        let phase = self.machine.phase();
        let game_id = self.machine.game_id();
        info!(phase = ?phase, game_id, "Shutting down");

        match self.machine.interrupt() {
            Some(session) => {
                let report = self.writer.flush(&session, Some(INTERRUPT_TAG));
                ShutdownReport {
                    phase,
                    game_id,
                    artifact: report.artifact,
                    cache_saved: report.cache_saved,
                }
            }
            None => ShutdownReport {
                phase,
                game_id,
                artifact: None,
                cache_saved: self.writer.save_cache(game_id),
            },
        }
    }
}
