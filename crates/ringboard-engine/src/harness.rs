//! Newline-delimited JSON command loop.
//!
//! Each stdin line is one [`Command`]; everything the engine has to say is
//! an [`Output`] line on stdout. Session events reach stdout through one
//! forwarding task per game, so timer-driven events show up without any
//! command prompting them.
//!
//! ```text
//! {"command":"start_game","players":[{"id":"...","name":"Ada"}]}
//! {"command":"roll","gameId":"...","playerId":"...","rollResult":4}
//! {"command":"choose","gameId":"...","playerId":"...","cardId":"sin_001","choiceIndex":0}
//! {"command":"snapshot","gameId":"..."}
//! {"command":"end_game","gameId":"..."}
//! ```

use std::sync::Arc;

use ringboard_session::{SessionError, SessionHandle, SessionRegistry};
use ringboard_types::{
    CardChoiceAction, GameId, PlayerSeat, RollAction, SessionEvent, SessionSnapshot,
};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::error::EngineError;

/// Capacity of the outbound line queue.
const OUTPUT_CAPACITY: usize = 256;

/// One inbound line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Seat players and start a game.
    StartGame {
        /// Id for the new game; generated when absent.
        #[serde(default, rename = "gameId")]
        game_id: Option<GameId>,
        /// Seats, in turn order.
        players: Vec<PlayerSeat>,
    },
    /// Forward a roll.
    Roll(RollAction),
    /// Forward a card choice.
    Choose(CardChoiceAction),
    /// Print a game's current state.
    Snapshot {
        /// Target game.
        #[serde(rename = "gameId")]
        game_id: GameId,
    },
    /// Stop a game.
    EndGame {
        /// Target game.
        #[serde(rename = "gameId")]
        game_id: GameId,
    },
}

/// One outbound line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Output {
    /// A game was registered.
    GameStarted {
        /// The new game.
        #[serde(rename = "gameId")]
        game_id: GameId,
    },
    /// Something happened in a game.
    Event {
        /// The game it happened in.
        #[serde(rename = "gameId")]
        game_id: GameId,
        /// What happened.
        event: Box<SessionEvent>,
    },
    /// A game's state, on request or when it ends.
    Snapshot {
        /// The state.
        snapshot: Box<SessionSnapshot>,
    },
    /// A command was rejected or could not be parsed.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

/// Routes commands into a registry and results onto the output queue.
pub struct Harness {
    registry: Arc<SessionRegistry>,
    out: mpsc::Sender<Output>,
}

impl Harness {
    /// A harness over `registry` and the queue drained by [`write_lines`].
    pub const fn new(registry: Arc<SessionRegistry>, out: mpsc::Sender<Output>) -> Self {
        Self { registry, out }
    }

    /// The outbound queue for a new harness, sized for interactive use.
    pub fn output_channel() -> (mpsc::Sender<Output>, mpsc::Receiver<Output>) {
        mpsc::channel(OUTPUT_CAPACITY)
    }

    /// Read commands until EOF. Games are left running; the caller ends
    /// them with [`SessionRegistry::shutdown`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Io`] if reading fails.
    pub async fn run<R>(&self, input: R) -> Result<(), EngineError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            self.dispatch(&line).await;
        }
        debug!("stdin closed");
        Ok(())
    }

    /// Parse and execute one line. Failures are reported as [`Output::Error`].
    pub async fn dispatch(&self, line: &str) {
        let command = match serde_json::from_str::<Command>(line) {
            Ok(command) => command,
            Err(err) => {
                warn!(error = %err, "Unparseable command");
                self.emit(Output::Error {
                    message: format!("invalid command: {err}"),
                })
                .await;
                return;
            }
        };
        if let Err(err) = self.execute(command).await {
            self.emit(Output::Error {
                message: err.to_string(),
            })
            .await;
        }
    }

    async fn execute(&self, command: Command) -> Result<(), SessionError> {
        match command {
            Command::StartGame { game_id, players } => {
                let game_id = game_id.unwrap_or_default();
                let (handle, opening) = self.registry.start_game(game_id, players).await?;
                self.forward(&handle);
                self.emit(Output::GameStarted { game_id }).await;
                for event in opening {
                    self.emit(Output::Event {
                        game_id,
                        event: Box::new(event),
                    })
                    .await;
                }
            }
            Command::Roll(action) => {
                self.registry.roll(action).await?;
            }
            Command::Choose(action) => {
                self.registry.choose(action).await?;
            }
            Command::Snapshot { game_id } => {
                let snapshot = self.registry.get(game_id).await?.snapshot().await?;
                self.emit(Output::Snapshot {
                    snapshot: Box::new(snapshot),
                })
                .await;
            }
            Command::EndGame { game_id } => {
                let snapshot = self.registry.end_game(game_id).await?;
                self.emit(Output::Snapshot {
                    snapshot: Box::new(snapshot),
                })
                .await;
            }
        }
        Ok(())
    }

    /// Copy a game's broadcast onto the output queue until the game ends.
    fn forward(&self, handle: &SessionHandle) {
        let game_id = handle.game_id();
        let mut rx = handle.subscribe();
        let out = self.out.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let output = Output::Event {
                            game_id,
                            event: Box::new(event),
                        };
                        if out.send(output).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(%game_id, skipped, "Event forwarder lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    async fn emit(&self, output: Output) {
        if self.out.send(output).await.is_err() {
            debug!("output queue closed");
        }
    }
}

/// Serialize every queued [`Output`] as one JSON line on `writer`.
///
/// # Errors
///
/// Returns [`EngineError::Json`] or [`EngineError::Io`] if a line cannot be
/// produced or written.
pub async fn write_lines<W>(mut rx: mpsc::Receiver<Output>, mut writer: W) -> Result<(), EngineError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(output) = rx.recv().await {
        let mut line = serde_json::to_vec(&output)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::panic
)]
mod tests {
    use ringboard_core::config::RingboardConfig;
    use ringboard_session::MemoryCatalog;
    use ringboard_types::{PlayerId, TurnPhase};

    use super::*;

    fn harness() -> (Harness, mpsc::Receiver<Output>) {
        let mut config = RingboardConfig::default();
        config.session.seed = Some(1);
        let registry = Arc::new(SessionRegistry::new(config, Arc::new(MemoryCatalog::new())));
        let (tx, rx) = Harness::output_channel();
        (Harness::new(registry, tx), rx)
    }

    fn event_of(output: Output) -> Option<SessionEvent> {
        match output {
            Output::Event { event, .. } => Some(*event),
            _ => None,
        }
    }

    #[test]
    fn parses_every_command() {
        let game_id = GameId::new();
        let player_id = PlayerId::new();
        let start = format!(
            r#"{{"command":"start_game","players":[{{"id":"{}","name":"Ada"}}]}}"#,
            player_id.into_inner()
        );
        assert!(matches!(
            serde_json::from_str::<Command>(&start).unwrap(),
            Command::StartGame { game_id: None, ref players } if players.len() == 1
        ));

        let roll = format!(
            r#"{{"command":"roll","gameId":"{}","playerId":"{}","rollResult":4}}"#,
            game_id.into_inner(),
            player_id.into_inner()
        );
        assert_eq!(
            serde_json::from_str::<Command>(&roll).unwrap(),
            Command::Roll(RollAction {
                game_id,
                player_id,
                roll_result: 4
            })
        );

        let end = format!(
            r#"{{"command":"end_game","gameId":"{}"}}"#,
            game_id.into_inner()
        );
        assert_eq!(
            serde_json::from_str::<Command>(&end).unwrap(),
            Command::EndGame { game_id }
        );
    }

    #[test]
    fn outputs_are_tagged_by_kind() {
        let value = serde_json::to_value(Output::Error {
            message: "nope".to_owned(),
        })
        .unwrap();
        assert_eq!(value["kind"], "error");
        assert_eq!(value["message"], "nope");
    }

    #[tokio::test]
    async fn bad_lines_become_error_outputs() {
        let (harness, mut rx) = harness();
        harness.dispatch("not json").await;
        assert!(matches!(rx.recv().await, Some(Output::Error { .. })));

        let unknown = format!(
            r#"{{"command":"snapshot","gameId":"{}"}}"#,
            GameId::new().into_inner()
        );
        harness.dispatch(&unknown).await;
        match rx.recv().await.unwrap() {
            Output::Error { message } => assert!(message.starts_with("unknown game")),
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[tokio::test]
    async fn start_roll_and_end_a_game() {
        let (harness, mut rx) = harness();
        let game_id = GameId::new();
        let player_id = PlayerId::new();
        harness
            .dispatch(&format!(
                r#"{{"command":"start_game","gameId":"{}","players":[{{"id":"{}","name":"Ada"}}]}}"#,
                game_id.into_inner(),
                player_id.into_inner()
            ))
            .await;
        assert_eq!(rx.recv().await.unwrap(), Output::GameStarted { game_id });
        assert!(matches!(
            event_of(rx.recv().await.unwrap()),
            Some(SessionEvent::TurnStarted(_))
        ));

        harness
            .dispatch(&format!(
                r#"{{"command":"roll","gameId":"{}","playerId":"{}","rollResult":3}}"#,
                game_id.into_inner(),
                player_id.into_inner()
            ))
            .await;
        assert!(matches!(
            event_of(rx.recv().await.unwrap()),
            Some(SessionEvent::TurnResult(_))
        ));

        harness
            .dispatch(&format!(
                r#"{{"command":"end_game","gameId":"{}"}}"#,
                game_id.into_inner()
            ))
            .await;
        let snapshot = loop {
            if let Output::Snapshot { snapshot } = rx.recv().await.unwrap() {
                break snapshot;
            }
        };
        assert_eq!(snapshot.game_id, game_id);
        assert_eq!(snapshot.phase, TurnPhase::Roll);
        assert_eq!(snapshot.players[0].position, 3);
    }

    #[tokio::test]
    async fn eof_leaves_shutdown_to_the_caller() {
        let (harness, mut rx) = harness();
        let game_id = GameId::new();
        let input = format!(
            "{{\"command\":\"start_game\",\"gameId\":\"{}\",\"players\":[{{\"id\":\"{}\",\"name\":\"Ada\"}}]}}\n\n",
            game_id.into_inner(),
            PlayerId::new().into_inner()
        );
        harness.run(input.as_bytes()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), Output::GameStarted { game_id });
        assert_eq!(harness.registry.game_ids().await, vec![game_id]);

        harness.registry.shutdown().await;
        assert!(harness.registry.is_empty().await);
    }

    #[tokio::test]
    async fn lines_are_written_as_json() {
        let (tx, rx) = Harness::output_channel();
        tx.send(Output::GameStarted {
            game_id: GameId::new(),
        })
        .await
        .unwrap();
        drop(tx);
        let mut buffer = Vec::new();
        write_lines(rx, &mut buffer).await.unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.ends_with('\n'));
        assert!(text.contains(r#""kind":"game_started""#));
    }
}
