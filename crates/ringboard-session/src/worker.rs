//! The task that owns one [`GameSession`].
//!
//! Player actions and timer wakes arrive on a single `mpsc` queue and are
//! applied strictly one at a time. Timers are plain `tokio` sleep tasks
//! holding a weak sender: when one expires it enqueues a wake carrying its
//! token. Timers whose token the session no longer considers armed are
//! aborted after every command, and a wake that still slips through is
//! ignored by the session.

use std::collections::BTreeMap;

use ringboard_core::wake::{ArmedWake, WakeToken};
use ringboard_types::{CardChoiceAction, RollAction, SessionEvent, SessionSnapshot};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::session::{GameSession, SessionOutput};

/// Reply channel for commands that produce events.
pub(crate) type EventsReply = oneshot::Sender<Result<Vec<SessionEvent>, SessionError>>;

/// Messages accepted by a session worker.
pub(crate) enum SessionCommand {
    /// A player rolled.
    Roll {
        action: RollAction,
        reply: EventsReply,
    },
    /// A player answered a card.
    Choose {
        action: CardChoiceAction,
        reply: EventsReply,
    },
    /// Read the current state.
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    /// A phase timer expired.
    Wake(WakeToken),
    /// Stop the worker, cancel every timer, return the final state.
    Shutdown {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

/// Background task that serializes all mutation of one game.
pub(crate) struct SessionWorker {
    session: GameSession,
    command_rx: mpsc::Receiver<SessionCommand>,
    wake_tx: mpsc::WeakSender<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
    timers: BTreeMap<WakeToken, JoinHandle<()>>,
}

impl SessionWorker {
    pub(crate) fn new(
        session: GameSession,
        command_rx: mpsc::Receiver<SessionCommand>,
        wake_tx: mpsc::WeakSender<SessionCommand>,
        event_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            session,
            command_rx,
            wake_tx,
            event_tx,
            timers: BTreeMap::new(),
        }
    }

    /// Schedule `initial` and then drain the queue until shutdown or until
    /// every handle is dropped.
    pub(crate) async fn run(mut self, initial: Vec<ArmedWake>) {
        for wake in initial {
            self.arm(wake);
        }
        while let Some(command) = self.command_rx.recv().await {
            match command {
                SessionCommand::Roll { action, reply } => {
                    let result = self.session.handle_roll(&action).map(|out| self.publish(out));
                    let _ = reply.send(result);
                }
                SessionCommand::Choose { action, reply } => {
                    let result = self
                        .session
                        .handle_choice(&action)
                        .map(|out| self.publish(out));
                    let _ = reply.send(result);
                }
                SessionCommand::Snapshot { reply } => {
                    let _ = reply.send(self.session.snapshot());
                }
                SessionCommand::Wake(token) => match self.session.handle_wake(token) {
                    Ok(out) => {
                        let _ = self.publish(out);
                    }
                    Err(err) => warn!(
                        game_id = %self.session.game_id(),
                        error = %err,
                        "Timed-out phase could not continue"
                    ),
                },
                SessionCommand::Shutdown { reply } => {
                    self.cancel_timers();
                    let _ = reply.send(self.session.snapshot());
                    debug!(game_id = %self.session.game_id(), "Session worker stopped");
                    return;
                }
            }
            self.prune_timers();
        }
        self.cancel_timers();
        debug!(game_id = %self.session.game_id(), "Session handles dropped");
    }

    /// Broadcast the events, schedule the wakes, hand the events back.
    fn publish(&mut self, output: SessionOutput) -> Vec<SessionEvent> {
        for wake in output.wakes {
            self.arm(wake);
        }
        for event in &output.events {
            // send fails only when nobody is subscribed.
            let _ = self.event_tx.send(event.clone());
        }
        output.events
    }

    fn arm(&mut self, wake: ArmedWake) {
        let wake_tx = self.wake_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(wake.after).await;
            if let Some(tx) = wake_tx.upgrade() {
                let _ = tx.send(SessionCommand::Wake(wake.token)).await;
            }
        });
        if let Some(previous) = self.timers.insert(wake.token, handle) {
            previous.abort();
        }
    }

    fn prune_timers(&mut self) {
        let session = &self.session;
        self.timers.retain(|token, handle| {
            let live = session.is_armed(*token);
            if !live {
                handle.abort();
            }
            live
        });
    }

    fn cancel_timers(&mut self) {
        for (_, handle) in std::mem::take(&mut self.timers) {
            handle.abort();
        }
    }
}
