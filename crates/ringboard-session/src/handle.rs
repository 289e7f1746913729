//! Cloneable façade over a running session worker.

use ringboard_types::{CardChoiceAction, GameId, RollAction, SessionEvent, SessionSnapshot};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::SessionError;
use crate::session::GameSession;
use crate::worker::{SessionCommand, SessionWorker};

/// Capacity of each session's event broadcast channel.
///
/// A subscriber that falls further behind receives
/// [`broadcast::error::RecvError::Lagged`] and skips ahead.
const BROADCAST_CAPACITY: usize = 256;

/// Client-facing handle to one game.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    game_id: GameId,
    command_tx: mpsc::Sender<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Start `session`, spawn its worker, and return the handle, the worker
    /// task, and the events produced by starting the first turn.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Transition`] if the session was already
    /// started.
    pub fn spawn(
        mut session: GameSession,
        queue_capacity: usize,
    ) -> Result<(Self, JoinHandle<()>, Vec<SessionEvent>), SessionError> {
        let started = session.start()?;
        let game_id = session.game_id();
        let (command_tx, command_rx) = mpsc::channel(queue_capacity.max(1));
        let (event_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let worker =
            SessionWorker::new(session, command_rx, command_tx.downgrade(), event_tx.clone());
        let task = tokio::spawn(worker.run(started.wakes));
        let handle = Self {
            game_id,
            command_tx,
            event_tx,
        };
        Ok((handle, task, started.events))
    }

    /// The game this handle drives.
    pub const fn game_id(&self) -> GameId {
        self.game_id
    }

    /// Subscribe to everything the session broadcasts from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Submit a roll and wait for the events it produced.
    ///
    /// # Errors
    ///
    /// Returns the session's rejection, or [`SessionError::Closed`] if the
    /// worker has stopped.
    pub async fn roll(&self, action: RollAction) -> Result<Vec<SessionEvent>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Roll { action, reply }).await?;
        rx.await.ok().ok_or_else(|| self.closed())?
    }

    /// Submit a card choice and wait for the events it produced.
    ///
    /// # Errors
    ///
    /// Returns the session's rejection, or [`SessionError::Closed`] if the
    /// worker has stopped.
    pub async fn choose(
        &self,
        action: CardChoiceAction,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Choose { action, reply }).await?;
        rx.await.ok().ok_or_else(|| self.closed())?
    }

    /// Read the current state.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the worker has stopped.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Snapshot { reply }).await?;
        rx.await.ok().ok_or_else(|| self.closed())
    }

    /// Stop the worker and cancel its timers. Returns the final state.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the worker had already stopped.
    pub async fn shutdown(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Shutdown { reply }).await?;
        rx.await.ok().ok_or_else(|| self.closed())
    }

    async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.command_tx
            .send(command)
            .await
            .ok()
            .ok_or_else(|| self.closed())
    }

    const fn closed(&self) -> SessionError {
        SessionError::Closed {
            game_id: self.game_id,
        }
    }
}
