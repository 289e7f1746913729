//! The set of running games, keyed by game id.
//!
//! A session is created when a game starts and discarded when it ends.
//! Sessions share nothing with each other; the registry only routes
//! actions to the right worker.

use std::collections::BTreeMap;
use std::sync::Arc;

use ringboard_core::config::RingboardConfig;
use ringboard_types::{
    CardChoiceAction, GameId, PlayerSeat, RollAction, SessionEvent, SessionSnapshot,
};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::catalog::CardCatalog;
use crate::error::SessionError;
use crate::handle::SessionHandle;
use crate::session::GameSession;

/// A registered session and its worker task.
struct Entry {
    handle: SessionHandle,
    task: JoinHandle<()>,
}

/// Owns every running session.
pub struct SessionRegistry {
    config: RingboardConfig,
    catalog: Arc<dyn CardCatalog>,
    sessions: RwLock<BTreeMap<GameId, Entry>>,
}

impl core::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SessionRegistry {
    /// An empty registry whose sessions use `config` and draw from
    /// `catalog`.
    pub fn new(config: RingboardConfig, catalog: Arc<dyn CardCatalog>) -> Self {
        Self {
            config,
            catalog,
            sessions: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create and start a game. Returns its handle and the opening events.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::DuplicateGame`] if the id is taken or
    /// [`SessionError::EmptyRoster`] if `seats` is empty.
    pub async fn start_game(
        &self,
        game_id: GameId,
        seats: Vec<PlayerSeat>,
    ) -> Result<(SessionHandle, Vec<SessionEvent>), SessionError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&game_id) {
            warn!(%game_id, "Duplicate game rejected");
            return Err(SessionError::DuplicateGame { game_id });
        }
        let players = seats.len();
        let session = GameSession::new(game_id, seats, &self.config, Arc::clone(&self.catalog))?;
        let (handle, task, events) =
            SessionHandle::spawn(session, self.config.session.queue_capacity)?;
        sessions.insert(
            game_id,
            Entry {
                handle: handle.clone(),
                task,
            },
        );
        info!(%game_id, players, active_games = sessions.len(), "Game registered");
        Ok((handle, events))
    }

    /// The handle for `game_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownGame`] if no such game is running.
    pub async fn get(&self, game_id: GameId) -> Result<SessionHandle, SessionError> {
        self.sessions
            .read()
            .await
            .get(&game_id)
            .map(|entry| entry.handle.clone())
            .ok_or(SessionError::UnknownGame { game_id })
    }

    /// Stop and discard a game, cancelling its timers. Returns its final
    /// state.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownGame`] if no such game is running, or
    /// [`SessionError::Closed`] if its worker had already stopped.
    pub async fn end_game(&self, game_id: GameId) -> Result<SessionSnapshot, SessionError> {
        let entry = self
            .sessions
            .write()
            .await
            .remove(&game_id)
            .ok_or(SessionError::UnknownGame { game_id })?;
        let result = entry.handle.shutdown().await;
        if result.is_err() {
            entry.task.abort();
        }
        info!(%game_id, "Game ended");
        result
    }

    /// Route a roll to its game.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownGame`] or the session's rejection.
    pub async fn roll(&self, action: RollAction) -> Result<Vec<SessionEvent>, SessionError> {
        self.get(action.game_id).await?.roll(action).await
    }

    /// Route a card choice to its game.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownGame`] or the session's rejection.
    pub async fn choose(
        &self,
        action: CardChoiceAction,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        self.get(action.game_id).await?.choose(action).await
    }

    /// Ids of every running game.
    pub async fn game_ids(&self) -> Vec<GameId> {
        self.sessions.read().await.keys().copied().collect()
    }

    /// Number of running games.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no games are running.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// End every game.
    pub async fn shutdown(&self) {
        let ids = self.game_ids().await;
        for game_id in ids {
            if let Err(err) = self.end_game(game_id).await {
                warn!(%game_id, error = %err, "Game did not stop cleanly");
            }
        }
    }
}
