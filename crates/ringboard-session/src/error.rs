//! Error types for game sessions and the session registry.
//!
//! Every variant is recoverable: a rejected action leaves the session
//! exactly as it was and the caller is told why.

use ringboard_core::effects::{EffectError, Requirement};
use ringboard_core::scheduler::SchedulerError;
use ringboard_core::turn::TransitionError;
use ringboard_types::{CardId, GameId, PlayerId, TurnPhase};

/// Errors returned by session operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No session is registered under this id.
    #[error("unknown game {game_id}")]
    UnknownGame {
        /// The requested game.
        game_id: GameId,
    },

    /// A session with this id is already running.
    #[error("game {game_id} already exists")]
    DuplicateGame {
        /// The requested game.
        game_id: GameId,
    },

    /// The action names a different game than the session it reached.
    #[error("action for game {got} delivered to game {expected}")]
    WrongGame {
        /// The session's game.
        expected: GameId,
        /// The game named in the action.
        got: GameId,
    },

    /// Only the active player may act.
    #[error("player {player_id} is not the active player")]
    NotYourTurn {
        /// The player who tried to act.
        player_id: PlayerId,
    },

    /// The action is not accepted in the current phase.
    #[error("action not accepted in phase {phase}")]
    WrongPhase {
        /// The phase at the time of the action.
        phase: TurnPhase,
    },

    /// A die roll outside 1 through 6.
    #[error("roll {roll} is outside 1..=6")]
    InvalidRoll {
        /// The reported value.
        roll: u8,
    },

    /// The card is not the one awaiting a choice.
    #[error("card {card_id} is not awaiting a choice")]
    UnknownCard {
        /// The card named in the action.
        card_id: CardId,
    },

    /// The choice index is outside the card's options.
    #[error("choice {index} out of range for a card with {count} choices")]
    InvalidChoice {
        /// Requested index.
        index: usize,
        /// Number of options on the card.
        count: usize,
    },

    /// The player does not meet the choice's requirements.
    #[error("precondition failed: requires {requirement}")]
    PreconditionFailed {
        /// The first unmet requirement.
        requirement: Requirement,
    },

    /// The turn state machine refused a transition.
    #[error("turn transition failed: {source}")]
    Transition {
        /// The underlying state machine error.
        #[from]
        source: TransitionError,
    },

    /// The ring scheduler could not be built or advanced.
    #[error("scheduler error: {source}")]
    Scheduler {
        /// The underlying scheduler error.
        #[from]
        source: SchedulerError,
    },

    /// A game needs at least one seated player.
    #[error("cannot start a game with no players")]
    EmptyRoster,

    /// The session task has stopped.
    #[error("session {game_id} is closed")]
    Closed {
        /// The stopped game.
        game_id: GameId,
    },
}

impl From<EffectError> for SessionError {
    fn from(error: EffectError) -> Self {
        match error {
            EffectError::PreconditionFailed { requirement } => {
                Self::PreconditionFailed { requirement }
            }
            EffectError::InvalidChoice { index, count } => Self::InvalidChoice { index, count },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_errors_map_to_session_variants() {
        let err = SessionError::from(EffectError::InvalidChoice { index: 4, count: 2 });
        assert_eq!(err, SessionError::InvalidChoice { index: 4, count: 2 });

        let err = SessionError::from(EffectError::PreconditionFailed {
            requirement: Requirement::Money(5000),
        });
        assert_eq!(err.to_string(), "precondition failed: requires money >= 5000");
    }
}
