//! Payloads exchanged with the transport layer.
//!
//! Inbound actions arrive from players; outbound [`SessionEvent`]s are
//! broadcast to everyone at the table. Field names are camelCase on the
//! wire.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Ring, TurnPhase};
use crate::ids::{CardId, GameId, PlayerId};
use crate::structs::{Card, CardChoice, PlayerState, PlayerStats, RingEvent, TileResult, TurnContext};

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A player rolled the die.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct RollAction {
    /// Target game.
    pub game_id: GameId,
    /// The player claiming the roll.
    pub player_id: PlayerId,
    /// Die value, 1 through 6.
    pub roll_result: u8,
}

/// A player picked an option on a drawn card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct CardChoiceAction {
    /// Target game.
    pub game_id: GameId,
    /// The player making the choice.
    pub player_id: PlayerId,
    /// The card being answered.
    pub card_id: CardId,
    /// Zero-based index into the card's choices.
    pub choice_index: usize,
}

/// A seat at the table when a game starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct PlayerSeat {
    /// Player identifier.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// A new turn began and the active player may roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TurnStarted {
    /// The player now on turn.
    pub player_id: PlayerId,
    /// Seat index of that player.
    pub player_index: usize,
    /// Round counter, starting at 1.
    pub round: u32,
    /// Turn number from the turn context.
    pub turn: u64,
}

/// Outcome of a roll: triggered rings, fired events and drawn cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TurnResult {
    /// The player who rolled.
    pub player_id: PlayerId,
    /// Die value used.
    pub roll_result: u8,
    /// Where the player landed.
    pub tile: TileResult,
    /// Rings whose events fired this turn, in clock order.
    pub triggered_rings: Vec<Ring>,
    /// Ring events applied this turn.
    pub events: Vec<RingEvent>,
    /// Cards drawn for the player.
    pub cards: Vec<Card>,
    /// Whether the player now owes a card choice.
    pub awaiting_choice: bool,
    /// Seat index of the player who goes next.
    pub next_player: usize,
    /// Round counter at the time of the roll.
    pub round: u32,
    /// Turn number from the turn context, matching the preceding
    /// [`TurnStarted::turn`].
    pub turn: u64,
    /// Scheduler turn the roll advanced to.
    pub scheduler_turn: u64,
}

/// A card choice was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct CardResolved {
    /// The player who chose.
    pub player_id: PlayerId,
    /// The card answered.
    pub card_id: CardId,
    /// Index of the picked option.
    pub choice_index: usize,
    /// The picked option.
    pub choice: CardChoice,
    /// Die value if the option rolled for its outcome.
    pub dice_roll: Option<u8>,
    /// Stats after applying the option.
    pub new_stats: PlayerStats,
    /// Tags after applying the option.
    pub tags: Vec<String>,
}

/// A phase timer expired and the engine moved the turn on by itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct PhaseTimedOut {
    /// The player who did not act.
    pub player_id: PlayerId,
    /// The phase that expired.
    pub phase: TurnPhase,
}

/// Everything a session broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum SessionEvent {
    /// See [`TurnStarted`].
    TurnStarted(TurnStarted),
    /// See [`TurnResult`].
    TurnResult(TurnResult),
    /// See [`CardResolved`].
    CardResolved(CardResolved),
    /// See [`PhaseTimedOut`].
    PhaseTimedOut(PhaseTimedOut),
}

/// Read-only view of a session for dashboards and reconnecting clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct SessionSnapshot {
    /// The game.
    pub game_id: GameId,
    /// Current turn phase.
    pub phase: TurnPhase,
    /// Current turn context.
    pub context: TurnContext,
    /// Round counter.
    pub round: u32,
    /// Seat index of the active player.
    pub active_index: usize,
    /// Every seated player.
    pub players: Vec<PlayerState>,
    /// Scheduler turn counter.
    pub scheduler_turn: u64,
    /// Queued events due within the lookahead window.
    pub upcoming_events: Vec<RingEvent>,
    /// Number of events already fired.
    pub fired_events: usize,
    /// Cards drawn on the current turn.
    pub drawn_cards: Vec<Card>,
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use super::*;

    #[test]
    fn roll_action_uses_camel_case_fields() {
        let game_id = GameId::new();
        let player_id = PlayerId::new();
        let json = format!(
            r#"{{"gameId":"{}","playerId":"{}","rollResult":4}}"#,
            game_id.into_inner(),
            player_id.into_inner()
        );
        let action: RollAction = serde_json::from_str(&json).unwrap();
        assert_eq!(action.game_id, game_id);
        assert_eq!(action.roll_result, 4);
    }

    #[test]
    fn session_event_is_tagged_by_type() {
        let event = SessionEvent::PhaseTimedOut(PhaseTimedOut {
            player_id: PlayerId::new(),
            phase: TurnPhase::Decision,
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "phase_timed_out");
        assert_eq!(value["phase"], "decision");
        assert!(value.get("playerId").is_some());
    }
}
