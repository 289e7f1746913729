//! Closed vocabularies shared by the engine and the transport layer.
//!
//! Rings and turn phases are fixed at design time. Everything keyed by them
//! uses the fixed-size tables in [`crate::tables`] instead of dynamic maps.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Error returned when a string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    /// Which vocabulary was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

// ---------------------------------------------------------------------------
// Rings
// ---------------------------------------------------------------------------

/// A thematic category of recurring world events.
///
/// Each ring has its own clock and fires on its own cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Ring {
    /// Work, income, promotions.
    Career,
    /// Physical wellbeing.
    Health,
    /// Friends, family, reputation.
    Social,
    /// Inner life and personal growth.
    Personal,
    /// City-wide upheavals.
    Babel,
}

impl Ring {
    /// Every ring, in clock order.
    pub const ALL: [Self; 5] = [
        Self::Career,
        Self::Health,
        Self::Social,
        Self::Personal,
        Self::Babel,
    ];

    /// Wire name of the ring.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Career => "career",
            Self::Health => "health",
            Self::Social => "social",
            Self::Personal => "personal",
            Self::Babel => "babel",
        }
    }

    /// Default clock interval in turns.
    pub const fn default_interval(self) -> u64 {
        match self {
            Self::Career => 4,
            Self::Health => 6,
            Self::Social => 8,
            Self::Personal => 10,
            Self::Babel => 12,
        }
    }
}

impl fmt::Display for Ring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Ring {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ring| ring.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseEnumError {
                kind: "ring",
                value: s.to_owned(),
            })
    }
}

// ---------------------------------------------------------------------------
// Turn phases
// ---------------------------------------------------------------------------

/// One step of a single player's turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TurnPhase {
    /// Between turns.
    Idle,
    /// Waiting for the active player to roll.
    Roll,
    /// Resolving the landing tile.
    Tile,
    /// Drawing cards.
    Card,
    /// Waiting for the active player to pick a card choice.
    Decision,
    /// Wrapping up the turn.
    EndTurn,
}

impl TurnPhase {
    /// Every phase, in turn order.
    pub const ALL: [Self; 6] = [
        Self::Idle,
        Self::Roll,
        Self::Tile,
        Self::Card,
        Self::Decision,
        Self::EndTurn,
    ];

    /// Wire name of the phase.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Roll => "roll",
            Self::Tile => "tile",
            Self::Card => "card",
            Self::Decision => "decision",
            Self::EndTurn => "end_turn",
        }
    }

    /// Whether the active player is expected to send an action in this phase.
    pub const fn awaits_player(self) -> bool {
        matches!(self, Self::Roll | Self::Decision)
    }
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Events, decks, stats
// ---------------------------------------------------------------------------

/// Whom a ring event affects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum EventKind {
    /// Only the player whose turn triggered it.
    Tile,
    /// Every player at the table.
    Global,
}

/// The deck a card is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Deck {
    /// Temptations.
    Sin,
    /// Good deeds.
    Virtue,
}

impl Deck {
    /// Both decks.
    pub const ALL: [Self; 2] = [Self::Sin, Self::Virtue];

    /// Wire name of the deck.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sin => "sin",
            Self::Virtue => "virtue",
        }
    }
}

impl fmt::Display for Deck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Deck {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|deck| deck.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseEnumError {
                kind: "deck",
                value: s.to_owned(),
            })
    }
}

/// A single entry of the player stat vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Stat {
    /// Cash on hand. May go negative.
    Money,
    /// Mental state.
    Mental,
    /// Accumulated sin. Never below zero.
    Sin,
    /// Accumulated virtue. Never below zero.
    Virtue,
}

impl Stat {
    /// Every stat.
    pub const ALL: [Self; 4] = [Self::Money, Self::Mental, Self::Sin, Self::Virtue];

    /// Whether the stat is a non-negative accumulator.
    pub const fn is_accumulator(self) -> bool {
        matches!(self, Self::Sin | Self::Virtue)
    }
}

/// How often a card shows up in print. Carried as data; draws are uniform.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Rarity {
    /// The bulk of each deck.
    #[default]
    Common,
    /// Uncommon.
    Uncommon,
    /// Rare.
    Rare,
    /// One or two per deck.
    Legendary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_round_trips_through_its_wire_name() {
        for ring in Ring::ALL {
            assert_eq!(ring.as_str().parse::<Ring>().ok(), Some(ring));
        }
        assert!("weather".parse::<Ring>().is_err());
    }

    #[test]
    fn ring_intervals_match_the_design_cadence() {
        let intervals: Vec<u64> = Ring::ALL.iter().map(|r| r.default_interval()).collect();
        assert_eq!(intervals, vec![4, 6, 8, 10, 12]);
    }

    #[test]
    fn only_roll_and_decision_await_the_player() {
        let waiting: Vec<TurnPhase> = TurnPhase::ALL
            .into_iter()
            .filter(|phase| phase.awaits_player())
            .collect();
        assert_eq!(waiting, vec![TurnPhase::Roll, TurnPhase::Decision]);
    }

    #[test]
    fn phase_serializes_snake_case() {
        let json = serde_json::to_string(&TurnPhase::EndTurn).ok();
        assert_eq!(json.as_deref(), Some("\"end_turn\""));
    }

    #[test]
    fn deck_parse_is_case_insensitive() {
        assert_eq!("SIN".parse::<Deck>().ok(), Some(Deck::Sin));
        assert_eq!("virtue".parse::<Deck>().ok(), Some(Deck::Virtue));
    }
}
