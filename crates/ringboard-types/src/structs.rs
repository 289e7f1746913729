//! Core data structs: stat vectors, effects, ring events, cards, turn context.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Deck, EventKind, Rarity, Ring, Stat};
use crate::ids::{CardId, EventId, PlayerId};

// ---------------------------------------------------------------------------
// Stats and effects
// ---------------------------------------------------------------------------

/// A player's stat vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PlayerStats {
    /// Cash on hand. May go negative.
    pub money: i64,
    /// Mental state.
    pub mental: i64,
    /// Sin accumulator.
    pub sin: i64,
    /// Virtue accumulator.
    pub virtue: i64,
}

impl PlayerStats {
    /// Read a single stat.
    pub const fn get(&self, stat: Stat) -> i64 {
        match stat {
            Stat::Money => self.money,
            Stat::Mental => self.mental,
            Stat::Sin => self.sin,
            Stat::Virtue => self.virtue,
        }
    }

    /// Mutably borrow a single stat.
    pub const fn get_mut(&mut self, stat: Stat) -> &mut i64 {
        match stat {
            Stat::Money => &mut self.money,
            Stat::Mental => &mut self.mental,
            Stat::Sin => &mut self.sin,
            Stat::Virtue => &mut self.virtue,
        }
    }
}

/// A partial stat vector of signed adjustments.
///
/// Serialized as a plain map, e.g. `{"money": -500, "mental": 1}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EffectDelta(pub BTreeMap<Stat, i64>);

impl EffectDelta {
    /// An empty delta.
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder: set the adjustment for `stat`, replacing any earlier value.
    #[must_use]
    pub fn with(mut self, stat: Stat, amount: i64) -> Self {
        self.0.insert(stat, amount);
        self
    }

    /// The adjustment for `stat`, if the delta names it.
    pub fn get(&self, stat: Stat) -> Option<i64> {
        self.0.get(&stat).copied()
    }

    /// Whether the delta names no stats.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(stat, amount)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Stat, i64)> + '_ {
        self.0.iter().map(|(stat, amount)| (*stat, *amount))
    }

    /// Sum of two deltas, stat by stat.
    #[must_use]
    pub fn combined(&self, other: &Self) -> Self {
        let mut out = self.clone();
        for (stat, amount) in other.iter() {
            let slot = out.0.entry(stat).or_insert(0);
            *slot = slot.saturating_add(amount);
        }
        out
    }
}

impl FromIterator<(Stat, i64)> for EffectDelta {
    fn from_iter<I: IntoIterator<Item = (Stat, i64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Ring events
// ---------------------------------------------------------------------------

/// A world event injected into the timeline by a ring clock.
///
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct RingEvent {
    /// Unique event key.
    pub id: EventId,
    /// The ring whose clock produced the event.
    pub ring: Ring,
    /// Whom the event affects.
    pub kind: EventKind,
    /// Short headline.
    pub title: String,
    /// Flavor text.
    pub description: String,
    /// Stat adjustment applied when the event fires.
    pub effects: EffectDelta,
    /// The scheduler turn on which the event fires.
    pub trigger_turn: u64,
}

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

/// A card template record as stored in the catalog files.
///
/// The deck is implied by which list the record sits in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CardTemplate {
    /// Catalog key.
    pub id: CardId,
    /// Display name.
    pub name: String,
    /// Free-form card type (e.g. `temptation`, `opportunity`).
    #[serde(rename = "type")]
    pub card_type: String,
    /// Category; ring-driven draws match it against the ring name.
    pub category: String,
    /// Flavor text.
    #[serde(default)]
    pub description: String,
    /// The options offered to the player.
    #[serde(default)]
    pub choices: Vec<CardChoice>,
    /// Print rarity.
    #[serde(default)]
    pub rarity: Rarity,
    /// Earliest round in which the card may be drawn.
    #[serde(default)]
    pub min_round: Option<u32>,
}

impl CardTemplate {
    /// Attach the deck the template was loaded from.
    pub fn into_card(self, deck: Deck) -> Card {
        Card {
            id: self.id,
            name: self.name,
            deck,
            card_type: self.card_type,
            category: self.category,
            description: self.description,
            choices: self.choices,
            rarity: self.rarity,
            min_round: self.min_round,
        }
    }
}

/// A drawable card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Card {
    /// Catalog key.
    pub id: CardId,
    /// Display name.
    pub name: String,
    /// The deck the card belongs to.
    pub deck: Deck,
    /// Free-form card type.
    #[serde(rename = "type")]
    pub card_type: String,
    /// Category.
    pub category: String,
    /// Flavor text.
    pub description: String,
    /// The options offered to the player.
    pub choices: Vec<CardChoice>,
    /// Print rarity.
    pub rarity: Rarity,
    /// Earliest round in which the card may be drawn.
    pub min_round: Option<u32>,
}

impl Card {
    /// Whether drawing this card puts the turn into the decision phase.
    pub const fn requires_choice(&self) -> bool {
        !self.choices.is_empty()
    }
}

/// One option on a card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CardChoice {
    /// Label shown to the player.
    pub text: String,
    /// Unconditional stat adjustment.
    #[serde(default)]
    pub effects: EffectDelta,
    /// Requirements the player must meet to pick this option.
    #[serde(default)]
    pub conditions: Option<ChoiceConditions>,
    /// Extra consequences: tags and dice branches.
    #[serde(default)]
    pub triggers: Option<ChoiceTriggers>,
}

/// Preconditions on a card choice. Every present requirement must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ChoiceConditions {
    /// Money must be at least this much.
    #[serde(default)]
    pub requires_money: Option<i64>,
    /// Mental must be at least this much.
    #[serde(default)]
    pub requires_mental: Option<i64>,
    /// The player must already carry this tag.
    #[serde(default)]
    pub requires_tag: Option<String>,
}

/// Side effects of picking a card choice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ChoiceTriggers {
    /// Tags appended to the player's tag list.
    #[serde(default)]
    pub add_tags: Vec<String>,
    /// Branches selected by a d6 roll. Empty means no roll.
    #[serde(default)]
    pub dice: Vec<DiceBranch>,
}

/// One outcome of a dice trigger, covering the inclusive roll range
/// `min..=max`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DiceBranch {
    /// Lowest roll covered.
    pub min: u8,
    /// Highest roll covered.
    pub max: u8,
    /// Adjustment applied when the roll lands in range.
    #[serde(default)]
    pub effects: EffectDelta,
}

impl DiceBranch {
    /// Whether `roll` falls inside this branch.
    pub const fn covers(&self, roll: u8) -> bool {
        self.min <= roll && roll <= self.max
    }
}

// ---------------------------------------------------------------------------
// Players and turns
// ---------------------------------------------------------------------------

/// A seated player and everything the engine tracks about them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct PlayerState {
    /// Player identifier.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Current stat vector.
    pub stats: PlayerStats,
    /// Tag multiset, in the order tags were gained.
    pub tags: Vec<String>,
    /// Board tile the player stands on.
    pub position: u32,
}

/// Where a roll landed the active player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TileResult {
    /// The die value that moved the player.
    pub roll: u8,
    /// Tile index after moving.
    pub position: u32,
}

/// A card choice the active player still owes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct PendingDecision {
    /// The card awaiting a choice.
    pub card_id: CardId,
    /// Number of options on that card.
    pub choice_count: usize,
}

/// Per-turn scratch state owned by the turn state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TurnContext {
    /// Whose turn it is. `None` before the first turn.
    pub player_id: Option<PlayerId>,
    /// Turn number, starting at 1.
    pub turn: u64,
    /// Seconds shown on the turn timer.
    pub time_remaining: u32,
    /// Die value of this turn's roll.
    pub last_roll: Option<u8>,
    /// Landing tile of this turn's roll.
    pub last_tile: Option<TileResult>,
    /// Most recently drawn card.
    pub last_card: Option<CardId>,
    /// Card choice still owed by the player.
    pub pending_decision: Option<PendingDecision>,
}

impl TurnContext {
    /// Seconds on the turn timer for a fresh context.
    pub const DEFAULT_TIME_REMAINING: u32 = 30;

    /// A fresh context: no player, turn 1, a full timer.
    pub const fn fresh(time_remaining: u32) -> Self {
        Self {
            player_id: None,
            turn: 1,
            time_remaining,
            last_roll: None,
            last_tile: None,
            last_card: None,
            pending_decision: None,
        }
    }
}

impl Default for TurnContext {
    fn default() -> Self {
        Self::fresh(Self::DEFAULT_TIME_REMAINING)
    }
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
    fn effect_delta_parses_from_plain_map() {
        let delta: EffectDelta = serde_json::from_str(r#"{"money": -500, "mental": 1}"#).unwrap();
        assert_eq!(delta.get(Stat::Money), Some(-500));
        assert_eq!(delta.get(Stat::Mental), Some(1));
        assert_eq!(delta.get(Stat::Sin), None);
    }

    #[test]
    fn combined_deltas_sum_shared_stats() {
        let base = EffectDelta::new().with(Stat::Money, 100).with(Stat::Sin, 1);
        let branch = EffectDelta::new().with(Stat::Money, -300);
        let sum = base.combined(&branch);
        assert_eq!(sum.get(Stat::Money), Some(-200));
        assert_eq!(sum.get(Stat::Sin), Some(1));
    }

    #[test]
    fn template_record_parses_with_optional_fields() {
        let json = r#"{
            "id": "sin_001",
            "name": "Office Gamble",
            "type": "temptation",
            "category": "career",
            "description": "A coworker runs a betting pool.",
            "choices": [
                {"text": "Bet big", "effects": {}, "conditions": {"requires_money": 5000},
                 "triggers": {"dice": [
                    {"min": 1, "max": 2, "effects": {"money": -5000}},
                    {"min": 3, "max": 6, "effects": {"money": 8000}}
                 ]}},
                {"text": "Walk away", "effects": {"virtue": 1}}
            ],
            "rarity": "rare"
        }"#;
        let template: CardTemplate = serde_json::from_str(json).unwrap();
        let card = template.into_card(Deck::Sin);
        assert_eq!(card.deck, Deck::Sin);
        assert_eq!(card.rarity, Rarity::Rare);
        assert_eq!(card.min_round, None);
        assert!(card.requires_choice());
        let gamble = card.choices.first().unwrap();
        let dice = &gamble.triggers.as_ref().unwrap().dice;
        assert_eq!(dice.len(), 2);
        assert!(dice.first().unwrap().covers(2));
        assert!(!dice.first().unwrap().covers(3));
    }

    #[test]
    fn outbound_state_uses_camel_case_keys() {
        let ctx = TurnContext {
            last_roll: Some(4),
            last_tile: Some(TileResult {
                roll: 4,
                position: 4,
            }),
            pending_decision: Some(PendingDecision {
                card_id: CardId::new("sin_001"),
                choice_count: 2,
            }),
            ..TurnContext::default()
        };
        let value = serde_json::to_value(&ctx).unwrap();
        assert_eq!(value["timeRemaining"], 30);
        assert_eq!(value["lastRoll"], 4);
        assert_eq!(value["pendingDecision"]["cardId"], "sin_001");
        assert_eq!(value["pendingDecision"]["choiceCount"], 2);
        assert!(value.get("pending_decision").is_none());

        let card = CardTemplate {
            id: CardId::new("vir_002"),
            name: "Night Class".to_owned(),
            card_type: "opportunity".to_owned(),
            category: "career".to_owned(),
            description: String::new(),
            choices: Vec::new(),
            rarity: Rarity::default(),
            min_round: Some(2),
        }
        .into_card(Deck::Virtue);
        let value = serde_json::to_value(&card).unwrap();
        assert_eq!(value["minRound"], 2);
        assert_eq!(value["type"], "opportunity");
    }

    #[test]
    fn fresh_context_starts_at_turn_one() {
        let ctx = TurnContext::default();
        assert_eq!(ctx.turn, 1);
        assert_eq!(ctx.time_remaining, 30);
        assert!(ctx.player_id.is_none());
        assert!(ctx.pending_decision.is_none());
    }
}
