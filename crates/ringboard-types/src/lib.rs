//! Shared type definitions for the Ringboard turn engine.
//!
//! This crate is the single source of truth for every type that crosses a
//! crate or transport boundary. Types with `#[ts(export)]` flow to
//! `TypeScript` via `ts-rs` for the game client.
//!
//! # Modules
//!
//! - [`ids`] -- Identifier newtypes for games, players, cards and events
//! - [`enums`] -- Closed vocabularies (rings, phases, decks, stats)
//! - [`tables`] -- Fixed-size tables keyed by rings and phases
//! - [`structs`] -- Stat vectors, effects, ring events, cards, turn context
//! - [`messages`] -- Inbound actions and outbound session events

pub mod enums;
pub mod ids;
pub mod messages;
pub mod structs;
pub mod tables;

// Re-export all public types at crate root for convenience.
pub use enums::{Deck, EventKind, ParseEnumError, Rarity, Ring, Stat, TurnPhase};
pub use ids::{CardId, EventId, GameId, PlayerId};
pub use messages::{
    CardChoiceAction, CardResolved, PhaseTimedOut, PlayerSeat, RollAction, SessionEvent,
    SessionSnapshot, TurnResult, TurnStarted,
};
pub use structs::{
    Card, CardChoice, CardTemplate, ChoiceConditions, ChoiceTriggers, DiceBranch, EffectDelta,
    PendingDecision, PlayerState, PlayerStats, RingEvent, TileResult, TurnContext,
};
pub use tables::{PhaseMap, RingMap};
