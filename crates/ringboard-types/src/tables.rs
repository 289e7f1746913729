//! Fixed-size tables keyed by the closed enumerations.
//!
//! Every ring and every phase has a slot, so lookups cannot miss.

use serde::{Deserialize, Serialize};

use crate::enums::{Ring, TurnPhase};

/// One value per [`Ring`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingMap<T> {
    /// Slot for [`Ring::Career`].
    pub career: T,
    /// Slot for [`Ring::Health`].
    pub health: T,
    /// Slot for [`Ring::Social`].
    pub social: T,
    /// Slot for [`Ring::Personal`].
    pub personal: T,
    /// Slot for [`Ring::Babel`].
    pub babel: T,
}

impl<T> RingMap<T> {
    /// Build a table by evaluating `f` for every ring in clock order.
    pub fn from_fn(mut f: impl FnMut(Ring) -> T) -> Self {
        Self {
            career: f(Ring::Career),
            health: f(Ring::Health),
            social: f(Ring::Social),
            personal: f(Ring::Personal),
            babel: f(Ring::Babel),
        }
    }

    /// Borrow the slot for `ring`.
    pub const fn get(&self, ring: Ring) -> &T {
        match ring {
            Ring::Career => &self.career,
            Ring::Health => &self.health,
            Ring::Social => &self.social,
            Ring::Personal => &self.personal,
            Ring::Babel => &self.babel,
        }
    }

    /// Mutably borrow the slot for `ring`.
    pub const fn get_mut(&mut self, ring: Ring) -> &mut T {
        match ring {
            Ring::Career => &mut self.career,
            Ring::Health => &mut self.health,
            Ring::Social => &mut self.social,
            Ring::Personal => &mut self.personal,
            Ring::Babel => &mut self.babel,
        }
    }

    /// Iterate `(ring, value)` pairs in clock order.
    pub fn iter(&self) -> impl Iterator<Item = (Ring, &T)> {
        Ring::ALL.into_iter().map(move |ring| (ring, self.get(ring)))
    }
}

/// One value per [`TurnPhase`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseMap<T> {
    /// Slot for [`TurnPhase::Idle`].
    pub idle: T,
    /// Slot for [`TurnPhase::Roll`].
    pub roll: T,
    /// Slot for [`TurnPhase::Tile`].
    pub tile: T,
    /// Slot for [`TurnPhase::Card`].
    pub card: T,
    /// Slot for [`TurnPhase::Decision`].
    pub decision: T,
    /// Slot for [`TurnPhase::EndTurn`].
    pub end_turn: T,
}

impl<T> PhaseMap<T> {
    /// Build a table by evaluating `f` for every phase in turn order.
    pub fn from_fn(mut f: impl FnMut(TurnPhase) -> T) -> Self {
        Self {
            idle: f(TurnPhase::Idle),
            roll: f(TurnPhase::Roll),
            tile: f(TurnPhase::Tile),
            card: f(TurnPhase::Card),
            decision: f(TurnPhase::Decision),
            end_turn: f(TurnPhase::EndTurn),
        }
    }

    /// Borrow the slot for `phase`.
    pub const fn get(&self, phase: TurnPhase) -> &T {
        match phase {
            TurnPhase::Idle => &self.idle,
            TurnPhase::Roll => &self.roll,
            TurnPhase::Tile => &self.tile,
            TurnPhase::Card => &self.card,
            TurnPhase::Decision => &self.decision,
            TurnPhase::EndTurn => &self.end_turn,
        }
    }

    /// Mutably borrow the slot for `phase`.
    pub const fn get_mut(&mut self, phase: TurnPhase) -> &mut T {
        match phase {
            TurnPhase::Idle => &mut self.idle,
            TurnPhase::Roll => &mut self.roll,
            TurnPhase::Tile => &mut self.tile,
            TurnPhase::Card => &mut self.card,
            TurnPhase::Decision => &mut self.decision,
            TurnPhase::EndTurn => &mut self.end_turn,
        }
    }

    /// Iterate `(phase, value)` pairs in turn order.
    pub fn iter(&self) -> impl Iterator<Item = (TurnPhase, &T)> {
        TurnPhase::ALL
            .into_iter()
            .map(move |phase| (phase, self.get(phase)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_map_slots_are_independent() {
        let mut map = RingMap::from_fn(Ring::default_interval);
        *map.get_mut(Ring::Social) = 99;
        assert_eq!(*map.get(Ring::Social), 99);
        assert_eq!(*map.get(Ring::Career), 4);
        assert_eq!(map.iter().count(), 5);
    }

    #[test]
    fn phase_map_iterates_in_turn_order() {
        let map = PhaseMap::from_fn(|phase| phase.as_str().len());
        let phases: Vec<TurnPhase> = map.iter().map(|(phase, _)| phase).collect();
        assert_eq!(phases, TurnPhase::ALL.to_vec());
        assert_eq!(*map.get(TurnPhase::EndTurn), "end_turn".len());
    }
}
