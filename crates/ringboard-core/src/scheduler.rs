//! Ring clocks and the world event queue.
//!
//! Each ring runs its own periodic clock against a shared turn counter.
//! When a clock comes due the scheduler queues one event for that ring on
//! the current turn. Queued events are retired into an append-only history
//! by [`RingEventScheduler::process_events`], exactly once each.
//!
//! # Invariants
//!
//! - `next_trigger == last_trigger + interval` for every clock.
//! - `last_trigger` never moves backwards.
//! - An event is either queued or in history, never both.

use std::collections::BTreeMap;

use rand::Rng;
use ringboard_types::{Ring, RingEvent, RingMap};
use tracing::debug;

use crate::templates;

/// Errors raised while building or advancing the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// Turn counter would overflow.
    #[error("turn counter overflow: cannot advance beyond u64::MAX")]
    TurnOverflow,

    /// A ring was configured with an interval of zero.
    #[error("invalid interval for ring {ring}: must be at least 1")]
    InvalidInterval {
        /// The offending ring.
        ring: Ring,
    },
}

/// Scheduling state for one ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingClock {
    ring: Ring,
    interval: u64,
    last_trigger: u64,
    next_trigger: u64,
}

impl RingClock {
    /// A clock that has never fired: first firing on turn `interval`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidInterval`] for a zero interval.
    pub const fn new(ring: Ring, interval: u64) -> Result<Self, SchedulerError> {
        if interval == 0 {
            return Err(SchedulerError::InvalidInterval { ring });
        }
        Ok(Self {
            ring,
            interval,
            last_trigger: 0,
            next_trigger: interval,
        })
    }

    /// The ring this clock drives.
    pub const fn ring(&self) -> Ring {
        self.ring
    }

    /// Turns between firings.
    pub const fn interval(&self) -> u64 {
        self.interval
    }

    /// Turn of the most recent firing, 0 if none yet.
    pub const fn last_trigger(&self) -> u64 {
        self.last_trigger
    }

    /// Turn of the next scheduled firing.
    pub const fn next_trigger(&self) -> u64 {
        self.next_trigger
    }

    /// Whether the clock is due on `turn`.
    pub const fn is_due(&self, turn: u64) -> bool {
        self.next_trigger <= turn
    }

    /// Record a firing on `turn` and schedule the next one.
    const fn fire(&mut self, turn: u64) {
        if turn > self.last_trigger {
            self.last_trigger = turn;
        }
        self.next_trigger = self.last_trigger.saturating_add(self.interval);
    }
}

/// Owns the ring clocks, the pending event queue and the fired history.
#[derive(Debug, Clone)]
pub struct RingEventScheduler {
    turn: u64,
    clocks: RingMap<RingClock>,
    /// Keyed by `(trigger_turn, insertion sequence)`.
    queue: BTreeMap<(u64, u64), RingEvent>,
    next_seq: u64,
    history: Vec<RingEvent>,
}

impl RingEventScheduler {
    /// Build a scheduler on turn 1 and queue one seed event per ring on that
    /// ring's first firing turn. Turn 1 is never advanced into, so a clock
    /// due on it has its seed placed on turn 2.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidInterval`] if any interval is zero.
    pub fn new(intervals: &RingMap<u64>) -> Result<Self, SchedulerError> {
        let clocks = RingMap {
            career: RingClock::new(Ring::Career, intervals.career)?,
            health: RingClock::new(Ring::Health, intervals.health)?,
            social: RingClock::new(Ring::Social, intervals.social)?,
            personal: RingClock::new(Ring::Personal, intervals.personal)?,
            babel: RingClock::new(Ring::Babel, intervals.babel)?,
        };
        Ok(Self::from_clocks(clocks))
    }

    /// Build a scheduler with the stock intervals (4, 6, 8, 10, 12).
    pub fn with_default_intervals() -> Self {
        let clocks = RingMap::from_fn(|ring| RingClock {
            ring,
            interval: ring.default_interval(),
            last_trigger: 0,
            next_trigger: ring.default_interval(),
        });
        Self::from_clocks(clocks)
    }

    fn from_clocks(clocks: RingMap<RingClock>) -> Self {
        let mut scheduler = Self {
            turn: 1,
            clocks,
            queue: BTreeMap::new(),
            next_seq: 0,
            history: Vec::new(),
        };
        let first_playable = scheduler.turn.saturating_add(1);
        for ring in Ring::ALL {
            let at = scheduler.clocks.get(ring).next_trigger().max(first_playable);
            scheduler.enqueue(templates::seed_event(ring, at));
        }
        scheduler
    }

    /// The current turn.
    pub const fn current_turn(&self) -> u64 {
        self.turn
    }

    /// The clock for `ring`.
    pub const fn clock(&self, ring: Ring) -> &RingClock {
        self.clocks.get(ring)
    }

    /// Every clock, in ring order.
    pub fn clocks(&self) -> impl Iterator<Item = &RingClock> {
        self.clocks.iter().map(|(_, clock)| clock)
    }

    /// Advance one turn and fire every clock that comes due.
    ///
    /// A due ring gets a freshly generated event unless one is already
    /// queued for it on this turn (the seed event covers a clock's first
    /// firing). Returns the rings that fired, in ring order.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::TurnOverflow`] if the counter is exhausted.
    pub fn advance_turn(&mut self, random: &mut impl Rng) -> Result<Vec<Ring>, SchedulerError> {
        let turn = self
            .turn
            .checked_add(1)
            .ok_or(SchedulerError::TurnOverflow)?;
        self.turn = turn;

        let mut triggered = Vec::new();
        for ring in Ring::ALL {
            if !self.clocks.get(ring).is_due(turn) {
                continue;
            }
            self.clocks.get_mut(ring).fire(turn);
            if !self.has_queued(ring, turn)
                && let Some(template) = templates::choose(ring, random)
            {
                self.enqueue(template.instantiate(ring, turn, random));
            }
            debug!(
                ring = %ring,
                turn,
                next_trigger = self.clocks.get(ring).next_trigger(),
                "ring clock fired"
            );
            triggered.push(ring);
        }
        Ok(triggered)
    }

    /// Queued events firing on `turn`, in insertion order. Does not mutate.
    pub fn active_events(&self, turn: u64) -> Vec<RingEvent> {
        self.queue
            .range((turn, 0)..=(turn, u64::MAX))
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Queued events firing on the current turn.
    pub fn current_events(&self) -> Vec<RingEvent> {
        self.active_events(self.turn)
    }

    /// Queued events strictly after the current turn and within `lookahead`
    /// turns of it.
    pub fn upcoming_events(&self, lookahead: u64) -> Vec<RingEvent> {
        if lookahead == 0 {
            return Vec::new();
        }
        let Some(start) = self.turn.checked_add(1) else {
            return Vec::new();
        };
        let end = self.turn.saturating_add(lookahead);
        self.queue
            .range((start, 0)..=(end, u64::MAX))
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Retire every event queued for `turn` into history and return them.
    ///
    /// A second call for the same turn returns nothing.
    pub fn process_events(&mut self, turn: u64) -> Vec<RingEvent> {
        let keys: Vec<(u64, u64)> = self
            .queue
            .range((turn, 0)..=(turn, u64::MAX))
            .map(|(key, _)| *key)
            .collect();
        let mut fired = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(event) = self.queue.remove(&key) {
                self.history.push(event.clone());
                fired.push(event);
            }
        }
        fired
    }

    /// Retire the events queued for the current turn.
    pub fn process_current(&mut self) -> Vec<RingEvent> {
        self.process_events(self.turn)
    }

    /// Every fired event, oldest first.
    pub fn history(&self) -> &[RingEvent] {
        &self.history
    }

    /// Number of events still queued.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    fn has_queued(&self, ring: Ring, turn: u64) -> bool {
        self.queue
            .range((turn, 0)..=(turn, u64::MAX))
            .any(|(_, event)| event.ring == ring)
    }

    fn enqueue(&mut self, event: RingEvent) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.queue.insert((event.trigger_turn, seq), event);
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    fn advance_to(scheduler: &mut RingEventScheduler, target: u64, rng: &mut SmallRng) {
        while scheduler.current_turn() < target {
            scheduler.advance_turn(rng).unwrap();
            scheduler.process_current();
        }
    }

    #[test]
    fn starts_on_turn_one_with_seed_events() {
        let scheduler = RingEventScheduler::with_default_intervals();
        assert_eq!(scheduler.current_turn(), 1);
        assert_eq!(scheduler.queued(), 5);
        assert!(scheduler.history().is_empty());
        let career = scheduler.clock(Ring::Career);
        assert_eq!(career.last_trigger(), 0);
        assert_eq!(career.next_trigger(), 4);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let intervals = RingMap {
            social: 0,
            ..RingMap::from_fn(Ring::default_interval)
        };
        assert_eq!(
            RingEventScheduler::new(&intervals).unwrap_err(),
            SchedulerError::InvalidInterval { ring: Ring::Social }
        );
    }

    #[test]
    fn interval_one_seed_fires_on_the_first_advance() {
        let mut rng = SmallRng::seed_from_u64(5);
        let intervals = RingMap {
            career: 1,
            ..RingMap::from_fn(Ring::default_interval)
        };
        let mut scheduler = RingEventScheduler::new(&intervals).unwrap();
        assert!(scheduler.active_events(1).is_empty());
        assert_eq!(scheduler.clock(Ring::Career).next_trigger(), 1);

        let rings = scheduler.advance_turn(&mut rng).unwrap();
        assert_eq!(rings, vec![Ring::Career]);
        let fired = scheduler.process_current();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired.first().unwrap().id.as_str(), "seed-career");
        assert_eq!(scheduler.clock(Ring::Career).next_trigger(), 3);

        for _ in 0..10 {
            scheduler.advance_turn(&mut rng).unwrap();
            scheduler.process_current();
        }
        assert_eq!(
            scheduler
                .history()
                .iter()
                .filter(|event| event.id.as_str() == "seed-career")
                .count(),
            1
        );
        assert!(scheduler.active_events(1).is_empty());
        assert!(scheduler.queue.keys().all(|(turn, _)| *turn > scheduler.current_turn()));
    }

    #[test]
    fn interval_four_fires_on_multiples_of_four() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut scheduler = RingEventScheduler::with_default_intervals();
        let mut fired_on = Vec::new();
        for _ in 0..11 {
            let rings = scheduler.advance_turn(&mut rng).unwrap();
            if rings.contains(&Ring::Career) {
                fired_on.push(scheduler.current_turn());
                let clock = scheduler.clock(Ring::Career);
                assert_eq!(clock.last_trigger(), scheduler.current_turn());
                assert_eq!(clock.next_trigger(), scheduler.current_turn() + 4);
            }
        }
        assert_eq!(fired_on, vec![4, 8, 12]);
    }

    #[test]
    fn clock_invariant_holds_every_turn() {
        let mut rng = SmallRng::seed_from_u64(9);
        let mut scheduler = RingEventScheduler::with_default_intervals();
        let mut last = RingMap::from_fn(|_| 0_u64);
        for _ in 0..60 {
            scheduler.advance_turn(&mut rng).unwrap();
            for clock in scheduler.clocks() {
                assert_eq!(clock.next_trigger(), clock.last_trigger() + clock.interval());
                assert!(clock.last_trigger() >= *last.get(clock.ring()));
                *last.get_mut(clock.ring()) = clock.last_trigger();
            }
        }
    }

    #[test]
    fn several_clocks_can_fire_on_one_turn() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut scheduler = RingEventScheduler::with_default_intervals();
        let mut triggered = Vec::new();
        for _ in 0..11 {
            triggered = scheduler.advance_turn(&mut rng).unwrap();
        }
        assert_eq!(scheduler.current_turn(), 12);
        assert_eq!(triggered, vec![Ring::Career, Ring::Health, Ring::Babel]);
    }

    #[test]
    fn processing_a_turn_twice_yields_nothing_the_second_time() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut scheduler = RingEventScheduler::with_default_intervals();
        for _ in 0..3 {
            scheduler.advance_turn(&mut rng).unwrap();
        }
        let active = scheduler.active_events(4);
        assert_eq!(active.len(), 1);
        let first = scheduler.process_events(4);
        assert_eq!(first, active);
        assert!(scheduler.process_events(4).is_empty());
        assert_eq!(scheduler.history().len(), 1);
        assert!(scheduler.active_events(4).is_empty());
    }

    #[test]
    fn active_events_does_not_mutate() {
        let scheduler = RingEventScheduler::with_default_intervals();
        let before = scheduler.queued();
        assert_eq!(scheduler.active_events(6).len(), 1);
        assert_eq!(scheduler.active_events(6).len(), 1);
        assert_eq!(scheduler.queued(), before);
    }

    #[test]
    fn no_active_events_is_an_empty_set() {
        let mut scheduler = RingEventScheduler::with_default_intervals();
        assert!(scheduler.current_events().is_empty());
        assert!(scheduler.process_events(3).is_empty());
    }

    #[test]
    fn twelve_turns_fire_eight_events() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut scheduler = RingEventScheduler::with_default_intervals();
        advance_to(&mut scheduler, 12, &mut rng);

        let history = scheduler.history();
        assert_eq!(history.len(), 8);
        let count = |ring: Ring| history.iter().filter(|e| e.ring == ring).count();
        assert_eq!(count(Ring::Career), 3);
        assert_eq!(count(Ring::Health), 2);
        assert_eq!(count(Ring::Social), 1);
        assert_eq!(count(Ring::Personal), 1);
        assert_eq!(count(Ring::Babel), 1);
        assert_eq!(scheduler.queued(), 0);
    }

    #[test]
    fn each_fired_event_appears_in_history_once() {
        let mut rng = SmallRng::seed_from_u64(77);
        let mut scheduler = RingEventScheduler::with_default_intervals();
        advance_to(&mut scheduler, 40, &mut rng);
        let mut ids: Vec<_> = scheduler.history().iter().map(|e| e.id.clone()).collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }

    #[test]
    fn upcoming_window_excludes_the_current_turn() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut scheduler = RingEventScheduler::with_default_intervals();
        for _ in 0..3 {
            scheduler.advance_turn(&mut rng).unwrap();
        }
        assert_eq!(scheduler.current_turn(), 4);
        let upcoming: Vec<u64> = scheduler
            .upcoming_events(4)
            .iter()
            .map(|e| e.trigger_turn)
            .collect();
        assert_eq!(upcoming, vec![6, 8]);
        assert!(scheduler.upcoming_events(0).is_empty());
    }

    #[test]
    fn generated_events_are_reproducible_with_a_seed() {
        let run = || {
            let mut rng = SmallRng::seed_from_u64(2024);
            let mut scheduler = RingEventScheduler::with_default_intervals();
            advance_to(&mut scheduler, 24, &mut rng);
            scheduler
                .history()
                .iter()
                .map(|e| (e.ring, e.title.clone(), e.effects.clone(), e.trigger_turn))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn events_on_one_turn_keep_insertion_order() {
        let mut rng = SmallRng::seed_from_u64(8);
        let mut scheduler = RingEventScheduler::with_default_intervals();
        for _ in 0..11 {
            scheduler.advance_turn(&mut rng).unwrap();
        }
        let rings: Vec<Ring> = scheduler.current_events().iter().map(|e| e.ring).collect();
        assert_eq!(rings, vec![Ring::Babel, Ring::Career, Ring::Health]);
    }
}
