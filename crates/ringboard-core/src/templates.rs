//! Ring event template pools and the fixed seed events.
//!
//! Every ring owns a small static pool. When a clock fires, the scheduler
//! picks one template uniformly and instantiates it: ranged magnitudes are
//! rolled, everything else is copied. Seed events are the deterministic
//! opening set queued when a scheduler is constructed.

use chrono::Utc;
use rand::Rng;
use rand::distr::Alphanumeric;
use ringboard_types::{EffectDelta, EventId, EventKind, Ring, RingEvent, Stat};

/// Length of the random suffix on generated event ids.
const ID_SUFFIX_LEN: usize = 6;

/// Size of one stat adjustment in a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Magnitude {
    /// Always exactly this amount.
    Fixed(i64),
    /// Uniform over the inclusive range `min..=max`.
    Ranged {
        /// Lower bound.
        min: i64,
        /// Upper bound.
        max: i64,
    },
}

impl Magnitude {
    /// Resolve to a concrete amount.
    pub fn roll(self, rng: &mut impl Rng) -> i64 {
        match self {
            Self::Fixed(amount) => amount,
            Self::Ranged { min, max } if min < max => rng.random_range(min..=max),
            Self::Ranged { min, .. } => min,
        }
    }
}

/// Static description of a generated ring event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventTemplate {
    /// Whom the event affects.
    pub kind: EventKind,
    /// Headline.
    pub title: &'static str,
    /// Flavor text.
    pub description: &'static str,
    /// Stat adjustments before magnitude rolls.
    pub effects: &'static [(Stat, Magnitude)],
}

impl EventTemplate {
    /// Build a concrete event for `ring` firing on `trigger_turn`.
    pub fn instantiate(&self, ring: Ring, trigger_turn: u64, random: &mut impl Rng) -> RingEvent {
        let effects: EffectDelta = self
            .effects
            .iter()
            .map(|(stat, magnitude)| (*stat, magnitude.roll(random)))
            .collect();
        RingEvent {
            id: generated_id(ring, random),
            ring,
            kind: self.kind,
            title: self.title.to_owned(),
            description: self.description.to_owned(),
            effects,
            trigger_turn,
        }
    }
}

/// Identifier for a generated event: ring, millisecond timestamp, random
/// suffix.
pub fn generated_id(ring: Ring, random: &mut impl Rng) -> EventId {
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| char::from(random.sample(Alphanumeric)))
        .collect();
    EventId::new(format!(
        "{ring}-{}-{suffix}",
        Utc::now().timestamp_millis()
    ))
}

/// The template pool for `ring`.
pub const fn pool(ring: Ring) -> &'static [EventTemplate] {
    match ring {
        Ring::Career => CAREER,
        Ring::Health => HEALTH,
        Ring::Social => SOCIAL,
        Ring::Personal => PERSONAL,
        Ring::Babel => BABEL,
    }
}

/// Pick a template for `ring` uniformly at random.
pub fn choose(ring: Ring, random: &mut impl Rng) -> Option<&'static EventTemplate> {
    let templates = pool(ring);
    if templates.is_empty() {
        return None;
    }
    templates.get(random.random_range(0..templates.len()))
}

/// The opening event for `ring`, firing on `trigger_turn`.
pub fn seed_event(ring: Ring, trigger_turn: u64) -> RingEvent {
    let (id, kind, title, description, effects) = match ring {
        Ring::Career => (
            "seed-career",
            EventKind::Global,
            "Quarterly Review",
            "Every employer in town audits payroll at once.",
            EffectDelta::new().with(Stat::Money, -200),
        ),
        Ring::Health => (
            "seed-health",
            EventKind::Global,
            "Flu Season",
            "A cough spreads through the waiting rooms.",
            EffectDelta::new().with(Stat::Mental, -1),
        ),
        Ring::Social => (
            "seed-social",
            EventKind::Tile,
            "Block Party",
            "The neighbors throw a party on your street.",
            EffectDelta::new().with(Stat::Mental, 1).with(Stat::Money, -100),
        ),
        Ring::Personal => (
            "seed-personal",
            EventKind::Tile,
            "Quiet Sunday",
            "A rare free day to think things over.",
            EffectDelta::new().with(Stat::Mental, 2),
        ),
        Ring::Babel => (
            "seed-babel",
            EventKind::Global,
            "The Tower Speaks",
            "Every screen in the city shows the same message.",
            EffectDelta::new().with(Stat::Sin, 1).with(Stat::Virtue, 1),
        ),
    };
    RingEvent {
        id: EventId::from(id),
        ring,
        kind,
        title: title.to_owned(),
        description: description.to_owned(),
        effects,
        trigger_turn,
    }
}

// ---------------------------------------------------------------------------
// Pools
// ---------------------------------------------------------------------------

const CAREER: &[EventTemplate] = &[
    EventTemplate {
        kind: EventKind::Global,
        title: "Market Dip",
        description: "Stocks slide and bonuses shrink across the board.",
        effects: &[(Stat::Money, Magnitude::Ranged { min: -800, max: -200 })],
    },
    EventTemplate {
        kind: EventKind::Tile,
        title: "Surprise Promotion",
        description: "Your manager leaves and you inherit the title.",
        effects: &[
            (Stat::Money, Magnitude::Ranged { min: 300, max: 1_200 }),
            (Stat::Mental, Magnitude::Fixed(-1)),
        ],
    },
    EventTemplate {
        kind: EventKind::Tile,
        title: "Overtime Crunch",
        description: "A deadline eats every evening this week.",
        effects: &[
            (Stat::Money, Magnitude::Fixed(400)),
            (Stat::Mental, Magnitude::Fixed(-2)),
        ],
    },
];

const HEALTH: &[EventTemplate] = &[
    EventTemplate {
        kind: EventKind::Tile,
        title: "Sprained Ankle",
        description: "A missed step on the stairs costs a clinic visit.",
        effects: &[
            (Stat::Money, Magnitude::Ranged { min: -500, max: -100 }),
            (Stat::Mental, Magnitude::Fixed(-1)),
        ],
    },
    EventTemplate {
        kind: EventKind::Global,
        title: "Heat Wave",
        description: "Nobody sleeps well for a week.",
        effects: &[(Stat::Mental, Magnitude::Ranged { min: -2, max: -1 })],
    },
    EventTemplate {
        kind: EventKind::Tile,
        title: "Clean Checkup",
        description: "The doctor has nothing but good news.",
        effects: &[(Stat::Mental, Magnitude::Fixed(2))],
    },
];

const SOCIAL: &[EventTemplate] = &[
    EventTemplate {
        kind: EventKind::Tile,
        title: "Old Friend Calls",
        description: "A long phone call leaves you lighter.",
        effects: &[(Stat::Mental, Magnitude::Fixed(1))],
    },
    EventTemplate {
        kind: EventKind::Global,
        title: "Wedding Season",
        description: "Invitations arrive with gift registries attached.",
        effects: &[(Stat::Money, Magnitude::Ranged { min: -400, max: -150 })],
    },
    EventTemplate {
        kind: EventKind::Tile,
        title: "Gossip Spreads",
        description: "Someone repeated what you said in confidence.",
        effects: &[
            (Stat::Mental, Magnitude::Fixed(-1)),
            (Stat::Sin, Magnitude::Fixed(1)),
        ],
    },
];

const PERSONAL: &[EventTemplate] = &[
    EventTemplate {
        kind: EventKind::Tile,
        title: "New Hobby",
        description: "You pick up an instrument and some gear to go with it.",
        effects: &[
            (Stat::Money, Magnitude::Ranged { min: -300, max: -50 }),
            (Stat::Mental, Magnitude::Fixed(2)),
        ],
    },
    EventTemplate {
        kind: EventKind::Tile,
        title: "Volunteer Shift",
        description: "An afternoon at the shelter.",
        effects: &[(Stat::Virtue, Magnitude::Ranged { min: 1, max: 2 })],
    },
    EventTemplate {
        kind: EventKind::Tile,
        title: "Sleepless Night",
        description: "Old regrets keep you up.",
        effects: &[(Stat::Mental, Magnitude::Fixed(-1))],
    },
];

const BABEL: &[EventTemplate] = &[
    EventTemplate {
        kind: EventKind::Global,
        title: "Tower Tithe",
        description: "The tower collects its due from everyone.",
        effects: &[(Stat::Money, Magnitude::Ranged { min: -1_000, max: -300 })],
    },
    EventTemplate {
        kind: EventKind::Global,
        title: "Confusion of Tongues",
        description: "For a day no one understands anyone else.",
        effects: &[
            (Stat::Mental, Magnitude::Fixed(-2)),
            (Stat::Sin, Magnitude::Fixed(1)),
        ],
    },
    EventTemplate {
        kind: EventKind::Global,
        title: "Shared Vision",
        description: "The city dreams the same dream.",
        effects: &[(Stat::Virtue, Magnitude::Ranged { min: 1, max: 3 })],
    },
];

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

    #[test]
    fn every_ring_has_a_pool() {
        for ring in Ring::ALL {
            assert!(!pool(ring).is_empty(), "{ring}");
        }
    }

    #[test]
    fn ranged_magnitudes_stay_in_bounds() {
        let mut rng = SmallRng::seed_from_u64(11);
        let magnitude = Magnitude::Ranged { min: -800, max: -200 };
        for _ in 0..500 {
            let amount = magnitude.roll(&mut rng);
            assert!((-800..=-200).contains(&amount));
        }
    }

    #[test]
    fn degenerate_range_is_its_lower_bound() {
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(Magnitude::Ranged { min: 5, max: 5 }.roll(&mut rng), 5);
        assert_eq!(Magnitude::Ranged { min: 9, max: 2 }.roll(&mut rng), 9);
    }

    #[test]
    fn instantiated_event_carries_template_fields() {
        let mut rng = SmallRng::seed_from_u64(3);
        let template = pool(Ring::Health).get(2).unwrap();
        let event = template.instantiate(Ring::Health, 18, &mut rng);
        assert_eq!(event.ring, Ring::Health);
        assert_eq!(event.trigger_turn, 18);
        assert_eq!(event.title, "Clean Checkup");
        assert_eq!(event.effects.get(Stat::Mental), Some(2));
        assert!(event.id.as_str().starts_with("health-"));
    }

    #[test]
    fn generated_ids_have_a_six_char_suffix() {
        let mut rng = SmallRng::seed_from_u64(5);
        let id = generated_id(Ring::Babel, &mut rng);
        let suffix = id.as_str().rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, generated_id(Ring::Babel, &mut rng));
    }

    #[test]
    fn seed_events_use_fixed_ids() {
        let ids: Vec<String> = Ring::ALL
            .iter()
            .map(|ring| seed_event(*ring, ring.default_interval()).id.to_string())
            .collect();
        assert_eq!(
            ids,
            [
                "seed-career",
                "seed-health",
                "seed-social",
                "seed-personal",
                "seed-babel"
            ]
        );
    }
}
