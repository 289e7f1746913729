//! Stat effects, choice preconditions and dice branches.
//!
//! The resolver is stateless: every call works on the stats and tags it is
//! handed and touches nothing else. Money and mental saturate at the `i64`
//! limits; sin and virtue are accumulators and never drop below zero.

use rand::Rng;
use ringboard_types::{CardChoice, ChoiceConditions, DiceBranch, EffectDelta, PlayerStats};
use tracing::debug;

/// Faces on the die used by dice triggers.
pub const DIE_FACES: u8 = 6;

/// A requirement a card choice can place on the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Money at least this much.
    Money(i64),
    /// Mental at least this much.
    Mental(i64),
    /// This tag present.
    Tag(String),
}

impl core::fmt::Display for Requirement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Money(threshold) => write!(f, "money >= {threshold}"),
            Self::Mental(threshold) => write!(f, "mental >= {threshold}"),
            Self::Tag(tag) => write!(f, "tag `{tag}`"),
        }
    }
}

/// Errors from resolving a card choice.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EffectError {
    /// The player does not meet a requirement. Nothing was applied.
    #[error("precondition failed: requires {requirement}")]
    PreconditionFailed {
        /// The first unmet requirement.
        requirement: Requirement,
    },

    /// The choice index is outside the card's options.
    #[error("choice {index} out of range for a card with {count} choices")]
    InvalidChoice {
        /// Requested index.
        index: usize,
        /// Number of options on the card.
        count: usize,
    },
}

/// What resolving a choice did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceOutcome {
    /// The combined delta that was applied.
    pub applied: EffectDelta,
    /// Die value, if the choice rolled.
    pub dice_roll: Option<u8>,
    /// Tags appended to the player.
    pub added_tags: Vec<String>,
}

/// Applies deltas and resolves card choices.
#[derive(Debug, Clone, Copy, Default)]
pub struct EffectResolver;

impl EffectResolver {
    /// Add `delta` to `stats`. Stats the delta does not name are untouched.
    pub fn apply(stats: &mut PlayerStats, delta: &EffectDelta) {
        for (stat, amount) in delta.iter() {
            let slot = stats.get_mut(stat);
            let next = slot.saturating_add(amount);
            *slot = if stat.is_accumulator() { next.max(0) } else { next };
        }
    }

    /// Check every present requirement.
    ///
    /// # Errors
    ///
    /// Returns [`EffectError::PreconditionFailed`] naming the first unmet
    /// requirement, checked in the order money, mental, tag.
    pub fn check_conditions(
        stats: &PlayerStats,
        tags: &[String],
        conditions: &ChoiceConditions,
    ) -> Result<(), EffectError> {
        if let Some(threshold) = conditions.requires_money
            && stats.money < threshold
        {
            return Err(EffectError::PreconditionFailed {
                requirement: Requirement::Money(threshold),
            });
        }
        if let Some(threshold) = conditions.requires_mental
            && stats.mental < threshold
        {
            return Err(EffectError::PreconditionFailed {
                requirement: Requirement::Mental(threshold),
            });
        }
        if let Some(tag) = &conditions.requires_tag
            && !tags.contains(tag)
        {
            return Err(EffectError::PreconditionFailed {
                requirement: Requirement::Tag(tag.clone()),
            });
        }
        Ok(())
    }

    /// Roll a fair die, 1 through [`DIE_FACES`].
    pub fn roll_die(rng: &mut impl Rng) -> u8 {
        rng.random_range(1..=DIE_FACES)
    }

    /// The first branch covering `roll`.
    pub fn select_branch(branches: &[DiceBranch], roll: u8) -> Option<&DiceBranch> {
        branches.iter().find(|branch| branch.covers(roll))
    }

    /// Apply `choice` to the player.
    ///
    /// Preconditions are checked first; on failure nothing changes. The
    /// base effects and, if the choice rolls, the selected branch's effects
    /// are applied together. Tag additions are appended in order.
    ///
    /// # Errors
    ///
    /// Returns [`EffectError::PreconditionFailed`] if a requirement is not
    /// met.
    pub fn resolve_choice(
        stats: &mut PlayerStats,
        tags: &mut Vec<String>,
        choice: &CardChoice,
        rng: &mut impl Rng,
    ) -> Result<ChoiceOutcome, EffectError> {
        if let Some(conditions) = &choice.conditions {
            Self::check_conditions(stats, tags, conditions)?;
        }

        let mut applied = choice.effects.clone();
        let mut dice_roll = None;
        let mut added_tags = Vec::new();

        if let Some(triggers) = &choice.triggers {
            if !triggers.dice.is_empty() {
                let roll = Self::roll_die(rng);
                dice_roll = Some(roll);
                if let Some(branch) = Self::select_branch(&triggers.dice, roll) {
                    applied = applied.combined(&branch.effects);
                } else {
                    debug!(roll, "dice roll matched no branch");
                }
            }
            added_tags.clone_from(&triggers.add_tags);
        }

        Self::apply(stats, &applied);
        tags.extend(added_tags.iter().cloned());

        Ok(ChoiceOutcome {
            applied,
            dice_roll,
            added_tags,
        })
    }

    /// The choice at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`EffectError::InvalidChoice`] when `index` is out of range.
    pub fn choice_at(choices: &[CardChoice], index: usize) -> Result<&CardChoice, EffectError> {
        choices.get(index).ok_or(EffectError::InvalidChoice {
            index,
            count: choices.len(),
        })
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
    use ringboard_types::{ChoiceTriggers, Stat};

    use super::*;

    fn start() -> PlayerStats {
        PlayerStats {
            money: 2000,
            mental: 5,
            sin: 0,
            virtue: 0,
        }
    }

    #[test]
    fn apply_changes_only_named_stats() {
        let mut stats = start();
        let delta = EffectDelta::new().with(Stat::Money, -500).with(Stat::Mental, 1);
        EffectResolver::apply(&mut stats, &delta);
        assert_eq!(
            stats,
            PlayerStats {
                money: 1500,
                mental: 6,
                sin: 0,
                virtue: 0
            }
        );
    }

    #[test]
    fn money_may_go_negative_but_accumulators_may_not() {
        let mut stats = start();
        let delta = EffectDelta::new()
            .with(Stat::Money, -5000)
            .with(Stat::Sin, -3)
            .with(Stat::Virtue, 2);
        EffectResolver::apply(&mut stats, &delta);
        assert_eq!(stats.money, -3000);
        assert_eq!(stats.sin, 0);
        assert_eq!(stats.virtue, 2);
    }

    #[test]
    fn money_saturates() {
        let mut stats = PlayerStats {
            money: i64::MAX - 1,
            ..start()
        };
        EffectResolver::apply(&mut stats, &EffectDelta::new().with(Stat::Money, 10));
        assert_eq!(stats.money, i64::MAX);
    }

    #[test]
    fn requires_money_rejects_and_leaves_stats_untouched() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut stats = PlayerStats {
            money: 3000,
            ..start()
        };
        let mut tags = Vec::new();
        let choice = CardChoice {
            text: "Invest".to_owned(),
            effects: EffectDelta::new().with(Stat::Money, -5000),
            conditions: Some(ChoiceConditions {
                requires_money: Some(5000),
                ..ChoiceConditions::default()
            }),
            triggers: None,
        };
        let err = EffectResolver::resolve_choice(&mut stats, &mut tags, &choice, &mut rng);
        assert_eq!(
            err,
            Err(EffectError::PreconditionFailed {
                requirement: Requirement::Money(5000)
            })
        );
        assert_eq!(stats.money, 3000);
        assert!(tags.is_empty());
    }

    #[test]
    fn requires_mental_and_tag() {
        let stats = start();
        let tags = vec!["gambler".to_owned()];
        let mental = ChoiceConditions {
            requires_mental: Some(6),
            ..ChoiceConditions::default()
        };
        assert!(matches!(
            EffectResolver::check_conditions(&stats, &tags, &mental),
            Err(EffectError::PreconditionFailed {
                requirement: Requirement::Mental(6)
            })
        ));
        let tag = ChoiceConditions {
            requires_tag: Some("gambler".to_owned()),
            ..ChoiceConditions::default()
        };
        assert!(EffectResolver::check_conditions(&stats, &tags, &tag).is_ok());
        assert!(EffectResolver::check_conditions(&stats, &[], &tag).is_err());
    }

    #[test]
    fn tags_are_appended_with_duplicates() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut stats = start();
        let mut tags = vec!["gambler".to_owned()];
        let choice = CardChoice {
            text: "Again".to_owned(),
            triggers: Some(ChoiceTriggers {
                add_tags: vec!["gambler".to_owned(), "debtor".to_owned()],
                dice: Vec::new(),
            }),
            ..CardChoice::default()
        };
        let outcome =
            EffectResolver::resolve_choice(&mut stats, &mut tags, &choice, &mut rng).unwrap();
        assert_eq!(tags, vec!["gambler", "gambler", "debtor"]);
        assert_eq!(outcome.dice_roll, None);
        assert_eq!(stats, start());
    }

    #[test]
    fn die_rolls_stay_on_the_die() {
        let mut rng = SmallRng::seed_from_u64(99);
        let mut seen = [false; 6];
        for _ in 0..600 {
            let roll = EffectResolver::roll_die(&mut rng);
            assert!((1..=6).contains(&roll));
            if let Some(slot) = seen.get_mut(usize::from(roll - 1)) {
                *slot = true;
            }
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn dice_branch_adds_to_base_effects() {
        let choice = CardChoice {
            text: "Bet".to_owned(),
            effects: EffectDelta::new().with(Stat::Sin, 1),
            conditions: None,
            triggers: Some(ChoiceTriggers {
                add_tags: Vec::new(),
                dice: vec![
                    DiceBranch {
                        min: 1,
                        max: 3,
                        effects: EffectDelta::new().with(Stat::Money, -1000),
                    },
                    DiceBranch {
                        min: 4,
                        max: 6,
                        effects: EffectDelta::new().with(Stat::Money, 1000),
                    },
                ],
            }),
        };
        for seed in 0..20 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let mut stats = start();
            let mut tags = Vec::new();
            let outcome =
                EffectResolver::resolve_choice(&mut stats, &mut tags, &choice, &mut rng).unwrap();
            let roll = outcome.dice_roll.unwrap();
            let expected = if roll <= 3 { 1000 } else { 3000 };
            assert_eq!(stats.money, expected, "roll {roll}");
            assert_eq!(stats.sin, 1);
        }
    }

    #[test]
    fn unmatched_roll_applies_base_only() {
        let branches = [DiceBranch {
            min: 6,
            max: 6,
            effects: EffectDelta::new().with(Stat::Money, 100),
        }];
        assert!(EffectResolver::select_branch(&branches, 2).is_none());
        assert!(EffectResolver::select_branch(&branches, 6).is_some());
    }

    #[test]
    fn choice_index_out_of_range() {
        let choices = vec![CardChoice::default()];
        assert!(EffectResolver::choice_at(&choices, 0).is_ok());
        assert_eq!(
            EffectResolver::choice_at(&choices, 3),
            Err(EffectError::InvalidChoice { index: 3, count: 1 })
        );
    }
}
