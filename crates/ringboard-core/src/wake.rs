//! Scheduled wakes with cancellation tokens.
//!
//! A phase that carries a bounded wait arms a wake when it is entered. Arming
//! hands out a [`WakeToken`]; the caller owns the actual wall-clock timer and
//! reports back with the token when it expires. A token stays valid only
//! while it is the armed token for its phase. Leaving the phase, re-arming
//! it, or resetting the machine invalidates it, so a late report is a no-op.

use std::time::Duration;

use ringboard_types::{PhaseMap, TurnPhase};

/// Handle for one armed phase timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WakeToken {
    phase: TurnPhase,
    generation: u64,
}

impl WakeToken {
    /// The phase the timer was armed for.
    pub const fn phase(self) -> TurnPhase {
        self.phase
    }

    /// Monotonic arm counter; distinguishes re-arms of the same phase.
    pub const fn generation(self) -> u64 {
        self.generation
    }
}

/// A wake the caller must schedule: fire `token` after `after` elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmedWake {
    /// Token to report when the timer expires.
    pub token: WakeToken,
    /// Wall-clock delay from the moment of arming.
    pub after: Duration,
}

/// The armed token per phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseTimers {
    armed: PhaseMap<Option<WakeToken>>,
    next_generation: u64,
}

impl PhaseTimers {
    /// No timers armed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer for `phase`, replacing any timer already armed for it.
    pub const fn arm(&mut self, phase: TurnPhase, after: Duration) -> ArmedWake {
        let token = WakeToken {
            phase,
            generation: self.next_generation,
        };
        self.next_generation = self.next_generation.wrapping_add(1);
        *self.armed.get_mut(phase) = Some(token);
        ArmedWake { token, after }
    }

    /// Cancel the timer armed for `phase`, returning its token.
    pub const fn cancel(&mut self, phase: TurnPhase) -> Option<WakeToken> {
        self.armed.get_mut(phase).take()
    }

    /// Cancel every armed timer.
    pub fn cancel_all(&mut self) {
        for phase in TurnPhase::ALL {
            *self.armed.get_mut(phase) = None;
        }
    }

    /// The token currently armed for `phase`.
    pub const fn armed(&self, phase: TurnPhase) -> Option<WakeToken> {
        *self.armed.get(phase)
    }

    /// Whether `token` is still the live timer for its phase.
    pub fn is_armed(&self, token: WakeToken) -> bool {
        self.armed(token.phase) == Some(token)
    }

    /// Every live token.
    pub fn live(&self) -> impl Iterator<Item = WakeToken> + '_ {
        self.armed.iter().filter_map(|(_, token)| *token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rearming_invalidates_the_previous_token() {
        let mut timers = PhaseTimers::new();
        let first = timers.arm(TurnPhase::Roll, Duration::from_millis(5));
        let second = timers.arm(TurnPhase::Roll, Duration::from_millis(5));
        assert_ne!(first.token, second.token);
        assert!(!timers.is_armed(first.token));
        assert!(timers.is_armed(second.token));
    }

    #[test]
    fn cancel_only_touches_its_phase() {
        let mut timers = PhaseTimers::new();
        let roll = timers.arm(TurnPhase::Roll, Duration::from_millis(5));
        let decision = timers.arm(TurnPhase::Decision, Duration::from_millis(5));
        assert_eq!(timers.cancel(TurnPhase::Roll), Some(roll.token));
        assert!(!timers.is_armed(roll.token));
        assert!(timers.is_armed(decision.token));
        assert_eq!(timers.live().count(), 1);
    }

    #[test]
    fn cancel_all_clears_everything() {
        let mut timers = PhaseTimers::new();
        let _ = timers.arm(TurnPhase::Roll, Duration::from_millis(5));
        let _ = timers.arm(TurnPhase::Decision, Duration::from_millis(5));
        timers.cancel_all();
        assert_eq!(timers.live().count(), 0);
    }
}
