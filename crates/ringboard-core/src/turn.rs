//! Turn phase state machine.
//!
//! A deterministic automaton over [`TurnPhase`] with no terminal state:
//!
//! ```text
//! Idle     -> Roll      always
//! Roll     -> Tile      always
//! Tile     -> Card      always
//! Card     -> Decision  pending decision present
//! Card     -> EndTurn   no pending decision
//! Decision -> EndTurn   always
//! EndTurn  -> Idle      always
//! ```
//!
//! `Roll` and `Decision` carry bounded waits. Entering either arms a wake
//! (see [`crate::wake`]); when the caller reports the wake back through
//! [`TurnStateMachine::fire`], the machine forces the turn forward so an
//! unresponsive player can never stall it.

use core::fmt;
use std::time::Duration;

use ringboard_types::{
    CardId, PendingDecision, PhaseMap, PlayerId, TileResult, TurnContext, TurnPhase,
};
use tracing::{debug, warn};

use crate::config::TurnConfig;
use crate::wake::{ArmedWake, PhaseTimers, WakeToken};

/// Why a transition request was refused. State is unchanged in both cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// No table row connects the two phases.
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// Phase at the time of the request.
        from: TurnPhase,
        /// Requested phase.
        to: TurnPhase,
    },

    /// A row exists but its guard does not hold.
    #[error("guard rejected transition: {from} -> {to}")]
    GuardRejected {
        /// Phase at the time of the request.
        from: TurnPhase,
        /// Requested phase.
        to: TurnPhase,
    },
}

/// Condition a row requires of the turn context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Guard {
    Always,
    PendingDecision,
    NoPendingDecision,
}

impl Guard {
    const fn holds(self, context: &TurnContext) -> bool {
        match self {
            Self::Always => true,
            Self::PendingDecision => context.pending_decision.is_some(),
            Self::NoPendingDecision => context.pending_decision.is_none(),
        }
    }
}

/// Side effect a row applies after the phase changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowAction {
    None,
    ClearPendingDecision,
    NextTurnNumber,
}

#[derive(Debug, Clone, Copy)]
struct Row {
    from: TurnPhase,
    to: TurnPhase,
    guard: Guard,
    action: RowAction,
}

const TABLE: [Row; 7] = [
    Row {
        from: TurnPhase::Idle,
        to: TurnPhase::Roll,
        guard: Guard::Always,
        action: RowAction::None,
    },
    Row {
        from: TurnPhase::Roll,
        to: TurnPhase::Tile,
        guard: Guard::Always,
        action: RowAction::None,
    },
    Row {
        from: TurnPhase::Tile,
        to: TurnPhase::Card,
        guard: Guard::Always,
        action: RowAction::None,
    },
    Row {
        from: TurnPhase::Card,
        to: TurnPhase::Decision,
        guard: Guard::PendingDecision,
        action: RowAction::None,
    },
    Row {
        from: TurnPhase::Card,
        to: TurnPhase::EndTurn,
        guard: Guard::NoPendingDecision,
        action: RowAction::None,
    },
    Row {
        from: TurnPhase::Decision,
        to: TurnPhase::EndTurn,
        guard: Guard::Always,
        action: RowAction::ClearPendingDecision,
    },
    Row {
        from: TurnPhase::EndTurn,
        to: TurnPhase::Idle,
        guard: Guard::Always,
        action: RowAction::NextTurnNumber,
    },
];

fn find_row(from: TurnPhase, to: TurnPhase) -> Option<&'static Row> {
    TABLE.iter().find(|row| row.from == from && row.to == to)
}

/// Whether the table has a row from `from` to `to`, ignoring guards.
pub fn is_listed(from: TurnPhase, to: TurnPhase) -> bool {
    find_row(from, to).is_some()
}

/// A completed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Phase left.
    pub from: TurnPhase,
    /// Phase entered.
    pub to: TurnPhase,
    /// Whether a timer forced it.
    pub forced: bool,
    /// Wake armed on entry, if the new phase has a bounded wait.
    pub armed: Option<ArmedWake>,
}

/// Observer called with the phase and context on entry or exit.
pub type PhaseHook = Box<dyn FnMut(TurnPhase, &TurnContext) + Send>;

/// Sequences one player's turn through its phases.
pub struct TurnStateMachine {
    phase: TurnPhase,
    context: TurnContext,
    timers: PhaseTimers,
    timeouts: PhaseMap<Option<Duration>>,
    time_remaining: u32,
    enter_hooks: PhaseMap<Vec<PhaseHook>>,
    exit_hooks: PhaseMap<Vec<PhaseHook>>,
}

impl fmt::Debug for TurnStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TurnStateMachine")
            .field("phase", &self.phase)
            .field("context", &self.context)
            .field("timers", &self.timers)
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl TurnStateMachine {
    /// Create a machine in `Idle` with a fresh context.
    pub fn new(config: &TurnConfig) -> Self {
        let timeouts = PhaseMap {
            roll: Some(config.roll_timeout()),
            decision: Some(config.decision_timeout()),
            ..PhaseMap::default()
        };
        Self {
            phase: TurnPhase::Idle,
            context: TurnContext::fresh(config.time_remaining_secs),
            timers: PhaseTimers::new(),
            timeouts,
            time_remaining: config.time_remaining_secs,
            enter_hooks: PhaseMap::default(),
            exit_hooks: PhaseMap::default(),
        }
    }

    /// Current phase.
    pub const fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Current turn context.
    pub const fn context(&self) -> &TurnContext {
        &self.context
    }

    /// Whether the active player may act right now.
    pub const fn can_player_act(&self) -> bool {
        self.phase.awaits_player()
    }

    /// Whether the machine is blocked on player input.
    pub const fn is_waiting_for_input(&self) -> bool {
        self.phase.awaits_player()
    }

    /// Whether `token` is still the live timer for its phase.
    pub fn is_armed(&self, token: WakeToken) -> bool {
        self.timers.is_armed(token)
    }

    /// The token armed for `phase`, if any.
    pub const fn armed(&self, phase: TurnPhase) -> Option<WakeToken> {
        self.timers.armed(phase)
    }

    /// Register an observer run after entering `phase`.
    pub fn on_enter(&mut self, phase: TurnPhase, hook: PhaseHook) {
        self.enter_hooks.get_mut(phase).push(hook);
    }

    /// Register an observer run before leaving `phase`.
    pub fn on_exit(&mut self, phase: TurnPhase, hook: PhaseHook) {
        self.exit_hooks.get_mut(phase).push(hook);
    }

    /// Hand the turn to `player` and enter `Roll`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] unless the machine is `Idle`.
    pub fn begin_turn(&mut self, player: PlayerId) -> Result<Transition, TransitionError> {
        if self.phase != TurnPhase::Idle {
            return Err(self.reject(TurnPhase::Roll, false));
        }
        self.context.player_id = Some(player);
        self.context.time_remaining = self.time_remaining;
        self.context.last_roll = None;
        self.context.last_tile = None;
        self.context.last_card = None;
        self.context.pending_decision = None;
        self.transition(TurnPhase::Roll)
    }

    /// Move to `target` if the table allows it.
    ///
    /// On success: exit hooks for the old phase run, its timer is cancelled,
    /// the phase changes, the row action runs, entry hooks for the new phase
    /// run, and the new phase's timer is armed if it has one.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] and leaves every field untouched if no row
    /// matches or the row's guard fails.
    pub fn transition(&mut self, target: TurnPhase) -> Result<Transition, TransitionError> {
        self.apply(target, false)
    }

    /// Report an expired timer.
    ///
    /// Returns the forced transition, or `None` when the token is stale: the
    /// phase was already left, re-armed, or the machine was reset.
    pub fn fire(&mut self, token: WakeToken) -> Option<Transition> {
        if !self.timers.is_armed(token) || self.phase != token.phase() {
            debug!(
                phase = %token.phase(),
                generation = token.generation(),
                current = %self.phase,
                "stale wake ignored"
            );
            return None;
        }
        match token.phase() {
            TurnPhase::Roll => self.apply(TurnPhase::Tile, true).ok(),
            TurnPhase::Decision => {
                self.context.pending_decision = None;
                self.apply(TurnPhase::EndTurn, true).ok()
            }
            _ => None,
        }
    }

    /// Cancel every timer and return to `Idle` with a fresh context.
    pub fn reset(&mut self) {
        self.timers.cancel_all();
        self.phase = TurnPhase::Idle;
        self.context = TurnContext::fresh(self.time_remaining);
    }

    /// Record this turn's die value.
    pub const fn record_roll(&mut self, roll: u8) {
        self.context.last_roll = Some(roll);
    }

    /// Record where this turn's roll landed.
    pub const fn record_tile(&mut self, tile: TileResult) {
        self.context.last_tile = Some(tile);
    }

    /// Record the most recently drawn card.
    pub fn record_card(&mut self, card: CardId) {
        self.context.last_card = Some(card);
    }

    /// Set or clear the choice the player owes.
    pub fn set_pending_decision(&mut self, pending: Option<PendingDecision>) {
        self.context.pending_decision = pending;
    }

    fn apply(&mut self, target: TurnPhase, forced: bool) -> Result<Transition, TransitionError> {
        let from = self.phase;
        let Some(row) = find_row(from, target) else {
            return Err(self.reject(target, false));
        };
        if !row.guard.holds(&self.context) {
            return Err(self.reject(target, true));
        }

        for hook in self.exit_hooks.get_mut(from) {
            hook(from, &self.context);
        }
        let _ = self.timers.cancel(from);

        self.phase = target;
        match row.action {
            RowAction::None => {}
            RowAction::ClearPendingDecision => self.context.pending_decision = None,
            RowAction::NextTurnNumber => {
                self.context.turn = self.context.turn.saturating_add(1);
            }
        }

        for hook in self.enter_hooks.get_mut(target) {
            hook(target, &self.context);
        }
        let armed = (*self.timeouts.get(target)).map(|after| self.timers.arm(target, after));

        debug!(from = %from, to = %target, forced, armed = armed.is_some(), "phase transition");
        Ok(Transition {
            from,
            to: target,
            forced,
            armed,
        })
    }

    fn reject(&self, target: TurnPhase, guarded: bool) -> TransitionError {
        let from = self.phase;
        warn!(from = %from, to = %target, guarded, "transition rejected");
        if guarded {
            TransitionError::GuardRejected { from, to: target }
        } else {
            TransitionError::InvalidTransition { from, to: target }
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn machine() -> TurnStateMachine {
        TurnStateMachine::new(&TurnConfig::default())
    }

    fn pending() -> PendingDecision {
        PendingDecision {
            card_id: CardId::from("sin_001"),
            choice_count: 2,
        }
    }

    #[test]
    fn starts_idle_with_fresh_context() {
        let m = machine();
        assert_eq!(m.phase(), TurnPhase::Idle);
        assert_eq!(m.context().turn, 1);
        assert_eq!(m.context().time_remaining, 30);
        assert!(!m.can_player_act());
    }

    #[test]
    fn full_cycle_without_decision() {
        let mut m = machine();
        let path = [
            TurnPhase::Roll,
            TurnPhase::Tile,
            TurnPhase::Card,
            TurnPhase::EndTurn,
            TurnPhase::Idle,
        ];
        for target in path {
            let t = m.transition(target).unwrap();
            assert_eq!(t.to, target);
            assert!(!t.forced);
        }
        assert_eq!(m.phase(), TurnPhase::Idle);
        assert_eq!(m.context().turn, 2);
    }

    #[test]
    fn replaying_the_table_is_deterministic() {
        let script = [
            TurnPhase::Roll,
            TurnPhase::Tile,
            TurnPhase::Card,
            TurnPhase::Decision,
            TurnPhase::EndTurn,
            TurnPhase::Idle,
            TurnPhase::Roll,
        ];
        let run = || {
            let mut m = machine();
            let mut seen = Vec::new();
            for target in script {
                if target == TurnPhase::Decision {
                    m.set_pending_decision(Some(pending()));
                }
                let _ = m.transition(target);
                seen.push(m.phase());
            }
            (seen, m.context().turn)
        };
        let first = run();
        assert_eq!(first, run());
        assert_eq!(first.0, script.to_vec());
    }

    #[test]
    fn unlisted_transitions_are_rejected_without_mutation() {
        for from in TurnPhase::ALL {
            for to in TurnPhase::ALL {
                if is_listed(from, to) {
                    continue;
                }
                let mut m = machine();
                drive_to(&mut m, from);
                let before = m.context().clone();
                let result = m.transition(to);
                assert_eq!(
                    result,
                    Err(TransitionError::InvalidTransition { from, to }),
                    "{from} -> {to}"
                );
                assert_eq!(m.phase(), from);
                assert_eq!(m.context(), &before);
            }
        }
    }

    #[test]
    fn card_to_decision_requires_pending_decision() {
        let mut m = machine();
        drive_to(&mut m, TurnPhase::Card);
        assert_eq!(
            m.transition(TurnPhase::Decision),
            Err(TransitionError::GuardRejected {
                from: TurnPhase::Card,
                to: TurnPhase::Decision
            })
        );
        m.set_pending_decision(Some(pending()));
        assert_eq!(
            m.transition(TurnPhase::EndTurn),
            Err(TransitionError::GuardRejected {
                from: TurnPhase::Card,
                to: TurnPhase::EndTurn
            })
        );
        assert!(m.transition(TurnPhase::Decision).is_ok());
        assert!(m.can_player_act());
        assert!(m.is_waiting_for_input());
    }

    #[test]
    fn entering_roll_arms_the_roll_timer() {
        let mut m = machine();
        let t = m.begin_turn(PlayerId::new()).unwrap();
        let wake = t.armed.unwrap();
        assert_eq!(wake.token.phase(), TurnPhase::Roll);
        assert_eq!(wake.after, Duration::from_millis(5_000));
        assert!(m.is_armed(wake.token));
    }

    #[test]
    fn roll_timeout_forces_tile() {
        let mut m = machine();
        let wake = m.begin_turn(PlayerId::new()).unwrap().armed.unwrap();
        let forced = m.fire(wake.token).unwrap();
        assert!(forced.forced);
        assert_eq!(forced.from, TurnPhase::Roll);
        assert_eq!(m.phase(), TurnPhase::Tile);
        assert!(!m.is_armed(wake.token));
    }

    #[test]
    fn decision_timeout_forces_end_turn_and_clears_pending() {
        let mut m = machine();
        drive_to(&mut m, TurnPhase::Card);
        m.set_pending_decision(Some(pending()));
        let wake = m.transition(TurnPhase::Decision).unwrap().armed.unwrap();
        assert_eq!(wake.after, Duration::from_millis(30_000));
        let forced = m.fire(wake.token).unwrap();
        assert_eq!(forced.to, TurnPhase::EndTurn);
        assert_eq!(m.phase(), TurnPhase::EndTurn);
        assert!(m.context().pending_decision.is_none());
    }

    #[test]
    fn explicit_transition_makes_the_wake_stale() {
        let mut m = machine();
        let wake = m.begin_turn(PlayerId::new()).unwrap().armed.unwrap();
        m.transition(TurnPhase::Tile).unwrap();
        m.transition(TurnPhase::Card).unwrap();
        assert!(m.fire(wake.token).is_none());
        assert_eq!(m.phase(), TurnPhase::Card);
    }

    #[test]
    fn wake_from_an_earlier_visit_does_not_fire_on_reentry() {
        let mut m = machine();
        let player = PlayerId::new();
        let old = m.begin_turn(player).unwrap().armed.unwrap();
        for target in [TurnPhase::Tile, TurnPhase::Card, TurnPhase::EndTurn, TurnPhase::Idle] {
            m.transition(target).unwrap();
        }
        let fresh = m.begin_turn(player).unwrap().armed.unwrap();
        assert!(m.fire(old.token).is_none());
        assert_eq!(m.phase(), TurnPhase::Roll);
        assert!(m.fire(fresh.token).is_some());
    }

    #[test]
    fn reset_cancels_timers_and_restores_idle() {
        let mut m = machine();
        let wake = m.begin_turn(PlayerId::new()).unwrap().armed.unwrap();
        m.record_roll(3);
        m.reset();
        assert_eq!(m.phase(), TurnPhase::Idle);
        assert_eq!(m.context(), &TurnContext::default());
        assert!(m.fire(wake.token).is_none());
    }

    #[test]
    fn hooks_run_in_exit_then_enter_order() {
        let mut m = machine();
        let log = Arc::new(Mutex::new(Vec::new()));
        let exit_log = Arc::clone(&log);
        m.on_exit(
            TurnPhase::Idle,
            Box::new(move |phase: TurnPhase, _: &TurnContext| exit_log.lock().unwrap().push(format!("exit {phase}"))),
        );
        let enter_log = Arc::clone(&log);
        m.on_enter(
            TurnPhase::Roll,
            Box::new(move |phase: TurnPhase, ctx: &TurnContext| {
                enter_log
                    .lock()
                    .unwrap()
                    .push(format!("enter {phase} turn {}", ctx.turn));
            }),
        );
        m.transition(TurnPhase::Roll).unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["exit idle".to_owned(), "enter roll turn 1".to_owned()]
        );
    }

    #[test]
    fn rejected_transition_runs_no_hooks() {
        let mut m = machine();
        let count = Arc::new(Mutex::new(0_u32));
        let hook_count = Arc::clone(&count);
        m.on_exit(
            TurnPhase::Idle,
            Box::new(move |_: TurnPhase, _: &TurnContext| *hook_count.lock().unwrap() += 1),
        );
        assert!(m.transition(TurnPhase::Card).is_err());
        assert_eq!(*count.lock().unwrap(), 0);
    }

    /// Walk a fresh machine along the table to `target`.
    fn drive_to(m: &mut TurnStateMachine, target: TurnPhase) {
        let path: &[TurnPhase] = match target {
            TurnPhase::Idle => &[],
            TurnPhase::Roll => &[TurnPhase::Roll],
            TurnPhase::Tile => &[TurnPhase::Roll, TurnPhase::Tile],
            TurnPhase::Card => &[TurnPhase::Roll, TurnPhase::Tile, TurnPhase::Card],
            TurnPhase::Decision => &[
                TurnPhase::Roll,
                TurnPhase::Tile,
                TurnPhase::Card,
                TurnPhase::Decision,
            ],
            TurnPhase::EndTurn => &[
                TurnPhase::Roll,
                TurnPhase::Tile,
                TurnPhase::Card,
                TurnPhase::EndTurn,
            ],
        };
        for step in path {
            if *step == TurnPhase::Decision {
                m.set_pending_decision(Some(pending()));
            }
            m.transition(*step).unwrap();
        }
    }
}
