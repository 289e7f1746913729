//! Turn sequencing, ring clocks and effect resolution for Ringboard.
//!
//! Everything in this crate is synchronous and free of I/O. Wall-clock
//! timers and message queues live in `ringboard-session`; here a timer is
//! only a [`wake::WakeToken`] the caller reports back when it expires.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `ringboard-config.yaml` into
//!   strongly-typed structs.
//! - [`turn`] -- The per-turn phase state machine.
//! - [`wake`] -- Armed phase timers and their cancellation tokens.
//! - [`scheduler`] -- Ring clocks, the event queue and fired history.
//! - [`templates`] -- Per-ring event template pools and seed events.
//! - [`effects`] -- Stat deltas, choice preconditions and dice branches.

pub mod config;
pub mod effects;
pub mod scheduler;
pub mod templates;
pub mod turn;
pub mod wake;
