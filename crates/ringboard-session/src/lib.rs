//! Game sessions for the Ringboard turn engine.
//!
//! A session is one running game. Its state lives in a [`GameSession`]
//! owned by a single worker task; everything that mutates it (player
//! actions and expired phase timers) goes through that task's queue. The
//! [`SessionRegistry`] creates, routes to, and tears down sessions.
//!
//! # Modules
//!
//! - [`catalog`] -- The [`CardCatalog`] trait and an in-memory catalog
//!   loaded from the card template JSON format.
//! - [`error`] -- [`SessionError`].
//! - [`session`] -- The synchronous per-game orchestrator.
//! - [`handle`] -- Cloneable async handle to a running session.
//! - [`registry`] -- Sessions keyed by game id.
//!
//! [`CardCatalog`]: catalog::CardCatalog
//! [`GameSession`]: session::GameSession
//! [`SessionError`]: error::SessionError
//! [`SessionRegistry`]: registry::SessionRegistry

pub mod catalog;
pub mod error;
pub mod handle;
pub mod registry;
pub mod session;
mod worker;

pub use catalog::{CardCatalog, CardFilter, CatalogError, MemoryCatalog};
pub use error::SessionError;
pub use handle::SessionHandle;
pub use registry::SessionRegistry;
pub use session::{GameSession, SessionOutput};
