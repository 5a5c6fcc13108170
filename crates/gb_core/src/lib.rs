//! gb_core is a persistent, asynchronous grid-combat game engine.
//!
//! One game runs per guild at a time. Players muster onto a square board,
//! spend action points on moves, shots and shoves, and the engine advances
//! every few hours on a tick: distributing AP, respawning the dead,
//! restocking pickups and spreading fire. A game ends when a player banks
//! five goal points or stands alone as the last survivor.
//!
//! The crate is front-end agnostic: a chat bot (or any other driver) wires
//! in a [`GameStore`] for persistence and a [`Notifier`] for announcements,
//! then calls [`Engine`] entry points from user commands and periodic
//! sweeps.

pub mod engine;
pub mod error;
pub mod models;
pub mod notify;
pub mod store;

pub use engine::{calculate_board_size, Action, Engine, GoblinStep};
pub use error::{EngineError, Result};
pub use notify::{LogNotifier, Notifier};
pub use store::{lock_game, GameHandle, GameStore, MemoryStore};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
