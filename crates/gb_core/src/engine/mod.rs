//! The engine facade: one shared instance serving user commands and the
//! periodic driver sweeps.

pub mod actions;
pub mod board;
pub mod goblin;
pub mod lifecycle;
pub mod tick;

use std::sync::{Arc, Mutex, MutexGuard};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{EngineError, Result};
use crate::models::GameId;
use crate::notify::Notifier;
use crate::store::{lock_game, GameHandle, GameStore};

pub use actions::Action;
pub use board::calculate_board_size;
pub use goblin::GoblinStep;

/// The game simulation engine.
///
/// Holds the persistence collaborator, the notification effect and a seeded
/// RNG. All entry points take `&self`; per-game mutual exclusion comes from
/// the [`GameHandle`] mutex and is held for whole operations.
pub struct Engine {
    store: Arc<dyn GameStore>,
    notifier: Arc<dyn Notifier>,
    rng: Mutex<ChaCha8Rng>,
}

impl Engine {
    pub fn new(store: Arc<dyn GameStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier, rng: Mutex::new(ChaCha8Rng::from_entropy()) }
    }

    /// Deterministic engine for tests and replay: same seed, same spawns.
    pub fn with_seed(store: Arc<dyn GameStore>, notifier: Arc<dyn Notifier>, seed: u64) -> Self {
        Self { store, notifier, rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)) }
    }

    pub fn store(&self) -> &Arc<dyn GameStore> {
        &self.store
    }

    /// Lock order is game first, then RNG; never the reverse.
    pub(crate) fn rng(&self) -> MutexGuard<'_, ChaCha8Rng> {
        self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn notify(&self, game: &crate::models::Game, message: &str) {
        self.notifier.notify(game, message);
    }

    /// The guild's game currently in progress (any non-terminal status).
    pub fn current_game(&self, guild_id: &str) -> Result<GameHandle> {
        let guild = self.store.guild(guild_id)?;
        let game_id = guild
            .current_game_id
            .ok_or_else(|| EngineError::NotFound(format!("no game in progress for guild {}", guild_id)))?;
        self.store.game(game_id)
    }

    /// Inbound command entry point: resolve one user action against the
    /// guild's current game. The front end has already resolved identities;
    /// the engine validates everything else.
    pub fn submit_action(
        &self,
        guild_id: &str,
        player_id: &str,
        action_name: &str,
        target_x: Option<i32>,
        target_y: Option<i32>,
    ) -> Result<String> {
        let action = Action::parse(action_name, target_x, target_y)?;
        let handle = self.current_game(guild_id)?;
        let mut game = lock_game(&handle);
        self.resolve_action(&mut game, player_id, action)
    }

    /// Resolve one action against an explicitly chosen game.
    pub fn submit_action_for_game(
        &self,
        game_id: GameId,
        player_id: &str,
        action_name: &str,
        target_x: Option<i32>,
        target_y: Option<i32>,
    ) -> Result<String> {
        let action = Action::parse(action_name, target_x, target_y)?;
        let handle = self.store.game(game_id)?;
        let mut game = lock_game(&handle);
        self.resolve_action(&mut game, player_id, action)
    }
}
