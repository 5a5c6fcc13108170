use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::error::{EngineError, Result};
use crate::models::{Game, GameId, GamePlayerId, GameStatus, GuildConfig, MoveRecord};

/// Shared handle to one game aggregate. The mutex is the per-game
/// at-most-one-mutator guard: ticks, action resolution, lifecycle
/// transitions and goblin steps all hold it for their whole operation.
pub type GameHandle = Arc<Mutex<Game>>;

/// Lock a game handle, recovering the guard if a previous holder panicked.
pub fn lock_game(handle: &GameHandle) -> MutexGuard<'_, Game> {
    handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The persistence queries the engine requires of its storage collaborator.
///
/// `save_game` and `save_guild` are durability checkpoints; the in-memory
/// reference implementation shares the aggregate through [`GameHandle`], so
/// for it they are bookkeeping only. A database-backed implementation would
/// upsert rows at each checkpoint.
pub trait GameStore: Send + Sync {
    fn guild(&self, id: &str) -> Result<GuildConfig>;
    fn save_guild(&self, guild: &GuildConfig) -> Result<()>;

    fn next_game_id(&self) -> GameId;
    fn next_game_player_id(&self) -> GamePlayerId;

    fn insert_game(&self, game: Game) -> GameHandle;
    fn game(&self, id: GameId) -> Result<GameHandle>;
    fn save_game(&self, game: &Game) -> Result<()>;

    fn record_move(&self, mv: MoveRecord) -> Result<()>;

    /// Games in `new` status whose scheduled start time has passed.
    fn games_needing_start(&self, now: DateTime<Utc>) -> Vec<GameHandle>;
    /// Active games whose next tick time has passed.
    fn games_needing_tick(&self, now: DateTime<Utc>) -> Vec<GameHandle>;
    fn active_games(&self) -> Vec<GameHandle>;
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    guilds: HashMap<String, GuildConfig>,
    games: HashMap<GameId, GameHandle>,
    moves: Vec<MoveRecord>,
    next_game_id: GameId,
    next_game_player_id: GamePlayerId,
}

/// In-memory reference store, used by tests and local drivers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn put_guild(&self, guild: GuildConfig) {
        self.inner().guilds.insert(guild.id.clone(), guild);
    }

    /// Snapshot of the move log, oldest first.
    pub fn moves(&self) -> Vec<MoveRecord> {
        self.inner().moves.clone()
    }

    fn games_matching<F>(&self, predicate: F) -> Vec<GameHandle>
    where
        F: Fn(&Game) -> bool,
    {
        // Snapshot the handles before taking any game lock; engine
        // operations hold game locks while calling back into the store.
        let handles: Vec<GameHandle> = self.inner().games.values().cloned().collect();
        handles.into_iter().filter(|handle| predicate(&lock_game(handle))).collect()
    }
}

impl GameStore for MemoryStore {
    fn guild(&self, id: &str) -> Result<GuildConfig> {
        self.inner()
            .guilds
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("guild {}", id)))
    }

    fn save_guild(&self, guild: &GuildConfig) -> Result<()> {
        self.inner().guilds.insert(guild.id.clone(), guild.clone());
        Ok(())
    }

    fn next_game_id(&self) -> GameId {
        let mut inner = self.inner();
        inner.next_game_id += 1;
        inner.next_game_id
    }

    fn next_game_player_id(&self) -> GamePlayerId {
        let mut inner = self.inner();
        inner.next_game_player_id += 1;
        inner.next_game_player_id
    }

    fn insert_game(&self, game: Game) -> GameHandle {
        let id = game.id;
        let handle: GameHandle = Arc::new(Mutex::new(game));
        self.inner().games.insert(id, handle.clone());
        handle
    }

    fn game(&self, id: GameId) -> Result<GameHandle> {
        self.inner()
            .games
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("game {}", id)))
    }

    fn save_game(&self, _game: &Game) -> Result<()> {
        // The handle already shares the live aggregate.
        Ok(())
    }

    fn record_move(&self, mv: MoveRecord) -> Result<()> {
        self.inner().moves.push(mv);
        Ok(())
    }

    fn games_needing_start(&self, now: DateTime<Utc>) -> Vec<GameHandle> {
        self.games_matching(|game| {
            game.status == GameStatus::New && game.start_time.is_some_and(|t| t < now)
        })
    }

    fn games_needing_tick(&self, now: DateTime<Utc>) -> Vec<GameHandle> {
        self.games_matching(|game| {
            game.status == GameStatus::Active && game.next_tick_time.is_some_and(|t| t < now)
        })
    }

    fn active_games(&self) -> Vec<GameHandle> {
        self.games_matching(|game| game.status == GameStatus::Active)
    }
}
