use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{GameId, GamePlayer, GamePlayerId, GuildConfig, GuildId, PlayerStatus};
use crate::error::{EngineError, Result};

/// Exclusive lifecycle state of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    New,
    Active,
    Won,
    Tied,
    Cancelled,
}

impl GameStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, GameStatus::Won | GameStatus::Tied | GameStatus::Cancelled)
    }
}

/// The kinds of object that can occupy a board cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObjectKind {
    Goal,
    Heart,
    Power,
    Fire,
    LootGoblin,
}

/// Extra state carried only by loot goblin objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootGoblinState {
    pub health: i32,
    pub turns_left: u32,
    pub stolen_hearts: u32,
    pub stolen_powers: u32,
}

/// One object on the board. Goblins carry their roaming state inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardObject {
    pub kind: ObjectKind,
    pub x: i32,
    pub y: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goblin: Option<LootGoblinState>,
}

impl BoardObject {
    pub fn new(kind: ObjectKind, x: i32, y: i32) -> Self {
        Self { kind, x, y, goblin: None }
    }

    pub fn loot_goblin(x: i32, y: i32) -> Self {
        Self {
            kind: ObjectKind::LootGoblin,
            x,
            y,
            goblin: Some(LootGoblinState {
                health: 4,
                turns_left: 10,
                stolen_hearts: 0,
                stolen_powers: 0,
            }),
        }
    }

    pub fn is_at(&self, x: i32, y: i32) -> bool {
        self.x == x && self.y == y
    }
}

/// The aggregate root: one game on one guild, owning its board objects and
/// its participant rows. All mutation happens under the per-game lock held
/// by whoever obtained the aggregate from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub guild_id: GuildId,
    pub status: GameStatus,
    pub muster_time: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub next_tick_time: Option<DateTime<Utc>>,
    pub minutes_per_action_distro: i64,
    pub board_width: i32,
    pub board_height: i32,
    pub minimum_player_count: usize,
    pub winning_player_id: Option<GamePlayerId>,
    /// Inert counter kept for a future storm mechanic.
    pub sudden_death_round: u32,
    pub board_objects: Vec<BoardObject>,
    pub players: Vec<GamePlayer>,
}

impl Game {
    /// Build a fresh game in `new` status from a guild's resolved config.
    pub fn from_guild(id: GameId, guild: &GuildConfig, board_size: i32, now: DateTime<Utc>) -> Self {
        Self {
            id,
            guild_id: guild.id.clone(),
            status: GameStatus::New,
            muster_time: now,
            start_time: None,
            next_tick_time: None,
            minutes_per_action_distro: guild.action_timer_minutes,
            board_width: board_size,
            board_height: board_size,
            minimum_player_count: guild.minimum_player_count,
            winning_player_id: None,
            sudden_death_round: 0,
            board_objects: Vec::new(),
            players: Vec::new(),
        }
    }

    /// Add a participant during the muster phase. Idempotent per identity.
    pub fn add_player(&mut self, id: GamePlayerId, player_id: &str) -> Result<&GamePlayer> {
        if self.status != GameStatus::New {
            return Err(EngineError::Validation(
                "Cannot add a player if the game's not new".into(),
            ));
        }
        if let Some(idx) = self.player_index(player_id) {
            return Ok(&self.players[idx]);
        }
        let idx = self.players.len();
        self.players.push(GamePlayer::new(id, self.id, player_id.to_string()));
        Ok(&self.players[idx])
    }

    /// Remove a participant during the muster phase. No-op if absent.
    pub fn remove_player(&mut self, player_id: &str) -> Result<()> {
        if self.status != GameStatus::New {
            return Err(EngineError::Validation(
                "Cannot remove a player if the game's not new".into(),
            ));
        }
        self.players.retain(|gp| gp.player_id != player_id);
        Ok(())
    }

    /// Roster index for an external player identity.
    pub fn player_index(&self, player_id: &str) -> Option<usize> {
        self.players.iter().position(|gp| gp.player_id == player_id)
    }

    /// Roster index of any player (alive or dead) occupying a cell.
    pub fn player_index_at(&self, x: i32, y: i32) -> Option<usize> {
        self.players.iter().position(|gp| gp.is_at(x, y))
    }

    pub fn living_player_indices(&self) -> Vec<usize> {
        self.players
            .iter()
            .enumerate()
            .filter(|(_, gp)| gp.is_alive())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn living_player_count(&self) -> usize {
        self.players.iter().filter(|gp| gp.is_alive()).count()
    }

    /// The periodic bulk AP distribution.
    pub fn give_all_living_players_ap(&mut self, ap: i32) {
        for gp in self.players.iter_mut() {
            if gp.status == PlayerStatus::Alive {
                gp.actions += ap;
            }
        }
    }
}
