use serde::{Deserialize, Serialize};

use super::{GameId, GuildId, PlayerId};

/// Resolved per-community configuration, read at game-creation time.
/// Membership opt-in management lives with the community front end; the
/// engine only consumes the resolved roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildConfig {
    pub id: GuildId,
    pub board_size: i32,
    pub action_timer_minutes: i64,
    pub minimum_player_count: usize,
    pub current_game_id: Option<GameId>,
    pub opted_in_players: Vec<PlayerId>,
}

impl GuildConfig {
    pub fn new(id: GuildId) -> Self {
        Self {
            id,
            board_size: 20,
            action_timer_minutes: 60 * 12,
            minimum_player_count: 2,
            current_game_id: None,
            opted_in_players: Vec::new(),
        }
    }
}
