pub mod game;
pub mod game_player;
pub mod guild;
pub mod move_record;

pub use game::{BoardObject, Game, GameStatus, LootGoblinState, ObjectKind};
pub use game_player::{GamePlayer, PlayerStats, PlayerStatus, StatKind};
pub use guild::GuildConfig;
pub use move_record::{ActionKind, MoveRecord};

/// Store-assigned primary key for a game.
pub type GameId = i64;
/// Store-assigned primary key for a game participant row.
pub type GamePlayerId = i64;
/// External player identity, resolved by the front end.
pub type PlayerId = String;
/// External community identity.
pub type GuildId = String;
