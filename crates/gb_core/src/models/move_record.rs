use serde::{Deserialize, Serialize};

use super::{GameId, GamePlayerId};

/// The nine resolvable action kinds, as recorded in the move log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Move,
    Shoot,
    Shove,
    GiveAp,
    GiveHp,
    Heal,
    Upgrade,
    JuryVote,
    StartFire,
}

impl ActionKind {
    pub fn name(self) -> &'static str {
        match self {
            ActionKind::Move => "move",
            ActionKind::Shoot => "shoot",
            ActionKind::Shove => "shove",
            ActionKind::GiveAp => "giveAP",
            ActionKind::GiveHp => "giveHP",
            ActionKind::Heal => "heal",
            ActionKind::Upgrade => "upgrade",
            ActionKind::JuryVote => "juryVote",
            ActionKind::StartFire => "startFire",
        }
    }
}

/// Append-only audit record of one resolved action. Written exactly once
/// per successful resolution; failed validations produce no record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub game_id: GameId,
    pub action: ActionKind,
    pub target_x: Option<i32>,
    pub target_y: Option<i32>,
    pub acting_game_player_id: GamePlayerId,
    pub target_game_player_id: Option<GamePlayerId>,
}

impl MoveRecord {
    pub fn new(
        game_id: GameId,
        action: ActionKind,
        target: Option<(i32, i32)>,
        acting_game_player_id: GamePlayerId,
    ) -> Self {
        Self {
            game_id,
            action,
            target_x: target.map(|(x, _)| x),
            target_y: target.map(|(_, y)| y),
            acting_game_player_id,
            target_game_player_id: None,
        }
    }
}
