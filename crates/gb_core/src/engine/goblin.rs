//! The roaming loot goblin: rare spawn, wanders the board stealing pickups,
//! drops its hoard when shot down (see the shoot action).

use rand::Rng;

use super::board::random_direction;
use super::Engine;
use crate::error::{EngineError, Result};
use crate::models::{BoardObject, Game, ObjectKind};
use crate::store::{lock_game, GameStore};

/// Per-sweep chance of a goblin appearing in each active game.
const GOBLIN_SPAWN_CHANCE: f64 = 0.03;

/// Neighbour cells tried before the goblin gives up moving this step.
const GOBLIN_RELOCATION_TRIES: usize = 5;

/// Outcome of one goblin step for a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoblinStep {
    /// Wandered to a neighbouring cell.
    Moved,
    /// Every tried neighbour was blocked; stayed put.
    Cornered,
    /// No goblin on the board, or its time ran out this step.
    Despawned,
}

impl Engine {
    /// Roll a spawn for every active game. Returns how many goblins appeared.
    pub fn sprinkle_enemies(&self) -> usize {
        let mut spawned = 0;
        for handle in self.store().active_games() {
            let mut game = lock_game(&handle);
            let roll = self.rng().gen_bool(GOBLIN_SPAWN_CHANCE);
            if !roll {
                continue;
            }
            match self.add_loot_goblin(&mut game) {
                Ok(true) => spawned += 1,
                Ok(false) => {}
                Err(err) => log::warn!("game {}: goblin spawn failed: {}", game.id, err),
            }
        }
        spawned
    }

    /// Drop a goblin on a random free cell. Returns false when the board is
    /// too full to place one.
    pub fn add_loot_goblin(&self, game: &mut Game) -> Result<bool> {
        let pos = {
            let mut rng = self.rng();
            game.find_clear_space(&mut *rng)
        };
        match pos {
            Ok((x, y)) => {
                game.add_object(BoardObject::loot_goblin(x, y));
                self.store().save_game(game)?;
                self.notify(game, "👺 A Loot Goblin appeared! Shoot it down before it escapes! 👺");
                Ok(true)
            }
            Err(EngineError::NoClearSpace) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Step the goblin in every active game. Self-maintaining: games without
    /// a goblin are skipped, so the sweep can run unconditionally.
    pub fn step_loot_goblins(&self) {
        for handle in self.store().active_games() {
            let mut game = lock_game(&handle);
            if let Err(err) = self.step_loot_goblin(&mut game) {
                log::warn!("game {}: goblin step failed: {}", game.id, err);
            }
        }
    }

    /// Advance one game's goblin: wander, taunt neighbours, steal pickups
    /// from its cell and count down its stay.
    pub fn step_loot_goblin(&self, game: &mut Game) -> Result<GoblinStep> {
        let Some(gob_idx) =
            game.board_objects.iter().position(|obj| obj.kind == ObjectKind::LootGoblin)
        else {
            return Ok(GoblinStep::Despawned);
        };
        let (gx, gy) = (game.board_objects[gob_idx].x, game.board_objects[gob_idx].y);

        // Players block the goblin; objects don't, it steals them instead.
        let mut dest = None;
        {
            let mut rng = self.rng();
            for _ in 0..GOBLIN_RELOCATION_TRIES {
                let (dx, dy) = random_direction(&mut *rng);
                let (nx, ny) = (gx + dx, gy + dy);
                if game.is_spot_on_board(nx, ny) && !game.is_player_at(nx, ny) {
                    dest = Some((nx, ny));
                    break;
                }
            }
        }
        let (cx, cy) = dest.unwrap_or((gx, gy));
        if let Some((nx, ny)) = dest {
            game.board_objects[gob_idx].x = nx;
            game.board_objects[gob_idx].y = ny;
        }

        let adjacent: Vec<&str> = game
            .players
            .iter()
            .filter(|gp| gp.is_alive())
            .filter(|gp| {
                gp.position
                    .map(|(px, py)| (px - cx).abs() <= 1 && (py - cy).abs() <= 1)
                    .unwrap_or(false)
            })
            .map(|gp| gp.player_id.as_str())
            .collect();
        if !adjacent.is_empty() {
            let names = adjacent.join(", ");
            self.notify(game, &format!("👺 The Loot Goblin cackles at {}! 👺", names));
        }

        // Removals shift indices, so recount the hoard before touching the
        // goblin's state again.
        let mut stolen_hearts = 0;
        let mut stolen_powers = 0;
        while game.remove_object_at(cx, cy, Some(ObjectKind::Heart)) {
            stolen_hearts += 1;
        }
        while game.remove_object_at(cx, cy, Some(ObjectKind::Power)) {
            stolen_powers += 1;
        }
        if stolen_hearts + stolen_powers > 0 {
            self.notify(game, "👺 The Loot Goblin stuffed some loot into its sack! 👺");
        }

        let gob_idx = game
            .board_objects
            .iter()
            .position(|obj| obj.kind == ObjectKind::LootGoblin)
            .ok_or_else(|| EngineError::NotFound("loot goblin vanished mid-step".into()))?;
        let state = game.board_objects[gob_idx]
            .goblin
            .as_mut()
            .ok_or_else(|| EngineError::NotFound("loot goblin state".into()))?;
        state.stolen_hearts += stolen_hearts;
        state.stolen_powers += stolen_powers;
        state.turns_left = state.turns_left.saturating_sub(1);
        let gone = state.turns_left == 0;

        if gone {
            game.remove_object_at(cx, cy, Some(ObjectKind::LootGoblin));
            self.store().save_game(game)?;
            self.notify(game, "👺 The Loot Goblin escaped with its haul! 👺");
            return Ok(GoblinStep::Despawned);
        }

        self.store().save_game(game)?;
        Ok(if dest.is_some() { GoblinStep::Moved } else { GoblinStep::Cornered })
    }
}
