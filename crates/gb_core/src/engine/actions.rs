//! Validation and resolution of player-submitted actions.

use chrono::Utc;
use rand::Rng;

use super::board::random_direction;
use super::Engine;
use crate::error::{EngineError, Result};
use crate::models::{ActionKind, BoardObject, Game, MoveRecord, ObjectKind, StatKind};
use crate::store::GameStore;

/// A fully parsed player action. Aimed actions carry validated integer
/// targets; `heal` and `upgrade` act on the actor alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Move { x: i32, y: i32 },
    Shoot { x: i32, y: i32 },
    Shove { x: i32, y: i32 },
    GiveAp { x: i32, y: i32 },
    GiveHp { x: i32, y: i32 },
    Heal,
    Upgrade,
    JuryVote { x: i32, y: i32 },
    StartFire { x: i32, y: i32 },
}

impl Action {
    /// Parse a command-style action name plus optional targets. Unknown
    /// names are rejected outright; targeted actions need both coordinates.
    pub fn parse(name: &str, target_x: Option<i32>, target_y: Option<i32>) -> Result<Action> {
        let target = || {
            target_x
                .zip(target_y)
                .ok_or_else(|| EngineError::Validation("Target is not numeric".into()))
        };
        match name {
            "move" => target().map(|(x, y)| Action::Move { x, y }),
            "shoot" => target().map(|(x, y)| Action::Shoot { x, y }),
            "shove" => target().map(|(x, y)| Action::Shove { x, y }),
            "giveAP" => target().map(|(x, y)| Action::GiveAp { x, y }),
            "giveHP" => target().map(|(x, y)| Action::GiveHp { x, y }),
            "heal" => Ok(Action::Heal),
            "upgrade" => Ok(Action::Upgrade),
            "juryVote" => target().map(|(x, y)| Action::JuryVote { x, y }),
            "startFire" => target().map(|(x, y)| Action::StartFire { x, y }),
            other => Err(EngineError::ActionNotImplemented(other.to_string())),
        }
    }

    pub fn kind(self) -> ActionKind {
        match self {
            Action::Move { .. } => ActionKind::Move,
            Action::Shoot { .. } => ActionKind::Shoot,
            Action::Shove { .. } => ActionKind::Shove,
            Action::GiveAp { .. } => ActionKind::GiveAp,
            Action::GiveHp { .. } => ActionKind::GiveHp,
            Action::Heal => ActionKind::Heal,
            Action::Upgrade => ActionKind::Upgrade,
            Action::JuryVote { .. } => ActionKind::JuryVote,
            Action::StartFire { .. } => ActionKind::StartFire,
        }
    }

    pub fn target(self) -> Option<(i32, i32)> {
        match self {
            Action::Move { x, y }
            | Action::Shoot { x, y }
            | Action::Shove { x, y }
            | Action::GiveAp { x, y }
            | Action::GiveHp { x, y }
            | Action::JuryVote { x, y }
            | Action::StartFire { x, y } => Some((x, y)),
            Action::Heal | Action::Upgrade => None,
        }
    }

    /// Everything but `giveHP`, `juryVote` and `startFire` costs AP up front.
    fn requires_ap(self) -> bool {
        !matches!(self, Action::GiveHp { .. } | Action::JuryVote { .. } | Action::StartFire { .. })
    }

    /// Ghost-only actions, spendable with the single jury vote.
    fn requires_dead(self) -> bool {
        matches!(self, Action::JuryVote { .. } | Action::StartFire { .. })
    }

    /// Actions whose target must sit within the actor's reach.
    fn is_aimed(self) -> bool {
        matches!(
            self,
            Action::Move { .. }
                | Action::Shoot { .. }
                | Action::Shove { .. }
                | Action::GiveAp { .. }
                | Action::GiveHp { .. }
        )
    }
}

impl Engine {
    /// Validate and apply one action. Exactly one [`MoveRecord`] is written
    /// per successful resolution; any failed precondition mutates nothing.
    pub fn resolve_action(&self, game: &mut Game, player_id: &str, action: Action) -> Result<String> {
        if game.status != crate::models::GameStatus::Active {
            return Err(EngineError::GameNotActive);
        }
        let actor = game.player_index(player_id).ok_or(EngineError::PlayerNotInGame)?;

        if action.requires_ap() && game.players[actor].actions < 1 {
            return Err(EngineError::Validation("You don't have enough AP".into()));
        }
        if !action.requires_dead() && !game.players[actor].is_alive() {
            return Err(EngineError::Validation("You're not alive".into()));
        }

        if let Some((tx, ty)) = action.target() {
            if !game.is_spot_on_board(tx, ty) {
                return Err(EngineError::Validation("Action is off the board".into()));
            }
        }

        if action.is_aimed() {
            let (cx, cy) = game.players[actor]
                .position
                .ok_or_else(|| EngineError::Validation("You're not on the board".into()))?;
            let reach = match action {
                Action::Move { .. } | Action::Shove { .. } => 1,
                _ => game.players[actor].range,
            };
            // Aimed actions always carry a target.
            if let Some((tx, ty)) = action.target() {
                if (tx - cx).abs() > reach || (ty - cy).abs() > reach {
                    return Err(EngineError::Validation("That is out of range".into()));
                }
            }
        }

        let mut mv =
            MoveRecord::new(game.id, action.kind(), action.target(), game.players[actor].id);

        let result = match action {
            Action::Move { x, y } => self.do_move(game, actor, x, y),
            Action::Shoot { x, y } => self.do_shoot(game, actor, x, y, &mut mv),
            Action::Shove { x, y } => self.do_shove(game, actor, x, y, &mut mv),
            Action::GiveAp { x, y } => self.do_give_ap(game, actor, x, y, &mut mv),
            Action::GiveHp { x, y } => self.do_give_hp(game, actor, x, y, &mut mv),
            Action::Heal => self.do_heal(game, actor),
            Action::Upgrade => self.do_upgrade(game, actor),
            Action::JuryVote { x, y } => self.do_jury_vote(game, actor, x, y, &mut mv),
            Action::StartFire { x, y } => self.do_start_fire(game, actor, x, y),
        }?;

        self.store().record_move(mv)?;
        Ok(result)
    }

    /// Apply pickups and hazards at a cell to the player landing there.
    /// Consumed objects are persisted away immediately.
    fn apply_object_interactions(&self, game: &mut Game, x: i32, y: i32, idx: usize) -> Result<()> {
        let kinds: Vec<ObjectKind> = game.objects_at(x, y).iter().map(|obj| obj.kind).collect();
        let mut consumed = false;
        let mut rng = self.rng();
        for kind in kinds {
            match kind {
                ObjectKind::Heart => {
                    game.players[idx].health += 1;
                    game.remove_object_at(x, y, Some(ObjectKind::Heart));
                    consumed = true;
                }
                ObjectKind::Power => {
                    let bonus = rng.gen_range(1..=3);
                    game.players[idx].actions += bonus;
                    game.remove_object_at(x, y, Some(ObjectKind::Power));
                    consumed = true;
                }
                ObjectKind::Fire => game.players[idx].health -= 1,
                ObjectKind::Goal | ObjectKind::LootGoblin => {}
            }
        }
        drop(rng);
        if consumed {
            self.store().save_game(game)?;
        }
        Ok(())
    }

    fn do_move(&self, game: &mut Game, actor: usize, tx: i32, ty: i32) -> Result<String> {
        if game.player_index_at(tx, ty).is_some() {
            return Err(EngineError::Validation("A player is already in that space".into()));
        }

        let was_on_goal = game.players[actor]
            .position
            .map(|(x, y)| game.is_object_at(x, y, Some(ObjectKind::Goal)))
            .unwrap_or(false);
        let pre_hp = game.players[actor].health;
        let pre_ap = game.players[actor].actions;

        self.apply_object_interactions(game, tx, ty, actor)?;

        if game.players[actor].health < 1 {
            game.players[actor].mark_dead(Utc::now());
            let name = game.players[actor].player_id.clone();
            self.notify(game, &format!("{} threw themselves in a fire! 🔥 ☠️", name));
            return Ok("Moved!".into());
        }

        game.players[actor].position = Some((tx, ty));
        game.players[actor].actions -= 1;
        game.players[actor].increment_stat(StatKind::Walked);

        let mut consequence = String::new();
        if game.players[actor].health < pre_hp {
            consequence.push_str(" through fire 🔥");
        }
        if game.players[actor].health > pre_hp {
            consequence.push_str(" and picked up a heart 💝");
        }
        if game.players[actor].actions > pre_ap - 1 {
            consequence.push_str(" and picked up some AP ⚡");
        }
        let name = game.players[actor].player_id.clone();
        self.notify(game, &format!("{} moved to ({}, {}){}!", name, tx, ty, consequence));

        if game.is_object_at(tx, ty, Some(ObjectKind::Goal)) {
            self.notify(game, &format!("🚨 {} is on a goal spot! Unseat them or they'll score!", name));
        }
        if was_on_goal {
            self.notify(game, &format!("🚨 {} abandoned a goal spot! It's your chance!", name));
        }

        Ok("Moved!".into())
    }

    fn do_shoot(
        &self,
        game: &mut Game,
        actor: usize,
        tx: i32,
        ty: i32,
        mv: &mut MoveRecord,
    ) -> Result<String> {
        // A fire at the target is always extinguished; with no player there
        // the shot ends as a squirt.
        if game.is_object_at(tx, ty, Some(ObjectKind::Fire)) {
            game.remove_object_at(tx, ty, Some(ObjectKind::Fire));
            self.store().save_game(game)?;
            let name = game.players[actor].player_id.clone();
            self.notify(game, &format!("💦 {} squirted out a fire! 💦", name));
            if game.player_index_at(tx, ty).is_none() {
                game.players[actor].actions -= 1;
                return Ok("Squirt!".into());
            }
        }

        if let Some(gob_idx) = game
            .board_objects
            .iter()
            .position(|obj| obj.kind == ObjectKind::LootGoblin && obj.is_at(tx, ty))
        {
            return self.shoot_loot_goblin(game, actor, gob_idx, tx, ty);
        }

        let target = game
            .player_index_at(tx, ty)
            .ok_or_else(|| EngineError::Validation("No player at that position".into()))?;
        if game.players[target].health <= 0 {
            return Err(EngineError::Validation("They're dead, Jim!".into()));
        }

        game.players[actor].increment_stat(StatKind::ShotSomeone);
        game.players[target].increment_stat(StatKind::WasShot);
        game.players[target].health -= 1;

        let mut killed = false;
        if game.players[target].health <= 0 {
            killed = true;
            game.players[actor].increment_stat(StatKind::KilledSomeone);
            game.players[target].increment_stat(StatKind::WasKilled);
            // The killer salvages half the victim's remaining AP.
            let reward = game.players[target].actions / 2;
            game.players[actor].actions += reward;
            game.players[target].mark_dead(Utc::now());
            let count_alive = game.living_player_count();
            game.players[target].win_position = Some(count_alive as u32 + 1);
        }

        game.players[actor].actions -= 1;
        mv.target_game_player_id = Some(game.players[target].id);

        let shooter = game.players[actor].player_id.clone();
        let victim = game.players[target].player_id.clone();
        if killed {
            self.notify(game, &format!("☠️ {} ELIMINATED {} and got an AP bonus!", shooter, victim));
        } else {
            self.notify(
                game,
                &format!(
                    "{} 💥shot💥 {}, reducing their health to {}! 🩸",
                    shooter, victim, game.players[target].health
                ),
            );
        }

        Ok("Shot!".into())
    }

    fn shoot_loot_goblin(
        &self,
        game: &mut Game,
        actor: usize,
        gob_idx: usize,
        tx: i32,
        ty: i32,
    ) -> Result<String> {
        let state = game.board_objects[gob_idx]
            .goblin
            .as_mut()
            .ok_or_else(|| EngineError::Validation("That goblin has no state".into()))?;
        state.health -= 1;
        let goblin_health = state.health;
        let scatter_hearts = state.stolen_hearts + 3;
        let scatter_powers = state.stolen_powers + 3;

        let mut rng = self.rng();

        // The goblin coughs up a heart or a power directly to the shooter.
        let gained = if rng.gen_bool(0.5) {
            game.players[actor].health += 1;
            "heart"
        } else {
            game.players[actor].actions += 1;
            "power"
        };

        if goblin_health <= 0 {
            // Scatter the hoard into free cells around the corpse.
            let drops = std::iter::repeat(ObjectKind::Heart)
                .take(scatter_hearts as usize)
                .chain(std::iter::repeat(ObjectKind::Power).take(scatter_powers as usize));
            for kind in drops {
                for _ in 0..100 {
                    let (dx, dy) = random_direction(&mut *rng);
                    let (lx, ly) = (tx + dx, ty + dy);
                    if game.is_spot_on_board(lx, ly)
                        && !game.is_player_at(lx, ly)
                        && !game.is_object_at(lx, ly, None)
                    {
                        game.add_object(BoardObject::new(kind, lx, ly));
                        break;
                    }
                }
            }
            drop(rng);
            game.remove_object_at(tx, ty, Some(ObjectKind::LootGoblin));
            game.add_object(BoardObject::new(ObjectKind::Power, tx, ty));
            self.store().save_game(game)?;
            let name = game.players[actor].player_id.clone();
            self.notify(
                game,
                &format!("💀 {} killed the Loot Goblin, pickups exploded everywhere! 💀", name),
            );
        } else {
            drop(rng);
            self.store().save_game(game)?;
            let name = game.players[actor].player_id.clone();
            self.notify(
                game,
                &format!(
                    "💥 {} shot the Loot Goblin and gained a {}! It has {} health left. 💥",
                    name, gained, goblin_health
                ),
            );
        }

        game.players[actor].actions -= 1;
        Ok("Shot Loot Goblin!".into())
    }

    fn do_shove(
        &self,
        game: &mut Game,
        actor: usize,
        tx: i32,
        ty: i32,
        mv: &mut MoveRecord,
    ) -> Result<String> {
        let target = game
            .player_index_at(tx, ty)
            .ok_or_else(|| EngineError::Validation("There's no player there to shove".into()))?;

        // Push the target one further cell along the shover's line.
        let (cx, cy) = game.players[actor]
            .position
            .ok_or_else(|| EngineError::Validation("You're not on the board".into()))?;
        let (nx, ny) = (tx + (tx - cx), ty + (ty - cy));

        if !game.is_spot_on_board(nx, ny) {
            return Err(EngineError::Validation("Shove target is off the board".into()));
        }
        if game.player_index_at(nx, ny).is_some() {
            return Err(EngineError::Validation("Shove target space is occupied".into()));
        }

        let was_on_goal = game.is_object_at(tx, ty, Some(ObjectKind::Goal));
        let pre_hp = game.players[target].health;
        let pre_ap = game.players[target].actions;

        game.players[target].position = Some((nx, ny));
        self.apply_object_interactions(game, nx, ny, target)?;

        let shover = game.players[actor].player_id.clone();
        let victim = game.players[target].player_id.clone();
        if game.players[target].health < pre_hp {
            if game.players[target].health < 1 {
                game.players[target].mark_dead(Utc::now());
                self.notify(game, &format!("{} shoved {} to their fiery death! 🔥 ☠️", shover, victim));
            } else {
                self.notify(game, &format!("{} shoved {} into a fire! 🔥", shover, victim));
            }
        } else if game.players[target].health > pre_hp {
            self.notify(game, &format!("{} shoved {} into a heart! 💝", shover, victim));
        } else if game.players[target].actions > pre_ap {
            self.notify(game, &format!("{} shoved {} into some AP! ⚡", shover, victim));
        } else {
            self.notify(game, &format!("{} shoved {} out of their way!", shover, victim));
        }

        if game.is_object_at(nx, ny, Some(ObjectKind::Goal)) {
            self.notify(game, &format!("🚨 {} was shoved onto a goal spot! How nice! 🎁", victim));
        }
        if was_on_goal {
            self.notify(game, &format!("🚨 {} was shoved off of a goal spot! Drama! 🎭", victim));
        }

        game.players[actor].actions -= 1;
        game.players[actor].increment_stat(StatKind::Shoved);
        mv.target_game_player_id = Some(game.players[target].id);

        Ok("Shoved!".into())
    }

    fn do_give_ap(
        &self,
        game: &mut Game,
        actor: usize,
        tx: i32,
        ty: i32,
        mv: &mut MoveRecord,
    ) -> Result<String> {
        let target = game
            .player_index_at(tx, ty)
            .ok_or_else(|| EngineError::Validation("There's no player at that target to gift".into()))?;
        if !game.players[target].is_alive() {
            return Err(EngineError::Validation("They dead!".into()));
        }

        game.players[target].actions += 1;
        game.players[actor].actions -= 1;
        game.players[actor].increment_stat(StatKind::GaveAp);
        game.players[target].increment_stat(StatKind::WasGiftedAp);
        mv.target_game_player_id = Some(game.players[target].id);

        let giver = game.players[actor].player_id.clone();
        let receiver = game.players[target].player_id.clone();
        self.notify(
            game,
            &format!(
                "{} ({} AP) 🤝 gave an AP to {} ({} AP)!",
                giver, game.players[actor].actions, receiver, game.players[target].actions
            ),
        );

        Ok("Gave AP!".into())
    }

    fn do_give_hp(
        &self,
        game: &mut Game,
        actor: usize,
        tx: i32,
        ty: i32,
        mv: &mut MoveRecord,
    ) -> Result<String> {
        let target = game
            .player_index_at(tx, ty)
            .ok_or_else(|| EngineError::Validation("There's no player at that target to gift".into()))?;
        if game.players[actor].health < 2 {
            return Err(EngineError::Validation("You don't have enough health to give".into()));
        }

        game.players[target].health += 1;
        game.players[target].increment_stat(StatKind::GotHp);

        let resurrected = game.players[target].health == 1;
        if resurrected {
            game.players[target].status = crate::models::PlayerStatus::Alive;
            game.players[target].win_position = None;
            game.players[target].death_time = None;
            game.players[actor].increment_stat(StatKind::Resurrector);
            game.players[target].increment_stat(StatKind::Resurrectee);
            rerank_dead_players(game);
        }

        game.players[actor].health -= 1;
        game.players[actor].increment_stat(StatKind::GaveHp);
        mv.target_game_player_id = Some(game.players[target].id);

        let giver = game.players[actor].player_id.clone();
        let receiver = game.players[target].player_id.clone();
        if resurrected {
            self.notify(game, &format!("{} 😇 brought {} back from the dead!", giver, receiver));
        } else {
            self.notify(
                game,
                &format!(
                    "{} ({} HP) 💌 gave an HP to {} ({} HP)!",
                    giver, game.players[actor].health, receiver, game.players[target].health
                ),
            );
        }

        Ok("Gave HP!".into())
    }

    fn do_heal(&self, game: &mut Game, actor: usize) -> Result<String> {
        if game.players[actor].actions < 3 {
            return Err(EngineError::Validation("You don't have enough AP".into()));
        }
        game.players[actor].health += 1;
        game.players[actor].actions -= 3;
        game.players[actor].increment_stat(StatKind::Healed);
        let name = game.players[actor].player_id.clone();
        let health = game.players[actor].health;
        self.notify(game, &format!("{} ❤️ healed to {}!", name, health));
        Ok("Healed!".into())
    }

    fn do_upgrade(&self, game: &mut Game, actor: usize) -> Result<String> {
        if game.players[actor].actions < 3 {
            return Err(EngineError::Validation("You don't have enough AP".into()));
        }
        game.players[actor].range += 1;
        game.players[actor].actions -= 3;
        game.players[actor].increment_stat(StatKind::UpgradedRange);
        let name = game.players[actor].player_id.clone();
        let range = game.players[actor].range;
        self.notify(game, &format!("{} 🔧 upgraded their range to {}!", name, range));
        Ok("Upgraded!".into())
    }

    fn do_jury_vote(
        &self,
        game: &mut Game,
        actor: usize,
        tx: i32,
        ty: i32,
        mv: &mut MoveRecord,
    ) -> Result<String> {
        if game.players[actor].health > 0 {
            return Err(EngineError::Validation("You need to be dead to vote".into()));
        }
        if game.players[actor].jury_votes_to_spend == 0 {
            return Err(EngineError::Validation("You've already voted".into()));
        }
        let target = game
            .player_index_at(tx, ty)
            .ok_or_else(|| EngineError::Validation("There's no player at that target".into()))?;
        if !game.players[target].is_alive() {
            return Err(EngineError::Validation("That fool's dead".into()));
        }

        game.players[actor].jury_votes_to_spend = 0;
        game.players[target].actions += 1;
        game.players[actor].increment_stat(StatKind::GaveTreat);
        game.players[target].increment_stat(StatKind::WasTreated);
        mv.target_game_player_id = Some(game.players[target].id);

        let ghost = game.players[actor].player_id.clone();
        let lucky = game.players[target].player_id.clone();
        self.notify(game, &format!("{} 🍬 treated {} to an extra AP! 🍬", ghost, lucky));

        Ok("Treated!".into())
    }

    fn do_start_fire(&self, game: &mut Game, actor: usize, tx: i32, ty: i32) -> Result<String> {
        if game.players[actor].health > 0 {
            return Err(EngineError::Validation("You need to be dead to start fires".into()));
        }
        if game.players[actor].jury_votes_to_spend == 0 {
            return Err(EngineError::Validation("You're out of jury votes".into()));
        }
        if game.player_index_at(tx, ty).is_some() {
            return Err(EngineError::Validation(
                "Sorry, you can't light your friends on fire".into(),
            ));
        }

        game.players[actor].jury_votes_to_spend = 0;
        game.players[actor].increment_stat(StatKind::StartFire);
        game.add_object(BoardObject::new(ObjectKind::Fire, tx, ty));
        self.store().save_game(game)?;

        let ghost = game.players[actor].player_id.clone();
        self.notify(game, &format!("{}'s ghost 🔥 lit a fire! 🔥", ghost));

        Ok("Ignited!".into())
    }
}

/// After a resurrection, recompute every still-dead player's rank from
/// death order: the earlier the death, the worse the final position.
fn rerank_dead_players(game: &mut Game) {
    let mut order: Vec<usize> = (0..game.players.len()).collect();
    order.sort_by(|&a, &b| match (game.players[a].death_time, game.players[b].death_time) {
        (Some(ta), Some(tb)) => ta.cmp(&tb),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    let total = game.players.len();
    for (position, &idx) in order.iter().enumerate() {
        if game.players[idx].health == 0 {
            game.players[idx].win_position = Some((total - position) as u32);
        }
    }
}
