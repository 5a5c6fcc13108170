//! The periodic tick: scoring, AP distribution, respawns, pickups and fire.

use chrono::{Duration, Utc};
use rand::Rng;

use super::board::random_direction;
use super::lifecycle::GameOutcome;
use super::Engine;
use crate::error::{EngineError, Result};
use crate::models::{BoardObject, Game, GameStatus, ObjectKind, PlayerStatus, StatKind};
use crate::store::GameStore;

/// Goal points needed to win outright.
const WINNING_GAME_POINTS: u32 = 5;

/// Target count of each pickup kind, as a fraction of the board side.
const PICKUP_PER_WIDTH: f64 = 0.9;

/// Chance per existing fire of spreading to a neighbour cell each tick.
const FIRE_SPREAD_CHANCE: f64 = 0.2;

impl Engine {
    /// Advance one game by a full tick.
    ///
    /// May end the game (goal win, last survivor, or everyone burning at
    /// once) and muster the next one. Sweep callers log failures and move on.
    pub fn do_tick(&self, game: &mut Game) -> Result<()> {
        if game.status != GameStatus::Active {
            return Err(EngineError::GameNotActive);
        }
        let now = Utc::now();
        game.next_tick_time = Some(now + Duration::minutes(game.minutes_per_action_distro));
        self.store().save_game(game)?;

        // Goal scoring first: a fifth point ends the game before anything
        // else happens this tick.
        for idx in game.living_player_indices() {
            let on_goal = game.players[idx]
                .position
                .map(|(x, y)| game.is_object_at(x, y, Some(ObjectKind::Goal)))
                .unwrap_or(false);
            if !on_goal {
                continue;
            }
            let points = game.players[idx].increment_stat(StatKind::GamePoint);
            let name = game.players[idx].player_id.clone();
            self.notify(
                game,
                &format!("🎯 {} held the goal and scored! {}/{} points! 🎯", name, points, WINNING_GAME_POINTS),
            );
            if points >= WINNING_GAME_POINTS {
                return self.end_game_and_begin_anew(game, GameOutcome::Won, &[idx]);
            }
        }

        game.give_all_living_players_ap(2);

        // Dead players come back on the perimeter with fresh health and a
        // catch-up AP bonus. A saturated perimeter skips the respawn until
        // the next tick.
        let mut respawned = Vec::new();
        for idx in 0..game.players.len() {
            if game.players[idx].is_alive() {
                continue;
            }
            let pos = {
                let mut rng = self.rng();
                game.find_open_perimeter_position(&mut *rng)
            };
            match pos {
                Ok(pos) => {
                    let gp = &mut game.players[idx];
                    gp.position = Some(pos);
                    gp.health = 3;
                    gp.actions += 2;
                    gp.status = PlayerStatus::Alive;
                    gp.death_time = None;
                    gp.win_position = None;
                    respawned.push(gp.player_id.clone());
                }
                Err(EngineError::NoClearSpace) => {
                    log::warn!("game {}: no perimeter space to respawn player", game.id);
                }
                Err(err) => return Err(err),
            }
        }
        if !respawned.is_empty() {
            self.notify(game, &format!("💫 Back from the dead: {} 💫", respawned.join(", ")));
        }

        self.sprinkle_pickups(game);

        // Fires spread before they burn, so a fresh fire can catch someone
        // standing next to an old one.
        let existing_fires: Vec<(i32, i32)> = game
            .board_objects
            .iter()
            .filter(|obj| obj.kind == ObjectKind::Fire)
            .map(|obj| (obj.x, obj.y))
            .collect();
        let mut spread = 0;
        for (fx, fy) in existing_fires {
            let (roll, dir) = {
                let mut rng = self.rng();
                (rng.gen_bool(FIRE_SPREAD_CHANCE), random_direction(&mut *rng))
            };
            if !roll {
                continue;
            }
            let (nx, ny) = (fx + dir.0, fy + dir.1);
            if game.is_spot_on_board(nx, ny) && !game.is_object_at(nx, ny, Some(ObjectKind::Fire)) {
                game.add_object(BoardObject::new(ObjectKind::Fire, nx, ny));
                spread += 1;
            }
        }
        if spread > 0 {
            self.notify(game, &format!("🔥 {} fires spread! 🔥", spread));
        }

        let living_before_burn = game.living_player_count();

        // Environmental burn deaths grant no jury vote and keep the player's
        // remaining AP; only combat deaths go through `mark_dead`.
        let fire_cells: Vec<(i32, i32)> = game
            .board_objects
            .iter()
            .filter(|obj| obj.kind == ObjectKind::Fire)
            .map(|obj| (obj.x, obj.y))
            .collect();
        let mut burned_to_death = Vec::new();
        for (fx, fy) in fire_cells {
            let Some(idx) = game.player_index_at(fx, fy) else { continue };
            if !game.players[idx].is_alive() {
                continue;
            }
            game.players[idx].health -= 1;
            game.players[idx].increment_stat(StatKind::Zapped);
            let name = game.players[idx].player_id.clone();
            if game.players[idx].health <= 0 {
                game.players[idx].status = PlayerStatus::Dead;
                game.players[idx].death_time = Some(now);
                burned_to_death.push(idx);
                self.notify(game, &format!("☠️ {} was cooked alive! ☠️", name));
            } else {
                self.notify(game, &format!("🔥 {} is on fire and lost a health! 🔥", name));
            }
        }

        if game.sudden_death_round == 0 {
            self.notify(game, "⚡ Distributed 2 AP to all living players! ⚡");
        }

        let survivors = game.living_player_count();
        if !burned_to_death.is_empty() {
            if survivors == 0 {
                // Everyone who was still standing burned at once.
                debug_assert_eq!(burned_to_death.len(), living_before_burn);
                for &idx in &burned_to_death {
                    game.players[idx].win_position = Some(2);
                }
                return self.end_game_and_begin_anew(game, GameOutcome::Tied, &burned_to_death);
            }
            for &idx in &burned_to_death {
                game.players[idx].win_position = Some(survivors as u32 + 1);
            }
        }
        // The last-survivor win only triggers off a death this tick; a lone
        // living player whose rivals are merely awaiting respawn plays on.
        if !burned_to_death.is_empty() && survivors == 1 && game.players.len() > 1 {
            let winner = game.living_player_indices()[0];
            return self.end_game_and_begin_anew(game, GameOutcome::Won, &[winner]);
        }

        self.store().save_game(game)?;
        Ok(())
    }

    /// Top the board back up to its target heart and power counts. Exhausted
    /// placement searches just leave the board short for this round.
    pub(crate) fn sprinkle_pickups(&self, game: &mut Game) {
        let desired = (game.board_width as f64 * PICKUP_PER_WIDTH).floor() as usize;
        for kind in [ObjectKind::Heart, ObjectKind::Power] {
            let current = game.count_objects_of_kind(kind);
            for _ in current..desired {
                let pos = {
                    let mut rng = self.rng();
                    game.find_clear_space(&mut *rng)
                };
                match pos {
                    Ok((x, y)) => game.add_object(BoardObject::new(kind, x, y)),
                    Err(_) => {
                        log::warn!("game {}: board too full to sprinkle pickups", game.id);
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::engine::Engine;
    use crate::models::GuildConfig;
    use crate::notify::test_support::RecordingNotifier;
    use crate::store::{lock_game, GameHandle, GameStore, MemoryStore};

    struct Fixture {
        engine: Engine,
        handle: GameHandle,
        store: Arc<MemoryStore>,
        notifier: Arc<RecordingNotifier>,
    }

    /// Bare active game: players placed by hand, no goal or pickups.
    fn fixture(board: i32, players: &[(&str, i32, i32)]) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = Engine::with_seed(store.clone(), notifier.clone(), 99);

        let mut guild = GuildConfig::new("g".into());
        guild.opted_in_players = players.iter().map(|(p, _, _)| p.to_string()).collect();
        store.put_guild(guild.clone());
        let mut game = crate::models::Game::from_guild(store.next_game_id(), &guild, board, Utc::now());
        for (name, x, y) in players {
            let id = store.next_game_player_id();
            game.add_player(id, name).unwrap();
            let idx = game.player_index(name).unwrap();
            game.players[idx].position = Some((*x, *y));
        }
        game.status = GameStatus::Active;
        let handle = store.insert_game(game.clone());
        let mut guild = store.guild("g").unwrap();
        guild.current_game_id = Some(game.id);
        store.put_guild(guild);
        Fixture { engine, handle, store, notifier }
    }

    fn tick(f: &Fixture) {
        let mut game = lock_game(&f.handle);
        f.engine.do_tick(&mut game).unwrap();
    }

    #[test]
    fn tick_distributes_ap_and_reschedules() {
        let f = fixture(20, &[("alice", 0, 0), ("bob", 5, 5)]);
        tick(&f);
        let game = lock_game(&f.handle);
        assert_eq!(game.players[0].actions, 5);
        assert_eq!(game.players[1].actions, 5);
        assert!(game.next_tick_time.is_some());
        // Board topped up to floor(20 * 0.9) of each pickup.
        assert_eq!(game.count_objects_of_kind(ObjectKind::Heart), 18);
        assert_eq!(game.count_objects_of_kind(ObjectKind::Power), 18);
    }

    #[test]
    fn tick_rejects_inactive_games() {
        let f = fixture(20, &[("alice", 0, 0)]);
        lock_game(&f.handle).status = GameStatus::Won;
        let mut game = lock_game(&f.handle);
        assert_eq!(f.engine.do_tick(&mut game), Err(EngineError::GameNotActive));
    }

    #[test]
    fn goal_sitter_accrues_points() {
        let f = fixture(20, &[("alice", 3, 3), ("bob", 10, 10)]);
        lock_game(&f.handle).add_object(BoardObject::new(ObjectKind::Goal, 3, 3));
        tick(&f);
        let game = lock_game(&f.handle);
        assert_eq!(game.players[0].stats().game_point, 1);
        assert_eq!(game.players[1].stats().game_point, 0);
        assert_eq!(game.status, GameStatus::Active);
    }

    #[test]
    fn fifth_goal_point_wins_immediately() {
        let f = fixture(20, &[("alice", 3, 3), ("bob", 10, 10)]);
        {
            let mut game = lock_game(&f.handle);
            game.add_object(BoardObject::new(ObjectKind::Goal, 3, 3));
            for _ in 0..4 {
                game.players[0].increment_stat(StatKind::GamePoint);
            }
            // The scorer stands in fire that would kill them later in the
            // tick; the win must land first.
            game.players[0].health = 1;
            game.add_object(BoardObject::new(ObjectKind::Fire, 3, 3));
        }
        tick(&f);
        let game = lock_game(&f.handle);
        assert_eq!(game.status, GameStatus::Won);
        assert_eq!(game.winning_player_id, Some(game.players[0].id));
        assert_eq!(game.players[0].win_position, Some(1));
        assert!(game.players[0].is_alive());
        // The next game is already mustering.
        assert!(f.store.guild("g").unwrap().current_game_id.is_some());
        assert_ne!(f.store.guild("g").unwrap().current_game_id, Some(game.id));
    }

    #[test]
    fn dead_players_respawn_on_the_perimeter() {
        let f = fixture(20, &[("alice", 3, 3), ("bob", 10, 10)]);
        {
            let mut game = lock_game(&f.handle);
            game.players[0].health = 0;
            game.players[0].status = PlayerStatus::Dead;
            game.players[0].death_time = Some(Utc::now());
            game.players[0].win_position = Some(2);
            game.players[0].actions = 1;
        }
        tick(&f);
        let game = lock_game(&f.handle);
        let gp = &game.players[0];
        assert!(gp.is_alive());
        assert_eq!(gp.health, 3);
        // 1 AP kept + 2 respawn bonus; dead players miss the distro.
        assert_eq!(gp.actions, 3);
        assert_eq!(gp.death_time, None);
        assert_eq!(gp.win_position, None);
        let (x, y) = gp.position.unwrap();
        assert!(x == 0 || x == 19 || y == 0 || y == 19);
        assert!(f.notifier.messages().iter().any(|m| m.contains("Back from the dead")));
    }

    #[test]
    fn burning_player_loses_health_without_dying() {
        let f = fixture(20, &[("alice", 3, 3), ("bob", 10, 10)]);
        lock_game(&f.handle).add_object(BoardObject::new(ObjectKind::Fire, 3, 3));
        tick(&f);
        let game = lock_game(&f.handle);
        assert_eq!(game.players[0].health, 2);
        assert_eq!(game.players[0].stats().zapped, 1);
        assert!(game.players[0].is_alive());
    }

    #[test]
    fn burn_death_grants_no_jury_vote_and_ranks_after_survivors() {
        let f = fixture(20, &[("alice", 3, 3), ("bob", 10, 10), ("carol", 15, 15)]);
        {
            let mut game = lock_game(&f.handle);
            game.players[0].health = 1;
            game.players[0].actions = 4;
            game.add_object(BoardObject::new(ObjectKind::Fire, 3, 3));
        }
        tick(&f);
        let game = lock_game(&f.handle);
        let gp = &game.players[0];
        assert_eq!(gp.status, PlayerStatus::Dead);
        assert_eq!(gp.jury_votes_to_spend, 0);
        // AP untouched apart from the distro they received while alive.
        assert_eq!(gp.actions, 6);
        assert_eq!(gp.win_position, Some(3));
        assert_eq!(game.status, GameStatus::Active);
    }

    #[test]
    fn everyone_burning_at_once_ties_at_second_place() {
        let f = fixture(20, &[("alice", 3, 3), ("bob", 10, 10)]);
        {
            let mut game = lock_game(&f.handle);
            game.players[0].health = 1;
            game.players[1].health = 1;
            game.add_object(BoardObject::new(ObjectKind::Fire, 3, 3));
            game.add_object(BoardObject::new(ObjectKind::Fire, 10, 10));
        }
        tick(&f);
        let game = lock_game(&f.handle);
        assert_eq!(game.status, GameStatus::Tied);
        assert_eq!(game.players[0].win_position, Some(2));
        assert_eq!(game.players[1].win_position, Some(2));
        assert_eq!(game.winning_player_id, None);
        assert!(f.notifier.messages().iter().any(|m| m.contains("tie")));
    }

    #[test]
    fn last_survivor_after_burns_wins() {
        let f = fixture(20, &[("alice", 3, 3), ("bob", 10, 10)]);
        {
            let mut game = lock_game(&f.handle);
            game.players[1].health = 1;
            game.add_object(BoardObject::new(ObjectKind::Fire, 10, 10));
        }
        tick(&f);
        let game = lock_game(&f.handle);
        assert_eq!(game.status, GameStatus::Won);
        assert_eq!(game.winning_player_id, Some(game.players[0].id));
        assert_eq!(game.players[0].win_position, Some(1));
        assert_eq!(game.players[1].win_position, Some(2));
    }

    #[test]
    fn lone_survivor_without_a_death_this_tick_plays_on() {
        // 3x3 board with every perimeter cell blocked, so the dead player
        // cannot respawn and the living one stands alone after the tick.
        let f = fixture(3, &[("alice", 1, 1), ("bob", 0, 0)]);
        {
            let mut game = lock_game(&f.handle);
            game.players[1].health = 0;
            game.players[1].status = PlayerStatus::Dead;
            game.players[1].death_time = Some(Utc::now());
            for x in 0..3 {
                for y in 0..3 {
                    if x == 0 || x == 2 || y == 0 || y == 2 {
                        game.add_object(BoardObject::new(ObjectKind::Heart, x, y));
                    }
                }
            }
        }
        tick(&f);
        let game = lock_game(&f.handle);
        assert_eq!(game.status, GameStatus::Active);
        assert_eq!(game.winning_player_id, None);
        assert_eq!(game.players[1].status, PlayerStatus::Dead);
    }

    #[test]
    fn tick_sweep_takes_only_due_games() {
        let f = fixture(20, &[("alice", 0, 0), ("bob", 5, 5)]);
        lock_game(&f.handle).next_tick_time = Some(Utc::now() + chrono::Duration::minutes(30));
        assert_eq!(f.engine.tick_games_needing_tick(), 0);

        lock_game(&f.handle).next_tick_time = Some(Utc::now() - chrono::Duration::minutes(1));
        assert_eq!(f.engine.tick_games_needing_tick(), 1);
        // Rescheduled into the future, so a second sweep finds nothing.
        assert_eq!(f.engine.tick_games_needing_tick(), 0);
    }

    #[test]
    fn sprinkle_respects_existing_pickups() {
        let f = fixture(10, &[("alice", 0, 0)]);
        {
            let mut game = lock_game(&f.handle);
            for n in 0..4 {
                game.add_object(BoardObject::new(ObjectKind::Heart, n, 5));
            }
            f.engine.sprinkle_pickups(&mut game);
            // floor(10 * 0.9) = 9 of each.
            assert_eq!(game.count_objects_of_kind(ObjectKind::Heart), 9);
            assert_eq!(game.count_objects_of_kind(ObjectKind::Power), 9);
        }
    }
}
