//! Game lifecycle: mustering, scheduled starts, endings and the chained
//! creation of the next game.

use chrono::{Duration, Utc};

use super::board::calculate_board_size;
use super::Engine;
use crate::error::{EngineError, Result};
use crate::models::{BoardObject, Game, GameStatus, ObjectKind};
use crate::store::{lock_game, GameHandle, GameStore};

/// Grace period between reaching the minimum roster and the actual start.
pub const MUSTER_DELAY_MINUTES: i64 = 5;

/// Density used when a guild's configured board is too small for its roster.
const AUTO_BOARD_DENSITY: f64 = 0.1;

/// How a finished game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GameOutcome {
    Won,
    Tied,
}

impl Engine {
    /// Open a new game for the guild and muster its opted-in players.
    ///
    /// Fails if a game is already in progress; the one-active-game invariant
    /// is owned by the guild's `current_game_id` pointer.
    pub fn create_new_game(&self, guild_id: &str) -> Result<GameHandle> {
        let mut guild = self.store().guild(guild_id)?;
        if guild.current_game_id.is_some() {
            return Err(EngineError::Validation("Already a game in progress".into()));
        }

        let now = Utc::now();
        let opted = guild.opted_in_players.clone();
        let mut board_size = guild.board_size;
        if (board_size as i64 * board_size as i64) < opted.len() as i64 {
            board_size = calculate_board_size(opted.len(), AUTO_BOARD_DENSITY)?;
        }

        let game_id = self.store().next_game_id();
        let mut game = Game::from_guild(game_id, &guild, board_size, now);
        for player_id in &opted {
            let id = self.store().next_game_player_id();
            game.add_player(id, player_id)?;
        }

        guild.current_game_id = Some(game_id);
        self.store().save_guild(&guild)?;
        let handle = self.store().insert_game(game);

        {
            let mut game = lock_game(&handle);
            self.notify(&game, "⚔️ A new game is mustering! Join up! ⚔️");
            if game.players.len() < game.minimum_player_count {
                self.notify(&game, "Not enough players yet. Recruit some friends!");
            } else {
                self.check_should_start_game(&mut game)?;
            }
            self.store().save_game(&game)?;
        }

        Ok(handle)
    }

    /// Opt a player in for the guild and add them to the mustering game, if
    /// one exists. Idempotent.
    pub fn join_game(&self, guild_id: &str, player_id: &str) -> Result<()> {
        let mut guild = self.store().guild(guild_id)?;
        if !guild.opted_in_players.iter().any(|p| p == player_id) {
            guild.opted_in_players.push(player_id.to_string());
            self.store().save_guild(&guild)?;
        }
        if let Some(game_id) = guild.current_game_id {
            let handle = self.store().game(game_id)?;
            let mut game = lock_game(&handle);
            if game.status == GameStatus::New {
                let id = self.store().next_game_player_id();
                game.add_player(id, player_id)?;
                let name = player_id.to_string();
                self.notify(&game, &format!("{} joined the muster!", name));
                self.check_should_start_game(&mut game)?;
                self.store().save_game(&game)?;
            }
        }
        Ok(())
    }

    /// Opt a player out and drop them from the mustering game. Idempotent;
    /// a game already under way keeps them.
    pub fn leave_game(&self, guild_id: &str, player_id: &str) -> Result<()> {
        let mut guild = self.store().guild(guild_id)?;
        guild.opted_in_players.retain(|p| p != player_id);
        self.store().save_guild(&guild)?;
        if let Some(game_id) = guild.current_game_id {
            let handle = self.store().game(game_id)?;
            let mut game = lock_game(&handle);
            if game.status == GameStatus::New {
                game.remove_player(player_id)?;
                self.check_should_start_game(&mut game)?;
                self.store().save_game(&game)?;
            }
        }
        Ok(())
    }

    /// Reconcile the scheduled start with the roster size. Called after any
    /// muster change; safe to call repeatedly.
    pub fn check_should_start_game(&self, game: &mut Game) -> Result<()> {
        if game.status != GameStatus::New {
            return Ok(());
        }
        let enough = game.players.len() >= game.minimum_player_count;
        match (enough, game.start_time) {
            (true, None) => {
                game.start_time = Some(Utc::now() + Duration::minutes(MUSTER_DELAY_MINUTES));
                self.store().save_game(game)?;
                self.notify(
                    game,
                    &format!("🎺 Enough players! The game starts in {} minutes! 🎺", MUSTER_DELAY_MINUTES),
                );
            }
            (false, Some(_)) => {
                game.start_time = None;
                self.store().save_game(game)?;
                self.notify(game, "The muster thinned out. Start postponed until more join.");
            }
            _ => {}
        }
        Ok(())
    }

    /// Transition a mustered game to active: size the board, place everyone
    /// on the perimeter, drop the goal and the first pickups.
    pub fn start_game(&self, game: &mut Game) -> Result<()> {
        if game.status != GameStatus::New {
            return Err(EngineError::Validation("Game is not new".into()));
        }
        let guild = self.store().guild(&game.guild_id)?;
        let player_count = game.players.len();
        if (game.board_width as i64 * game.board_height as i64) < player_count as i64 {
            let side = calculate_board_size(player_count, AUTO_BOARD_DENSITY)?;
            game.board_width = side;
            game.board_height = side;
        }
        game.minutes_per_action_distro = guild.action_timer_minutes;

        for idx in 0..game.players.len() {
            let pos = {
                let mut rng = self.rng();
                game.find_open_perimeter_position(&mut *rng)?
            };
            game.players[idx].position = Some(pos);
        }

        game.add_object(BoardObject::new(
            ObjectKind::Goal,
            game.board_width / 2,
            game.board_height / 2,
        ));
        self.sprinkle_pickups(game);

        let now = Utc::now();
        game.status = GameStatus::Active;
        game.start_time = Some(now);
        game.next_tick_time = Some(now + Duration::minutes(game.minutes_per_action_distro));
        self.store().save_game(game)?;
        self.notify(game, "🏁 The game has begun! Fight! 🏁");
        Ok(())
    }

    /// Close out a finished game, publish the report and muster the next one.
    pub(crate) fn end_game_and_begin_anew(
        &self,
        game: &mut Game,
        outcome: GameOutcome,
        winners: &[usize],
    ) -> Result<()> {
        game.status = match outcome {
            GameOutcome::Won => GameStatus::Won,
            GameOutcome::Tied => GameStatus::Tied,
        };

        match winners {
            [single] => {
                game.winning_player_id = Some(game.players[*single].id);
                game.players[*single].win_position = Some(1);
                let name = game.players[*single].player_id.clone();
                self.notify(game, &format!("🏆 {} won the game! 🏆", name));
            }
            [] => {}
            many => {
                let names: Vec<&str> =
                    many.iter().map(|&idx| game.players[idx].player_id.as_str()).collect();
                self.notify(game, &format!("🤝 The game ends in a tie between {}! 🤝", names.join(", ")));
            }
        }

        calc_win_positions(game);
        self.store().save_game(game)?;
        self.send_after_action_report(game);

        let mut guild = self.store().guild(&game.guild_id)?;
        guild.current_game_id = None;
        self.store().save_guild(&guild)?;
        self.create_new_game(&game.guild_id)?;
        Ok(())
    }

    /// Abort the current game without a report and muster a replacement.
    pub fn cancel_and_start_new_game(&self, game: &mut Game) -> Result<GameHandle> {
        self.notify(game, "🛑 The game was cancelled. 🛑");
        game.status = GameStatus::Cancelled;
        self.store().save_game(game)?;

        let mut guild = self.store().guild(&game.guild_id)?;
        guild.current_game_id = None;
        self.store().save_guild(&guild)?;
        self.create_new_game(&game.guild_id)
    }

    /// Final standings summary, medals for the podium.
    fn send_after_action_report(&self, game: &Game) {
        let mut order: Vec<usize> = (0..game.players.len()).collect();
        order.sort_by_key(|&idx| game.players[idx].win_position.unwrap_or(u32::MAX));

        let mut report = String::from("📜 After-action report 📜\n");
        for &idx in &order {
            let gp = &game.players[idx];
            let rank = match gp.win_position {
                Some(1) => "🥇".to_string(),
                Some(2) => "🥈".to_string(),
                Some(3) => "🥉".to_string(),
                Some(n) => format!("*{}.*", n),
                None => "*-*".to_string(),
            };
            report.push_str(&format!(
                "{} {} - {} points, {} kills, {} deaths\n",
                rank,
                gp.player_id,
                gp.stats().game_point,
                gp.stats().killed_someone,
                gp.stats().was_killed,
            ));
        }
        self.notify(game, &report);
    }

    /// Start every mustered game whose scheduled time has passed. Failures
    /// are logged and skipped so one bad game can't stall the sweep.
    pub fn start_games_needing_start(&self) -> usize {
        let mut started = 0;
        for handle in self.store().games_needing_start(Utc::now()) {
            let mut game = lock_game(&handle);
            match self.start_game(&mut game) {
                Ok(()) => started += 1,
                Err(err) => log::warn!("failed to start game {}: {}", game.id, err),
            }
        }
        started
    }

    /// Run the periodic tick for every active game that is due.
    pub fn tick_games_needing_tick(&self) -> usize {
        let mut ticked = 0;
        for handle in self.store().games_needing_tick(Utc::now()) {
            let mut game = lock_game(&handle);
            match self.do_tick(&mut game) {
                Ok(()) => ticked += 1,
                Err(err) => log::warn!("tick failed for game {}: {}", game.id, err),
            }
        }
        ticked
    }
}

/// Rank players without a final position yet by points, then by kills.
/// Positions assigned during play (kills, burns, resurrection reranks) are
/// kept as-is.
pub(crate) fn calc_win_positions(game: &mut Game) {
    let mut order: Vec<usize> = (0..game.players.len()).collect();
    order.sort_by(|&a, &b| {
        let pa = &game.players[a];
        let pb = &game.players[b];
        pb.stats()
            .game_point
            .cmp(&pa.stats().game_point)
            .then(pb.stats().killed_someone.cmp(&pa.stats().killed_someone))
    });
    for (rank, &idx) in order.iter().enumerate() {
        if game.players[idx].win_position.is_none() {
            game.players[idx].win_position = Some(rank as u32 + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::engine::Engine;
    use crate::models::{GuildConfig, StatKind};
    use crate::notify::test_support::RecordingNotifier;
    use crate::store::{GameStore, MemoryStore};

    fn engine_with_guild(opted: &[&str]) -> (Engine, Arc<MemoryStore>, Arc<RecordingNotifier>) {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = Engine::with_seed(store.clone(), notifier.clone(), 7);
        let mut guild = GuildConfig::new("g".into());
        guild.opted_in_players = opted.iter().map(|p| p.to_string()).collect();
        store.put_guild(guild);
        (engine, store, notifier)
    }

    #[test]
    fn create_new_game_musters_opted_in_players() {
        let (engine, store, _) = engine_with_guild(&["alice", "bob"]);
        let handle = engine.create_new_game("g").unwrap();
        let game = lock_game(&handle);
        assert_eq!(game.status, GameStatus::New);
        assert_eq!(game.players.len(), 2);
        // Minimum met, so a start is scheduled.
        assert!(game.start_time.is_some());
        assert_eq!(store.guild("g").unwrap().current_game_id, Some(game.id));
    }

    #[test]
    fn create_new_game_rejects_a_second_game() {
        let (engine, _, _) = engine_with_guild(&["alice", "bob"]);
        engine.create_new_game("g").unwrap();
        assert!(matches!(engine.create_new_game("g"), Err(EngineError::Validation(_))));
    }

    #[test]
    fn create_new_game_grows_an_undersized_board() {
        let (engine, store, _) = engine_with_guild(&[]);
        let mut guild = store.guild("g").unwrap();
        guild.board_size = 2;
        guild.opted_in_players = (0..10).map(|n| format!("p{}", n)).collect();
        store.put_guild(guild);
        let handle = engine.create_new_game("g").unwrap();
        let game = lock_game(&handle);
        // 10 players at density 0.1 -> 10x10.
        assert_eq!(game.board_width, 10);
    }

    #[test]
    fn join_and_leave_drive_the_start_schedule() {
        let (engine, store, _) = engine_with_guild(&["alice"]);
        let handle = engine.create_new_game("g").unwrap();
        assert!(lock_game(&handle).start_time.is_none());

        engine.join_game("g", "bob").unwrap();
        assert!(lock_game(&handle).start_time.is_some());
        assert_eq!(lock_game(&handle).players.len(), 2);

        // Joining twice changes nothing.
        engine.join_game("g", "bob").unwrap();
        assert_eq!(lock_game(&handle).players.len(), 2);
        assert_eq!(store.guild("g").unwrap().opted_in_players.len(), 2);

        // Dropping below the minimum clears the pending start.
        engine.leave_game("g", "bob").unwrap();
        assert!(lock_game(&handle).start_time.is_none());
        assert_eq!(lock_game(&handle).players.len(), 1);
    }

    #[test]
    fn check_should_start_game_is_idempotent() {
        let (engine, _, _) = engine_with_guild(&["alice", "bob"]);
        let handle = engine.create_new_game("g").unwrap();
        let scheduled = lock_game(&handle).start_time;
        assert!(scheduled.is_some());
        {
            let mut game = lock_game(&handle);
            engine.check_should_start_game(&mut game).unwrap();
        }
        // A second reconcile keeps the original schedule.
        assert_eq!(lock_game(&handle).start_time, scheduled);
    }

    #[test]
    fn start_game_places_everyone_on_the_perimeter() {
        let (engine, _, _) = engine_with_guild(&["alice", "bob", "carol"]);
        let handle = engine.create_new_game("g").unwrap();
        let mut game = lock_game(&handle);
        engine.start_game(&mut game).unwrap();

        assert_eq!(game.status, GameStatus::Active);
        assert!(game.next_tick_time.is_some());
        assert!(game.is_object_at(game.board_width / 2, game.board_height / 2, Some(ObjectKind::Goal)));
        let mut seen = std::collections::HashSet::new();
        for gp in &game.players {
            let (x, y) = gp.position.unwrap();
            assert!(
                x == 0 || x == game.board_width - 1 || y == 0 || y == game.board_height - 1,
                "player not on perimeter"
            );
            assert!(seen.insert((x, y)), "two players share a cell");
        }
        // Initial pickups: floor(width * 0.9) of each kind.
        let expected = (game.board_width as f64 * 0.9).floor() as usize;
        assert_eq!(game.count_objects_of_kind(ObjectKind::Heart), expected);
        assert_eq!(game.count_objects_of_kind(ObjectKind::Power), expected);
    }

    #[test]
    fn start_game_rejects_non_new_games() {
        let (engine, _, _) = engine_with_guild(&["alice", "bob"]);
        let handle = engine.create_new_game("g").unwrap();
        let mut game = lock_game(&handle);
        engine.start_game(&mut game).unwrap();
        assert!(engine.start_game(&mut game).is_err());
    }

    #[test]
    fn start_sweep_only_takes_due_games() {
        let (engine, _, _) = engine_with_guild(&["alice", "bob"]);
        let handle = engine.create_new_game("g").unwrap();
        // Scheduled five minutes out, so nothing is due yet.
        assert_eq!(engine.start_games_needing_start(), 0);

        lock_game(&handle).start_time = Some(Utc::now() - Duration::minutes(1));
        assert_eq!(engine.start_games_needing_start(), 1);
        assert_eq!(lock_game(&handle).status, GameStatus::Active);
    }

    #[test]
    fn ending_a_game_reports_and_musters_the_next() {
        let (engine, store, notifier) = engine_with_guild(&["alice", "bob"]);
        let handle = engine.create_new_game("g").unwrap();
        let first_id;
        {
            let mut game = lock_game(&handle);
            engine.start_game(&mut game).unwrap();
            first_id = game.id;
            engine.end_game_and_begin_anew(&mut game, GameOutcome::Won, &[0]).unwrap();
            assert_eq!(game.status, GameStatus::Won);
            assert_eq!(game.winning_player_id, Some(game.players[0].id));
            assert_eq!(game.players[0].win_position, Some(1));
        }

        let guild = store.guild("g").unwrap();
        let next_id = guild.current_game_id.unwrap();
        assert_ne!(next_id, first_id);
        let next = store.game(next_id).unwrap();
        assert_eq!(lock_game(&next).status, GameStatus::New);
        assert_eq!(lock_game(&next).players.len(), 2);

        let messages = notifier.messages();
        assert!(messages.iter().any(|m| m.contains("won the game")));
        assert!(messages.iter().any(|m| m.contains("After-action report")));
    }

    #[test]
    fn cancel_skips_the_report() {
        let (engine, store, notifier) = engine_with_guild(&["alice", "bob"]);
        let handle = engine.create_new_game("g").unwrap();
        {
            let mut game = lock_game(&handle);
            engine.cancel_and_start_new_game(&mut game).unwrap();
            assert_eq!(game.status, GameStatus::Cancelled);
        }
        assert!(store.guild("g").unwrap().current_game_id.is_some());
        assert!(!notifier.messages().iter().any(|m| m.contains("After-action report")));
    }

    #[test]
    fn win_positions_rank_by_points_then_kills() {
        let (engine, _, _) = engine_with_guild(&["alice", "bob", "carol"]);
        let handle = engine.create_new_game("g").unwrap();
        let mut game = lock_game(&handle);
        engine.start_game(&mut game).unwrap();

        game.players[0].increment_stat(StatKind::GamePoint);
        game.players[1].increment_stat(StatKind::GamePoint);
        game.players[1].increment_stat(StatKind::KilledSomeone);
        calc_win_positions(&mut game);

        assert_eq!(game.players[1].win_position, Some(1));
        assert_eq!(game.players[0].win_position, Some(2));
        assert_eq!(game.players[2].win_position, Some(3));
    }

    #[test]
    fn calc_win_positions_keeps_ranks_assigned_in_play() {
        let (engine, _, _) = engine_with_guild(&["alice", "bob"]);
        let handle = engine.create_new_game("g").unwrap();
        let mut game = lock_game(&handle);
        engine.start_game(&mut game).unwrap();

        game.players[1].win_position = Some(2);
        game.players[0].increment_stat(StatKind::GamePoint);
        calc_win_positions(&mut game);
        assert_eq!(game.players[0].win_position, Some(1));
        assert_eq!(game.players[1].win_position, Some(2));
    }
}
