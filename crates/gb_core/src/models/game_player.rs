use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{GameId, GamePlayerId, PlayerId};

/// Liveness of a participant. Dead players stay on the roster (and keep
/// their last board position) until the next respawn or game end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    Alive,
    Dead,
}

/// Every per-player counter the engine tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    GamePoint,
    KilledSomeone,
    WasKilled,
    Shoved,
    Walked,
    Healed,
    UpgradedRange,
    GaveAp,
    WasGiftedAp,
    GaveHp,
    GotHp,
    Resurrector,
    Resurrectee,
    GaveTreat,
    WasTreated,
    StartFire,
    Zapped,
    ShotSomeone,
    WasShot,
}

/// Fixed-schema stat record. A closed struct instead of a string-keyed map
/// so the ranking and report logic can't miss a counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub game_point: u32,
    pub killed_someone: u32,
    pub was_killed: u32,
    pub shoved: u32,
    pub walked: u32,
    pub healed: u32,
    pub upgraded_range: u32,
    pub gave_ap: u32,
    pub was_gifted_ap: u32,
    pub gave_hp: u32,
    pub got_hp: u32,
    pub resurrector: u32,
    pub resurrectee: u32,
    pub gave_treat: u32,
    pub was_treated: u32,
    pub start_fire: u32,
    pub zapped: u32,
    pub shot_someone: u32,
    pub was_shot: u32,
}

impl PlayerStats {
    fn counter_mut(&mut self, kind: StatKind) -> &mut u32 {
        match kind {
            StatKind::GamePoint => &mut self.game_point,
            StatKind::KilledSomeone => &mut self.killed_someone,
            StatKind::WasKilled => &mut self.was_killed,
            StatKind::Shoved => &mut self.shoved,
            StatKind::Walked => &mut self.walked,
            StatKind::Healed => &mut self.healed,
            StatKind::UpgradedRange => &mut self.upgraded_range,
            StatKind::GaveAp => &mut self.gave_ap,
            StatKind::WasGiftedAp => &mut self.was_gifted_ap,
            StatKind::GaveHp => &mut self.gave_hp,
            StatKind::GotHp => &mut self.got_hp,
            StatKind::Resurrector => &mut self.resurrector,
            StatKind::Resurrectee => &mut self.resurrectee,
            StatKind::GaveTreat => &mut self.gave_treat,
            StatKind::WasTreated => &mut self.was_treated,
            StatKind::StartFire => &mut self.start_fire,
            StatKind::Zapped => &mut self.zapped,
            StatKind::ShotSomeone => &mut self.shot_someone,
            StatKind::WasShot => &mut self.was_shot,
        }
    }

    pub fn get(&self, kind: StatKind) -> u32 {
        match kind {
            StatKind::GamePoint => self.game_point,
            StatKind::KilledSomeone => self.killed_someone,
            StatKind::WasKilled => self.was_killed,
            StatKind::Shoved => self.shoved,
            StatKind::Walked => self.walked,
            StatKind::Healed => self.healed,
            StatKind::UpgradedRange => self.upgraded_range,
            StatKind::GaveAp => self.gave_ap,
            StatKind::WasGiftedAp => self.was_gifted_ap,
            StatKind::GaveHp => self.gave_hp,
            StatKind::GotHp => self.got_hp,
            StatKind::Resurrector => self.resurrector,
            StatKind::Resurrectee => self.resurrectee,
            StatKind::GaveTreat => self.gave_treat,
            StatKind::WasTreated => self.was_treated,
            StatKind::StartFire => self.start_fire,
            StatKind::Zapped => self.zapped,
            StatKind::ShotSomeone => self.shot_someone,
            StatKind::WasShot => self.was_shot,
        }
    }
}

/// One participant's live state in a single game.
///
/// Position is unset until the game starts. Stats are only mutated through
/// [`GamePlayer::increment_stat`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GamePlayer {
    pub id: GamePlayerId,
    pub game_id: GameId,
    pub player_id: PlayerId,
    pub status: PlayerStatus,
    pub health: i32,
    pub actions: i32,
    pub range: i32,
    pub position: Option<(i32, i32)>,
    pub death_time: Option<DateTime<Utc>>,
    pub win_position: Option<u32>,
    pub jury_votes_to_spend: u32,
    stats: PlayerStats,
}

impl GamePlayer {
    pub fn new(id: GamePlayerId, game_id: GameId, player_id: PlayerId) -> Self {
        Self {
            id,
            game_id,
            player_id,
            status: PlayerStatus::Alive,
            health: 3,
            actions: 3,
            range: 2,
            position: None,
            death_time: None,
            win_position: None,
            jury_votes_to_spend: 0,
            stats: PlayerStats::default(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.status == PlayerStatus::Alive
    }

    pub fn is_at(&self, x: i32, y: i32) -> bool {
        self.position == Some((x, y))
    }

    pub fn stats(&self) -> &PlayerStats {
        &self.stats
    }

    /// Death bookkeeping for combat deaths: halve AP (floor), grant the
    /// single jury vote, stamp the death time. Environmental deaths during a
    /// tick deliberately bypass this and get no jury vote.
    pub fn mark_dead(&mut self, now: DateTime<Utc>) {
        self.status = PlayerStatus::Dead;
        self.actions /= 2;
        self.jury_votes_to_spend = 1;
        self.death_time = Some(now);
    }

    /// Increment the named counter and return its new value.
    pub fn increment_stat(&mut self, kind: StatKind) -> u32 {
        let counter = self.stats.counter_mut(kind);
        *counter += 1;
        *counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> GamePlayer {
        GamePlayer::new(1, 10, "alice".into())
    }

    #[test]
    fn new_player_defaults() {
        let gp = player();
        assert_eq!(gp.health, 3);
        assert_eq!(gp.actions, 3);
        assert_eq!(gp.range, 2);
        assert_eq!(gp.position, None);
        assert_eq!(gp.jury_votes_to_spend, 0);
        assert!(gp.is_alive());
    }

    #[test]
    fn mark_dead_halves_ap_and_grants_jury_vote() {
        let mut gp = player();
        gp.actions = 5;
        gp.mark_dead(Utc::now());
        assert_eq!(gp.status, PlayerStatus::Dead);
        assert_eq!(gp.actions, 2);
        assert_eq!(gp.jury_votes_to_spend, 1);
        assert!(gp.death_time.is_some());
    }

    #[test]
    fn increment_stat_creates_and_counts() {
        let mut gp = player();
        assert_eq!(gp.stats().get(StatKind::Walked), 0);
        assert_eq!(gp.increment_stat(StatKind::Walked), 1);
        assert_eq!(gp.increment_stat(StatKind::Walked), 2);
        assert_eq!(gp.stats().get(StatKind::Walked), 2);
    }
}
