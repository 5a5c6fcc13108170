//! Spatial queries and placement search over a game's board.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{EngineError, Result};
use crate::models::{BoardObject, Game, ObjectKind};

/// The eight cell neighbours, cardinals first.
pub const DIRECTIONS: [(i32, i32); 8] =
    [(-1, 0), (1, 0), (0, -1), (0, 1), (-1, -1), (1, 1), (-1, 1), (1, -1)];

/// Rejection-sampling bound for interior placement searches.
const CLEAR_SPACE_ATTEMPTS: usize = 100;

pub fn random_direction(rng: &mut impl Rng) -> (i32, i32) {
    DIRECTIONS[rng.gen_range(0..DIRECTIONS.len())]
}

impl Game {
    pub fn is_spot_on_board(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.board_width && y >= 0 && y < self.board_height
    }

    /// All board objects at a cell. Cells can stack (for example a fire lit
    /// under a player standing on a goal).
    pub fn objects_at(&self, x: i32, y: i32) -> Vec<&BoardObject> {
        self.board_objects.iter().filter(|obj| obj.is_at(x, y)).collect()
    }

    /// Is any object (optionally of one kind) at the cell?
    pub fn is_object_at(&self, x: i32, y: i32, kind: Option<ObjectKind>) -> bool {
        self.board_objects
            .iter()
            .any(|obj| obj.is_at(x, y) && kind.map_or(true, |k| obj.kind == k))
    }

    pub fn count_objects_of_kind(&self, kind: ObjectKind) -> usize {
        self.board_objects.iter().filter(|obj| obj.kind == kind).count()
    }

    pub fn add_object(&mut self, obj: BoardObject) {
        self.board_objects.push(obj);
    }

    /// Remove the first object at the cell, optionally filtered by kind.
    /// Returns whether anything was removed. Callers persist immediately so
    /// a consumed pickup cannot reappear after a later failure.
    pub fn remove_object_at(&mut self, x: i32, y: i32, kind: Option<ObjectKind>) -> bool {
        let found = self
            .board_objects
            .iter()
            .position(|obj| obj.is_at(x, y) && kind.map_or(true, |k| obj.kind == k));
        match found {
            Some(idx) => {
                self.board_objects.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn is_player_at(&self, x: i32, y: i32) -> bool {
        self.player_index_at(x, y).is_some()
    }

    /// Rejection-sample a random cell free of players and objects. Bounded;
    /// callers treat exhaustion as a skipped spawn, never as fatal.
    pub fn find_clear_space(&self, rng: &mut impl Rng) -> Result<(i32, i32)> {
        for _ in 0..CLEAR_SPACE_ATTEMPTS {
            let x = rng.gen_range(0..self.board_width);
            let y = rng.gen_range(0..self.board_height);
            if self.is_player_at(x, y) || self.is_object_at(x, y, None) {
                continue;
            }
            return Ok((x, y));
        }
        Err(EngineError::NoClearSpace)
    }

    /// Pick a random free cell on the outer ring of the board.
    ///
    /// The candidate list is shuffled and scanned once, so a saturated
    /// perimeter fails with `NoClearSpace` instead of looping forever.
    pub fn find_open_perimeter_position(&self, rng: &mut impl Rng) -> Result<(i32, i32)> {
        let mut candidates = Vec::with_capacity((2 * (self.board_width + self.board_height)) as usize);
        for x in 0..self.board_width {
            candidates.push((x, 0));
            candidates.push((x, self.board_height - 1));
        }
        for y in 1..self.board_height - 1 {
            candidates.push((0, y));
            candidates.push((self.board_width - 1, y));
        }
        candidates.shuffle(rng);
        candidates
            .into_iter()
            .find(|&(x, y)| !self.is_player_at(x, y) && !self.is_object_at(x, y, None))
            .ok_or(EngineError::NoClearSpace)
    }
}

/// Smallest square side that holds `player_count` players at the desired
/// density: `ceil(sqrt(count / density))`.
pub fn calculate_board_size(player_count: usize, desired_density: f64) -> Result<i32> {
    if player_count == 0 || desired_density <= 0.0 {
        return Err(EngineError::Validation(
            "Player count and density must be greater than zero".into(),
        ));
    }
    let required_area = player_count as f64 / desired_density;
    Ok(required_area.sqrt().ceil() as i32)
}
