//! Movement physics shared by server simulation and client prediction.
//!
//! Everything here is pure and rounds through [`to_fixed`] so that two
//! peers feeding it identical inputs land on bit-identical positions.

use serde::{Deserialize, Serialize};

use crate::game::player::Player;
use crate::util::time::FIXED_SUBSTEP;

/// The speed at which players move, in pixels per second.
pub const PLAYER_SPEED: f64 = 120.0;

/// Directional key symbols as they travel on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirKey {
    #[serde(rename = "l")]
    Left,
    #[serde(rename = "r")]
    Right,
    #[serde(rename = "u")]
    Up,
    #[serde(rename = "d")]
    Down,
}

/// A 2D position or displacement
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pos {
    pub x: f64,
    pub y: f64,
}

impl Pos {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Component-wise add, rounded to fixed precision
    pub fn add(self, other: Pos) -> Pos {
        Pos {
            x: to_fixed(self.x + other.x),
            y: to_fixed(self.y + other.y),
        }
    }
}

/// Round to 3 decimal digits. Fixed point keeps the simulation
/// deterministic across peers.
pub fn to_fixed(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// Linear interpolation with the factor clamped to [0, 1]
pub fn lerp(p: f64, n: f64, t: f64) -> f64 {
    let t = to_fixed(t.clamp(0.0, 1.0));
    to_fixed(p + t * (n - p))
}

/// Linear interpolation between two positions
pub fn v_lerp(v: Pos, tv: Pos, t: f64) -> Pos {
    Pos {
        x: lerp(v.x, tv.x, t),
        y: lerp(v.y, tv.y, t),
    }
}

/// Map held keys onto a direction vector. Opposing keys cancel on
/// their axis. Screen coordinates: y grows downward.
pub fn direction_from_keys(keys: &[DirKey]) -> (f64, f64) {
    let mut x_dir = 0.0;
    let mut y_dir = 0.0;
    for key in keys {
        match key {
            DirKey::Left => x_dir -= 1.0,
            DirKey::Right => x_dir += 1.0,
            DirKey::Up => y_dir -= 1.0,
            DirKey::Down => y_dir += 1.0,
        }
    }
    (x_dir, y_dir)
}

/// Scale a direction vector by one fixed physics substep.
pub fn movement_vector(x_dir: f64, y_dir: f64, speed: f64) -> Pos {
    Pos {
        x: to_fixed(x_dir * (speed * FIXED_SUBSTEP)),
        y: to_fixed(y_dir * (speed * FIXED_SUBSTEP)),
    }
}

/// Apply every pending input with a sequence past the player's
/// acknowledgement point, as one accumulated batch.
///
/// Already-processed entries (seq <= last_input_seq) are skipped, which
/// guards against duplicate delivery. Marks the highest processed
/// sequence, clears the consumed batch and clamps the result to the
/// player's world bounds.
pub fn apply_input_batch(player: &mut Player, speed: f64) {
    let mut x_dir = 0.0;
    let mut y_dir = 0.0;
    let mut newest: Option<(u64, f64)> = None;

    for input in player.pending_inputs() {
        if input.seq <= player.last_input_seq {
            continue;
        }
        let (dx, dy) = direction_from_keys(&input.keys);
        x_dir += dx;
        y_dir += dy;
        newest = Some((input.seq, input.time));
    }

    let delta = movement_vector(x_dir, y_dir, speed);
    player.pos = player.pos.add(delta);

    if let Some((seq, time)) = newest {
        player.last_input_seq = seq;
        player.last_input_time = time;
    }
    player.clear_inputs();
    player.clamp_to_bounds();
}
