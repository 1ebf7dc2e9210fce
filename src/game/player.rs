//! Authoritative per-player state

use std::collections::VecDeque;

use uuid::Uuid;

use crate::game::physics::{to_fixed, DirKey, Pos};

/// Half extent of the square player sprite, in pixels. Bounds keep the
/// whole sprite inside the world.
pub const PLAYER_HALF_EXTENT: f64 = 8.0;

/// Cap on buffered inputs per player. Under sustained loss of
/// acknowledgements the oldest entry is dropped rather than letting the
/// queue grow without bound.
pub const MAX_PENDING_INPUTS: usize = 128;

/// One sampled input command
#[derive(Debug, Clone, PartialEq)]
pub struct InputCmd {
    /// Directional keys held during the frame
    pub keys: Vec<DirKey>,
    /// Issuing client's local time, in seconds
    pub time: f64,
    /// Strictly increasing per player, starting at 1
    pub seq: u64,
}

/// Axis-aligned movement limits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl WorldBounds {
    /// Bounds for a player sprite confined to a world of the given size
    pub fn for_world(width: f64, height: f64) -> Self {
        Self {
            x_min: PLAYER_HALF_EXTENT,
            x_max: width - PLAYER_HALF_EXTENT,
            y_min: PLAYER_HALF_EXTENT,
            y_max: height - PLAYER_HALF_EXTENT,
        }
    }

    /// Clamp a position onto the bounds, each axis independently
    pub fn clamp(&self, pos: Pos) -> Pos {
        Pos {
            x: to_fixed(pos.x.clamp(self.x_min, self.x_max)),
            y: to_fixed(pos.y.clamp(self.y_min, self.y_max)),
        }
    }
}

/// A player as the server owns it: authoritative position plus the
/// queue of inputs waiting for the next tick.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: Uuid,
    pub pos: Pos,
    pub bounds: WorldBounds,
    /// Highest input sequence applied so far
    pub last_input_seq: u64,
    /// Client local time of the last applied input
    pub last_input_time: f64,
    pending: VecDeque<InputCmd>,
}

impl Player {
    pub fn new(id: Uuid, bounds: WorldBounds) -> Self {
        Self {
            id,
            pos: Pos::default(),
            bounds,
            last_input_seq: 0,
            last_input_time: 0.0,
            pending: VecDeque::new(),
        }
    }

    /// Queue an input for the next tick. Stale sequences are discarded
    /// silently; a full queue drops its oldest entry.
    pub fn push_input(&mut self, input: InputCmd) {
        if input.seq <= self.last_input_seq {
            return;
        }
        if self.pending.len() >= MAX_PENDING_INPUTS {
            self.pending.pop_front();
        }
        self.pending.push_back(input);
    }

    pub fn pending_inputs(&self) -> &VecDeque<InputCmd> {
        &self.pending
    }

    pub fn clear_inputs(&mut self) {
        self.pending.clear();
    }

    pub fn clamp_to_bounds(&mut self) {
        self.pos = self.bounds.clamp(self.pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_keeps_position_inside_world() {
        let bounds = WorldBounds::for_world(720.0, 480.0);
        assert_eq!(bounds.clamp(Pos::new(-5.0, 1000.0)), Pos::new(8.0, 472.0));
        assert_eq!(bounds.clamp(Pos::new(360.0, 240.0)), Pos::new(360.0, 240.0));
        assert_eq!(bounds.clamp(Pos::new(719.0, 0.0)), Pos::new(712.0, 8.0));
    }

    #[test]
    fn stale_inputs_are_discarded() {
        let mut player = Player::new(Uuid::new_v4(), WorldBounds::for_world(720.0, 480.0));
        player.last_input_seq = 5;
        player.push_input(InputCmd {
            keys: vec![DirKey::Left],
            time: 0.0,
            seq: 5,
        });
        assert!(player.pending_inputs().is_empty());

        player.push_input(InputCmd {
            keys: vec![DirKey::Left],
            time: 0.0,
            seq: 6,
        });
        assert_eq!(player.pending_inputs().len(), 1);
    }

    #[test]
    fn pending_queue_is_bounded_with_oldest_drop() {
        let mut player = Player::new(Uuid::new_v4(), WorldBounds::for_world(720.0, 480.0));
        for seq in 1..=(MAX_PENDING_INPUTS as u64 + 10) {
            player.push_input(InputCmd {
                keys: vec![DirKey::Down],
                time: 0.0,
                seq,
            });
        }
        assert_eq!(player.pending_inputs().len(), MAX_PENDING_INPUTS);
        assert_eq!(player.pending_inputs().front().map(|i| i.seq), Some(11));
    }
}
