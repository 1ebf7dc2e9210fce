//! Snapshot interpolation for remote entities.
//!
//! Remote players render `net_offset` milliseconds in the past so
//! their motion can be filled by interpolating between two buffered
//! snapshots instead of extrapolating past the newest one.

use uuid::Uuid;

use crate::client::buffer::SnapshotBuffer;
use crate::game::physics::{to_fixed, v_lerp, Pos};

/// Deliberate rendering delay for remote entities, in milliseconds
pub const NET_OFFSET_MS: f64 = 100.0;

/// Smoothing constant for the per-frame blend toward the
/// interpolated target
pub const CLIENT_SMOOTH: f64 = 25.0;

#[derive(Debug, Clone)]
pub struct Interpolator {
    /// Rendering delay in milliseconds
    pub net_offset_ms: f64,
    /// Blend toward the target instead of snapping to it
    pub smoothing: bool,
    /// Smoothing blend rate, scaled by the physics delta
    pub smooth_rate: f64,
}

impl Default for Interpolator {
    fn default() -> Self {
        Self {
            net_offset_ms: NET_OFFSET_MS,
            smoothing: true,
            smooth_rate: CLIENT_SMOOTH,
        }
    }
}

impl Interpolator {
    /// Where in the server timeline we want to render, given the last
    /// reported server time.
    pub fn playback_time(&self, server_time: f64) -> f64 {
        server_time - self.net_offset_ms / 1000.0
    }

    /// Interpolated position for one player at `playback_time`, or
    /// None when the buffer has no entries yet (the caller leaves the
    /// position unchanged).
    pub fn sample(
        &self,
        buffer: &SnapshotBuffer,
        playback_time: f64,
        player_id: Uuid,
    ) -> Option<Pos> {
        let (previous, target) = buffer.bracket(playback_time)?;
        let factor = interpolation_factor(previous.t, target.t, playback_time);

        let past_pos = find_pos(previous, player_id)?;
        let target_pos = find_pos(target, player_id)?;
        Some(v_lerp(past_pos, target_pos, factor))
    }

    /// One frame of exponential smoothing: blend the displayed
    /// position toward the freshly computed target by
    /// `physics_dt * smooth_rate` instead of snapping.
    pub fn smooth(&self, displayed: Pos, target: Pos, physics_dt: f64) -> Pos {
        if self.smoothing {
            v_lerp(displayed, target, physics_dt * self.smooth_rate)
        } else {
            target
        }
    }
}

/// Fraction of the bracket interval remaining at `playback_time`,
/// clamped to [0, 1]. A degenerate interval (previous.t == target.t)
/// divides to NaN or infinity; that is forced to 0 so it never reaches
/// a rendered position.
pub fn interpolation_factor(previous_t: f64, target_t: f64, playback_time: f64) -> f64 {
    let difference = target_t - playback_time;
    let max_difference = to_fixed(target_t - previous_t);
    let factor = to_fixed(difference / max_difference);
    if factor.is_finite() {
        factor.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn find_pos(tick: &crate::ws::protocol::TickMsg, player_id: Uuid) -> Option<Pos> {
    tick.players
        .iter()
        .find(|p| p.player_id == player_id)
        .map(|p| p.pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::{PlayerSnapshot, TickMsg};

    fn tick_with(t: f64, id: Uuid, pos: Pos) -> TickMsg {
        TickMsg {
            players: vec![PlayerSnapshot {
                player_id: id,
                pos,
                last_input_seq: 0,
            }],
            t,
        }
    }

    #[test]
    fn midpoint_factor_is_half() {
        assert_eq!(interpolation_factor(0.0, 1.0, 0.5), 0.5);
    }

    #[test]
    fn degenerate_interval_yields_zero_not_nan() {
        let factor = interpolation_factor(5.0, 5.0, 5.0);
        assert_eq!(factor, 0.0);
        assert!(!factor.is_nan());
    }

    #[test]
    fn remote_player_is_interpolated_between_brackets() {
        let id = Uuid::new_v4();
        let mut buffer = SnapshotBuffer::new(8);
        buffer.push(tick_with(1.0, id, Pos::new(0.0, 0.0)));
        buffer.push(tick_with(1.2, id, Pos::new(10.0, 0.0)));

        let interp = Interpolator::default();
        let pos = interp.sample(&buffer, 1.1, id).unwrap();
        assert_eq!(pos, Pos::new(5.0, 0.0));
    }

    #[test]
    fn empty_buffer_is_a_no_op() {
        let buffer = SnapshotBuffer::new(8);
        let interp = Interpolator::default();
        assert!(interp.sample(&buffer, 1.0, Uuid::new_v4()).is_none());
    }

    #[test]
    fn smoothing_blends_rather_than_snaps() {
        let interp = Interpolator::default();
        // 15 ms physics step, smooth rate 25 -> 0.375 of the gap
        let blended = interp.smooth(Pos::new(0.0, 0.0), Pos::new(10.0, 0.0), 0.015);
        assert_eq!(blended, Pos::new(3.75, 0.0));

        let snapped = Interpolator {
            smoothing: false,
            ..Default::default()
        }
        .smooth(Pos::new(0.0, 0.0), Pos::new(10.0, 0.0), 0.015);
        assert_eq!(snapped, Pos::new(10.0, 0.0));
    }
}
