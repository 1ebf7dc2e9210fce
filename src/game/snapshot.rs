//! Snapshot pacing and construction

use std::collections::HashMap;

use uuid::Uuid;

use crate::game::player::Player;
use crate::ws::protocol::{PlayerSnapshot, ServerMsg, TickMsg};

/// Paces snapshot emission relative to physics ticks. Physics runs at
/// 15 ms; clients only need state at the 45 ms update cadence.
pub struct SnapshotCadence {
    ticks_since_snapshot: u32,
    snapshot_interval: u32,
}

impl SnapshotCadence {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
        }
    }

    /// Count one physics tick; true when a snapshot is due
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force a snapshot on the next check (used for membership changes)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Build the tick message covering every player at `server_time`
    pub fn build(&self, server_time: f64, players: &HashMap<Uuid, Player>) -> ServerMsg {
        let mut entries: Vec<PlayerSnapshot> = players
            .values()
            .map(|p| PlayerSnapshot {
                player_id: p.id,
                pos: p.pos,
                last_input_seq: p.last_input_seq,
            })
            .collect();
        // HashMap iteration order is arbitrary; keep the wire stable
        entries.sort_by_key(|e| e.player_id);

        ServerMsg::Tick(TickMsg {
            players: entries,
            t: server_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::player::WorldBounds;
    use crate::game::physics::Pos;

    #[test]
    fn cadence_fires_every_nth_tick() {
        let mut cadence = SnapshotCadence::new(3);
        assert!(!cadence.should_send());
        assert!(!cadence.should_send());
        assert!(cadence.should_send());
        assert!(!cadence.should_send());
    }

    #[test]
    fn force_next_overrides_the_interval() {
        let mut cadence = SnapshotCadence::new(3);
        cadence.force_next();
        assert!(cadence.should_send());
        assert!(!cadence.should_send());
    }

    #[test]
    fn built_tick_reports_positions_and_acks() {
        let bounds = WorldBounds::for_world(720.0, 480.0);
        let mut players = HashMap::new();
        let id = Uuid::new_v4();
        let mut player = Player::new(id, bounds);
        player.pos = Pos::new(25.4, 20.0);
        player.last_input_seq = 3;
        players.insert(id, player);

        match SnapshotCadence::new(3).build(1.5, &players) {
            ServerMsg::Tick(tick) => {
                assert_eq!(tick.t, 1.5);
                assert_eq!(tick.players.len(), 1);
                assert_eq!(tick.players[0].pos, Pos::new(25.4, 20.0));
                assert_eq!(tick.players[0].last_input_seq, 3);
            }
            other => panic!("expected tick, got {:?}", other),
        }
    }
}
