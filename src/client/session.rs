//! Client-side game session.
//!
//! Composes the fixed physics clock, the input ledger, the snapshot
//! buffer and the reconciliation/interpolation passes into the state a
//! renderer reads from. The session owns no socket: it consumes
//! decoded [`ServerMsg`] values and emits [`ClientMsg`] values for the
//! caller to transmit.

use std::collections::HashMap;
use std::time::Instant;

use tracing::debug;
use uuid::Uuid;

use crate::client::buffer::SnapshotBuffer;
use crate::client::interpolate::{Interpolator, CLIENT_SMOOTH, NET_OFFSET_MS};
use crate::client::latency::LatencyEstimator;
use crate::client::ledger::InputLedger;
use crate::client::reconcile::Reconciler;
use crate::game::clock::FixedClock;
use crate::game::physics::{
    direction_from_keys, movement_vector, DirKey, Pos, PLAYER_SPEED,
};
use crate::game::player::WorldBounds;
use crate::util::time::PHYSICS_STEP;
use crate::ws::protocol::{ClientMsg, MoveMsg, ServerMsg, TickMsg};

/// Client behaviour switches, mirroring the classic netcode toggles
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Apply local inputs immediately instead of waiting for the server
    pub client_predict: bool,
    /// Blend displayed positions toward their targets each frame
    pub client_smoothing: bool,
    /// Smoothing blend rate, scaled by the physics delta
    pub client_smooth: f64,
    /// Rendering delay for remote entities, in milliseconds
    pub net_offset_ms: f64,
    /// Snapshot buffer sizing: rate x seconds of history
    pub buffer_rate_hz: u32,
    pub buffer_seconds: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_predict: true,
            client_smoothing: true,
            client_smooth: CLIENT_SMOOTH,
            net_offset_ms: NET_OFFSET_MS,
            buffer_rate_hz: 60,
            buffer_seconds: 2,
        }
    }
}

/// One connected client's view of the game
pub struct ClientSession {
    player_id: Uuid,
    cfg: ClientConfig,
    clock: FixedClock,
    ledger: InputLedger,
    buffer: SnapshotBuffer,
    interpolator: Interpolator,
    reconciler: Reconciler,
    latency: LatencyEstimator,
    bounds: WorldBounds,

    /// Locally predicted position of our own player
    predicted_pos: Pos,
    /// Highest ledger sequence already folded into `predicted_pos`
    predicted_seq: u64,
    /// Display positions for every player in the room, ours included
    displayed: HashMap<Uuid, Pos>,
    host_id: Option<Uuid>,

    /// Last time the server reported, and our delayed playback point
    server_time: f64,
    client_time: f64,
    last_physics_dt: f64,

    started: bool,
    ended: bool,
}

impl ClientSession {
    pub fn new(player_id: Uuid, bounds: WorldBounds) -> Self {
        Self::with_config(player_id, bounds, ClientConfig::default())
    }

    pub fn with_config(player_id: Uuid, bounds: WorldBounds, cfg: ClientConfig) -> Self {
        let interpolator = Interpolator {
            net_offset_ms: cfg.net_offset_ms,
            smoothing: cfg.client_smoothing,
            smooth_rate: cfg.client_smooth,
        };
        let buffer = SnapshotBuffer::for_rate(cfg.buffer_rate_hz, cfg.buffer_seconds);

        Self {
            player_id,
            clock: FixedClock::new(PHYSICS_STEP),
            ledger: InputLedger::new(),
            buffer,
            interpolator,
            reconciler: Reconciler::new(PLAYER_SPEED, bounds),
            latency: LatencyEstimator::new(),
            bounds,
            predicted_pos: Pos::default(),
            predicted_seq: 0,
            displayed: HashMap::new(),
            host_id: None,
            server_time: 0.0,
            client_time: 0.0,
            last_physics_dt: PHYSICS_STEP.as_secs_f64(),
            started: false,
            ended: false,
            cfg,
        }
    }

    /// Sample directional intent for one render frame. Idle frames
    /// produce nothing; held keys become the next sequenced move
    /// message, recorded locally for prediction and reconciliation.
    pub fn sample_input(&mut self, keys: &[DirKey]) -> Option<ClientMsg> {
        if keys.is_empty() {
            return None;
        }
        let cmd = self.ledger.record(keys.to_vec(), self.clock.local_time());
        Some(ClientMsg::Move(MoveMsg {
            player_id: self.player_id,
            input: cmd.keys,
            local_time: cmd.time,
            input_seq: cmd.seq,
        }))
    }

    /// Run one fixed physics step: advance the local clock and, with
    /// prediction enabled, fold not-yet-applied ledger entries into
    /// the predicted position so input feedback is instant.
    pub fn physics_step(&mut self, now: Instant) {
        self.last_physics_dt = self.clock.advance(now);

        if !self.cfg.client_predict {
            return;
        }

        let mut x_dir = 0.0;
        let mut y_dir = 0.0;
        let mut newest = self.predicted_seq;
        for entry in self.ledger.entries() {
            if entry.seq <= self.predicted_seq {
                continue;
            }
            let (dx, dy) = direction_from_keys(&entry.keys);
            x_dir += dx;
            y_dir += dy;
            newest = entry.seq;
        }
        if newest == self.predicted_seq {
            return;
        }

        let moved = self
            .predicted_pos
            .add(movement_vector(x_dir, y_dir, PLAYER_SPEED));
        self.predicted_pos = self.bounds.clamp(moved);
        self.predicted_seq = newest;
    }

    /// Emit a latency probe if one is due
    pub fn maybe_ping(&mut self, now: Instant, now_ms: f64) -> Option<ClientMsg> {
        self.latency.maybe_ping(now, now_ms).map(ClientMsg::Ping)
    }

    /// Feed one decoded server message into the session
    pub fn on_server_message(&mut self, msg: ServerMsg, now_ms: f64) {
        match msg {
            ServerMsg::StartGame(m) => {
                // Adopt the server clock, shifted by our one-way latency
                self.clock
                    .set_local_time(m.server_time + self.latency.net_latency_secs());
                self.started = true;
            }
            ServerMsg::EndGame => {
                self.ended = true;
            }
            ServerMsg::ClientJoin(m) => {
                for entry in m.players {
                    if entry.is_host {
                        self.host_id = Some(entry.player_id);
                    }
                    self.displayed.insert(entry.player_id, entry.pos);
                    if entry.player_id == self.player_id {
                        self.predicted_pos = entry.pos;
                    }
                }
            }
            ServerMsg::PlayerLeft(m) => {
                self.displayed.remove(&m.player_id);
                self.host_id = m.new_host_id;
            }
            ServerMsg::ClientPing(m) => {
                if m.player_id == self.player_id {
                    self.latency.on_pong(m.ping, now_ms);
                }
            }
            ServerMsg::Tick(tick) => self.on_tick(tick),
        }
    }

    /// Handle one authoritative snapshot: record it on the playback
    /// timeline and correct our own prediction against the
    /// acknowledgement it carries.
    fn on_tick(&mut self, tick: TickMsg) {
        self.server_time = tick.t;
        self.client_time = self.interpolator.playback_time(self.server_time);

        // Players we learned about from snapshots rather than a roster
        // message still need a display slot.
        for p in &tick.players {
            self.displayed.entry(p.player_id).or_insert(p.pos);
        }

        let reported = tick
            .players
            .iter()
            .find(|p| p.player_id == self.player_id)
            .cloned();

        self.buffer.push(tick);

        if let Some(reported) = reported {
            if self.cfg.client_predict {
                let outcome =
                    self.reconciler
                        .reconcile(&mut self.ledger, &mut self.predicted_pos, &reported);
                debug!(player_id = %self.player_id, ?outcome, "Reconciled against snapshot");
                // Replayed entries are already part of the prediction
                self.predicted_seq = self
                    .ledger
                    .last_seq()
                    .unwrap_or(reported.last_input_seq)
                    .max(reported.last_input_seq);
            }
        }
    }

    /// Recompute display positions for one render frame. Remote
    /// players (and ourselves, when prediction is off) follow the
    /// delayed interpolation timeline; our own player shows the
    /// prediction directly.
    pub fn update_display(&mut self) {
        let ids: Vec<Uuid> = self.displayed.keys().copied().collect();
        for id in ids {
            if id == self.player_id && self.cfg.client_predict {
                self.displayed.insert(id, self.predicted_pos);
                continue;
            }
            if let Some(target) = self.interpolator.sample(&self.buffer, self.client_time, id) {
                let current = self.displayed[&id];
                let next = self.interpolator.smooth(current, target, self.last_physics_dt);
                self.displayed.insert(id, next);
            }
            // No snapshots yet: leave the position unchanged
        }
    }

    pub fn display_position(&self, id: Uuid) -> Option<Pos> {
        self.displayed.get(&id).copied()
    }

    pub fn predicted_position(&self) -> Pos {
        self.predicted_pos
    }

    pub fn local_time(&self) -> f64 {
        self.clock.local_time()
    }

    pub fn server_time(&self) -> f64 {
        self.server_time
    }

    pub fn client_time(&self) -> f64 {
        self.client_time
    }

    pub fn host_id(&self) -> Option<Uuid> {
        self.host_id
    }

    pub fn net_latency_ms(&self) -> f64 {
        self.latency.net_latency_ms()
    }

    pub fn pending_inputs(&self) -> usize {
        self.ledger.len()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::{
        ClientJoinMsg, ClientPingMsg, PlayerSnapshot, RosterEntry, StartGameMsg,
    };
    use std::time::Duration;

    fn join_roster(session: &mut ClientSession, entries: &[(Uuid, Pos, bool)]) {
        session.on_server_message(
            ServerMsg::ClientJoin(ClientJoinMsg {
                players: entries
                    .iter()
                    .map(|(id, pos, is_host)| RosterEntry {
                        player_id: *id,
                        pos: *pos,
                        is_host: *is_host,
                    })
                    .collect(),
            }),
            0.0,
        );
    }

    #[test]
    fn prediction_and_reconciliation_converge() {
        let me = Uuid::new_v4();
        let bounds = WorldBounds::for_world(720.0, 480.0);
        let mut session = ClientSession::new(me, bounds);
        join_roster(&mut session, &[(me, Pos::new(20.0, 20.0), true)]);
        session.on_server_message(ServerMsg::StartGame(StartGameMsg { server_time: 0.0 }), 0.0);

        // Three frames holding 'right', each followed by a physics step
        let t0 = Instant::now();
        let mut seqs = Vec::new();
        for i in 1..=3u64 {
            let msg = session.sample_input(&[DirKey::Right]).unwrap();
            match msg {
                ClientMsg::Move(mv) => seqs.push(mv.input_seq),
                other => panic!("expected move, got {:?}", other),
            }
            session.physics_step(t0 + Duration::from_millis(15 * i));
        }
        assert_eq!(seqs, vec![1, 2, 3]);

        // Prediction has moved us 3 * 1.8 before any server round trip
        assert_eq!(session.predicted_position(), Pos::new(25.4, 20.0));

        // The server applied all three inputs and reports the same x
        session.on_server_message(
            ServerMsg::Tick(TickMsg {
                players: vec![PlayerSnapshot {
                    player_id: me,
                    pos: Pos::new(25.4, 20.0),
                    last_input_seq: 3,
                }],
                t: 0.5,
            }),
            0.0,
        );

        assert_eq!(session.pending_inputs(), 0);
        assert_eq!(session.predicted_position(), Pos::new(25.4, 20.0));

        session.update_display();
        assert_eq!(session.display_position(me), Some(Pos::new(25.4, 20.0)));
    }

    #[test]
    fn idle_frames_send_nothing() {
        let me = Uuid::new_v4();
        let mut session = ClientSession::new(me, WorldBounds::for_world(720.0, 480.0));
        assert!(session.sample_input(&[]).is_none());
        assert_eq!(session.pending_inputs(), 0);
    }

    #[test]
    fn remote_players_interpolate_on_the_delayed_timeline() {
        let me = Uuid::new_v4();
        let remote = Uuid::new_v4();
        let cfg = ClientConfig {
            client_smoothing: false,
            ..Default::default()
        };
        let mut session =
            ClientSession::with_config(me, WorldBounds::for_world(720.0, 480.0), cfg);
        join_roster(
            &mut session,
            &[(me, Pos::new(20.0, 20.0), true), (remote, Pos::new(0.0, 100.0), false)],
        );

        for (t, x) in [(1.0, 0.0), (1.2, 10.0)] {
            session.on_server_message(
                ServerMsg::Tick(TickMsg {
                    players: vec![PlayerSnapshot {
                        player_id: remote,
                        pos: Pos::new(x, 100.0),
                        last_input_seq: 0,
                    }],
                    t,
                }),
                0.0,
            );
        }

        // net_offset 100 ms behind the latest report lands at t = 1.1
        assert_eq!(session.client_time(), 1.1);

        session.update_display();
        assert_eq!(session.display_position(remote), Some(Pos::new(5.0, 100.0)));
    }

    #[test]
    fn smoothing_approaches_the_interpolated_target() {
        let me = Uuid::new_v4();
        let remote = Uuid::new_v4();
        let mut session = ClientSession::new(me, WorldBounds::for_world(720.0, 480.0));
        join_roster(&mut session, &[(remote, Pos::new(0.0, 0.0), true)]);

        for (t, x) in [(1.0, 0.0), (1.2, 10.0)] {
            session.on_server_message(
                ServerMsg::Tick(TickMsg {
                    players: vec![PlayerSnapshot {
                        player_id: remote,
                        pos: Pos::new(x, 0.0),
                        last_input_seq: 0,
                    }],
                    t,
                }),
                0.0,
            );
        }

        // Target is x = 5.0; a 15 ms step blends 37.5% of the gap
        session.update_display();
        assert_eq!(session.display_position(remote), Some(Pos::new(1.875, 0.0)));

        let gap_before = 5.0 - 1.875;
        session.update_display();
        let after = session.display_position(remote).unwrap().x;
        assert!(5.0 - after < gap_before);
    }

    #[test]
    fn start_game_adopts_server_time_plus_latency() {
        let me = Uuid::new_v4();
        let mut session = ClientSession::new(me, WorldBounds::for_world(720.0, 480.0));

        let t0 = Instant::now();
        let ping = session.maybe_ping(t0, 1000.0).unwrap();
        let sent = match ping {
            ClientMsg::Ping(p) => p.ping,
            other => panic!("expected ping, got {:?}", other),
        };
        session.on_server_message(
            ServerMsg::ClientPing(ClientPingMsg {
                player_id: me,
                ping: sent,
            }),
            1080.0,
        );
        assert_eq!(session.net_latency_ms(), 40.0);

        session.on_server_message(
            ServerMsg::StartGame(StartGameMsg { server_time: 10.0 }),
            1080.0,
        );
        assert!(session.is_started());
        assert!((session.local_time() - 10.04).abs() < 1e-9);
    }

    #[test]
    fn disabling_prediction_drives_the_local_player_by_interpolation() {
        let me = Uuid::new_v4();
        let cfg = ClientConfig {
            client_predict: false,
            client_smoothing: false,
            ..Default::default()
        };
        let mut session =
            ClientSession::with_config(me, WorldBounds::for_world(720.0, 480.0), cfg);
        join_roster(&mut session, &[(me, Pos::new(0.0, 50.0), true)]);

        for (t, x) in [(1.0, 0.0), (1.2, 4.0)] {
            session.on_server_message(
                ServerMsg::Tick(TickMsg {
                    players: vec![PlayerSnapshot {
                        player_id: me,
                        pos: Pos::new(x, 50.0),
                        last_input_seq: 0,
                    }],
                    t,
                }),
                0.0,
            );
        }

        session.update_display();
        assert_eq!(session.display_position(me), Some(Pos::new(2.0, 50.0)));
    }
}
