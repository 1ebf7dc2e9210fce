//! Room state and authoritative tick loop

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::clock::FixedClock;
use crate::game::physics::{apply_input_batch, Pos, PLAYER_SPEED};
use crate::game::player::{InputCmd, Player, WorldBounds};
use crate::game::snapshot::SnapshotCadence;
use crate::game::RoomMessage;
use crate::util::time::{PHYSICS_STEP, SNAPSHOT_INTERVAL_TICKS};
use crate::ws::protocol::{
    ClientJoinMsg, ClientMsg, ClientPingMsg, MoveMsg, PlayerLeftMsg, RosterEntry, ServerMsg,
    StartGameMsg,
};

/// Room lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Awaiting the player minimum
    Waiting,
    /// Ticking and broadcasting
    Running,
    /// Torn down
    Ended,
}

/// Spawn slots assigned round-robin by join order. The first two match
/// the classic host/guest spawn points.
const SPAWN_SLOTS: [Pos; 4] = [
    Pos { x: 20.0, y: 20.0 },
    Pos { x: 500.0, y: 200.0 },
    Pos { x: 500.0, y: 20.0 },
    Pos { x: 20.0, y: 200.0 },
];

/// Room state (owned by the room task)
pub struct RoomState {
    pub id: Uuid,
    pub phase: RoomPhase,
    pub players: HashMap<Uuid, Player>,
    /// Player ids in join order; the front is the host
    join_order: Vec<Uuid>,
    /// Monotonic join counter driving spawn slot assignment
    join_counter: usize,
    bounds: WorldBounds,
    min_players: usize,
    max_players: usize,
}

impl RoomState {
    pub fn new(id: Uuid, bounds: WorldBounds, min_players: usize, max_players: usize) -> Self {
        Self {
            id,
            phase: RoomPhase::Waiting,
            players: HashMap::new(),
            join_order: Vec::new(),
            join_counter: 0,
            bounds,
            min_players,
            max_players,
        }
    }

    pub fn host_id(&self) -> Option<Uuid> {
        self.join_order.first().copied()
    }
}

/// Handle to a running room
#[derive(Clone)]
pub struct RoomHandle {
    pub id: Uuid,
    pub input_tx: mpsc::Sender<RoomMessage>,
    pub outbound_tx: broadcast::Sender<ServerMsg>,
    pub player_count: Arc<AtomicUsize>,
}

impl RoomHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }
}

/// Registry of all active rooms
pub struct RoomRegistry {
    rooms: DashMap<Uuid, RoomHandle>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<RoomHandle> {
        self.rooms.get(id).map(|r| r.value().clone())
    }

    pub fn insert(&self, handle: RoomHandle) {
        self.rooms.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<RoomHandle> {
        self.rooms.remove(id).map(|(_, h)| h)
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_players(&self) -> usize {
        self.rooms.iter().map(|r| r.value().player_count()).sum()
    }

    /// Find a room with a free slot
    pub fn find_available_room(&self, max_players: usize) -> Option<RoomHandle> {
        self.rooms
            .iter()
            .find(|r| r.value().player_count() < max_players)
            .map(|r| r.value().clone())
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The authoritative game room. Owns all player state; inbound
/// messages queue on a channel and are drained atomically at the top
/// of each tick.
pub struct GameRoom {
    state: RoomState,
    clock: FixedClock,
    input_rx: mpsc::Receiver<RoomMessage>,
    outbound_tx: broadcast::Sender<ServerMsg>,
    cadence: SnapshotCadence,
    player_count: Arc<AtomicUsize>,
}

impl GameRoom {
    pub fn new(
        id: Uuid,
        bounds: WorldBounds,
        min_players: usize,
        max_players: usize,
    ) -> (Self, RoomHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (outbound_tx, _) = broadcast::channel(64);
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = RoomHandle {
            id,
            input_tx,
            outbound_tx: outbound_tx.clone(),
            player_count: player_count.clone(),
        };

        let room = Self {
            state: RoomState::new(id, bounds, min_players, max_players),
            clock: FixedClock::new(PHYSICS_STEP),
            input_rx,
            outbound_tx,
            cadence: SnapshotCadence::new(SNAPSHOT_INTERVAL_TICKS),
            player_count,
        };

        (room, handle)
    }

    /// Run the authoritative tick loop until the room empties
    pub async fn run(mut self) {
        info!(room_id = %self.state.id, "Room task started");

        let mut tick_interval = interval(PHYSICS_STEP);
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            // Drain the message queue, then run one physics step.
            // Inputs arriving mid-tick wait for the next drain.
            self.drain_messages();
            self.step(Instant::now());

            if self.state.phase == RoomPhase::Ended {
                break;
            }
        }

        let _ = self.outbound_tx.send(ServerMsg::EndGame);
        info!(room_id = %self.state.id, "Room ended");
    }

    /// Process all queued client messages
    fn drain_messages(&mut self) {
        while let Ok(msg) = self.input_rx.try_recv() {
            match msg.msg {
                ClientMsg::Join(join) => self.handle_join(join.player_id),
                ClientMsg::Leave(leave) => self.handle_leave(leave.player_id),
                ClientMsg::Move(mv) => self.handle_move(mv),
                ClientMsg::Ping(ping) => {
                    let _ = self.outbound_tx.send(ServerMsg::ClientPing(ClientPingMsg {
                        player_id: msg.player_id,
                        ping: ping.ping,
                    }));
                }
            }
        }
    }

    /// Run one fixed physics step and broadcast a snapshot when due
    fn step(&mut self, now: Instant) {
        self.clock.advance(now);

        if self.state.phase != RoomPhase::Running {
            return;
        }

        for player in self.state.players.values_mut() {
            apply_input_batch(player, PLAYER_SPEED);
        }

        if self.cadence.should_send() {
            let snapshot = self
                .cadence
                .build(self.clock.local_time(), &self.state.players);
            let _ = self.outbound_tx.send(snapshot);
        }
    }

    fn handle_join(&mut self, player_id: Uuid) {
        if self.state.players.contains_key(&player_id) {
            warn!(room_id = %self.state.id, player_id = %player_id, "Player already in room");
            return;
        }
        if self.state.players.len() >= self.state.max_players {
            warn!(room_id = %self.state.id, player_id = %player_id, "Room is full, join ignored");
            return;
        }

        let mut player = Player::new(player_id, self.state.bounds);
        player.pos = SPAWN_SLOTS[self.state.join_counter % SPAWN_SLOTS.len()];
        self.state.join_counter += 1;

        self.state.players.insert(player_id, player);
        self.state.join_order.push(player_id);
        self.player_count
            .store(self.state.players.len(), Ordering::Relaxed);

        info!(
            room_id = %self.state.id,
            player_id = %player_id,
            player_count = self.state.players.len(),
            "Player joined room"
        );

        let _ = self
            .outbound_tx
            .send(ServerMsg::ClientJoin(ClientJoinMsg {
                players: self.roster(),
            }));

        if self.state.phase == RoomPhase::Waiting
            && self.state.players.len() >= self.state.min_players
        {
            self.state.phase = RoomPhase::Running;
            self.cadence.force_next();
            let _ = self.outbound_tx.send(ServerMsg::StartGame(StartGameMsg {
                server_time: self.clock.local_time(),
            }));
            info!(room_id = %self.state.id, "Room started");
        }
    }

    fn handle_move(&mut self, mv: MoveMsg) {
        match self.state.players.get_mut(&mv.player_id) {
            Some(player) => player.push_input(InputCmd {
                keys: mv.input,
                time: mv.local_time,
                seq: mv.input_seq,
            }),
            None => debug!(room_id = %self.state.id, player_id = %mv.player_id, "Move for unknown player"),
        }
    }

    fn handle_leave(&mut self, player_id: Uuid) {
        if self.state.players.remove(&player_id).is_none() {
            return;
        }
        self.state.join_order.retain(|id| *id != player_id);
        self.player_count
            .store(self.state.players.len(), Ordering::Relaxed);

        let new_host_id = self.state.host_id();
        let _ = self.outbound_tx.send(ServerMsg::PlayerLeft(PlayerLeftMsg {
            player_id,
            new_host_id,
        }));

        info!(
            room_id = %self.state.id,
            player_id = %player_id,
            player_count = self.state.players.len(),
            "Player left room"
        );

        if self.state.players.is_empty() {
            self.state.phase = RoomPhase::Ended;
        }
    }

    fn roster(&self) -> Vec<RosterEntry> {
        let host = self.state.host_id();
        self.state
            .join_order
            .iter()
            .filter_map(|id| self.state.players.get(id))
            .map(|p| RosterEntry {
                player_id: p.id,
                pos: p.pos,
                is_host: Some(p.id) == host,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::physics::DirKey;
    use crate::util::time::unix_millis;
    use std::time::Duration;

    fn new_room() -> (GameRoom, RoomHandle) {
        GameRoom::new(Uuid::new_v4(), WorldBounds::for_world(720.0, 480.0), 2, 4)
    }

    fn join(room: &mut GameRoom, id: Uuid) {
        room.handle_join(id);
    }

    fn drain(rx: &mut broadcast::Receiver<ServerMsg>) -> Vec<ServerMsg> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn spawn_slots_are_deterministic_by_join_order() {
        let (mut room, _handle) = new_room();
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            join(&mut room, *id);
        }

        assert_eq!(room.state.players[&ids[0]].pos, Pos::new(20.0, 20.0));
        assert_eq!(room.state.players[&ids[1]].pos, Pos::new(500.0, 200.0));
        assert_eq!(room.state.players[&ids[2]].pos, Pos::new(500.0, 20.0));
        assert_eq!(room.state.players[&ids[3]].pos, Pos::new(20.0, 200.0));
        assert_eq!(room.state.host_id(), Some(ids[0]));
    }

    #[test]
    fn room_starts_once_minimum_is_reached() {
        let (mut room, handle) = new_room();
        let mut rx = handle.outbound_tx.subscribe();

        join(&mut room, Uuid::new_v4());
        assert_eq!(room.state.phase, RoomPhase::Waiting);

        join(&mut room, Uuid::new_v4());
        assert_eq!(room.state.phase, RoomPhase::Running);

        let started = drain(&mut rx)
            .into_iter()
            .any(|m| matches!(m, ServerMsg::StartGame(_)));
        assert!(started);
    }

    #[test]
    fn join_past_capacity_is_ignored() {
        let (mut room, _handle) = new_room();
        for _ in 0..5 {
            join(&mut room, Uuid::new_v4());
        }
        assert_eq!(room.state.players.len(), 4);
    }

    #[test]
    fn tick_applies_buffered_inputs_and_reports_ack() {
        let (mut room, handle) = new_room();
        let mut rx = handle.outbound_tx.subscribe();

        let mover = Uuid::new_v4();
        join(&mut room, mover);
        join(&mut room, Uuid::new_v4());
        drain(&mut rx);

        for seq in 1..=3u64 {
            room.handle_move(MoveMsg {
                player_id: mover,
                input: vec![DirKey::Right],
                local_time: seq as f64 * 0.1,
                input_seq: seq,
            });
        }

        // Step until the cadence emits a snapshot
        let t0 = Instant::now();
        for i in 0..SNAPSHOT_INTERVAL_TICKS {
            room.step(t0 + Duration::from_millis(15 * (i as u64 + 1)));
        }

        let ticks: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|m| match m {
                ServerMsg::Tick(t) => Some(t),
                _ => None,
            })
            .collect();
        assert_eq!(ticks.len(), 1);

        let me = ticks[0]
            .players
            .iter()
            .find(|p| p.player_id == mover)
            .unwrap();
        // 3 * 120 * 0.015 = 5.4 from the (20, 20) spawn
        assert_eq!(me.pos, Pos::new(25.4, 20.0));
        assert_eq!(me.last_input_seq, 3);
    }

    #[test]
    fn leave_migrates_host_and_empty_room_ends() {
        let (mut room, handle) = new_room();
        let mut rx = handle.outbound_tx.subscribe();

        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        join(&mut room, first);
        join(&mut room, second);
        drain(&mut rx);

        room.handle_leave(first);
        let left = drain(&mut rx)
            .into_iter()
            .find_map(|m| match m {
                ServerMsg::PlayerLeft(p) => Some(p),
                _ => None,
            })
            .unwrap();
        assert_eq!(left.player_id, first);
        assert_eq!(left.new_host_id, Some(second));
        assert_eq!(room.state.phase, RoomPhase::Running);

        room.handle_leave(second);
        assert_eq!(room.state.phase, RoomPhase::Ended);
        assert_eq!(handle.player_count(), 0);
    }

    #[tokio::test]
    async fn room_task_ends_and_notifies_when_everyone_leaves() {
        let (room, handle) = new_room();
        let mut rx = handle.outbound_tx.subscribe();
        let task = tokio::spawn(room.run());

        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        for id in [a, b] {
            handle
                .input_tx
                .send(RoomMessage {
                    player_id: id,
                    msg: ClientMsg::Join(crate::ws::protocol::JoinMsg { player_id: id }),
                    received_at: unix_millis(),
                })
                .await
                .unwrap();
        }
        for id in [a, b] {
            handle
                .input_tx
                .send(RoomMessage {
                    player_id: id,
                    msg: ClientMsg::Leave(crate::ws::protocol::LeaveMsg { player_id: id }),
                    received_at: unix_millis(),
                })
                .await
                .unwrap();
        }

        task.await.unwrap();

        let mut saw_end = false;
        while let Ok(msg) = rx.try_recv() {
            if matches!(msg, ServerMsg::EndGame) {
                saw_end = true;
            }
        }
        assert!(saw_end);
    }
}
