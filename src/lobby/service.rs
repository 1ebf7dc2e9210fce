//! Room assignment and message routing.
//!
//! Joining players are placed into the first room with a free slot, or
//! a fresh room when none has one. Each room runs as its own task; the
//! service only routes messages and tracks which room owns which
//! player.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::game::player::WorldBounds;
use crate::game::room::{GameRoom, RoomHandle, RoomRegistry};
use crate::game::RoomMessage;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, JoinMsg, LeaveMsg, ServerMsg};

#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    #[error("room channel closed")]
    RoomClosed,
}

/// Places players into rooms and forwards their messages to the
/// owning room task.
pub struct RoomService {
    registry: Arc<RoomRegistry>,
    bounds: WorldBounds,
    min_players: usize,
    max_players: usize,
    /// player id -> owning room id
    player_rooms: Arc<DashMap<Uuid, Uuid>>,
}

impl RoomService {
    pub fn new(registry: Arc<RoomRegistry>, config: &Config) -> Self {
        Self {
            registry,
            bounds: WorldBounds::for_world(config.world_width, config.world_height),
            min_players: config.room_min_players,
            max_players: config.room_max_players,
            player_rooms: Arc::new(DashMap::new()),
        }
    }

    /// Place a player into a room, creating one when every existing
    /// room is full. Returns the room handle plus a subscription to its
    /// outbound broadcast; the join itself is queued on the room's
    /// channel and takes effect on its next tick.
    pub async fn join_room(
        &self,
        player_id: Uuid,
    ) -> Result<(RoomHandle, broadcast::Receiver<ServerMsg>), LobbyError> {
        if let Some(room_id) = self.player_rooms.get(&player_id).map(|r| *r) {
            if let Some(handle) = self.registry.get(&room_id) {
                warn!(player_id = %player_id, room_id = %room_id, "Player already placed, rejoining");
                let rx = handle.outbound_tx.subscribe();
                return Ok((handle, rx));
            }
            self.player_rooms.remove(&player_id);
        }

        let handle = match self.registry.find_available_room(self.max_players) {
            Some(handle) => handle,
            None => self.create_room(),
        };
        let rx = handle.outbound_tx.subscribe();

        self.player_rooms.insert(player_id, handle.id);
        handle
            .input_tx
            .send(RoomMessage {
                player_id,
                msg: ClientMsg::Join(JoinMsg { player_id }),
                received_at: unix_millis(),
            })
            .await
            .map_err(|_| LobbyError::RoomClosed)?;

        info!(player_id = %player_id, room_id = %handle.id, "Player routed to room");
        Ok((handle, rx))
    }

    /// Remove a player from their room, on explicit leave or socket
    /// close. Safe to call twice.
    pub async fn leave_room(&self, player_id: Uuid) {
        let Some((_, room_id)) = self.player_rooms.remove(&player_id) else {
            return;
        };
        let Some(handle) = self.registry.get(&room_id) else {
            return;
        };
        let _ = handle
            .input_tx
            .send(RoomMessage {
                player_id,
                msg: ClientMsg::Leave(LeaveMsg { player_id }),
                received_at: unix_millis(),
            })
            .await;

        info!(player_id = %player_id, room_id = %room_id, "Player left room");
    }

    /// Forward a decoded message to the player's room
    pub async fn forward(&self, player_id: Uuid, msg: ClientMsg) -> Result<(), LobbyError> {
        let Some(room_id) = self.player_rooms.get(&player_id).map(|r| *r) else {
            debug!(player_id = %player_id, "Message from player with no room");
            return Ok(());
        };
        let Some(handle) = self.registry.get(&room_id) else {
            return Ok(());
        };
        handle
            .input_tx
            .send(RoomMessage {
                player_id,
                msg,
                received_at: unix_millis(),
            })
            .await
            .map_err(|_| LobbyError::RoomClosed)
    }

    pub fn room_of(&self, player_id: &Uuid) -> Option<Uuid> {
        self.player_rooms.get(player_id).map(|r| *r)
    }

    fn create_room(&self) -> RoomHandle {
        let room_id = Uuid::new_v4();
        let (room, handle) =
            GameRoom::new(room_id, self.bounds, self.min_players, self.max_players);

        self.registry.insert(handle.clone());

        let registry = self.registry.clone();
        let player_rooms = self.player_rooms.clone();
        tokio::spawn(async move {
            room.run().await;

            registry.remove(&room_id);
            player_rooms.retain(|_, owned| *owned != room_id);
            info!(room_id = %room_id, "Room removed from registry");
        });

        info!(room_id = %room_id, "Created new room");
        handle
    }
}
