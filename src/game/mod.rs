//! Game simulation modules

pub mod clock;
pub mod physics;
pub mod player;
pub mod room;
pub mod snapshot;

pub use player::Player;
pub use room::{GameRoom, RoomHandle, RoomRegistry};

use crate::ws::protocol::ClientMsg;
use uuid::Uuid;

/// A client message routed into a room, tagged with the connection it
/// arrived on.
#[derive(Debug, Clone)]
pub struct RoomMessage {
    pub player_id: Uuid,
    pub msg: ClientMsg,
    pub received_at: u64,
}
