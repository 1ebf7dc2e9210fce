//! Wire protocol message definitions.
//!
//! Every frame is a single leading ASCII digit (the message type)
//! followed immediately by a JSON body, no separator. Both directions
//! use the same framing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::physics::{DirKey, Pos};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMsg {
    /// Request to join a room
    Join(JoinMsg),
    /// Leave the current room
    Leave(LeaveMsg),
    /// A batch of directional input sampled on one render frame
    Move(MoveMsg),
    /// Latency probe carrying the client's send timestamp
    Ping(PingMsg),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinMsg {
    #[serde(rename = "playerId")]
    pub player_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveMsg {
    #[serde(rename = "playerId")]
    pub player_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveMsg {
    #[serde(rename = "playerId")]
    pub player_id: Uuid,
    /// Directional keys held during the sampled frame
    pub input: Vec<DirKey>,
    /// Client's local clock at sample time, in seconds
    pub local_time: f64,
    /// Client-assigned sequence number, strictly increasing from 1
    pub input_seq: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingMsg {
    /// Client timestamp in fractional milliseconds, echoed back verbatim
    pub ping: f64,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMsg {
    /// Room reached its player minimum and is now simulating
    StartGame(StartGameMsg),
    /// Room torn down
    EndGame,
    /// Authoritative state snapshot, one per server update
    Tick(TickMsg),
    /// Current roster, sent when the room membership grows
    ClientJoin(ClientJoinMsg),
    /// A player left; carries the migrated host if any
    PlayerLeft(PlayerLeftMsg),
    /// Echo of a latency probe
    ClientPing(ClientPingMsg),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartGameMsg {
    /// Server's local clock at start, in seconds
    pub server_time: f64,
}

/// One player's entry in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    #[serde(rename = "playerId")]
    pub player_id: Uuid,
    pub pos: Pos,
    /// Highest input sequence the server has applied for this player
    pub last_input_seq: u64,
}

/// Authoritative snapshot of every player at server time `t`.
/// Immutable once constructed; produced exactly once per server update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickMsg {
    pub players: Vec<PlayerSnapshot>,
    /// Server local time of this snapshot, in seconds
    pub t: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    #[serde(rename = "playerId")]
    pub player_id: Uuid,
    pub pos: Pos,
    #[serde(rename = "isHost")]
    pub is_host: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientJoinMsg {
    pub players: Vec<RosterEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerLeftMsg {
    #[serde(rename = "playerId")]
    pub player_id: Uuid,
    #[serde(rename = "newHostId")]
    pub new_host_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientPingMsg {
    #[serde(rename = "playerId")]
    pub player_id: Uuid,
    /// The timestamp the client sent, unchanged
    pub ping: f64,
}

/// Protocol decode errors
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("empty frame")]
    Empty,

    #[error("unknown message type: {0}")]
    UnknownType(char),

    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
}

// Message type discriminants. Kept numeric and single-digit so the
// frame prefix is always exactly one byte.
mod client_type {
    pub const JOIN: char = '0';
    pub const LEAVE: char = '1';
    pub const MOVE: char = '2';
    pub const PING: char = '3';
}

mod server_type {
    pub const START_GAME: char = '0';
    pub const END_GAME: char = '1';
    pub const TICK: char = '2';
    pub const CLIENT_JOIN: char = '5';
    pub const PLAYER_LEFT: char = '6';
    pub const CLIENT_PING: char = '8';
}

impl ClientMsg {
    pub fn encode(&self) -> String {
        match self {
            ClientMsg::Join(m) => frame(client_type::JOIN, m),
            ClientMsg::Leave(m) => frame(client_type::LEAVE, m),
            ClientMsg::Move(m) => frame(client_type::MOVE, m),
            ClientMsg::Ping(m) => frame(client_type::PING, m),
        }
    }

    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        let (tag, body) = split_frame(raw)?;
        match tag {
            client_type::JOIN => Ok(ClientMsg::Join(serde_json::from_str(body)?)),
            client_type::LEAVE => Ok(ClientMsg::Leave(serde_json::from_str(body)?)),
            client_type::MOVE => Ok(ClientMsg::Move(serde_json::from_str(body)?)),
            client_type::PING => Ok(ClientMsg::Ping(serde_json::from_str(body)?)),
            other => Err(ProtocolError::UnknownType(other)),
        }
    }
}

impl ServerMsg {
    pub fn encode(&self) -> String {
        match self {
            ServerMsg::StartGame(m) => frame(server_type::START_GAME, m),
            ServerMsg::EndGame => format!("{}true", server_type::END_GAME),
            ServerMsg::Tick(m) => frame(server_type::TICK, m),
            ServerMsg::ClientJoin(m) => frame(server_type::CLIENT_JOIN, m),
            ServerMsg::PlayerLeft(m) => frame(server_type::PLAYER_LEFT, m),
            ServerMsg::ClientPing(m) => frame(server_type::CLIENT_PING, m),
        }
    }

    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        let (tag, body) = split_frame(raw)?;
        match tag {
            server_type::START_GAME => Ok(ServerMsg::StartGame(serde_json::from_str(body)?)),
            server_type::END_GAME => Ok(ServerMsg::EndGame),
            server_type::TICK => Ok(ServerMsg::Tick(serde_json::from_str(body)?)),
            server_type::CLIENT_JOIN => Ok(ServerMsg::ClientJoin(serde_json::from_str(body)?)),
            server_type::PLAYER_LEFT => Ok(ServerMsg::PlayerLeft(serde_json::from_str(body)?)),
            server_type::CLIENT_PING => Ok(ServerMsg::ClientPing(serde_json::from_str(body)?)),
            other => Err(ProtocolError::UnknownType(other)),
        }
    }
}

fn frame<T: Serialize>(tag: char, payload: &T) -> String {
    // Payload types contain no maps with non-string keys, so
    // serialization cannot fail.
    let body = serde_json::to_string(payload).unwrap_or_else(|_| "null".to_string());
    format!("{}{}", tag, body)
}

fn split_frame(raw: &str) -> Result<(char, &str), ProtocolError> {
    let mut chars = raw.chars();
    let tag = chars.next().ok_or(ProtocolError::Empty)?;
    Ok((tag, chars.as_str()))
}
