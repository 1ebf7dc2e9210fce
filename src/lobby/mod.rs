//! Room placement and routing

pub mod service;

pub use service::{LobbyError, RoomService};
