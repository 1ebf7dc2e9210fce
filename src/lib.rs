//! Netcode for a real-time multiplayer arena game.
//!
//! The server side runs authoritative rooms on a fixed 15 ms physics
//! step and broadcasts snapshots every third tick; the client side
//! provides prediction, reconciliation and snapshot interpolation over
//! the same deterministic movement code. Both peers share the wire
//! protocol in [`ws::protocol`] and the physics in [`game::physics`].

pub mod app;
pub mod client;
pub mod config;
pub mod game;
pub mod http;
pub mod lobby;
pub mod util;
pub mod ws;
