//! Time utilities for game simulation

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Get current Unix timestamp in fractional milliseconds.
/// Ping/pong timestamps go over the wire in this form.
pub fn unix_millis_f64() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs_f64()
        * 1000.0
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(std::time::Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Physics runs at a fixed 15 ms step on both endpoints.
pub const PHYSICS_STEP: Duration = Duration::from_millis(15);

/// Snapshots go out every third physics tick (45 ms, ~22 Hz), the
/// cadence of the server's update loop.
pub const SNAPSHOT_INTERVAL_TICKS: u32 = 3;

/// Latency probes are sent once per second.
pub const PING_INTERVAL: Duration = Duration::from_secs(1);

/// Fraction of a second each physics substep covers when converting a
/// direction into a movement vector. Must match on client and server
/// or prediction diverges.
pub const FIXED_SUBSTEP: f64 = 0.015;

/// Upper bound on a single clock step. A stalled scheduler produces
/// one clamped step, never a catch-up burst.
pub const MAX_CLOCK_STEP: Duration = Duration::from_millis(250);
