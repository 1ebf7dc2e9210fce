//! Round-trip latency estimation

use std::time::{Duration, Instant};

use crate::util::time::PING_INTERVAL;
use crate::ws::protocol::PingMsg;

/// Periodic ping/pong latency probe. The last sample wins; there is no
/// smoothing. The estimate is used to offset the assumed server time
/// when a game starts, not inside the interpolation loop.
#[derive(Debug)]
pub struct LatencyEstimator {
    interval: Duration,
    last_ping_at: Option<Instant>,
    /// Last measured round trip, in milliseconds
    net_ping_ms: f64,
    /// One-way estimate, net_ping / 2, in milliseconds
    net_latency_ms: f64,
}

impl LatencyEstimator {
    pub fn new() -> Self {
        Self::with_interval(PING_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            last_ping_at: None,
            net_ping_ms: 0.0,
            net_latency_ms: 0.0,
        }
    }

    /// Produce the next probe if the interval has elapsed. The probe
    /// carries the current wall clock in milliseconds; the server
    /// echoes it untouched.
    pub fn maybe_ping(&mut self, now: Instant, now_ms: f64) -> Option<PingMsg> {
        let due = match self.last_ping_at {
            Some(last) => now.duration_since(last) >= self.interval,
            None => true,
        };
        if !due {
            return None;
        }
        self.last_ping_at = Some(now);
        Some(PingMsg { ping: now_ms })
    }

    /// Record an echoed probe. `sent_ms` is the timestamp the probe
    /// carried, `now_ms` the current wall clock.
    pub fn on_pong(&mut self, sent_ms: f64, now_ms: f64) {
        self.net_ping_ms = (now_ms - sent_ms).max(0.0);
        self.net_latency_ms = self.net_ping_ms / 2.0;
    }

    pub fn net_ping_ms(&self) -> f64 {
        self.net_ping_ms
    }

    pub fn net_latency_ms(&self) -> f64 {
        self.net_latency_ms
    }

    /// One-way latency in seconds, for offsetting the local clock
    pub fn net_latency_secs(&self) -> f64 {
        self.net_latency_ms / 1000.0
    }
}

impl Default for LatencyEstimator {
    fn default() -> Self {
        Self::new()
    }
}
