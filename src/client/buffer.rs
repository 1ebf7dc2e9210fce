//! Bounded, time-ordered history of received snapshots

use std::collections::VecDeque;

use crate::ws::protocol::TickMsg;

/// Snapshot history the interpolation timeline plays back over.
/// Entries are strictly non-decreasing in `t`; capacity is
/// tick_rate x buffer_seconds and eviction is FIFO.
#[derive(Debug)]
pub struct SnapshotBuffer {
    entries: VecDeque<TickMsg>,
    capacity: usize,
}

impl SnapshotBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Capacity for `buffer_seconds` worth of updates at `rate_hz`
    pub fn for_rate(rate_hz: u32, buffer_seconds: u32) -> Self {
        Self::new((rate_hz * buffer_seconds) as usize)
    }

    /// Append a snapshot at the tail. A snapshot older than the
    /// current tail would violate time ordering and is dropped
    /// silently (the transport is ordered, so this only covers
    /// misbehaving peers).
    pub fn push(&mut self, tick: TickMsg) {
        if let Some(last) = self.entries.back() {
            if tick.t < last.t {
                return;
            }
        }
        self.entries.push_back(tick);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Oldest-to-newest scan for the adjacent pair bracketing
    /// `playback_time`. Falls back to the earliest entry as both
    /// bounds when the time is outside the stored range; None only
    /// when the buffer is empty.
    pub fn bracket(&self, playback_time: f64) -> Option<(&TickMsg, &TickMsg)> {
        for i in 0..self.entries.len().saturating_sub(1) {
            let prev = &self.entries[i];
            let next = &self.entries[i + 1];
            if playback_time > prev.t && playback_time < next.t {
                return Some((prev, next));
            }
        }
        let earliest = self.entries.front()?;
        Some((earliest, earliest))
    }

    pub fn latest(&self) -> Option<&TickMsg> {
        self.entries.back()
    }

    pub fn oldest(&self) -> Option<&TickMsg> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
