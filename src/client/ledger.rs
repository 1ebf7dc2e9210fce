//! Outgoing input record for client-side prediction

use std::collections::VecDeque;

use crate::game::physics::DirKey;
use crate::game::player::{InputCmd, MAX_PENDING_INPUTS};

/// Records every input the client has sent but the server has not yet
/// acknowledged. Appended on each sampled frame, truncated when a
/// snapshot acknowledges a sequence.
#[derive(Debug)]
pub struct InputLedger {
    entries: VecDeque<InputCmd>,
    next_seq: u64,
}

impl InputLedger {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            next_seq: 1,
        }
    }

    /// Record a sampled key set, assigning the next sequence number.
    /// Returns the stored command. A full ledger drops its oldest
    /// entry so memory stays bounded under sustained ack loss.
    pub fn record(&mut self, keys: Vec<DirKey>, local_time: f64) -> InputCmd {
        let cmd = InputCmd {
            keys,
            time: local_time,
            seq: self.next_seq,
        };
        self.next_seq += 1;

        if self.entries.len() >= MAX_PENDING_INPUTS {
            self.entries.pop_front();
        }
        self.entries.push_back(cmd.clone());
        cmd
    }

    /// Drop every entry up to and including the acknowledged sequence.
    /// Returns false when the sequence is not in the ledger (already
    /// truncated past, or never recorded).
    pub fn truncate_through(&mut self, ack_seq: u64) -> bool {
        match self.entries.iter().position(|e| e.seq == ack_seq) {
            Some(idx) => {
                self.entries.drain(..=idx);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Unacknowledged entries, oldest first
    pub fn entries(&self) -> &VecDeque<InputCmd> {
        &self.entries
    }

    pub fn last_seq(&self) -> Option<u64> {
        self.entries.back().map(|e| e.seq)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for InputLedger {
    fn default() -> Self {
        Self::new()
    }
}
