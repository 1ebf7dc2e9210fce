//! Prediction correction against authoritative snapshots

use crate::client::ledger::InputLedger;
use crate::game::physics::{direction_from_keys, movement_vector, Pos};
use crate::game::player::WorldBounds;
use crate::ws::protocol::PlayerSnapshot;

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// The acknowledged sequence was found; unacknowledged inputs were
    /// replayed on top of the authoritative position.
    Replayed { remaining: usize },
    /// The sequence was not in the ledger; the snapshot position was
    /// adopted outright and the ledger cleared.
    Adopted,
}

/// Corrects the locally predicted position against the server's
/// report for this client.
#[derive(Debug, Clone)]
pub struct Reconciler {
    speed: f64,
    bounds: WorldBounds,
}

impl Reconciler {
    pub fn new(speed: f64, bounds: WorldBounds) -> Self {
        Self { speed, bounds }
    }

    /// Apply the server's authoritative result: truncate the ledger at
    /// the acknowledged sequence, reset to the authoritative position,
    /// and replay everything still unacknowledged in sequence order.
    ///
    /// After this, `predicted` equals the authoritative position plus
    /// exactly the effect of the still-queued inputs. When the
    /// acknowledged sequence is unknown the snapshot wins and any
    /// in-flight prediction is discarded.
    pub fn reconcile(
        &self,
        ledger: &mut InputLedger,
        predicted: &mut Pos,
        reported: &PlayerSnapshot,
    ) -> Reconciled {
        if ledger.truncate_through(reported.last_input_seq) {
            *predicted = self.replay(reported.pos, ledger);
            Reconciled::Replayed {
                remaining: ledger.len(),
            }
        } else {
            *predicted = reported.pos;
            ledger.clear();
            Reconciled::Adopted
        }
    }

    /// Re-run the movement batch over the unacknowledged ledger
    /// entries, the same accumulation the server tick applies.
    fn replay(&self, base: Pos, ledger: &InputLedger) -> Pos {
        let mut x_dir = 0.0;
        let mut y_dir = 0.0;
        for entry in ledger.entries() {
            let (dx, dy) = direction_from_keys(&entry.keys);
            x_dir += dx;
            y_dir += dy;
        }
        let moved = base.add(movement_vector(x_dir, y_dir, self.speed));
        self.bounds.clamp(moved)
    }
}
