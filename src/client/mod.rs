//! Client-side netcode: prediction, reconciliation and interpolation.
//!
//! Everything here is transport-agnostic; the session consumes decoded
//! server messages and produces client messages for the caller's
//! socket.

pub mod buffer;
pub mod interpolate;
pub mod latency;
pub mod ledger;
pub mod reconcile;
pub mod session;

pub use buffer::SnapshotBuffer;
pub use interpolate::Interpolator;
pub use latency::LatencyEstimator;
pub use ledger::InputLedger;
pub use reconcile::{Reconciled, Reconciler};
pub use session::{ClientConfig, ClientSession};
