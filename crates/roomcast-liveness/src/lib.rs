//! Connection liveness detection for Roomcast.
//!
//! Two pieces:
//!
//! - [`Heartbeat`]: the per-connection `alive` flag and its flip/check
//!   cycle. Each sweep either probes a connection (clearing the flag) or,
//!   if the previous probe was never acknowledged, condemns it.
//! - [`LivenessMonitor`]: the repeating timer that decides *when* a sweep
//!   happens.
//!
//! A connection that goes silent right after a sweep is terminated on the
//! sweep after next, so true inactivity before termination is between one
//! and two intervals.
//!
//! # Integration
//!
//! The monitor is designed to sit inside a `tokio::select!` loop next to a
//! shutdown signal, so cancelling the timer is just leaving the loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = shutdown.changed() => break,
//!         _ = monitor.wait_for_sweep() => {
//!             let report = registry.lock().await.sweep();
//!             monitor.record_sweep(report.probed, report.terminated.len());
//!         }
//!     }
//! }
//! ```

mod heartbeat;
mod monitor;

pub use heartbeat::{Heartbeat, Verdict};
pub use monitor::{LivenessConfig, LivenessMetrics, LivenessMonitor, SweepTick};
