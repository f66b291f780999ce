//! The repeating liveness sweep timer.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the liveness monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LivenessConfig {
    /// Time between sweeps. `Duration::ZERO` disables the monitor.
    pub interval: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
        }
    }
}

impl LivenessConfig {
    /// Sweep interval used when nothing else is configured.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

    /// Shortest accepted non-zero interval.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

    /// Create a config with the given sweep interval.
    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }

    /// Create a config with an interval in whole seconds.
    pub fn from_secs(secs: u64) -> Self {
        Self::with_interval(Duration::from_secs(secs))
    }

    /// A config whose monitor never sweeps.
    pub fn disabled() -> Self {
        Self::with_interval(Duration::ZERO)
    }

    /// Whether sweeps are turned off.
    pub fn is_disabled(&self) -> bool {
        self.interval.is_zero()
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`LivenessMonitor::new`]. Non-zero intervals
    /// shorter than [`Self::MIN_INTERVAL`] are raised to it.
    pub fn validated(mut self) -> Self {
        if !self.is_disabled() && self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_secs_f64() * 1000.0,
                min_ms = Self::MIN_INTERVAL.as_millis() as u64,
                "liveness interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Sweep info and metrics
// ---------------------------------------------------------------------------

/// Information about a due sweep, returned by
/// [`LivenessMonitor::wait_for_sweep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepTick {
    /// Monotonically increasing sweep number (starts at 1).
    pub sweep: u64,
    /// `true` if the timer woke up noticeably after its deadline.
    pub late: bool,
}

/// Running totals across all sweeps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LivenessMetrics {
    /// Sweeps that have fired.
    pub total_sweeps: u64,
    /// Probes sent across all sweeps.
    pub total_probes: u64,
    /// Connections force-closed across all sweeps.
    pub total_terminations: u64,
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// Fixed-interval sweep timer.
///
/// One monitor serves every connection the transport knows about. The
/// monitor only keeps time; the sweep itself is performed by whoever owns
/// the connection table.
pub struct LivenessMonitor {
    interval: Option<Duration>,
    sweep_count: u64,
    /// When the next sweep is due (Tokio instant for `sleep_until`).
    next_sweep: Option<Instant>,
    metrics: LivenessMetrics,
}

impl LivenessMonitor {
    /// Create a new monitor. The first sweep is due one interval from now.
    pub fn new(config: LivenessConfig) -> Self {
        let config = config.validated();
        let interval = (!config.is_disabled()).then_some(config.interval);
        let next_sweep = interval.map(|d| Instant::now() + d);

        match interval {
            Some(d) => debug!(
                interval_ms = d.as_millis() as u64,
                "liveness monitor created"
            ),
            None => debug!("liveness monitor created disabled (no sweeps)"),
        }

        Self {
            interval,
            sweep_count: 0,
            next_sweep,
            metrics: LivenessMetrics::default(),
        }
    }

    /// Wait until the next sweep is due.
    ///
    /// When the monitor is disabled this future pends forever; inside
    /// `tokio::select!` the other branches keep running.
    pub async fn wait_for_sweep(&mut self) -> SweepTick {
        let (Some(next), Some(interval)) = (self.next_sweep, self.interval)
        else {
            return std::future::pending::<SweepTick>().await;
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        self.sweep_count += 1;

        let late_by = now.saturating_duration_since(next);
        let late = late_by > interval / 10;
        self.next_sweep = Some(if late {
            warn!(
                sweep = self.sweep_count,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "liveness sweep fired late, rescheduling from now"
            );
            now + interval
        } else {
            next + interval
        });

        self.metrics.total_sweeps += 1;
        trace!(sweep = self.sweep_count, late, "liveness sweep due");

        SweepTick {
            sweep: self.sweep_count,
            late,
        }
    }

    /// Record the outcome of the sweep that just ran.
    pub fn record_sweep(&mut self, probed: usize, terminated: usize) {
        self.metrics.total_probes += probed as u64;
        self.metrics.total_terminations += terminated as u64;
        if terminated > 0 {
            debug!(
                sweep = self.sweep_count,
                probed, terminated, "liveness sweep terminated connections"
            );
        }
    }

    /// Whether this monitor never sweeps.
    pub fn is_disabled(&self) -> bool {
        self.interval.is_none()
    }

    /// Number of sweeps that have fired.
    pub fn sweep_count(&self) -> u64 {
        self.sweep_count
    }

    /// The sweep interval, or `None` when disabled.
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Snapshot of current metrics.
    pub fn metrics(&self) -> &LivenessMetrics {
        &self.metrics
    }
}
