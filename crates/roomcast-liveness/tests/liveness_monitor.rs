//! Integration tests for the liveness sweep timer.
//!
//! Uses `start_paused` so Tokio auto-advances the clock and every
//! `sleep_until` resolves instantly and deterministically.

use std::time::Duration;

use roomcast_liveness::{Heartbeat, LivenessConfig, LivenessMonitor, Verdict};

// =========================================================================
// Helpers
// =========================================================================

fn config_30s() -> LivenessConfig {
    LivenessConfig::from_secs(30)
}

// =========================================================================
// LivenessConfig
// =========================================================================

#[test]
fn test_from_secs_sets_interval() {
    assert_eq!(config_30s().interval, Duration::from_secs(30));
    assert!(!config_30s().is_disabled());
}

#[test]
fn test_disabled_config() {
    let cfg = LivenessConfig::disabled();
    assert!(cfg.is_disabled());
    assert_eq!(cfg.interval, Duration::ZERO);
}

// =========================================================================
// Monitor creation and accessors
// =========================================================================

#[test]
fn test_monitor_initial_state() {
    let m = LivenessMonitor::new(config_30s());
    assert_eq!(m.sweep_count(), 0);
    assert!(!m.is_disabled());
    assert_eq!(m.interval(), Some(Duration::from_secs(30)));
    assert_eq!(m.metrics().total_sweeps, 0);
}

#[test]
fn test_monitor_disabled_has_no_interval() {
    let m = LivenessMonitor::new(LivenessConfig::disabled());
    assert!(m.is_disabled());
    assert_eq!(m.interval(), None);
}

// =========================================================================
// Sweep timing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_first_sweep_fires_after_one_interval() {
    let start = tokio::time::Instant::now();
    let mut m = LivenessMonitor::new(config_30s());

    let tick = m.wait_for_sweep().await;
    assert_eq!(tick.sweep, 1);
    assert!(!tick.late);
    assert_eq!(start.elapsed(), Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_sweeps_keep_fixed_cadence() {
    let start = tokio::time::Instant::now();
    let mut m = LivenessMonitor::new(config_30s());

    for expected in 1..=4 {
        let tick = m.wait_for_sweep().await;
        assert_eq!(tick.sweep, expected);
    }
    assert_eq!(m.sweep_count(), 4);
    assert_eq!(start.elapsed(), Duration::from_secs(120));
}

#[tokio::test(start_paused = true)]
async fn test_sweep_does_not_fire_early() {
    let mut m = LivenessMonitor::new(config_30s());
    let result =
        tokio::time::timeout(Duration::from_secs(29), m.wait_for_sweep()).await;
    assert!(result.is_err(), "sweep must wait the full interval");
}

#[tokio::test(start_paused = true)]
async fn test_late_sweep_reschedules_from_now() {
    let mut m = LivenessMonitor::new(config_30s());

    // Sleep well past the first deadline before polling.
    tokio::time::sleep(Duration::from_secs(75)).await;
    let tick = m.wait_for_sweep().await;
    assert!(tick.late);

    // Next sweep is one full interval after the late wake-up, not a burst.
    let before = tokio::time::Instant::now();
    let tick = m.wait_for_sweep().await;
    assert_eq!(tick.sweep, 2);
    assert!(!tick.late);
    assert_eq!(before.elapsed(), Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_disabled_monitor_never_fires() {
    let mut m = LivenessMonitor::new(LivenessConfig::disabled());
    let result =
        tokio::time::timeout(Duration::from_secs(3600), m.wait_for_sweep()).await;
    assert!(result.is_err(), "disabled monitor should pend forever");
}

// =========================================================================
// Metrics
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_record_sweep_accumulates() {
    let mut m = LivenessMonitor::new(config_30s());

    m.wait_for_sweep().await;
    m.record_sweep(3, 0);
    m.wait_for_sweep().await;
    m.record_sweep(2, 1);

    let metrics = m.metrics();
    assert_eq!(metrics.total_sweeps, 2);
    assert_eq!(metrics.total_probes, 5);
    assert_eq!(metrics.total_terminations, 1);
}

// =========================================================================
// Integration: select! loop with cancellation (mirrors server usage)
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_select_loop_stops_on_shutdown() {
    let mut m = LivenessMonitor::new(config_30s());
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);

    tokio::spawn(async move {
        // Three sweeps at 30 s, then shutdown before the fourth.
        tokio::time::sleep(Duration::from_secs(100)).await;
        let _ = shutdown_tx.send(true);
    });

    let mut sweeps = 0u64;
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            tick = m.wait_for_sweep() => {
                sweeps += 1;
                assert_eq!(tick.sweep, sweeps);
            }
        }
    }

    assert_eq!(sweeps, 3);
}

#[tokio::test(start_paused = true)]
async fn test_silent_connection_is_condemned_on_second_sweep() {
    let mut m = LivenessMonitor::new(config_30s());
    let mut responsive = Heartbeat::new();
    let mut silent = Heartbeat::new();

    m.wait_for_sweep().await;
    assert_eq!(responsive.check(), Verdict::Probe);
    assert_eq!(silent.check(), Verdict::Probe);
    responsive.acknowledge();

    m.wait_for_sweep().await;
    assert_eq!(responsive.check(), Verdict::Probe);
    assert_eq!(silent.check(), Verdict::Terminate);
}
