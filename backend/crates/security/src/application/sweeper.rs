//! Periodic Sweeper
//!
//! One background task drives all time-based expiry: failed-login
//! counters, IP blocks, rate-limit histories and old alerts.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::application::abuse_tracker::AbuseTracker;
use crate::application::alert_log::AlertLog;
use crate::application::config::SecurityConfig;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Spawn the sweeper; it exits when `shutdown` becomes `true` or its sender is dropped
pub fn spawn_sweeper(
    tracker: Arc<AbuseTracker>,
    alerts: Arc<AlertLog>,
    config: &SecurityConfig,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let sweep_interval = config.sweep_interval.max(MIN_INTERVAL);
    let cleanup_interval = config.alert_cleanup_interval.max(MIN_INTERVAL);
    let alert_max_age = config.alert_max_age;

    tokio::spawn(async move {
        let mut sweep_tick = tokio::time::interval(sweep_interval);
        sweep_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cleanup_tick = tokio::time::interval(cleanup_interval);
        cleanup_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            sweep_interval_ms = sweep_interval.as_millis() as u64,
            cleanup_interval_ms = cleanup_interval.as_millis() as u64,
            "Security sweeper started"
        );

        loop {
            tokio::select! {
                _ = sweep_tick.tick() => {
                    let report = tracker.sweep();
                    if !report.is_empty() {
                        tracing::info!(
                            expired_failures = report.expired_failures,
                            expired_blocks = report.expired_blocks,
                            dropped_rate_limit_keys = report.dropped_rate_limit_keys,
                            "Security sweep completed"
                        );
                    }
                }
                _ = cleanup_tick.tick() => {
                    let removed = alerts.cleanup(alert_max_age);
                    if removed > 0 {
                        tracing::info!(removed, "Old security alerts purged");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Security sweeper stopped");
    })
}
