//! Periodic status notifications.
//!
//! The ticker runs beside a supervised child and hands the current usage
//! snapshot to the status reporter at a fixed interval. It only reads the
//! accounting state and never changes it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::budget::{GuardOptions, SharedUsageTracker};
use crate::report::StatusReporter;

/// Default interval between status notifications.
pub const STATUS_INTERVAL: Duration = Duration::from_secs(1);

/// Repeating status task scoped to one run.
///
/// Stop it with [`StatusTicker::stop`]; dropping it aborts the task as well,
/// so no notification can outlive the run.
///
/// # Example
///
/// ```ignore
/// let ticker = StatusTicker::start(tracker.clone(), reporter.clone(), options, STATUS_INTERVAL);
/// // ... child runs ...
/// ticker.stop().await;
/// ```
pub struct StatusTicker {
    /// Flag to signal the background task to stop.
    stop_flag: Arc<AtomicBool>,
    /// Handle to the background task.
    handle: Option<JoinHandle<()>>,
}

impl StatusTicker {
    /// Start notifying `reporter` every `interval`.
    ///
    /// The first notification happens one interval after start.
    pub fn start(
        tracker: SharedUsageTracker,
        reporter: Arc<dyn StatusReporter>,
        options: GuardOptions,
        interval: Duration,
    ) -> Self {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let task_stop = Arc::clone(&stop_flag);

        // tokio panics on a zero period
        let interval = interval.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticks = tokio::time::interval_at(start, interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticks.tick().await;
                if task_stop.load(Ordering::SeqCst) {
                    break;
                }
                reporter.status(&tracker.snapshot(), &options);
            }
        });

        Self {
            stop_flag,
            handle: Some(handle),
        }
    }

    /// Stop the task and wait until it has finished.
    pub async fn stop(mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }

    /// Returns true if the task is still running.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for StatusTicker {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::{PricingTable, UsageTracker};
    use crate::report::RecordingReporter;

    fn shared_tracker() -> SharedUsageTracker {
        SharedUsageTracker::new(UsageTracker::new(
            "tool",
            GuardOptions::new(),
            &PricingTable::builtin(),
        ))
    }

    #[tokio::test]
    async fn test_ticker_reports_periodically() {
        let reporter = Arc::new(RecordingReporter::new());
        let tracker = shared_tracker();
        tracker.record_output("hello world");

        let ticker = StatusTicker::start(
            tracker.clone(),
            reporter.clone(),
            GuardOptions::new(),
            Duration::from_millis(20),
        );
        assert!(ticker.is_running());

        tokio::time::sleep(Duration::from_millis(130)).await;
        ticker.stop().await;

        let statuses = reporter.statuses();
        assert!(statuses.len() >= 2);
        assert_eq!(statuses[0].output_tokens, 4);
    }

    #[tokio::test]
    async fn test_no_reports_after_stop() {
        let reporter = Arc::new(RecordingReporter::new());
        let ticker = StatusTicker::start(
            shared_tracker(),
            reporter.clone(),
            GuardOptions::new(),
            Duration::from_millis(20),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        ticker.stop().await;
        let count = reporter.statuses().len();

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(reporter.statuses().len(), count);
    }

    #[tokio::test]
    async fn test_drop_cancels_task() {
        let reporter = Arc::new(RecordingReporter::new());
        {
            let _ticker = StatusTicker::start(
                shared_tracker(),
                reporter.clone(),
                GuardOptions::new(),
                Duration::from_millis(20),
            );
        }

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(reporter.statuses().is_empty());
    }

    #[tokio::test]
    async fn test_first_report_waits_one_interval() {
        let reporter = Arc::new(RecordingReporter::new());
        let ticker = StatusTicker::start(
            shared_tracker(),
            reporter.clone(),
            GuardOptions::new(),
            Duration::from_secs(5),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(reporter.statuses().is_empty());
        ticker.stop().await;
    }
}
