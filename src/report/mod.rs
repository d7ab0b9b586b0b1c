//! Status reporting and final usage reports.
//!
//! The supervisor never renders anything itself. It notifies a
//! [`StatusReporter`] with live snapshots and lifecycle events, and hands a
//! [`RunReport`] back to the caller when the child exits.

pub mod terminal;
pub mod writer;

use serde::Serialize;
use std::sync::Mutex;

use crate::budget::{Ceiling, GuardOptions, UsageSnapshot, UsageStats};

pub use terminal::TerminalReporter;
pub use writer::write_report;

/// Lifecycle events emitted by the supervisor.
#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorEvent {
    /// The child was launched.
    Started {
        pid: Option<u32>,
        command: String,
        model: String,
    },
    /// Usage entered the warning band of a ceiling.
    Warning { ceiling: Ceiling, percent: f64 },
    /// A ceiling was reached and the child is being terminated.
    CeilingReached { ceiling: Ceiling, percent: f64 },
    /// The child could not be started.
    LaunchFailed { message: String },
    /// The child exited and its output was fully drained.
    Exited { exit_code: i32 },
}

/// Hook notified by the supervisor during a run.
///
/// Implementations are called from the status ticker and from the stream
/// pumps, so they must be cheap and must not block.
pub trait StatusReporter: Send + Sync {
    /// Periodic snapshot of usage.
    fn status(&self, snapshot: &UsageSnapshot, options: &GuardOptions);

    /// A lifecycle event.
    fn event(&self, event: &SupervisorEvent);
}

/// Final report of a run: the usage stats merged with the options used.
///
/// Serializes to the JSON layout of saved usage reports.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    #[serde(flatten)]
    pub stats: UsageStats,
    pub options: GuardOptions,
    /// Exit code of the child (`0` when none was reported)
    #[serde(skip)]
    pub exit_code: i32,
}

/// Reporter that keeps everything it is told, for embedding and tests.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    statuses: Mutex<Vec<UsageSnapshot>>,
    events: Mutex<Vec<SupervisorEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots received so far.
    pub fn statuses(&self) -> Vec<UsageSnapshot> {
        self.statuses.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Events received so far.
    pub fn events(&self) -> Vec<SupervisorEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Number of warning events received.
    pub fn warning_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, SupervisorEvent::Warning { .. }))
            .count()
    }
}

impl StatusReporter for RecordingReporter {
    fn status(&self, snapshot: &UsageSnapshot, _options: &GuardOptions) {
        if let Ok(mut statuses) = self.statuses.lock() {
            statuses.push(snapshot.clone());
        }
    }

    fn event(&self, event: &SupervisorEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::{PricingTable, UsageTracker};

    #[test]
    fn test_report_layout() {
        let options = GuardOptions::new()
            .with_budget(50_000)
            .with_output("usage.json");
        let mut tracker = UsageTracker::new("claude hi", options.clone(), &PricingTable::builtin());
        tracker.mark_running();
        tracker.record_output_tokens(12);
        tracker.finish();

        let report = RunReport {
            stats: tracker.stats().clone(),
            options,
            exit_code: 3,
        };
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["outputTokens"], 12);
        assert_eq!(json["model"], "claude-sonnet-4");
        assert_eq!(json["command"], "claude hi");
        assert_eq!(json["options"]["budget"], 50_000);
        assert_eq!(json["options"]["output"], "usage.json");
        assert!(json.get("exitCode").is_none());
        assert!(json.get("stats").is_none());
    }

    #[test]
    fn test_recording_reporter() {
        let reporter = RecordingReporter::new();
        reporter.event(&SupervisorEvent::Warning {
            ceiling: Ceiling::Budget,
            percent: 81.0,
        });
        reporter.event(&SupervisorEvent::Exited { exit_code: 0 });

        assert_eq!(reporter.events().len(), 2);
        assert_eq!(reporter.warning_count(), 1);
        assert!(reporter.statuses().is_empty());
    }
}
