//! Token and cost accounting for a supervised command.
//!
//! This module provides the pieces the supervisor feeds captured output
//! through:
//! - **estimator**: Estimates token counts from text (wrapped CLIs never report exact counts)
//! - **PricingTable**: Per-model prices per million tokens, with fuzzy lookup
//! - **GuardOptions**: Token budget, cost limit and warning threshold for a run
//! - **UsageTracker**: Running totals, cost, and ceiling checks
//!
//! # Example
//!
//! ```
//! use token_guard::budget::{GuardOptions, LimitEvent, PricingTable, UsageTracker};
//!
//! let table = PricingTable::builtin();
//! let options = GuardOptions::new().with_budget(10);
//! let mut tracker = UsageTracker::new("claude \"explain\"", options, &table);
//! tracker.mark_running();
//!
//! tracker.record_output("a reply long enough to blow a ten token budget, surely.");
//! let events = tracker.check_limits();
//! assert!(matches!(events.as_slice(), [LimitEvent::Exceeded { .. }]));
//! ```

pub mod estimator;
mod options;
mod pricing;
mod tracker;

pub use estimator::{estimate, format_tokens};
pub use options::{GuardOptions, DEFAULT_WARN_PERCENT};
pub use pricing::{detect_model, PricingEntry, PricingTable, DEFAULT_MODEL};
pub use tracker::{
    Ceiling, LimitEvent, RunState, SharedUsageTracker, UsageSnapshot, UsageStats, UsageTracker,
    WARN_BAND_WIDTH,
};
