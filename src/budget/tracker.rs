//! Usage accounting and ceiling enforcement for a single run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::estimator;
use super::options::GuardOptions;
use super::pricing::{detect_model, PricingEntry, PricingTable};

/// Width of the warning band above the warn percentage.
pub const WARN_BAND_WIDTH: f64 = 5.0;

/// A configured upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ceiling {
    /// Token budget
    Budget,
    /// Cost limit in USD
    Cost,
}

impl Ceiling {
    /// Short human label ("token budget", "cost limit").
    pub fn label(&self) -> &'static str {
        match self {
            Ceiling::Budget => "token budget",
            Ceiling::Cost => "cost limit",
        }
    }
}

impl fmt::Display for Ceiling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of a limit check that the caller must act on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LimitEvent {
    /// Usage entered the warning band of a ceiling.
    Warning { ceiling: Ceiling, percent: f64 },
    /// A ceiling was reached; the child must be terminated.
    Exceeded { ceiling: Ceiling, percent: f64 },
}

/// Lifecycle of a supervised run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Options resolved, child not yet launched
    Starting,
    /// Child is running and output is being counted
    Running,
    /// A ceiling was reached and termination was requested
    Terminating,
    /// Child exited or never launched
    Exited,
}

/// Token and cost usage of one run.
///
/// Serialized field names match the JSON usage report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    /// Estimated tokens sent to the model (the command line)
    pub input_tokens: u64,
    /// Estimated tokens produced on stdout and stderr
    pub output_tokens: u64,
    /// Always `input_tokens + output_tokens`
    pub total_tokens: u64,
    /// Estimated cost in USD
    pub estimated_cost: f64,
    /// Model used for pricing, fixed at construction
    pub model: String,
    /// When accounting started
    #[serde(with = "timestamp")]
    pub start_time: DateTime<Utc>,
    /// When the child exited or failed to launch (set once)
    #[serde(
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_time: Option<DateTime<Utc>>,
    /// The wrapped command line
    pub command: String,
    /// The token budget was reached (never reset)
    pub budget_exceeded: bool,
    /// The cost limit was reached (never reset)
    pub cost_exceeded: bool,
}

impl UsageStats {
    /// Fresh stats for `command` priced as `model`.
    pub fn new(command: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            input_tokens: 0,
            output_tokens: 0,
            total_tokens: 0,
            estimated_cost: 0.0,
            model: model.into(),
            start_time: Utc::now(),
            end_time: None,
            command: command.into(),
            budget_exceeded: false,
            cost_exceeded: false,
        }
    }

    /// Wall-clock duration of the run, once it has ended.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.end_time.map(|end| end - self.start_time)
    }

    /// The subset shown on the live status line.
    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            total_tokens: self.total_tokens,
            estimated_cost: self.estimated_cost,
            model: self.model.clone(),
        }
    }
}

/// Live view of usage, delivered to status reporters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    /// Input tokens so far
    pub input_tokens: u64,
    /// Output tokens so far
    pub output_tokens: u64,
    /// Input plus output
    pub total_tokens: u64,
    /// Estimated cost in USD
    pub estimated_cost: f64,
    /// Model used for pricing
    pub model: String,
}

/// Accounting state for a run: usage counters plus ceiling latches.
#[derive(Debug, Clone)]
pub struct UsageTracker {
    stats: UsageStats,
    options: GuardOptions,
    pricing: PricingEntry,
    state: RunState,
    budget_warned: bool,
    cost_warned: bool,
}

impl UsageTracker {
    /// Create a tracker for `command`.
    ///
    /// The model comes from the options when given, otherwise it is
    /// detected from the command line. Pricing is resolved once here.
    pub fn new(command: impl Into<String>, options: GuardOptions, table: &PricingTable) -> Self {
        let command = command.into();
        let model = options
            .model
            .clone()
            .unwrap_or_else(|| detect_model(&command));
        let pricing = table.lookup(&model);

        Self {
            stats: UsageStats::new(command, model),
            options,
            pricing,
            state: RunState::Starting,
            budget_warned: false,
            cost_warned: false,
        }
    }

    /// Record text sent to the model. Returns the tokens added.
    pub fn record_input(&mut self, text: &str) -> u64 {
        let tokens = estimator::estimate(text);
        self.record_input_tokens(tokens);
        tokens
    }

    /// Record text produced by the wrapped command. Returns the tokens added.
    pub fn record_output(&mut self, text: &str) -> u64 {
        let tokens = estimator::estimate(text);
        self.record_output_tokens(tokens);
        tokens
    }

    /// Record input tokens directly.
    pub fn record_input_tokens(&mut self, tokens: u64) {
        self.stats.input_tokens += tokens;
        self.update_totals();
    }

    /// Record output tokens directly.
    pub fn record_output_tokens(&mut self, tokens: u64) {
        self.stats.output_tokens += tokens;
        self.update_totals();
    }

    fn update_totals(&mut self) {
        self.stats.total_tokens = self.stats.input_tokens + self.stats.output_tokens;
        self.stats.estimated_cost = self
            .pricing
            .calculate_cost(self.stats.input_tokens, self.stats.output_tokens);
    }

    /// Evaluate both ceilings against current usage.
    ///
    /// The budget is checked before the cost limit. Reaching either one
    /// latches its exceeded flag, moves the run to `Terminating` and stops
    /// all further evaluation for the run. A warning fires at most once per
    /// ceiling, and only while usage sits inside
    /// `[warn_percent, warn_percent + 5)`.
    pub fn check_limits(&mut self) -> Vec<LimitEvent> {
        let mut events = Vec::new();
        if self.state != RunState::Running && self.state != RunState::Starting {
            return events;
        }

        if let Some(percent) = self.budget_percent() {
            if percent >= 100.0 {
                self.stats.budget_exceeded = true;
                self.state = RunState::Terminating;
                events.push(LimitEvent::Exceeded {
                    ceiling: Ceiling::Budget,
                    percent,
                });
                return events;
            }
            if !self.budget_warned && self.in_warn_band(percent) {
                self.budget_warned = true;
                events.push(LimitEvent::Warning {
                    ceiling: Ceiling::Budget,
                    percent,
                });
            }
        }

        if let Some(percent) = self.cost_percent() {
            if percent >= 100.0 {
                self.stats.cost_exceeded = true;
                self.state = RunState::Terminating;
                events.push(LimitEvent::Exceeded {
                    ceiling: Ceiling::Cost,
                    percent,
                });
                return events;
            }
            if !self.cost_warned && self.in_warn_band(percent) {
                self.cost_warned = true;
                events.push(LimitEvent::Warning {
                    ceiling: Ceiling::Cost,
                    percent,
                });
            }
        }

        events
    }

    fn in_warn_band(&self, percent: f64) -> bool {
        let warn = self.options.warn_percent;
        percent >= warn && percent < warn + WARN_BAND_WIDTH
    }

    /// Token usage as a percentage of the budget, if one is set.
    pub fn budget_percent(&self) -> Option<f64> {
        self.options
            .effective_budget()
            .map(|budget| self.stats.total_tokens as f64 * 100.0 / budget as f64)
    }

    /// Cost as a percentage of the cost limit, if one is set.
    pub fn cost_percent(&self) -> Option<f64> {
        self.options
            .effective_cost_limit()
            .map(|limit| self.stats.estimated_cost * 100.0 / limit)
    }

    /// Mark the child as launched.
    pub fn mark_running(&mut self) {
        if self.state == RunState::Starting {
            self.state = RunState::Running;
        }
    }

    /// Freeze the stats. The end time is stamped only on the first call.
    pub fn finish(&mut self) {
        if self.stats.end_time.is_none() {
            self.stats.end_time = Some(Utc::now());
        }
        self.state = RunState::Exited;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Usage counters and exceeded flags.
    pub fn stats(&self) -> &UsageStats {
        &self.stats
    }

    /// Options the ceilings are checked against.
    pub fn options(&self) -> &GuardOptions {
        &self.options
    }

    /// Pricing resolved for this run's model.
    pub fn pricing(&self) -> PricingEntry {
        self.pricing
    }

    /// Live view for status reporters.
    pub fn snapshot(&self) -> UsageSnapshot {
        self.stats.snapshot()
    }
}

/// Thread-safe usage tracker shared by the stream pumps and the ticker.
///
/// Every method takes the lock once, so each accounting update is a single
/// critical section.
#[derive(Debug, Clone)]
pub struct SharedUsageTracker {
    inner: Arc<Mutex<UsageTracker>>,
}

impl SharedUsageTracker {
    /// Wrap `tracker` for sharing between tasks.
    pub fn new(tracker: UsageTracker) -> Self {
        Self {
            inner: Arc::new(Mutex::new(tracker)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, UsageTracker> {
        // Counters stay consistent even if a holder panicked mid-update
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record input text.
    pub fn record_input(&self, text: &str) -> u64 {
        self.lock().record_input(text)
    }

    /// Record output text.
    pub fn record_output(&self, text: &str) -> u64 {
        self.lock().record_output(text)
    }

    /// Perform a limit check.
    pub fn check_limits(&self) -> Vec<LimitEvent> {
        self.lock().check_limits()
    }

    /// Mark the child as launched.
    pub fn mark_running(&self) {
        self.lock().mark_running();
    }

    /// Freeze the stats and stamp the end time.
    pub fn finish(&self) {
        self.lock().finish();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunState {
        self.lock().state()
    }

    /// Copy of the full stats record.
    pub fn stats(&self) -> UsageStats {
        self.lock().stats().clone()
    }

    /// Live view for status reporters.
    pub fn snapshot(&self) -> UsageSnapshot {
        self.lock().snapshot()
    }
}

/// ISO-8601 UTC timestamps with millisecond precision.
mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::Serializer;

    pub fn serialize<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::Serializer;

        pub fn serialize<S: Serializer>(
            time: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match time {
                Some(time) => super::serialize(time, serializer),
                None => serializer.serialize_none(),
            }
        }
    }
}
