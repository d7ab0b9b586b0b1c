//! Run options: ceilings, warning threshold and output settings.

use serde::{Deserialize, Serialize, Serializer};
use std::path::PathBuf;

use crate::error::{GuardError, Result};

/// Default warning threshold, as a percentage of a ceiling.
pub const DEFAULT_WARN_PERCENT: f64 = 80.0;

/// Options for one supervised run.
///
/// Serialized field names match the `options` object of the JSON report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardOptions {
    /// Maximum total tokens (`None` = unlimited)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<u64>,

    /// Maximum estimated cost in USD (`None` = unlimited)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_limit: Option<f64>,

    /// Explicit model for pricing; detected from the command when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Warn when usage reaches this percentage of a ceiling
    #[serde(serialize_with = "serialize_percent")]
    pub warn_percent: f64,

    /// Suppress the live status line and the final report
    #[serde(default)]
    pub quiet: bool,

    /// Where to save the JSON usage report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

/// Whole percentages are written as integers (`80`, not `80.0`).
fn serialize_percent<S: Serializer>(percent: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    if percent.fract() == 0.0 && percent.abs() < 1e15 {
        serializer.serialize_i64(*percent as i64)
    } else {
        serializer.serialize_f64(*percent)
    }
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self {
            budget: None,
            cost_limit: None,
            model: None,
            warn_percent: DEFAULT_WARN_PERCENT,
            quiet: false,
            output: None,
        }
    }
}

impl GuardOptions {
    /// Create options with no ceilings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the token budget.
    pub fn with_budget(mut self, tokens: u64) -> Self {
        self.budget = Some(tokens);
        self
    }

    /// Set the cost limit in USD.
    pub fn with_cost_limit(mut self, usd: f64) -> Self {
        self.cost_limit = Some(usd);
        self
    }

    /// Set the model used for pricing.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the warning threshold percentage.
    pub fn with_warn_percent(mut self, percent: f64) -> Self {
        self.warn_percent = percent;
        self
    }

    /// Enable quiet mode.
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Set the report output path.
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Token budget that is actually enforced. Zero means unlimited.
    pub fn effective_budget(&self) -> Option<u64> {
        self.budget.filter(|&b| b > 0)
    }

    /// Cost limit that is actually enforced. Zero means unlimited.
    pub fn effective_cost_limit(&self) -> Option<f64> {
        self.cost_limit.filter(|&c| c > 0.0)
    }

    /// Check if any ceiling is enforced.
    pub fn is_enabled(&self) -> bool {
        self.effective_budget().is_some() || self.effective_cost_limit().is_some()
    }

    /// Reject options that cannot drive a run.
    ///
    /// A warn percentage outside `(0, 100]` is accepted; it only makes the
    /// warning fire early, late or never.
    pub fn validate(&self) -> Result<()> {
        if let Some(limit) = self.cost_limit {
            if !limit.is_finite() || limit < 0.0 {
                return Err(GuardError::InvalidOptions(format!(
                    "cost limit must be a non-negative number, got {limit}"
                )));
            }
        }

        if !self.warn_percent.is_finite() {
            return Err(GuardError::InvalidOptions(format!(
                "warn percent must be a finite number, got {}",
                self.warn_percent
            )));
        }

        if self.warn_percent <= 0.0 || self.warn_percent > 100.0 {
            tracing::warn!(
                warn_percent = self.warn_percent,
                "warn percent outside (0, 100]; warnings may not fire as expected"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = GuardOptions::default();
        assert_eq!(options.warn_percent, 80.0);
        assert!(options.budget.is_none());
        assert!(!options.quiet);
        assert!(!options.is_enabled());
    }

    #[test]
    fn test_builder_pattern() {
        let options = GuardOptions::new()
            .with_budget(50_000)
            .with_cost_limit(0.5)
            .with_model("gpt-4o")
            .with_warn_percent(50.0)
            .with_quiet(true)
            .with_output("report.json");

        assert_eq!(options.budget, Some(50_000));
        assert_eq!(options.cost_limit, Some(0.5));
        assert_eq!(options.model.as_deref(), Some("gpt-4o"));
        assert_eq!(options.warn_percent, 50.0);
        assert!(options.quiet);
        assert_eq!(options.output, Some(PathBuf::from("report.json")));
        assert!(options.is_enabled());
    }

    #[test]
    fn test_zero_ceilings_are_unlimited() {
        let options = GuardOptions::new().with_budget(0).with_cost_limit(0.0);
        assert_eq!(options.effective_budget(), None);
        assert_eq!(options.effective_cost_limit(), None);
        assert!(!options.is_enabled());
    }

    #[test]
    fn test_validate_rejects_bad_cost_limit() {
        assert!(GuardOptions::new().with_cost_limit(-1.0).validate().is_err());
        assert!(GuardOptions::new()
            .with_cost_limit(f64::NAN)
            .validate()
            .is_err());
        assert!(GuardOptions::new()
            .with_cost_limit(f64::INFINITY)
            .validate()
            .is_err());
        assert!(GuardOptions::new().with_cost_limit(0.25).validate().is_ok());
    }

    #[test]
    fn test_validate_warn_percent() {
        assert!(GuardOptions::new()
            .with_warn_percent(f64::NAN)
            .validate()
            .is_err());
        // Out of range is tolerated
        assert!(GuardOptions::new().with_warn_percent(150.0).validate().is_ok());
        assert!(GuardOptions::new().with_warn_percent(0.0).validate().is_ok());
    }

    #[test]
    fn test_serialized_field_names() {
        let options = GuardOptions::new().with_budget(100).with_cost_limit(1.5);
        let json = serde_json::to_value(&options).unwrap();

        assert_eq!(json["budget"], 100);
        assert_eq!(json["costLimit"], 1.5);
        assert_eq!(json["warnPercent"], 80);
        assert_eq!(json["quiet"], false);
        assert!(json.get("model").is_none());
        assert!(json.get("output").is_none());
    }

    #[test]
    fn test_warn_percent_written_like_saved_reports() {
        let whole = serde_json::to_string(&GuardOptions::new()).unwrap();
        assert!(whole.contains("\"warnPercent\":80"));
        assert!(!whole.contains("80.0"));

        let fractional = serde_json::to_value(GuardOptions::new().with_warn_percent(72.5)).unwrap();
        assert_eq!(fractional["warnPercent"], 72.5);

        let back: GuardOptions = serde_json::from_str(&whole).unwrap();
        assert_eq!(back.warn_percent, 80.0);
    }
}
