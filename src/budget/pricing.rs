//! Model pricing and cost calculation.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Key of the fallback entry used when no model name matches.
pub const DEFAULT_MODEL: &str = "default";

/// Cost per one million tokens, in USD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingEntry {
    /// Cost per 1M input tokens
    pub input: f64,
    /// Cost per 1M output tokens
    pub output: f64,
}

impl PricingEntry {
    pub const fn new(input: f64, output: f64) -> Self {
        Self { input, output }
    }

    /// Calculate cost for given token counts.
    pub fn calculate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        let input_cost = (input_tokens as f64 / 1_000_000.0) * self.input;
        let output_cost = (output_tokens as f64 / 1_000_000.0) * self.output;
        input_cost + output_cost
    }
}

/// Built-in prices (as of Jan 2026).
///
/// Lookup takes the first key contained in the model name, so longer keys
/// must come before any key they contain.
const BUILTIN_PRICING: &[(&str, PricingEntry)] = &[
    // Claude models
    ("claude-opus-4-5", PricingEntry::new(15.00, 75.00)),
    ("claude-opus-4", PricingEntry::new(15.00, 75.00)),
    ("claude-sonnet-4", PricingEntry::new(3.00, 15.00)),
    ("claude-3-opus", PricingEntry::new(15.00, 75.00)),
    ("claude-3-sonnet", PricingEntry::new(3.00, 15.00)),
    ("claude-3-haiku", PricingEntry::new(0.25, 1.25)),
    // OpenAI models
    ("gpt-4o", PricingEntry::new(2.50, 10.00)),
    ("gpt-4-turbo", PricingEntry::new(10.00, 30.00)),
    ("gpt-4", PricingEntry::new(30.00, 60.00)),
    ("gpt-3.5-turbo", PricingEntry::new(0.50, 1.50)),
    ("o1", PricingEntry::new(15.00, 60.00)),
    ("o1-mini", PricingEntry::new(3.00, 12.00)),
    // Sonnet-level pricing for anything unrecognised
    (DEFAULT_MODEL, PricingEntry::new(3.00, 15.00)),
];

/// Ordered table of model prices.
///
/// Built once at startup and shared by reference; nothing mutates it after
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingTable {
    entries: Vec<(String, PricingEntry)>,
    fallback: PricingEntry,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PricingTable {
    /// The built-in table.
    pub fn builtin() -> Self {
        let entries: Vec<(String, PricingEntry)> = BUILTIN_PRICING
            .iter()
            .map(|(key, entry)| (key.to_string(), *entry))
            .collect();
        let fallback = entry_for_key(&entries, DEFAULT_MODEL)
            .unwrap_or(PricingEntry::new(3.00, 15.00));
        Self { entries, fallback }
    }

    /// Apply user-configured prices on top of this table.
    ///
    /// A key already in the table keeps its position and takes the new
    /// prices. Unknown keys are scanned before every existing entry.
    pub fn with_overrides(mut self, models: &BTreeMap<String, PricingEntry>) -> Self {
        let mut added = Vec::new();
        for (key, entry) in models {
            match self.entries.iter_mut().find(|(k, _)| k == key) {
                Some(existing) => existing.1 = *entry,
                None => added.push((key.clone(), *entry)),
            }
        }
        added.append(&mut self.entries);
        self.entries = added;
        self.fallback = entry_for_key(&self.entries, DEFAULT_MODEL).unwrap_or(self.fallback);
        self
    }

    /// Find the pricing for a model name.
    ///
    /// Matching is case-insensitive and treats `_` and `-` as the same
    /// separator. Falls back to the `default` entry.
    pub fn lookup(&self, model: &str) -> PricingEntry {
        let name = normalize(model);
        self.entries
            .iter()
            .find(|(key, _)| name.contains(&*normalize(key)))
            .map(|(_, entry)| *entry)
            .unwrap_or(self.fallback)
    }

    /// Estimated USD cost of the given usage for `model`.
    pub fn cost(&self, input_tokens: u64, output_tokens: u64, model: &str) -> f64 {
        self.lookup(model).calculate_cost(input_tokens, output_tokens)
    }

    /// Model keys in scan order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }
}

fn entry_for_key(entries: &[(String, PricingEntry)], key: &str) -> Option<PricingEntry> {
    entries.iter().find(|(k, _)| k == key).map(|(_, e)| *e)
}

fn normalize(name: &str) -> Cow<'_, str> {
    if name.bytes().any(|b| b == b'_' || b.is_ascii_uppercase()) || !name.is_ascii() {
        Cow::Owned(name.to_lowercase().replace('_', "-"))
    } else {
        Cow::Borrowed(name)
    }
}

/// Guess the model from the wrapped command line.
pub fn detect_model(command: &str) -> String {
    let command = command.to_lowercase();

    let model = if command.contains("claude") {
        if command.contains("opus") {
            "claude-opus-4"
        } else if command.contains("haiku") {
            "claude-3-haiku"
        } else {
            "claude-sonnet-4"
        }
    } else if command.contains("aider") {
        // Aider's default backend varies; sonnet is the common case
        "claude-sonnet-4"
    } else if command.contains("gpt-4") || command.contains("openai") {
        "gpt-4o"
    } else {
        DEFAULT_MODEL
    };

    model.to_string()
}
