//! token-guard: monitor and limit the token usage of AI coding assistants.
//!
//! The wrapped command runs as a child process. Everything it writes is
//! estimated in tokens, priced for the detected model, and passed through
//! unchanged. When a token budget or cost limit is reached the child is
//! terminated.
//!
//! - [`budget`]: estimation, pricing, options and the usage tracker
//! - [`supervisor`]: launching, pumping and terminating the child
//! - [`report`]: live status, terminal rendering and JSON reports
//! - [`config`]: persistent defaults from `.token-guard.json`

pub mod budget;
pub mod config;
pub mod error;
pub mod logging;
pub mod report;
pub mod supervisor;

pub use budget::{GuardOptions, PricingTable, UsageStats};
pub use error::{GuardError, Result};
pub use report::{RunReport, StatusReporter, SupervisorEvent};
pub use supervisor::{RunOutcome, Supervisor};
