//! Process supervision for token-guard.
//!
//! A [`Supervisor`] launches the wrapped command with stdin inherited and
//! stdout/stderr captured, counts every chunk the child writes, passes the
//! bytes through unchanged, and terminates the child once a ceiling is
//! reached.
//!
//! # Overview
//!
//! One run moves through `Starting → Running → Terminating → Exited`:
//! - **pump**: one task per captured stream, feeding the shared tracker
//! - **ticker**: periodic status notifications while the run is live
//! - **signal**: graceful termination of the child
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use token_guard::budget::{GuardOptions, PricingTable};
//! use token_guard::report::RecordingReporter;
//! use token_guard::supervisor::Supervisor;
//!
//! # async fn demo() -> token_guard::Result<()> {
//! let table = PricingTable::builtin();
//! let options = GuardOptions::new().with_budget(50_000);
//! let argv = vec!["claude".to_string(), "explain this codebase".to_string()];
//!
//! let supervisor = Supervisor::new(argv, options, &table, Arc::new(RecordingReporter::new()))?;
//! let outcome = supervisor.run().await?;
//! println!("exit code {}", outcome.exit_code());
//! # Ok(())
//! # }
//! ```

pub mod pump;
pub mod signal;
pub mod ticker;

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::budget::{Ceiling, GuardOptions, PricingTable, RunState, SharedUsageTracker, UsageStats, UsageTracker};
use crate::error::{GuardError, Result};
use crate::report::{RunReport, StatusReporter, SupervisorEvent};

pub use pump::{PumpContext, StreamKind, CHUNK_SIZE};
pub use ticker::{StatusTicker, STATUS_INTERVAL};

/// Destination for the child's passed-through output.
pub type OutputSink = Pin<Box<dyn AsyncWrite + Send>>;

/// How a supervised run ended.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The child ran and exited; the report is final.
    Exited(RunReport),
    /// The child could not be started.
    LaunchFailed {
        message: String,
        stats: UsageStats,
    },
}

impl RunOutcome {
    /// Process exit code for the caller: the child's own code, or `1` when
    /// the child never started.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Exited(report) => report.exit_code,
            RunOutcome::LaunchFailed { .. } => 1,
        }
    }

    /// The final report, when the child actually ran.
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            RunOutcome::Exited(report) => Some(report),
            RunOutcome::LaunchFailed { .. } => None,
        }
    }

    /// Usage stats of the run, frozen at exit.
    pub fn stats(&self) -> &UsageStats {
        match self {
            RunOutcome::Exited(report) => &report.stats,
            RunOutcome::LaunchFailed { stats, .. } => stats,
        }
    }
}

/// Supervises one run of a wrapped command.
pub struct Supervisor {
    argv: Vec<String>,
    options: GuardOptions,
    tracker: SharedUsageTracker,
    reporter: Arc<dyn StatusReporter>,
    stdout: OutputSink,
    stderr: OutputSink,
    status_interval: Duration,
}

impl Supervisor {
    /// Prepare a run of `argv`.
    ///
    /// The options are validated and the model is resolved here, once.
    /// `argv[0]` is the program; the rest are passed to it verbatim.
    pub fn new(
        argv: Vec<String>,
        options: GuardOptions,
        table: &PricingTable,
        reporter: Arc<dyn StatusReporter>,
    ) -> Result<Self> {
        options.validate()?;
        if argv.is_empty() {
            return Err(GuardError::InvalidOptions("no command specified".to_string()));
        }

        let command = argv.join(" ");
        let tracker = UsageTracker::new(command, options.clone(), table);
        debug!(model = %tracker.stats().model, pricing = ?tracker.pricing(), "model resolved");

        Ok(Self {
            argv,
            options,
            tracker: SharedUsageTracker::new(tracker),
            reporter,
            stdout: Box::pin(tokio::io::stdout()),
            stderr: Box::pin(tokio::io::stderr()),
            status_interval: STATUS_INTERVAL,
        })
    }

    /// Send the child's output somewhere other than our own stdout/stderr.
    pub fn with_output_sinks(mut self, stdout: OutputSink, stderr: OutputSink) -> Self {
        self.stdout = stdout;
        self.stderr = stderr;
        self
    }

    /// Change how often the status reporter is notified.
    pub fn with_status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = interval;
        self
    }

    /// Handle to the live accounting state.
    pub fn tracker(&self) -> SharedUsageTracker {
        self.tracker.clone()
    }

    /// Copy of the current usage stats.
    pub fn stats(&self) -> UsageStats {
        self.tracker.stats()
    }

    pub fn state(&self) -> RunState {
        self.tracker.state()
    }

    /// Run the child to completion.
    ///
    /// Resolves only after the child has exited and both of its output
    /// streams are drained, or after an interrupt once the child is gone.
    /// A launch failure is returned as
    /// [`RunOutcome::LaunchFailed`], not as an error.
    pub async fn run(self) -> Result<RunOutcome> {
        let Self {
            argv,
            options,
            tracker,
            reporter,
            stdout,
            stderr,
            status_interval,
        } = self;

        let mut child = match spawn(&argv) {
            Ok(child) => child,
            Err(err) => {
                info!(error = %err, "launch failed");
                tracker.finish();
                let message = err.to_string();
                reporter.event(&SupervisorEvent::LaunchFailed {
                    message: message.clone(),
                });
                return Ok(RunOutcome::LaunchFailed {
                    message,
                    stats: tracker.stats(),
                });
            }
        };

        tracker.mark_running();
        let command = argv.join(" ");
        // The command line carries the prompt; count it as input
        tracker.record_input(&command);
        info!(pid = ?child.id(), command = %command, "child started");
        reporter.event(&SupervisorEvent::Started {
            pid: child.id(),
            command,
            model: tracker.stats().model,
        });

        let ticker = (!options.quiet).then(|| {
            StatusTicker::start(
                tracker.clone(),
                Arc::clone(&reporter),
                options.clone(),
                status_interval,
            )
        });

        let (terminate_tx, mut terminate_rx) = mpsc::unbounded_channel();
        let ctx = PumpContext {
            tracker: tracker.clone(),
            reporter: Arc::clone(&reporter),
            terminate: terminate_tx,
        };
        let mut pumps: Vec<JoinHandle<u64>> = Vec::with_capacity(2);
        if let Some(out) = child.stdout.take() {
            pumps.push(tokio::spawn(pump::pump(StreamKind::Stdout, out, stdout, ctx.clone())));
        }
        if let Some(err) = child.stderr.take() {
            pumps.push(tokio::spawn(pump::pump(StreamKind::Stderr, err, stderr, ctx.clone())));
        }
        drop(ctx);

        let mut watch_interrupt = true;
        let status = loop {
            tokio::select! {
                status = child.wait() => break status,
                Some(ceiling) = terminate_rx.recv() => request_termination(&mut child, ceiling),
                res = tokio::signal::ctrl_c(), if watch_interrupt => {
                    // The child shares our process group and got the same
                    // interrupt; keep waiting so it is reaped and reported.
                    match res {
                        Ok(()) => debug!("interrupt received, waiting for child to exit"),
                        Err(err) => {
                            warn!(error = %err, "cannot listen for interrupts");
                            watch_interrupt = false;
                        }
                    }
                }
            }
        };
        drop(terminate_rx);

        // A grandchild may still hold the pipes open; an interrupt ends the wait
        if drain_pumps(pumps, interrupted()).await {
            info!("interrupted while draining child output");
        }

        if let Some(ticker) = ticker {
            ticker.stop().await;
        }
        tracker.finish();

        let status = status?;
        let exit_code = status.code().unwrap_or(0);
        info!(exit_code, %status, "child exited");
        reporter.event(&SupervisorEvent::Exited { exit_code });

        Ok(RunOutcome::Exited(RunReport {
            stats: tracker.stats(),
            options,
            exit_code,
        }))
    }
}

fn spawn(argv: &[String]) -> Result<Child> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| GuardError::InvalidOptions("no command specified".to_string()))?;

    Command::new(program)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| GuardError::Launch {
            program: program.clone(),
            source,
        })
}

/// Wait for every pump to reach EOF, or for `interrupt` to resolve.
///
/// On interrupt the remaining pumps are aborted and `true` is returned.
async fn drain_pumps<F>(pumps: Vec<JoinHandle<u64>>, interrupt: F) -> bool
where
    F: Future<Output = ()>,
{
    let aborts: Vec<AbortHandle> = pumps.iter().map(JoinHandle::abort_handle).collect();
    let join_all = async move {
        for handle in pumps {
            match handle.await {
                Ok(_) => {}
                Err(err) if err.is_cancelled() => {}
                Err(err) => warn!(error = %err, "stream pump failed"),
            }
        }
    };

    tokio::select! {
        _ = join_all => false,
        _ = interrupt => {
            for abort in &aborts {
                abort.abort();
            }
            true
        }
    }
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        debug!(error = %err, "cannot listen for interrupts");
        std::future::pending::<()>().await;
    }
}

fn request_termination(child: &mut Child, ceiling: Ceiling) {
    info!(%ceiling, pid = ?child.id(), "terminating child");
    if let Err(err) = signal::terminate(child) {
        error!(error = %err, "failed to signal child");
    }
}
