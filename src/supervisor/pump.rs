//! Stream pumps: count captured output, pass it through, check limits.

use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::budget::{Ceiling, LimitEvent, SharedUsageTracker};
use crate::report::{StatusReporter, SupervisorEvent};

/// Read buffer size for captured streams.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Which of the child's output streams a pump drains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => f.write_str("stdout"),
            StreamKind::Stderr => f.write_str("stderr"),
        }
    }
}

/// Everything a pump needs besides its two ends.
#[derive(Clone)]
pub struct PumpContext {
    pub tracker: SharedUsageTracker,
    pub reporter: Arc<dyn StatusReporter>,
    /// Requests termination from the task that owns the child
    pub terminate: mpsc::UnboundedSender<Ceiling>,
}

/// Drain `reader` until EOF.
///
/// Every chunk is counted, forwarded unmodified to `sink`, and then checked
/// against the ceilings. Returns the number of bytes read. A failing sink
/// stops forwarding but not counting.
pub async fn pump<R, W>(kind: StreamKind, mut reader: R, mut sink: W, ctx: PumpContext) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    let mut forwarding = true;

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                warn!(stream = %kind, error = %err, "read from child failed");
                break;
            }
        };
        total += n as u64;
        let chunk = &buf[..n];

        let tokens = ctx.tracker.record_output(&String::from_utf8_lossy(chunk));
        debug!(stream = %kind, bytes = n, tokens, "chunk counted");

        if forwarding {
            if let Err(err) = forward(&mut sink, chunk).await {
                debug!(stream = %kind, error = %err, "pass-through stopped");
                forwarding = false;
            }
        }

        for event in ctx.tracker.check_limits() {
            match event {
                LimitEvent::Warning { ceiling, percent } => {
                    info!(%ceiling, percent, "approaching ceiling");
                    ctx.reporter
                        .event(&SupervisorEvent::Warning { ceiling, percent });
                }
                LimitEvent::Exceeded { ceiling, percent } => {
                    info!(%ceiling, percent, "ceiling reached, terminating child");
                    ctx.reporter
                        .event(&SupervisorEvent::CeilingReached { ceiling, percent });
                    // The receiver is gone once the child has been reaped
                    let _ = ctx.terminate.send(ceiling);
                }
            }
        }
    }

    debug!(stream = %kind, bytes = total, "stream closed");
    total
}

async fn forward<W: AsyncWrite + Unpin>(sink: &mut W, chunk: &[u8]) -> std::io::Result<()> {
    sink.write_all(chunk).await?;
    sink.flush().await
}
