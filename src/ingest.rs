//! Stream reader: tees every input line and forwards extracted snapshots.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, trace};

use crate::handoff;
use crate::record::Snapshot;

/// Per-run reader counters, reported when the stream ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Lines read from the input.
    pub lines: u64,
    /// Lines that passed classification.
    pub candidates: u64,
    /// Candidates that yielded a snapshot.
    pub snapshots: u64,
    /// Snapshots taken by the publisher.
    pub delivered: u64,
}

/// Read `input` to the end, echoing each line to `output` verbatim.
///
/// Every line is written and flushed before classification. Snapshots are
/// handed to the publisher one at a time; once the publisher is gone the
/// reader keeps echoing but stops extracting. A read error ends the stream.
pub async fn run<R, W>(
    mut input: R,
    mut output: W,
    tx: handoff::Sender<Snapshot>,
) -> Result<IngestStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stats = IngestStats::default();
    let mut buf = Vec::with_capacity(512);
    let mut publishing = true;

    loop {
        buf.clear();
        let n = match input.read_until(b'\n', &mut buf).await {
            Ok(n) => n,
            Err(e) => {
                error!(error = %e, "reading input stream");
                break;
            }
        };
        if n == 0 {
            break;
        }
        stats.lines += 1;

        output.write_all(&buf).await.context("writing pass-through")?;
        output.flush().await.context("flushing pass-through")?;

        if !publishing {
            continue;
        }

        let Ok(line) = std::str::from_utf8(&buf) else {
            trace!(line = stats.lines, "skipping non-UTF-8 line");
            continue;
        };

        let snapshot = match Snapshot::from_line(line) {
            Ok(snapshot) => snapshot,
            Err(crate::record::ExtractError::NotCandidate) => {
                trace!(line = stats.lines, "skipping non-interval line");
                continue;
            }
            Err(e) => {
                stats.candidates += 1;
                debug!(line = stats.lines, error = %e, "dropping malformed interval line");
                continue;
            }
        };
        stats.candidates += 1;
        stats.snapshots += 1;

        if tx.send(snapshot).await.is_err() {
            info!("publisher stopped, continuing pass-through only");
            publishing = false;
            continue;
        }
        stats.delivered += 1;
    }

    debug!(
        lines = stats.lines,
        candidates = stats.candidates,
        snapshots = stats.snapshots,
        delivered = stats.delivered,
        "input stream ended",
    );

    Ok(stats)
}
