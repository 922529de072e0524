//! Broadcast fan-out.

use bytes::Bytes;
use parley_core::ConnectionId;
use tokio::sync::mpsc::error::TrySendError;

use crate::registry::Outbound;

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Queues the message was placed in
    pub delivered: usize,
    /// Queues that were full or already closed
    pub dropped: usize,
}

/// Enqueue `bytes` to each target in order without waiting.
///
/// A full queue means that peer is not keeping up; it misses this message.
/// A closed queue belongs to a connection that is being torn down.
pub fn fan_out(targets: &[(ConnectionId, Outbound)], bytes: &Bytes) -> BroadcastReport {
    let mut report = BroadcastReport::default();

    for (id, outbound) in targets {
        match outbound.try_send(bytes.clone()) {
            Ok(()) => report.delivered += 1,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    conn = %id,
                    len = bytes.len(),
                    "outbound queue full, dropping broadcast"
                );
                report.dropped += 1;
            },
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(conn = %id, "outbound queue closed, skipping");
                report.dropped += 1;
            },
        }
    }

    report
}
