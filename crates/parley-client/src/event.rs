//! Transfer events.

/// Events a transfer worker reports to its owner.
///
/// Every transfer ends with exactly one of [`TransferEvent::Completed`] or
/// [`TransferEvent::Failed`].
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    /// Connection established and size known.
    Started {
        /// Name on the server
        filename: String,
        /// Total bytes to move
        size: u64,
    },

    /// A chunk was moved.
    Progress {
        /// Bytes moved so far
        bytes_moved: u64,
        /// 0 to 100
        percentage: u8,
        /// Formatted rate, e.g. `2.00 KB/s`
        throughput: String,
    },

    /// All bytes moved.
    Completed {
        /// Total bytes moved
        bytes: u64,
    },

    /// Transfer ended early.
    Failed {
        /// Human-readable reason
        reason: String,
    },
}

impl TransferEvent {
    /// True for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}
