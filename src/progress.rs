//! Canonical progress notification contract.
//!
//! The object store backend delivers native progress events from its own
//! worker task; [`ProgressBridge`] translates them into the canonical
//! listener calls.  The bridge is `Send + Sync`, keeps its byte accounting
//! in an atomic, and guarantees that exactly one terminal notification is
//! delivered no matter which task observes completion first.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Caller-supplied sink for incremental transfer notifications.
///
/// Callbacks are invoked from the backend's worker task, not the caller's;
/// implementations must not assume a particular thread and should return
/// promptly -- a slow listener stalls the transfer it is observing.
pub trait TransferProgressListener: Send + Sync + 'static {
    /// Bytes moved so far, with the total when known.
    fn transfer_progressed(&self, bytes_transferred: u64, total_bytes: Option<u64>);

    /// The transfer finished successfully.  `checksum` carries the stored
    /// object's entity tag when the backend surfaces one.
    fn transfer_completed(&self, checksum: Option<&str>);

    /// The transfer failed.
    fn transfer_failed(&self, reason: &str);
}

/// Bridge from a backend's native progress events to the canonical
/// listener contract.
pub struct ProgressBridge {
    listener: Arc<dyn TransferProgressListener>,
    transferred: AtomicU64,
    total_bytes: Option<u64>,
    finished: AtomicBool,
}

impl ProgressBridge {
    /// Wrap `listener` for a transfer of `total_bytes` (when known).
    pub fn new(listener: Arc<dyn TransferProgressListener>, total_bytes: Option<u64>) -> Self {
        Self {
            listener,
            transferred: AtomicU64::new(0),
            total_bytes,
            finished: AtomicBool::new(false),
        }
    }

    /// Announce the start of the transfer (zero bytes moved).
    pub fn started(&self) {
        self.listener.transfer_progressed(0, self.total_bytes);
    }

    /// Record `count` more bytes and notify the listener with the
    /// cumulative figure.
    pub fn add_bytes(&self, count: u64) {
        let cumulative = self.transferred.fetch_add(count, Ordering::Relaxed) + count;
        self.listener.transfer_progressed(cumulative, self.total_bytes);
    }

    /// Bytes recorded so far.
    pub fn bytes_transferred(&self) -> u64 {
        self.transferred.load(Ordering::Relaxed)
    }

    /// Deliver the terminal success notification.  No-op if a terminal
    /// notification was already delivered.
    pub fn completed(&self, checksum: Option<&str>) {
        if !self.finished.swap(true, Ordering::SeqCst) {
            self.listener.transfer_completed(checksum);
        }
    }

    /// Deliver the terminal failure notification.  No-op if a terminal
    /// notification was already delivered.
    pub fn failed(&self, reason: &str) {
        if !self.finished.swap(true, Ordering::SeqCst) {
            self.listener.transfer_failed(reason);
        }
    }
}

// -- Tests -------------------------------------------------------------------
