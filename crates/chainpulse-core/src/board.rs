//! In-memory status board shared between the checkers and the web frontend.
//!
//! Each widget owns one [`StatusCell`]: the latest snapshot, the latest
//! error, and a loading flag. Cells follow the lifecycle
//! `Loading -> {Success, Error} -> Loading -> ...` and hold no history.
//!
//! A closed cell silently drops every further write. Checker cycles that
//! resolve after teardown therefore land in a no-op instead of a stale
//! update.

use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Snapshot of a cell as the web layer reads it.
#[derive(Debug, Clone)]
pub struct CellState<T> {
    pub snapshot: Option<T>,
    pub error: Option<String>,
    pub loading: bool,
}

struct CellInner<T> {
    state: CellState<T>,
    closed: bool,
}

/// Shared handle to one widget's state. Cheap to clone.
pub struct StatusCell<T> {
    inner: Arc<RwLock<CellInner<T>>>,
}

impl<T> Clone for StatusCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> StatusCell<T> {
    /// A fresh cell starts out loading, matching the first render before
    /// any poll has completed.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(CellInner {
                state: CellState {
                    snapshot: None,
                    error: None,
                    loading: true,
                },
                closed: false,
            })),
        }
    }

    /// Mark the start of a poll cycle. Interval ticks and manual refreshes
    /// share this flag; whichever cycle finishes last clears it.
    pub async fn begin_cycle(&self) {
        let mut inner = self.inner.write().await;
        if inner.closed {
            return;
        }
        inner.state.loading = true;
    }

    /// Publish a successful snapshot, clearing any previous error.
    pub async fn publish(&self, snapshot: T) {
        let mut inner = self.inner.write().await;
        if inner.closed {
            return;
        }
        inner.state.snapshot = Some(snapshot);
        inner.state.error = None;
        inner.state.loading = false;
    }

    /// Record a failed cycle. The previous snapshot is left in place, so a
    /// transient failure degrades to a stale display rather than a blank
    /// one.
    pub async fn publish_error(&self, message: String) {
        let mut inner = self.inner.write().await;
        if inner.closed {
            return;
        }
        inner.state.error = Some(message);
        inner.state.loading = false;
    }

    pub async fn read(&self) -> CellState<T> {
        self.inner.read().await.state.clone()
    }

    /// Tear the cell down. In-flight cycles are not aborted; their late
    /// writes are simply ignored.
    pub async fn close(&self) {
        self.inner.write().await.closed = true;
    }
}

impl<T: Clone> Default for StatusCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Create the manual-refresh channel connecting the web frontend to the
/// RPC checker. The buffer is small on purpose: a burst of refresh clicks
/// collapses into at most a handful of queued cycles.
pub fn refresh_channel() -> (RefreshHandle, mpsc::Receiver<()>) {
    let (tx, rx) = mpsc::channel(8);
    (RefreshHandle(tx), rx)
}

/// Sender half of the refresh channel, held by the web frontend.
#[derive(Clone)]
pub struct RefreshHandle(mpsc::Sender<()>);

impl RefreshHandle {
    /// Request an immediate poll cycle. Returns false when no checker is
    /// listening (checker role disabled or already shut down).
    pub fn request(&self) -> bool {
        self.0.try_send(()).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_cell_starts_loading() {
        let cell: StatusCell<u64> = StatusCell::new();
        let state = cell.read().await;
        assert!(state.loading);
        assert!(state.snapshot.is_none());
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn publish_clears_error_and_loading() {
        let cell: StatusCell<u64> = StatusCell::new();
        cell.publish_error("boom".into()).await;
        cell.begin_cycle().await;
        cell.publish(7).await;

        let state = cell.read().await;
        assert_eq!(state.snapshot, Some(7));
        assert!(state.error.is_none());
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn error_keeps_previous_snapshot() {
        let cell: StatusCell<u64> = StatusCell::new();
        cell.publish(7).await;
        cell.publish_error("explorer unreachable".into()).await;

        let state = cell.read().await;
        assert_eq!(state.snapshot, Some(7));
        assert_eq!(state.error.as_deref(), Some("explorer unreachable"));
    }

    #[tokio::test]
    async fn closed_cell_ignores_late_writes() {
        let cell: StatusCell<u64> = StatusCell::new();
        cell.publish(7).await;
        cell.close().await;

        cell.begin_cycle().await;
        cell.publish(8).await;
        cell.publish_error("late".into()).await;

        let state = cell.read().await;
        assert_eq!(state.snapshot, Some(7));
        assert!(state.error.is_none());
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn refresh_request_fails_without_listener() {
        let (handle, rx) = refresh_channel();
        assert!(handle.request());
        drop(rx);
        assert!(!handle.request());
    }
}
