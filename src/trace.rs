//! Per-batch storage for the solver states observed during one forward pass.

use std::cell::RefCell;
use std::rc::Rc;

use nalgebra::DMatrix;

/// Ordered sequence of internal solver states captured for the current batch.
///
/// Each snapshot is a `(batch_size, feature_dim)` matrix with one row per
/// sample. The trace never spans two batches: it is cleared when a batch
/// starts and drained when the batch's diagnostics are computed.
#[derive(Clone, Debug, Default)]
pub struct StateTrace {
    snapshots: Vec<DMatrix<f64>>,
}

impl StateTrace {
    /// Creates an empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a snapshot in execution order.
    pub fn push(&mut self, state: DMatrix<f64>) {
        self.snapshots.push(state);
    }

    /// Discards every recorded snapshot.
    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    /// Number of snapshots recorded so far.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether the trace holds no snapshots.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Read-only view of the recorded snapshots.
    pub fn snapshots(&self) -> &[DMatrix<f64>] {
        &self.snapshots
    }

    /// Drains the trace, handing the snapshots to the caller and leaving the
    /// trace empty for the next batch.
    pub fn take(&mut self) -> Vec<DMatrix<f64>> {
        std::mem::take(&mut self.snapshots)
    }
}

/// Shared handle to a [`StateTrace`].
///
/// The orchestrator owns the trace and the recorder probe appends through a
/// clone of this handle. Recording is single threaded relative to the host
/// loop (one trace per batch execution context), so the handle is a plain
/// `Rc<RefCell<_>>` and intentionally neither `Send` nor `Sync`.
#[derive(Clone, Debug, Default)]
pub struct SharedTrace {
    inner: Rc<RefCell<StateTrace>>,
}

impl SharedTrace {
    /// Creates a handle to a fresh, empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a snapshot to the underlying trace.
    pub fn push(&self, state: DMatrix<f64>) {
        self.inner.borrow_mut().push(state);
    }

    /// Discards every recorded snapshot.
    pub fn clear(&self) {
        self.inner.borrow_mut().clear();
    }

    /// Number of snapshots recorded so far.
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    /// Whether the underlying trace holds no snapshots.
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    /// Drains the underlying trace, leaving it empty for the next batch.
    pub fn take(&self) -> Vec<DMatrix<f64>> {
        self.inner.borrow_mut().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(value: f64) -> DMatrix<f64> {
        DMatrix::from_element(2, 3, value)
    }

    #[test]
    fn push_preserves_execution_order() {
        let mut trace = StateTrace::new();
        trace.push(snapshot(1.0));
        trace.push(snapshot(2.0));
        trace.push(snapshot(3.0));

        assert_eq!(trace.len(), 3);
        let values: Vec<f64> = trace.snapshots().iter().map(|s| s[(0, 0)]).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn take_drains_and_resets() {
        let mut trace = StateTrace::new();
        trace.push(snapshot(1.0));
        trace.push(snapshot(2.0));

        let drained = trace.take();
        assert_eq!(drained.len(), 2);
        assert!(trace.is_empty());
    }

    #[test]
    fn shared_handles_see_the_same_trace() {
        let trace = SharedTrace::new();
        let probe_side = trace.clone();

        probe_side.push(snapshot(4.0));
        assert_eq!(trace.len(), 1);

        trace.clear();
        assert!(probe_side.is_empty());
    }
}
