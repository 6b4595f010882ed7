//! Toggleable recording of the solver's intermediate states.

use nalgebra::DMatrix;

use crate::solver::{ObservableSolver, StepObserver};
use crate::trace::SharedTrace;

/// Step observer that clones every observed state into a shared trace.
#[derive(Clone, Debug)]
pub struct TraceProbe {
    trace: SharedTrace,
}

impl TraceProbe {
    /// Creates a probe that appends to the trace behind `trace`.
    pub fn new(trace: SharedTrace) -> Self {
        Self { trace }
    }
}

impl StepObserver for TraceProbe {
    fn on_step(&mut self, state: &DMatrix<f64>) {
        self.trace.push(state.clone_owned());
    }
}

/// Recording toggle bound to one per-batch trace.
///
/// While enabled, every intermediate state the solver produces is appended
/// to the trace in execution order; the solver's own computation is
/// untouched. Disabling removes the probe and is idempotent: disabling
/// twice, or without a prior enable, does nothing and leaves the trace
/// intact for the next batch.
#[derive(Clone, Debug)]
pub struct Recorder {
    trace: SharedTrace,
}

impl Recorder {
    /// Binds a recorder to the shared per-batch trace.
    pub fn new(trace: SharedTrace) -> Self {
        Self { trace }
    }

    /// Handle to the trace this recorder appends to.
    pub fn trace(&self) -> &SharedTrace {
        &self.trace
    }

    /// Starts recording by installing a probe as the solver's step observer.
    pub fn enable(&self, solver: &mut dyn ObservableSolver) {
        solver.set_step_observer(Box::new(TraceProbe::new(self.trace.clone())));
        log::debug!("state recording enabled");
    }

    /// Stops recording. Returns whether a probe was actually installed.
    pub fn disable(&self, solver: &mut dyn ObservableSolver) -> bool {
        let removed = solver.clear_step_observer();
        if removed {
            log::debug!("state recording disabled ({} snapshot(s))", self.trace.len());
        }
        removed
    }
}
