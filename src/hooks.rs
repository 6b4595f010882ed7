//! Lifecycle hooks tying recording, analysis, and metric logging to the
//! train/validation/test phases of a host loop.

use crate::analysis::{analyze, BatchDiagnostics};
use crate::error::{MonitorError, Result};
use crate::metrics::{MetricSink, DID_NOT_CONVERGE, TIME_TO_CONVERGENCE};
use crate::options::MonitorOptions;
use crate::recorder::Recorder;
use crate::solver::ObservableSolver;
use crate::trace::SharedTrace;

/// Execution phase of the host loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Fitting batches; metrics are logged under their base names.
    Train,
    /// Validation batches; metric names carry a `val ` prefix.
    Validation,
    /// Test batches; metric names carry a `test/` prefix.
    Test,
}

impl Phase {
    /// Maps a base metric name to the name logged during this phase.
    ///
    /// Training logs the base name unchanged; validation and test apply the
    /// host's naming convention for their phase. These strings are a
    /// compatibility surface and must not drift.
    pub fn metric_name(self, base: &str) -> String {
        match self {
            Phase::Train => base.to_string(),
            Phase::Validation => format!("val {base}"),
            Phase::Test => format!("test/{base}"),
        }
    }
}

/// Installation-ordered record of the host loop's callbacks.
///
/// Hosts register each callback name in the order they install them; the
/// monitor validates its own position at phase start instead of trusting a
/// positional convention.
#[derive(Clone, Debug, Default)]
pub struct CallbackRegistry {
    names: Vec<String>,
}

impl CallbackRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a callback name in installation order.
    pub fn register(&mut self, name: impl Into<String>) {
        self.names.push(name.into());
    }

    /// Position of `name` in installation order, if registered.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|registered| registered == name)
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no callbacks are registered.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Per-batch convergence monitor.
///
/// Owns the shared state trace, the recorder bound to it, and the metric
/// sink. Around every batch it clears the trace, records the solver's
/// intermediate states, analyzes them, and logs two scalars under
/// phase-qualified names. Recording must be the first thing that touches the
/// solver each batch, so the monitor must be the host's first registered
/// callback; [`on_fit_start`](ConvergenceMonitor::on_fit_start) enforces
/// this before any batch runs.
pub struct ConvergenceMonitor<S: MetricSink> {
    options: MonitorOptions,
    recorder: Recorder,
    sink: S,
}

impl<S: MetricSink> ConvergenceMonitor<S> {
    /// Name under which the monitor must be registered with the host loop.
    pub const NAME: &'static str = "time-to-convergence";

    /// Creates a monitor with default options.
    pub fn new(sink: S) -> Self {
        Self::with_options(sink, MonitorOptions::default())
    }

    /// Creates a monitor with explicit options.
    pub fn with_options(sink: S, options: MonitorOptions) -> Self {
        Self {
            options,
            recorder: Recorder::new(SharedTrace::new()),
            sink,
        }
    }

    /// Accessor for the metric sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consumes the monitor, handing back the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Accessor for the monitor configuration.
    pub fn options(&self) -> &MonitorOptions {
        &self.options
    }

    fn start_phase(&mut self, registry: &CallbackRegistry) -> Result<()> {
        match registry.position(Self::NAME) {
            Some(0) => {
                self.recorder.trace().clear();
                Ok(())
            }
            Some(position) => Err(MonitorError::HookNotFirst {
                position,
                registered: registry.len(),
            }),
            None => Err(MonitorError::HookNotRegistered { name: Self::NAME }),
        }
    }

    fn start_batch(&mut self, solver: &mut dyn ObservableSolver, batch_index: usize) {
        self.recorder.trace().clear();
        self.recorder.enable(solver);
        log::debug!("recording solver states for batch {batch_index}");
    }

    fn finish_batch(
        &mut self,
        solver: &mut dyn ObservableSolver,
        phase: Phase,
    ) -> Result<BatchDiagnostics> {
        self.recorder.disable(solver);
        let snapshots = self.recorder.trace().take();
        let report = analyze(
            snapshots,
            self.options.convergence_threshold,
            solver.damping_factor(),
        )?;
        self.sink
            .log(&phase.metric_name(DID_NOT_CONVERGE), report.did_not_converge);
        self.sink.log(
            &phase.metric_name(TIME_TO_CONVERGENCE),
            report.time_to_convergence,
        );
        Ok(report)
    }

    /// Training-phase start. Verifies the monitor is the host's first
    /// registered callback and resets the trace; any other position is a
    /// fatal configuration error raised before any batch runs.
    pub fn on_fit_start(&mut self, registry: &CallbackRegistry) -> Result<()> {
        self.start_phase(registry)
    }

    /// Clears the trace and starts recording for a training batch.
    pub fn on_train_batch_start(
        &mut self,
        solver: &mut dyn ObservableSolver,
        batch_index: usize,
    ) {
        self.start_batch(solver, batch_index);
    }

    /// Stops recording, analyzes the batch, and logs the training metrics.
    pub fn on_train_batch_end(
        &mut self,
        solver: &mut dyn ObservableSolver,
        _batch_index: usize,
    ) -> Result<BatchDiagnostics> {
        self.finish_batch(solver, Phase::Train)
    }

    /// Validation-phase start; same checks as training.
    pub fn on_validation_start(&mut self, registry: &CallbackRegistry) -> Result<()> {
        self.start_phase(registry)
    }

    /// Starts recording for a validation batch.
    pub fn on_validation_batch_start(
        &mut self,
        solver: &mut dyn ObservableSolver,
        batch_index: usize,
        _dataloader_index: usize,
    ) {
        self.start_batch(solver, batch_index);
    }

    /// Finishes a validation batch under validation metric names.
    pub fn on_validation_batch_end(
        &mut self,
        solver: &mut dyn ObservableSolver,
        _batch_index: usize,
        _dataloader_index: usize,
    ) -> Result<BatchDiagnostics> {
        self.finish_batch(solver, Phase::Validation)
    }

    /// Test-phase start; same checks as training.
    pub fn on_test_start(&mut self, registry: &CallbackRegistry) -> Result<()> {
        self.start_phase(registry)
    }

    /// Starts recording for a test batch.
    pub fn on_test_batch_start(
        &mut self,
        solver: &mut dyn ObservableSolver,
        batch_index: usize,
        _dataloader_index: usize,
    ) {
        self.start_batch(solver, batch_index);
    }

    /// Finishes a test batch under test metric names.
    pub fn on_test_batch_end(
        &mut self,
        solver: &mut dyn ObservableSolver,
        _batch_index: usize,
        _dataloader_index: usize,
    ) -> Result<BatchDiagnostics> {
        self.finish_batch(solver, Phase::Test)
    }
}
