//! Per-batch convergence diagnostics for deep-equilibrium style fixed-point
//! solvers.
//!
//! A deep-equilibrium model computes its output by iterating an internal map
//! until successive states stabilize. This crate instruments that iteration
//! during training, validation, and testing, and reports two scalars per
//! batch: how many samples failed to converge within the allotted steps, and
//! an estimated continuous-time "time to convergence" in units of the
//! equivalent forward-Euler step. It offers tools to
//!
//! - record the ordered intermediate states of one batch (`trace` and
//!   `recorder` modules),
//! - reduce a recorded trace to convergence diagnostics (`analysis` module),
//! - drive recording and analysis from host lifecycle hooks and emit named
//!   metrics per phase (`hooks` and `metrics` modules), and
//! - observe any solver exposing the step-observer seam, with a reference
//!   damped fixed-point runner included (`solver` module).
//!
//! The diagnostics are strictly read-only with respect to the solver: an
//! observed forward pass produces the same outputs as an unobserved one.
//!
//! # Quick start
//!
//! ```no_run
//! use deqmon::hooks::{CallbackRegistry, ConvergenceMonitor};
//! use deqmon::metrics::MemorySink;
//! use deqmon::solver::{FixedPointSolver, SolverOptions};
//! use nalgebra::DMatrix;
//!
//! // The host loop registers its callbacks in installation order; the
//! // monitor must come first.
//! let mut registry = CallbackRegistry::new();
//! registry.register(ConvergenceMonitor::<MemorySink>::NAME);
//!
//! let mut monitor = ConvergenceMonitor::new(MemorySink::new());
//! monitor.on_fit_start(&registry).expect("monitor registered first");
//!
//! // A toy equilibrium map contracting each sample toward 1.0.
//! let map = |state: &DMatrix<f64>| state.map(|z| 0.5 * z + 0.5);
//! let options = SolverOptions::default();
//! let mut solver = FixedPointSolver::new(map, options).expect("valid options");
//!
//! let batch = DMatrix::from_element(8, 4, 0.0);
//! monitor.on_train_batch_start(&mut solver, 0);
//! let _output = solver.solve(&batch);
//! let report = monitor.on_train_batch_end(&mut solver, 0).expect("diagnostics");
//! println!(
//!     "did not converge: {}, time to convergence: {}",
//!     report.did_not_converge, report.time_to_convergence
//! );
//! ```
//!
//! Metric aggregation over an epoch is the host's responsibility: the
//! monitor emits each scalar once per batch through the
//! [`MetricSink`](metrics::MetricSink) it was built with.

pub mod analysis;
pub mod error;
pub mod hooks;
pub mod metrics;
pub mod options;
pub mod recorder;
pub mod solver;
pub mod trace;

pub use analysis::{analyze, BatchDiagnostics, CONVERGENCE_THRESHOLD};
pub use error::{MonitorError, Result};
pub use hooks::{CallbackRegistry, ConvergenceMonitor, Phase};
pub use metrics::{LogSink, MemorySink, MetricSink};
pub use options::MonitorOptions;
pub use recorder::{Recorder, TraceProbe};
pub use solver::{
    EquilibriumMap, FixedPointSolver, ObservableSolver, SolveOutcome, SolverOptions, StepObserver,
};
pub use trace::{SharedTrace, StateTrace};
