//! Damped fixed-point solver interface and a reference implementation.
//!
//! The diagnostics in this crate only observe a solver; they never alter its
//! math. This module defines the seam they observe through: an equilibrium
//! map (the solver's inner step function), an optional step observer invoked
//! with every intermediate state, and a damped Picard runner that drives the
//! map until its update stalls or an iteration cap is reached.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, Result};

/// The solver's inner step function `f`, mapping a batch of states to their
/// images. A fixed point satisfies `f(z) = z` per sample row.
pub trait EquilibriumMap {
    /// Applies the map to a `(batch_size, feature_dim)` state matrix.
    fn apply(&self, state: &DMatrix<f64>) -> DMatrix<f64>;
}

impl<F> EquilibriumMap for F
where
    F: Fn(&DMatrix<f64>) -> DMatrix<f64>,
{
    fn apply(&self, state: &DMatrix<f64>) -> DMatrix<f64> {
        self(state)
    }
}

/// Observer invoked with each internal state the solver produces, in
/// execution order. Observers see the state by reference and cannot perturb
/// the iteration.
pub trait StepObserver {
    /// Called once per internal iteration with the post-update state.
    fn on_step(&mut self, state: &DMatrix<f64>);
}

/// The object-safe surface the lifecycle hooks need from a solver: an
/// injection point for a step observer and the configured damping factor.
pub trait ObservableSolver {
    /// Installs `observer`, replacing any previously installed one.
    fn set_step_observer(&mut self, observer: Box<dyn StepObserver>);

    /// Removes the installed observer. Returns whether one was installed;
    /// removing when none is installed is a no-op.
    fn clear_step_observer(&mut self) -> bool;

    /// The damping factor applied to each internal update, in `[0, 1)`.
    fn damping_factor(&self) -> f64;
}

/// Configuration for a damped fixed-point iteration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolverOptions {
    /// Fraction of each update that is withheld; `0.0` is an undamped
    /// iteration and values approaching `1.0` freeze the state.
    pub damping_factor: f64,
    /// Maximum number of internal iterations per forward pass.
    pub max_steps: usize,
    /// Supremum-norm tolerance on the applied update below which the solver
    /// stops early.
    pub fixed_point_tol: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            damping_factor: 0.5,
            max_steps: 50,
            fixed_point_tol: 1e-6,
        }
    }
}

/// Outcome of one forward pass of [`FixedPointSolver`].
///
/// Failing to reach a fixed point within the iteration cap is an observable
/// outcome rather than an error: measuring how often that happens is the
/// whole point of the surrounding diagnostics.
#[derive(Clone, Debug)]
pub struct SolveOutcome {
    /// Final internal state after the last iteration.
    pub state: DMatrix<f64>,
    /// Number of internal iterations performed.
    pub steps: usize,
    /// Whether the update stalled below the tolerance before the cap.
    pub converged: bool,
    /// Supremum norm of the last applied update.
    pub max_update: f64,
}

/// Reference damped fixed-point solver: `z = z + (1 - damping) * (f(z) - z)`.
pub struct FixedPointSolver<M: EquilibriumMap> {
    map: M,
    options: SolverOptions,
    observer: Option<Box<dyn StepObserver>>,
}

impl<M: EquilibriumMap> FixedPointSolver<M> {
    /// Constructs a solver after validating `options`.
    pub fn new(map: M, options: SolverOptions) -> Result<Self> {
        if !(0.0..1.0).contains(&options.damping_factor) {
            return Err(MonitorError::InvalidDamping {
                value: options.damping_factor,
            });
        }
        if options.max_steps == 0 {
            return Err(MonitorError::InvalidMaxSteps);
        }
        Ok(Self {
            map,
            options,
            observer: None,
        })
    }

    /// Accessor for the solver configuration.
    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Runs the damped iteration from `initial` until the applied update's
    /// supremum norm falls below the tolerance or the step cap is reached.
    ///
    /// Every post-update state is reported to the installed observer before
    /// the stopping check, so an observer sees exactly as many states as
    /// iterations executed.
    pub fn solve(&mut self, initial: &DMatrix<f64>) -> SolveOutcome {
        let step_size = 1.0 - self.options.damping_factor;
        let mut state = initial.clone_owned();
        let mut steps = 0usize;
        let mut max_update = f64::INFINITY;

        while steps < self.options.max_steps {
            let image = self.map.apply(&state);
            let update = (image - &state) * step_size;
            state += &update;
            steps += 1;

            if let Some(observer) = self.observer.as_mut() {
                observer.on_step(&state);
            }

            max_update = update.amax();
            if max_update < self.options.fixed_point_tol {
                return SolveOutcome {
                    state,
                    steps,
                    converged: true,
                    max_update,
                };
            }
        }

        SolveOutcome {
            state,
            steps,
            converged: false,
            max_update,
        }
    }
}

impl<M: EquilibriumMap> ObservableSolver for FixedPointSolver<M> {
    fn set_step_observer(&mut self, observer: Box<dyn StepObserver>) {
        self.observer = Some(observer);
    }

    fn clear_step_observer(&mut self) -> bool {
        self.observer.take().is_some()
    }

    fn damping_factor(&self) -> f64 {
        self.options.damping_factor
    }
}
