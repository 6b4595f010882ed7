use thiserror::Error;

/// Unified error type for `deqmon` operations.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Raised at phase start when the monitor is registered with the host
    /// loop but not in the first position.
    #[error(
        "convergence monitor must be the first registered callback; found at position {position} of {registered}"
    )]
    HookNotFirst {
        /// Zero-based position the monitor was found at.
        position: usize,
        /// Total number of registered callbacks.
        registered: usize,
    },

    /// Raised at phase start when the monitor is absent from the host's
    /// callback registry.
    #[error("convergence monitor `{name}` is not registered with the host loop")]
    HookNotRegistered { name: &'static str },

    /// Raised when a batch trace holds fewer than the two snapshots needed
    /// to form a single relative residual.
    #[error(
        "batch trace holds {recorded} snapshot(s); at least 2 are required to measure convergence"
    )]
    InsufficientStates { recorded: usize },

    /// Raised when recorded snapshots disagree on shape, or a snapshot has
    /// an empty batch or feature dimension.
    #[error("snapshot shape mismatch in {context}: expected {expected_rows}x{expected_cols} but found {found_rows}x{found_cols}")]
    ShapeMismatch {
        /// Human-readable context describing the operation.
        context: &'static str,
        expected_rows: usize,
        expected_cols: usize,
        found_rows: usize,
        found_cols: usize,
    },

    /// Raised when a snapshot carries no samples or no features.
    #[error("snapshots must have at least one sample row and one feature column, found {rows}x{cols}")]
    EmptySnapshot { rows: usize, cols: usize },

    /// Raised when a damping factor falls outside `[0, 1)`.
    #[error("damping factor must lie in [0, 1), found {value}")]
    InvalidDamping { value: f64 },

    /// Raised when a solver is configured to run zero iterations.
    #[error("solver must be allowed at least one step, found max_steps = 0")]
    InvalidMaxSteps,

    /// Raised when a convergence threshold is non-positive or non-finite.
    #[error("convergence threshold must be a positive finite value, found {value}")]
    InvalidThreshold { value: f64 },
}

impl MonitorError {
    /// Helper to format a [`ShapeMismatch`](MonitorError::ShapeMismatch) error.
    pub fn shape_mismatch(
        context: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    ) -> Self {
        Self::ShapeMismatch {
            context,
            expected_rows: expected.0,
            expected_cols: expected.1,
            found_rows: found.0,
            found_cols: found.1,
        }
    }
}

/// Type alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, MonitorError>;
