//! Turns a batch's recorded state trace into convergence diagnostics.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, Result};

/// Relative-residual threshold below which a sample counts as converged.
pub const CONVERGENCE_THRESHOLD: f64 = 1e-4;

/// Convergence diagnostics for one batch.
///
/// The two headline scalars mirror what gets logged; the per-sample vectors
/// are kept for hosts that want a finer breakdown. Everything here is
/// transient and recomputed from scratch for every batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchDiagnostics {
    /// Number of samples whose relative residual never dropped below the
    /// threshold, as a float so hosts can average it over an epoch.
    pub did_not_converge: f64,
    /// Batch-averaged corrected convergence step, scaled by the equivalent
    /// forward-Euler step size `1 - damping_factor`.
    pub time_to_convergence: f64,
    /// Number of samples in the batch.
    pub sample_count: usize,
    /// Number of snapshots the solver produced for this batch.
    pub steps_observed: usize,
    /// Per-sample corrected convergence step. Non-converged samples carry
    /// the maximum step count `steps_observed - 1`.
    pub convergence_steps: Vec<usize>,
    /// Per-sample convergence flag.
    pub converged: Vec<bool>,
}

/// Computes per-batch convergence diagnostics from an ordered state trace.
///
/// Consumes the drained trace: snapshot `t` is the solver's internal state
/// after iteration `t`, shaped `(batch_size, feature_dim)` with one row per
/// sample. For each consecutive pair the per-sample relative residual is
/// `norm(state[t+1] - state[t]) / norm(state[t+1])` with norms over the feature
/// axis. A sample converges at the first step whose residual is strictly
/// below `convergence_threshold`; samples that never cross it are assigned
/// the maximum step count and tallied in
/// [`did_not_converge`](BatchDiagnostics::did_not_converge).
///
/// A near-zero reference norm is not guarded: the Inf/NaN residual it
/// produces compares false against the threshold, so the affected sample
/// classifies as non-converged.
///
/// At least two snapshots are required; fewer is an error rather than a
/// silently degenerate result.
pub fn analyze(
    snapshots: Vec<DMatrix<f64>>,
    convergence_threshold: f64,
    damping_factor: f64,
) -> Result<BatchDiagnostics> {
    if !(convergence_threshold.is_finite() && convergence_threshold > 0.0) {
        return Err(MonitorError::InvalidThreshold {
            value: convergence_threshold,
        });
    }
    if !(0.0..1.0).contains(&damping_factor) {
        return Err(MonitorError::InvalidDamping {
            value: damping_factor,
        });
    }

    let steps = snapshots.len();
    if steps < 2 {
        return Err(MonitorError::InsufficientStates { recorded: steps });
    }

    let batch = snapshots[0].nrows();
    let features = snapshots[0].ncols();
    if batch == 0 || features == 0 {
        return Err(MonitorError::EmptySnapshot {
            rows: batch,
            cols: features,
        });
    }
    for snapshot in &snapshots[1..] {
        if snapshot.nrows() != batch || snapshot.ncols() != features {
            return Err(MonitorError::shape_mismatch(
                "state trace",
                (batch, features),
                (snapshot.nrows(), snapshot.ncols()),
            ));
        }
    }

    // Row t of the residual matrix compares iteration t+1 against t.
    let mut residuals = DMatrix::zeros(steps - 1, batch);
    for t in 0..steps - 1 {
        let current = &snapshots[t];
        let next = &snapshots[t + 1];
        for sample in 0..batch {
            let delta_norm = (next.row(sample) - current.row(sample)).norm();
            let reference_norm = next.row(sample).norm();
            residuals[(t, sample)] = delta_norm / reference_norm;
        }
    }

    // First crossing below the threshold per sample; samples whose residual
    // never crosses take the maximum step count.
    let sentinel = steps - 1;
    let mut convergence_steps = Vec::with_capacity(batch);
    let mut converged = Vec::with_capacity(batch);
    for sample in 0..batch {
        let column = residuals.column(sample);
        match column.iter().position(|&r| r < convergence_threshold) {
            Some(index) => {
                convergence_steps.push(index);
                converged.push(true);
            }
            None => {
                convergence_steps.push(sentinel);
                converged.push(false);
            }
        }
    }

    let did_not_converge = converged.iter().filter(|flag| !**flag).count() as f64;
    let mean_step: f64 =
        convergence_steps.iter().map(|&s| s as f64).sum::<f64>() / batch as f64;
    let step_size = 1.0 - damping_factor;
    let time_to_convergence = mean_step * step_size;

    log::debug!(
        "analyzed batch of {batch} sample(s) over {steps} step(s): did_not_converge = {did_not_converge}, time_to_convergence = {time_to_convergence}"
    );

    Ok(BatchDiagnostics {
        did_not_converge,
        time_to_convergence,
        sample_count: batch,
        steps_observed: steps,
        convergence_steps,
        converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Builds a single-feature trace from per-step sample values: row i of
    /// snapshot t holds `samples[i][t]`.
    fn trace_from_series(samples: &[&[f64]]) -> Vec<DMatrix<f64>> {
        let steps = samples[0].len();
        (0..steps)
            .map(|t| {
                let column: Vec<f64> = samples.iter().map(|series| series[t]).collect();
                DMatrix::from_column_slice(samples.len(), 1, &column)
            })
            .collect()
    }

    #[test]
    fn mixed_batch_averages_corrected_steps() {
        // Sample A settles after step 2; sample B keeps doubling and its
        // residual stays at 0.5 forever.
        let snapshots = trace_from_series(&[
            &[1.0, 2.0, 4.0, 4.0, 4.0],
            &[1.0, 2.0, 4.0, 8.0, 16.0],
        ]);

        let report = analyze(snapshots, CONVERGENCE_THRESHOLD, 0.5).unwrap();
        assert_eq!(report.convergence_steps, vec![2, 4]);
        assert_eq!(report.converged, vec![true, false]);
        assert_relative_eq!(report.did_not_converge, 1.0);
        // Mean corrected step (2 + 4) / 2 = 3, scaled by step size 0.5.
        assert_relative_eq!(report.time_to_convergence, 1.5, epsilon = 1e-12);
        assert_eq!(report.sample_count, 2);
        assert_eq!(report.steps_observed, 5);
    }

    #[test]
    fn stationary_trace_converges_at_step_zero() {
        let snapshots = trace_from_series(&[&[3.0, 3.0, 3.0], &[7.0, 7.0, 7.0]]);

        let report = analyze(snapshots, CONVERGENCE_THRESHOLD, 0.25).unwrap();
        assert_eq!(report.convergence_steps, vec![0, 0]);
        assert_relative_eq!(report.did_not_converge, 0.0);
        assert_relative_eq!(report.time_to_convergence, 0.0);
    }

    #[test]
    fn diverging_trace_is_fully_non_converged() {
        let snapshots = trace_from_series(&[&[1.0, 2.0, 4.0, 8.0, 16.0]]);

        let report = analyze(snapshots, CONVERGENCE_THRESHOLD, 0.0).unwrap();
        assert_eq!(report.convergence_steps, vec![4]);
        assert_eq!(report.converged, vec![false]);
        assert_relative_eq!(report.did_not_converge, 1.0);
        assert_relative_eq!(report.time_to_convergence, 4.0);
    }

    #[test]
    fn residual_exactly_at_threshold_is_not_converged() {
        // Doubling values give residuals of exactly 0.5 in binary floating
        // point, so a 0.5 threshold exercises the strict comparison.
        let snapshots = trace_from_series(&[&[1.0, 2.0, 4.0]]);

        let at_threshold = analyze(snapshots.clone(), 0.5, 0.0).unwrap();
        assert_eq!(at_threshold.converged, vec![false]);
        assert_eq!(at_threshold.convergence_steps, vec![2]);

        let above_threshold = analyze(snapshots, 0.5000001, 0.0).unwrap();
        assert_eq!(above_threshold.converged, vec![true]);
        assert_eq!(above_threshold.convergence_steps, vec![0]);
    }

    #[test]
    fn zero_states_classify_as_non_converged() {
        // All-zero states make both norms zero; the NaN residual compares
        // false against the threshold.
        let snapshots = trace_from_series(&[&[0.0, 0.0, 0.0]]);

        let report = analyze(snapshots, CONVERGENCE_THRESHOLD, 0.0).unwrap();
        assert_eq!(report.converged, vec![false]);
        assert_relative_eq!(report.did_not_converge, 1.0);
        assert_relative_eq!(report.time_to_convergence, 2.0);
    }

    #[test]
    fn short_traces_fail_fast() {
        let empty: Vec<DMatrix<f64>> = Vec::new();
        assert!(matches!(
            analyze(empty, CONVERGENCE_THRESHOLD, 0.0),
            Err(MonitorError::InsufficientStates { recorded: 0 })
        ));

        let single = vec![DMatrix::from_element(2, 2, 1.0)];
        assert!(matches!(
            analyze(single, CONVERGENCE_THRESHOLD, 0.0),
            Err(MonitorError::InsufficientStates { recorded: 1 })
        ));
    }

    #[test]
    fn shape_drift_is_rejected() {
        let snapshots = vec![
            DMatrix::from_element(2, 3, 1.0),
            DMatrix::from_element(2, 2, 1.0),
        ];
        assert!(matches!(
            analyze(snapshots, CONVERGENCE_THRESHOLD, 0.0),
            Err(MonitorError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn degenerate_dimensions_are_rejected() {
        let snapshots = vec![DMatrix::zeros(0, 3), DMatrix::zeros(0, 3)];
        assert!(matches!(
            analyze(snapshots, CONVERGENCE_THRESHOLD, 0.0),
            Err(MonitorError::EmptySnapshot { .. })
        ));
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let snapshots = trace_from_series(&[&[1.0, 2.0]]);
        assert!(matches!(
            analyze(snapshots.clone(), 0.0, 0.0),
            Err(MonitorError::InvalidThreshold { .. })
        ));
        assert!(matches!(
            analyze(snapshots, CONVERGENCE_THRESHOLD, 1.0),
            Err(MonitorError::InvalidDamping { .. })
        ));
    }

    #[test]
    fn diagnostics_round_trip_through_serde() {
        let snapshots = trace_from_series(&[&[1.0, 2.0, 4.0, 4.0]]);
        let report = analyze(snapshots, CONVERGENCE_THRESHOLD, 0.5).unwrap();

        let encoded = serde_json::to_string(&report).unwrap();
        let decoded: BatchDiagnostics = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.convergence_steps, report.convergence_steps);
        assert_relative_eq!(decoded.time_to_convergence, report.time_to_convergence);
    }
}
