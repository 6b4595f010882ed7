//! Scalar metric reporting seam.
//!
//! The monitor emits two named scalars per batch and leaves any epoch-level
//! accumulation to the host, so the seam is a single `log` call.

/// Base name of the per-batch non-convergence count metric.
pub const DID_NOT_CONVERGE: &str = "Did not converge";

/// Base name of the per-batch time-to-convergence metric.
pub const TIME_TO_CONVERGENCE: &str = "Time to convergence";

/// Receiver for named scalar metrics, one call per metric per batch.
pub trait MetricSink {
    /// Records `value` under `name`.
    fn log(&mut self, name: &str, value: f64);
}

/// Sink that keeps every emitted metric in memory, in emission order.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    records: Vec<(String, f64)>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(name, value)` pair recorded so far, in emission order.
    pub fn records(&self) -> &[(String, f64)] {
        &self.records
    }

    /// Values recorded under `name`, in emission order.
    pub fn values_for(&self, name: &str) -> Vec<f64> {
        self.records
            .iter()
            .filter(|(recorded, _)| recorded == name)
            .map(|(_, value)| *value)
            .collect()
    }
}

impl MetricSink for MemorySink {
    fn log(&mut self, name: &str, value: f64) {
        self.records.push((name.to_string(), value));
    }
}

/// Sink that forwards metrics to the `log` facade at info level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl MetricSink for LogSink {
    fn log(&mut self, name: &str, value: f64) {
        log::info!(target: "deqmon::metrics", "{name} = {value}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_keeps_emission_order() {
        let mut sink = MemorySink::new();
        sink.log(DID_NOT_CONVERGE, 2.0);
        sink.log(TIME_TO_CONVERGENCE, 1.5);
        sink.log(DID_NOT_CONVERGE, 0.0);

        assert_eq!(sink.records().len(), 3);
        assert_eq!(sink.values_for(DID_NOT_CONVERGE), vec![2.0, 0.0]);
        assert_eq!(sink.values_for(TIME_TO_CONVERGENCE), vec![1.5]);
    }
}
