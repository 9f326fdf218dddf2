// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Structured logging and per-job run metrics for the orchestrator.
//!
//! [`init_tracing`] wires up a `tracing-subscriber` fmt layer with an
//! `EnvFilter`; [`StageSpan`] emits one structured log line per pipeline
//! stage; [`MetricsCollector`] accumulates [`RunMetrics`] for process-local
//! introspection (there is no external metrics backend — out of scope —
//! but the capability itself is carried regardless).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::info;

/// Initializes the global `tracing` subscriber from `RUST_LOG` (defaulting
/// to `info` when unset).
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Metrics captured for a single job run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunMetrics {
    /// The service id the job ran against.
    pub service_id: String,
    /// The specification dialect of the service (`socaity`, `runpod`, ...).
    pub specification: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Number of stages in the job's task plan.
    pub stages_count: u64,
    /// Number of transient poll failures tolerated before a terminal
    /// status was reached (or the job failed).
    pub poll_retries: u64,
    /// `1` if the job reached `finished`, else `0`.
    pub succeeded: u64,
    /// Number of files uploaded out of band.
    pub files_uploaded: u64,
}

/// Aggregated statistics across multiple job runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsSummary {
    /// Number of runs recorded.
    pub count: usize,
    /// Mean duration in milliseconds.
    pub mean_duration_ms: f64,
    /// Median (p50) duration in milliseconds.
    pub p50_duration_ms: f64,
    /// 99th-percentile duration in milliseconds.
    pub p99_duration_ms: f64,
    /// Fraction of runs that reached `finished`.
    pub success_rate: f64,
    /// Total files uploaded across all runs.
    pub total_files_uploaded: u64,
    /// Per-specification run counts (deterministic ordering).
    pub specification_counts: BTreeMap<String, usize>,
}

impl Default for MetricsSummary {
    fn default() -> Self {
        Self {
            count: 0,
            mean_duration_ms: 0.0,
            p50_duration_ms: 0.0,
            p99_duration_ms: 0.0,
            success_rate: 0.0,
            total_files_uploaded: 0,
            specification_counts: BTreeMap::new(),
        }
    }
}

/// Computes a percentile value from a **sorted** slice.
fn percentile(sorted: &[u64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0] as f64;
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    sorted[lower] as f64 * (1.0 - frac) + sorted[upper] as f64 * frac
}

/// Thread-safe collector for run metrics. Wrap in an `Arc` to share across
/// the orchestrator's concurrently-running jobs (the inner storage is
/// already behind a `Mutex`).
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<Vec<RunMetrics>>>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    /// Creates a new, empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Records a completed job's metrics.
    pub fn record(&self, metrics: RunMetrics) {
        let mut data = self.inner.lock().expect("metrics lock poisoned");
        data.push(metrics);
    }

    /// Returns all recorded run metrics.
    #[must_use]
    pub fn runs(&self) -> Vec<RunMetrics> {
        self.inner.lock().expect("metrics lock poisoned").clone()
    }

    /// Number of runs recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("metrics lock poisoned").len()
    }

    /// Whether the collector has no recorded runs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Computes an aggregated summary of all recorded runs.
    #[must_use]
    pub fn summary(&self) -> MetricsSummary {
        let data = self.inner.lock().expect("metrics lock poisoned");
        if data.is_empty() {
            return MetricsSummary::default();
        }

        let count = data.len();
        let mut durations: Vec<u64> = data.iter().map(|r| r.duration_ms).collect();
        durations.sort_unstable();

        let total_duration: u64 = durations.iter().sum();
        let mean_duration_ms = total_duration as f64 / count as f64;
        let p50_duration_ms = percentile(&durations, 50.0);
        let p99_duration_ms = percentile(&durations, 99.0);

        let successes: u64 = data.iter().map(|r| r.succeeded).sum();
        let success_rate = successes as f64 / count as f64;

        let total_files_uploaded: u64 = data.iter().map(|r| r.files_uploaded).sum();

        let mut specification_counts: BTreeMap<String, usize> = BTreeMap::new();
        for r in data.iter() {
            *specification_counts.entry(r.specification.clone()).or_insert(0) += 1;
        }

        MetricsSummary {
            count,
            mean_duration_ms,
            p50_duration_ms,
            p99_duration_ms,
            success_rate,
            total_files_uploaded,
            specification_counts,
        }
    }

    /// Clears all recorded metrics.
    pub fn clear(&self) {
        self.inner.lock().expect("metrics lock poisoned").clear();
    }
}

/// A structured span emitted once per pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSpan {
    /// Stage name (`Preparing`, `LoadFiles`, ...).
    pub name: String,
    /// Arbitrary key-value attributes (deterministic ordering).
    pub attributes: BTreeMap<String, String>,
}

impl StageSpan {
    /// Creates a new span for the named stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), attributes: BTreeMap::new() }
    }

    /// Inserts an attribute (e.g. `job_id`, `service_id`, `endpoint_id`).
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Emits the span via `tracing::info!`.
    pub fn emit(&self) {
        info!(stage = %self.name, attributes = ?self.attributes, "pipeline_stage");
    }
}

/// Trait for exporting collected metrics.
pub trait MetricsExporter: Send + Sync {
    /// Exports the given summary. Returns the serialized output on success.
    fn export(&self, summary: &MetricsSummary) -> Result<String, String>;
}

/// Exports metrics as pretty-printed JSON to a string.
#[derive(Debug, Default)]
pub struct JsonExporter;

impl MetricsExporter for JsonExporter {
    fn export(&self, summary: &MetricsSummary) -> Result<String, String> {
        serde_json::to_string_pretty(summary).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn sample(spec: &str, duration: u64, succeeded: bool) -> RunMetrics {
        RunMetrics {
            service_id: "svc".to_string(),
            specification: spec.to_string(),
            duration_ms: duration,
            stages_count: 4,
            poll_retries: 0,
            succeeded: u64::from(succeeded),
            files_uploaded: 1,
        }
    }

    #[test]
    fn collector_new_is_empty() {
        let c = MetricsCollector::new();
        assert!(c.is_empty());
        assert_eq!(c.len(), 0);
    }

    #[test]
    fn collector_record_and_len() {
        let c = MetricsCollector::new();
        c.record(sample("socaity", 100, true));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn collector_clear() {
        let c = MetricsCollector::new();
        c.record(sample("socaity", 50, true));
        c.clear();
        assert!(c.is_empty());
    }

    #[test]
    fn empty_collector_summary() {
        let s = MetricsCollector::new().summary();
        assert_eq!(s.count, 0);
        assert_eq!(s.success_rate, 0.0);
    }

    #[test]
    fn summary_mean_and_percentiles() {
        let c = MetricsCollector::new();
        for d in [10, 20, 30, 40] {
            c.record(sample("runpod", d, true));
        }
        let s = c.summary();
        assert!((s.mean_duration_ms - 25.0).abs() < f64::EPSILON);
        assert!((s.p50_duration_ms - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn summary_success_rate() {
        let c = MetricsCollector::new();
        c.record(sample("replicate", 10, true));
        c.record(sample("replicate", 20, false));
        let s = c.summary();
        assert!((s.success_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn summary_specification_counts() {
        let c = MetricsCollector::new();
        c.record(sample("socaity", 10, true));
        c.record(sample("runpod", 20, true));
        c.record(sample("socaity", 30, true));
        let s = c.summary();
        assert_eq!(s.specification_counts["socaity"], 2);
        assert_eq!(s.specification_counts["runpod"], 1);
    }

    #[test]
    fn concurrent_recording() {
        let c = MetricsCollector::new();
        let handles: Vec<_> = (0..10)
            .map(|i| {
                let cc = c.clone();
                thread::spawn(move || cc.record(sample("socaity", i * 10, true)))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(c.len(), 10);
    }

    #[test]
    fn stage_span_attributes() {
        let span = StageSpan::new("Polling").with_attribute("job_id", "j1");
        assert_eq!(span.name, "Polling");
        assert_eq!(span.attributes["job_id"], "j1");
    }

    #[test]
    fn json_exporter_round_trips_count() {
        let c = MetricsCollector::new();
        c.record(sample("socaity", 100, true));
        let json = JsonExporter.export(&c.summary()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["count"], 1);
    }

    #[test]
    fn percentile_empty_and_single() {
        assert_eq!(percentile(&[], 50.0), 0.0);
        assert_eq!(percentile(&[42], 99.0), 42.0);
    }
}
