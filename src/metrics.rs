//! Process-lifetime metrics handle.
//!
//! A global process-wide metric counter is an ambient mutable global the
//! design notes steer away from; instead every component that records a
//! metric is handed a cheaply-cloned [`Metrics`] from the composition root.
//! Names match the external interface in the metrics section verbatim —
//! they are part of the wire contract even though this crate doesn't ship a
//! Prometheus/OpenTelemetry exporter itself.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MetricKey {
    name: &'static str,
    labels: Vec<(&'static str, String)>,
}

#[derive(Default)]
struct Inner {
    counters: DashMap<MetricKey, AtomicU64>,
    /// Sum of recorded durations in microseconds, alongside the sample count.
    durations: DashMap<MetricKey, (AtomicU64, AtomicU64)>,
    gauges: DashMap<&'static str, AtomicU64>,
}

/// Cheaply-cloned handle for recording the metrics named in the external
/// interface. Backed by atomics and a concurrent map, never a `static mut`.
#[derive(Clone, Default)]
pub struct Metrics {
    inner: Arc<Inner>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn incr(&self, name: &'static str, labels: Vec<(&'static str, String)>) {
        self.inner
            .counters
            .entry(MetricKey { name, labels })
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    fn record_duration(&self, name: &'static str, labels: Vec<(&'static str, String)>, duration: Duration) {
        let entry = self
            .inner
            .durations
            .entry(MetricKey { name, labels })
            .or_insert_with(|| (AtomicU64::new(0), AtomicU64::new(0)));
        entry.0.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        entry.1.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self, family: &str) {
        self.incr("cache.hit.count", vec![("family", family.to_string())]);
    }

    pub fn record_cache_miss(&self, family: &str) {
        self.incr("cache.miss.count", vec![("family", family.to_string())]);
    }

    pub fn record_scheduler_run(&self, job: &str, success: bool, duration: Duration) {
        let labels = vec![("job", job.to_string()), ("success", success.to_string())];
        self.incr("scheduler.run.count", labels.clone());
        self.record_duration("scheduler.run.duration", labels, duration);
    }

    pub fn record_scheduler_skip(&self, job: &str) {
        self.incr("scheduler.skip.count", vec![("job", job.to_string())]);
    }

    pub fn inc_sse_connections(&self) {
        self.inner
            .gauges
            .entry("sse.active_connections")
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec_sse_connections(&self) {
        self.inner
            .gauges
            .entry("sse.active_connections")
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_sub(1)))
            .ok();
    }

    pub fn record_http_request(&self, method: &str, route: &str, status: u16, duration: Duration) {
        let labels = vec![
            ("method", method.to_string()),
            ("route", route.to_string()),
            ("status", status.to_string()),
        ];
        self.incr("http.server.request.count", labels.clone());
        self.record_duration("http.server.request.duration", labels, duration);
    }

    pub fn record_db_query(&self, operation: &str, duration: Duration) {
        self.record_duration("db.query.duration", vec![("operation", operation.to_string())], duration);
    }

    /// A count for a single named counter, summed across all label
    /// combinations. Intended for tests asserting on `scheduler.run.count`
    /// and similar invariants in the testable-properties section.
    pub fn counter_total(&self, name: &'static str) -> u64 {
        self.inner
            .counters
            .iter()
            .filter(|entry| entry.key().name == name)
            .map(|entry| entry.value().load(Ordering::Relaxed))
            .sum()
    }

    pub fn gauge(&self, name: &'static str) -> u64 {
        self.inner
            .gauges
            .get(name)
            .map(|v| v.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// A serializable point-in-time view, for tests and an (out-of-scope)
    /// exposition endpoint.
    pub fn snapshot(&self) -> HashMap<String, u64> {
        let mut out = HashMap::new();
        for entry in self.inner.counters.iter() {
            *out.entry(entry.key().name.to_string()).or_insert(0) += entry.value().load(Ordering::Relaxed);
        }
        for (name, value) in self.inner.gauges.iter().map(|e| (*e.key(), e.value().load(Ordering::Relaxed))) {
            out.insert(name.to_string(), value);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_total_sums_across_labels() {
        let metrics = Metrics::new();
        metrics.record_scheduler_run("sync-a", true, Duration::from_millis(5));
        metrics.record_scheduler_run("sync-a", false, Duration::from_millis(5));
        assert_eq!(metrics.counter_total("scheduler.run.count"), 2);
    }

    #[test]
    fn sse_gauge_tracks_connect_and_disconnect() {
        let metrics = Metrics::new();
        metrics.inc_sse_connections();
        metrics.inc_sse_connections();
        metrics.dec_sse_connections();
        assert_eq!(metrics.gauge("sse.active_connections"), 1);
    }
}
