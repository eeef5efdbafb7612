use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Trait for metrics backends. Implementations can forward to Prometheus,
/// StatsD, or simply log metrics.
pub trait MetricsBackend: Send + Sync {
    fn record_counter(&self, name: &str, value: u64);
    fn record_gauge(&self, name: &str, value: f64);
}

/// Atomic counters shared by the manager, the external adapter and the
/// worker server.
pub struct RuntimeMetrics {
    pub deploys: AtomicU64,
    pub deploy_failures: AtomicU64,
    pub deletes: AtomicU64,
    pub registrations: AtomicU64,
    pub registrations_released: AtomicU64,
    pub events_read: AtomicU64,
    pub events_written: AtomicU64,
    pub commits: AtomicU64,
    backend: Option<Arc<dyn MetricsBackend>>,
}

impl std::fmt::Debug for RuntimeMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeMetrics")
            .field("deploys", &self.deploys)
            .field("deploy_failures", &self.deploy_failures)
            .field("deletes", &self.deletes)
            .field("registrations", &self.registrations)
            .field("registrations_released", &self.registrations_released)
            .field("events_read", &self.events_read)
            .field("events_written", &self.events_written)
            .field("commits", &self.commits)
            .finish()
    }
}

impl Default for RuntimeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeMetrics {
    pub fn new() -> Self {
        Self {
            deploys: AtomicU64::new(0),
            deploy_failures: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            registrations: AtomicU64::new(0),
            registrations_released: AtomicU64::new(0),
            events_read: AtomicU64::new(0),
            events_written: AtomicU64::new(0),
            commits: AtomicU64::new(0),
            backend: None,
        }
    }

    pub fn with_backend(backend: Arc<dyn MetricsBackend>) -> Self {
        Self {
            backend: Some(backend),
            ..Self::new()
        }
    }

    fn bump(&self, counter: &AtomicU64, name: &str) {
        let val = counter.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(backend) = &self.backend {
            backend.record_counter(name, val);
        }
    }

    pub fn record_deploy(&self) {
        self.bump(&self.deploys, "fstream.runtime.deploys");
    }

    pub fn record_deploy_failed(&self) {
        self.bump(&self.deploy_failures, "fstream.runtime.deploy_failures");
    }

    pub fn record_delete(&self) {
        self.bump(&self.deletes, "fstream.runtime.deletes");
    }

    pub fn record_registration(&self) {
        self.bump(&self.registrations, "fstream.runtime.registrations");
        self.report_live_registrations();
    }

    pub fn record_registration_released(&self) {
        self.bump(
            &self.registrations_released,
            "fstream.runtime.registrations_released",
        );
        self.report_live_registrations();
    }

    pub fn record_event_read(&self) {
        self.bump(&self.events_read, "fstream.runtime.events_read");
    }

    pub fn record_event_written(&self) {
        self.bump(&self.events_written, "fstream.runtime.events_written");
    }

    pub fn record_commit(&self) {
        self.bump(&self.commits, "fstream.runtime.commits");
    }

    fn report_live_registrations(&self) {
        if let Some(backend) = &self.backend {
            let opened = self.registrations.load(Ordering::Relaxed);
            let closed = self.registrations_released.load(Ordering::Relaxed);
            backend.record_gauge(
                "fstream.runtime.live_registrations",
                opened.saturating_sub(closed) as f64,
            );
        }
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            deploys: self.deploys.load(Ordering::Relaxed),
            deploy_failures: self.deploy_failures.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            registrations: self.registrations.load(Ordering::Relaxed),
            registrations_released: self.registrations_released.load(Ordering::Relaxed),
            events_read: self.events_read.load(Ordering::Relaxed),
            events_written: self.events_written.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of runtime metrics.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MetricsSnapshot {
    pub deploys: u64,
    pub deploy_failures: u64,
    pub deletes: u64,
    pub registrations: u64,
    pub registrations_released: u64,
    pub events_read: u64,
    pub events_written: u64,
    pub commits: u64,
}

/// Logging-based metrics backend. Emits metrics as structured log events.
pub struct LoggingMetricsBackend;

impl MetricsBackend for LoggingMetricsBackend {
    fn record_counter(&self, name: &str, value: u64) {
        tracing::debug!(metric = name, value = value, kind = "counter", "metric");
    }

    fn record_gauge(&self, name: &str, value: f64) {
        tracing::debug!(metric = name, value = value, kind = "gauge", "metric");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingBackend {
        gauges: Mutex<Vec<(String, f64)>>,
    }

    impl MetricsBackend for RecordingBackend {
        fn record_counter(&self, _name: &str, _value: u64) {}

        fn record_gauge(&self, name: &str, value: f64) {
            self.gauges.lock().unwrap().push((name.to_string(), value));
        }
    }

    #[test]
    fn default_metrics_start_at_zero() {
        let snap = RuntimeMetrics::new().snapshot();
        assert_eq!(snap.deploys, 0);
        assert_eq!(snap.registrations, 0);
        assert_eq!(snap.commits, 0);
    }

    #[test]
    fn counters_increment_independently() {
        let metrics = RuntimeMetrics::new();
        metrics.record_deploy();
        metrics.record_deploy();
        metrics.record_deploy_failed();
        metrics.record_delete();
        metrics.record_event_written();

        let snap = metrics.snapshot();
        assert_eq!(snap.deploys, 2);
        assert_eq!(snap.deploy_failures, 1);
        assert_eq!(snap.deletes, 1);
        assert_eq!(snap.events_written, 1);
        assert_eq!(snap.events_read, 0);
    }

    #[test]
    fn live_registrations_gauge_tracks_open_minus_released() {
        let backend = Arc::new(RecordingBackend::default());
        let metrics = RuntimeMetrics::with_backend(backend.clone());
        metrics.record_registration();
        metrics.record_registration();
        metrics.record_registration_released();

        let gauges = backend.gauges.lock().unwrap();
        let values: Vec<f64> = gauges.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![1.0, 2.0, 1.0]);
    }

    #[test]
    fn with_logging_backend() {
        let metrics = RuntimeMetrics::with_backend(Arc::new(LoggingMetricsBackend));
        metrics.record_commit();
        assert_eq!(metrics.snapshot().commits, 1);
    }

    #[test]
    fn concurrent_increments() {
        let metrics = Arc::new(RuntimeMetrics::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let m = Arc::clone(&metrics);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    m.record_event_read();
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(metrics.snapshot().events_read, 1000);
    }
}
