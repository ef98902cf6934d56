//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Item outcomes are counted per sink label; whole migrations per job kind.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared by dispatcher and CLI.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    migration_items_total: IntCounterVec,
    migrations_total: IntCounterVec,
    active_jobs: IntGauge,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

/// Snapshot of the job gauge and migration counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Jobs currently running.
    pub active_jobs: i64,
    /// Finished migrations of every kind with status `success`.
    pub migrations_succeeded: u64,
    /// Finished migrations of every kind with status `failure`.
    pub migrations_failed: u64,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("active_jobs", &self.inner.active_jobs.get())
            .finish_non_exhaustive()
    }
}

fn collector<T>(name: &'static str, built: prometheus::Result<T>) -> Result<T> {
    built.map_err(|source| TelemetryError::MetricsCollector { name, source })
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be built or
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let migration_items_total = collector(
            "migration_items_total",
            IntCounterVec::new(
                Opts::new(
                    "migration_items_total",
                    "Migrated content items by destination and status",
                ),
                &["sink", "status"],
            ),
        )?;
        let migrations_total = collector(
            "migrations_total",
            IntCounterVec::new(
                Opts::new("migrations_total", "Finished migration jobs by kind and status"),
                &["kind", "status"],
            ),
        )?;
        let active_jobs = collector(
            "active_jobs",
            IntGauge::with_opts(Opts::new("active_jobs", "Migration jobs currently running")),
        )?;

        let register = |name: &'static str, metric: Box<dyn prometheus::core::Collector>| {
            registry
                .register(metric)
                .map_err(|source| TelemetryError::MetricsRegister { name, source })
        };
        register(
            "migration_items_total",
            Box::new(migration_items_total.clone()),
        )?;
        register("migrations_total", Box::new(migrations_total.clone()))?;
        register("active_jobs", Box::new(active_jobs.clone()))?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                migration_items_total,
                migrations_total,
                active_jobs,
                succeeded: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
        })
    }

    /// Count one migrated item for `sink` with `status` (`success` or `failure`).
    pub fn inc_item(&self, sink: &str, status: &str) {
        self.inner
            .migration_items_total
            .with_label_values(&[sink, status])
            .inc();
    }

    /// Count one finished migration of `kind`.
    pub fn inc_migration(&self, kind: &str, status: &str) {
        self.inner
            .migrations_total
            .with_label_values(&[kind, status])
            .inc();
        match status {
            "success" => self.inner.succeeded.fetch_add(1, Ordering::Relaxed),
            _ => self.inner.failed.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Mark a job as started.
    pub fn job_started(&self) {
        self.inner.active_jobs.inc();
    }

    /// Mark a job as finished.
    pub fn job_finished(&self) {
        self.inner.active_jobs.dec();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the job gauge and migration totals.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_jobs: self.inner.active_jobs.get(),
            migrations_succeeded: self.inner.succeeded.load(Ordering::Relaxed),
            migrations_failed: self.inner.failed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_and_render_reflect_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.job_started();
        metrics.job_started();
        metrics.job_finished();
        metrics.inc_item("archive", "success");
        metrics.inc_item("Box", "failure");
        metrics.inc_migration("archive", "success");
        metrics.inc_migration("upload", "failure");
        metrics.inc_migration("upload", "failure");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.active_jobs, 1);
        assert_eq!(snapshot.migrations_succeeded, 1);
        assert_eq!(snapshot.migrations_failed, 2);

        let rendered = metrics.render()?;
        assert!(rendered.contains("migration_items_total{sink=\"Box\",status=\"failure\"} 1"));
        assert!(rendered.contains("migrations_total"));
        assert!(rendered.contains("active_jobs 1"));
        Ok(())
    }
}
