//! Reload metrics tracking using OpenTelemetry.

use crate::sources::SourceKind;
use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use std::sync::Arc;
use std::time::Instant;

/// Metrics collector for reload, rejection and rollback events.
///
/// Reload metrics carry a `source` attribute (`local` or `remote`).
#[derive(Clone)]
pub struct ReloadMetrics {
    reload_attempts: Counter<u64>,
    reload_success: Counter<u64>,
    reload_failures: Counter<u64>,
    reload_duration: Histogram<f64>,
    rejections: Counter<u64>,
    rollbacks: Counter<u64>,
    config_age_seconds: Gauge<i64>,
    last_update: Arc<parking_lot::Mutex<Instant>>,
}

impl ReloadMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let reload_attempts = meter
            .u64_counter("cloud_reload.reload.attempts")
            .with_description("Total number of reload attempts")
            .build();

        let reload_success = meter
            .u64_counter("cloud_reload.reload.success")
            .with_description("Number of successful reloads")
            .build();

        let reload_failures = meter
            .u64_counter("cloud_reload.reload.failures")
            .with_description("Number of failed reloads")
            .build();

        let reload_duration = meter
            .f64_histogram("cloud_reload.reload.duration")
            .with_description("Duration of reload operations in seconds")
            .with_unit("s")
            .build();

        let rejections = meter
            .u64_counter("cloud_reload.callback.rejections")
            .with_description("Number of changes rejected by the application")
            .build();

        let rollbacks = meter
            .u64_counter("cloud_reload.rollbacks")
            .with_description("Number of rollbacks to the last known-good configuration")
            .build();

        let config_age_seconds = meter
            .i64_gauge("cloud_reload.age")
            .with_description("Time since last accepted configuration in seconds")
            .with_unit("s")
            .build();

        Self {
            reload_attempts,
            reload_success,
            reload_failures,
            reload_duration,
            rejections,
            rollbacks,
            config_age_seconds,
            last_update: Arc::new(parking_lot::Mutex::new(Instant::now())),
        }
    }

    fn source_attr(source: SourceKind) -> [KeyValue; 1] {
        [KeyValue::new("source", source.to_string())]
    }

    /// Count a reload attempt and start its timer.
    pub fn start_reload(&self, source: SourceKind) -> Instant {
        self.reload_attempts.add(1, &Self::source_attr(source));
        Instant::now()
    }

    /// Record a successful reload started at `start`.
    pub fn record_reload_success(&self, source: SourceKind, start: Instant) {
        let attrs = Self::source_attr(source);
        self.reload_success.add(1, &attrs);
        self.reload_duration.record(start.elapsed().as_secs_f64(), &attrs);

        *self.last_update.lock() = Instant::now();
    }

    /// Record a failed reload started at `start`.
    pub fn record_reload_failure(&self, source: SourceKind, start: Instant) {
        let attrs = Self::source_attr(source);
        self.reload_failures.add(1, &attrs);
        self.reload_duration.record(start.elapsed().as_secs_f64(), &attrs);
    }

    /// Record a change rejected by the application callback.
    pub fn record_rejection(&self, source: SourceKind) {
        self.rejections.add(1, &Self::source_attr(source));
    }

    /// Record a rollback.
    pub fn record_rollback(&self) {
        self.rollbacks.add(1, &[]);
    }

    /// Update the configuration age metric.
    ///
    /// Call periodically to track how stale the configuration is.
    pub fn update_config_age(&self) {
        let age_secs = self.last_update.lock().elapsed().as_secs() as i64;
        self.config_age_seconds.record(age_secs, &[]);
    }
}
