//! Metrics collection using Prometheus
//!
//! This module provides the metric families exported by the OPD queue service
//! on `/metrics`.

use crate::types::{Ward, WardSummary};
use anyhow::Result;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the queue service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Booking and consultation metrics
    queue_metrics: QueueMetrics,

    /// Per-ward gauges
    ward_metrics: WardMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,

    /// Failed staff logins
    pub login_failures_total: IntCounter,
}

/// Booking and consultation metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Tokens issued, by ward and priority
    pub tokens_booked_total: IntCounterVec,

    /// Bookings turned away, by reason
    pub bookings_rejected_total: IntCounterVec,

    /// Patients checked in at reception
    pub check_ins_total: IntCounterVec,

    /// Patients called in to the doctor
    pub patients_served_total: IntCounterVec,
}

/// Per-ward gauges refreshed after every mutation
#[derive(Clone)]
pub struct WardMetrics {
    /// Tokens waiting in the ward queue
    pub queue_length: IntGaugeVec,

    /// Waiting tokens that have already checked in
    pub checked_in_waiting: IntGaugeVec,

    /// Doctor break flag (0 or 1)
    pub doctor_on_break: IntGaugeVec,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Queue operation durations
    pub operation_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let queue_metrics = QueueMetrics::new(&registry)?;
        let ward_metrics = WardMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            queue_metrics,
            ward_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get service metrics
    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Get queue metrics
    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    /// Get ward metrics
    pub fn ward(&self) -> &WardMetrics {
        &self.ward_metrics
    }

    /// Get performance metrics
    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Record a token being issued
    pub fn record_booking(&self, ward: Ward, emergency: bool) {
        let priority = if emergency { "emergency" } else { "normal" };

        self.queue_metrics
            .tokens_booked_total
            .with_label_values(&[ward.label(), priority])
            .inc();
    }

    /// Record a booking that was turned away
    pub fn record_booking_rejected(&self, reason: &str) {
        self.queue_metrics
            .bookings_rejected_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Record a reception check-in
    pub fn record_check_in(&self, ward: Ward) {
        self.queue_metrics
            .check_ins_total
            .with_label_values(&[ward.label()])
            .inc();
    }

    /// Record a patient being called in
    pub fn record_patient_served(&self, ward: Ward) {
        self.queue_metrics
            .patients_served_total
            .with_label_values(&[ward.label()])
            .inc();
    }

    /// Refresh the gauges for one ward
    pub fn update_ward(&self, summary: &WardSummary) {
        let ward = summary.ward.label();

        self.ward_metrics
            .queue_length
            .with_label_values(&[ward])
            .set(summary.waiting as i64);

        self.ward_metrics
            .checked_in_waiting
            .with_label_values(&[ward])
            .set(summary.checked_in as i64);

        self.ward_metrics
            .doctor_on_break
            .with_label_values(&[ward])
            .set(i64::from(summary.on_break));
    }

    /// Record queue operation duration
    pub fn record_operation(&self, operation: &str, duration: Duration) {
        self.performance_metrics
            .operation_duration
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64());
    }

    /// Record a rejected staff login
    pub fn record_login_failure(&self) {
        self.service_metrics.login_failures_total.inc();
    }

    /// Update uptime
    pub fn update_uptime(&self, uptime: Duration) {
        self.service_metrics
            .uptime_seconds
            .set(uptime.as_secs() as i64);
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds = IntGauge::new("opd_queue_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "opd_queue_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("opd_queue_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        let login_failures_total = IntCounter::new(
            "opd_queue_login_failures_total",
            "Rejected staff login attempts",
        )?;
        registry.register(Box::new(login_failures_total.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
            login_failures_total,
        })
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let tokens_booked_total = IntCounterVec::new(
            Opts::new("opd_queue_tokens_booked_total", "Total tokens issued"),
            &["ward", "priority"],
        )?;
        registry.register(Box::new(tokens_booked_total.clone()))?;

        let bookings_rejected_total = IntCounterVec::new(
            Opts::new(
                "opd_queue_bookings_rejected_total",
                "Total bookings turned away",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(bookings_rejected_total.clone()))?;

        let check_ins_total = IntCounterVec::new(
            Opts::new("opd_queue_check_ins_total", "Total reception check-ins"),
            &["ward"],
        )?;
        registry.register(Box::new(check_ins_total.clone()))?;

        let patients_served_total = IntCounterVec::new(
            Opts::new(
                "opd_queue_patients_served_total",
                "Total patients called in to a doctor",
            ),
            &["ward"],
        )?;
        registry.register(Box::new(patients_served_total.clone()))?;

        Ok(Self {
            tokens_booked_total,
            bookings_rejected_total,
            check_ins_total,
            patients_served_total,
        })
    }
}

impl WardMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let queue_length = IntGaugeVec::new(
            Opts::new("opd_queue_queue_length", "Tokens waiting in the ward queue"),
            &["ward"],
        )?;
        registry.register(Box::new(queue_length.clone()))?;

        let checked_in_waiting = IntGaugeVec::new(
            Opts::new(
                "opd_queue_checked_in_waiting",
                "Checked-in patients waiting to be called",
            ),
            &["ward"],
        )?;
        registry.register(Box::new(checked_in_waiting.clone()))?;

        let doctor_on_break = IntGaugeVec::new(
            Opts::new("opd_queue_doctor_on_break", "Doctor break flag"),
            &["ward"],
        )?;
        registry.register(Box::new(doctor_on_break.clone()))?;

        Ok(Self {
            queue_length,
            checked_in_waiting,
            doctor_on_break,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "opd_queue_operation_duration_seconds",
                "Queue operation duration",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        Ok(Self { operation_duration })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}
