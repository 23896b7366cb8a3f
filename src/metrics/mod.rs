//! Metrics for the OPD queue service
//!
//! This module provides Prometheus metrics collection for bookings, check-ins,
//! consultations, and per-ward queue state.

pub mod collector;

pub use collector::{
    MetricsCollector, MetricsTimer, PerformanceMetrics, QueueMetrics, ServiceMetrics, WardMetrics,
};
