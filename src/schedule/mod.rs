//! Consultation slot scheduling
//!
//! This module projects estimated consultation times for every token waiting in a
//! ward queue, given the ward clock, the doctor's hours and break state.

pub mod calculator;

// Re-export commonly used types
pub use calculator::{EstimateCalculator, ScheduleConfig, SlotEstimateCalculator};
