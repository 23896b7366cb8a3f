//! OPD Queue - token scheduling for hospital outpatient wards
//!
//! This crate books patient tokens into per-ward queues, estimates consultation
//! times, tracks arrivals and doctor breaks, and serves it all over HTTP.

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod schedule;
pub mod service;
pub mod types;
pub mod utils;
pub mod ward;

// Re-export commonly used types and traits
pub use error::{QueueError, Result};
pub use types::*;

// Re-export key components
pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{EventPublisher, QueueEvent};
pub use ward::{QueueManager, StaticWardProvider, WardProvider};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
