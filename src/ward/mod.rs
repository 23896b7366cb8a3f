//! Ward queue engine
//!
//! This module owns the per-ward token queues: booking, arrival check-in, calling
//! the next patient, doctor breaks, and the shared statistics board.

pub mod instance;
pub mod manager;
pub mod provider;

// Re-export commonly used types
pub use instance::WardQueue;
pub use manager::{QueueManager, QueueStats};
pub use provider::{StaticWardProvider, WardConfiguration, WardProvider};
