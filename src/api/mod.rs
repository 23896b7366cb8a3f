//! HTTP boundary of the queue service
//!
//! JSON endpoints for booking, check-in, and the doctor dashboard, a
//! server-sent event stream for ward display boards, and the health and
//! metrics endpoints.

pub mod handlers;
pub mod messages;
pub mod server;

pub use handlers::ApiError;
pub use server::{create_router, ApiServer};
