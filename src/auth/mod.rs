//! Staff authentication
//!
//! Doctors and receptionists log in against statically configured accounts.

pub mod staff;

pub use staff::{StaffAuthenticator, StaffIdentity, StaffRole, StaticStaffAuthenticator};
