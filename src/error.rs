//! Error types for the OPD queue service
//!
//! Engine operations return the crate-wide `Result` (an `anyhow::Result`) carrying
//! one of the `QueueError` variants below. Callers that need to branch on the
//! failure kind, such as the HTTP layer, downcast with `QueueError::from_anyhow`.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Recoverable failures surfaced to front desk and doctor screens
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("Invalid input: {reason}")]
    Validation { reason: String },

    #[error("Phone number {phone} already holds an active token")]
    DuplicateBooking { phone: String },

    #[error("Token not found: {token}")]
    TokenNotFound { token: String },

    #[error("Unknown ward: {ward}")]
    UnknownWard { ward: String },

    #[error("Doctor in the {ward} ward is on break")]
    DoctorOnBreak { ward: String },

    #[error("No checked-in patients waiting in the {ward} ward")]
    NoArrivedPatients { ward: String },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal service error: {message}")]
    Internal { message: String },
}

impl QueueError {
    /// Shorthand for a validation failure
    pub fn validation(reason: impl Into<String>) -> Self {
        QueueError::Validation {
            reason: reason.into(),
        }
    }

    /// Shorthand for a poisoned or unavailable lock
    pub fn lock_failed(what: &str) -> Self {
        QueueError::Internal {
            message: format!("Failed to acquire {} lock", what),
        }
    }

    /// Recover the typed error from an `anyhow::Error`, if it carries one
    pub fn from_anyhow(error: &anyhow::Error) -> Option<&QueueError> {
        error.downcast_ref::<QueueError>()
    }

    /// Stable machine-readable code for logs and metric labels
    pub fn code(&self) -> &'static str {
        match self {
            QueueError::Validation { .. } => "validation",
            QueueError::DuplicateBooking { .. } => "duplicate_booking",
            QueueError::TokenNotFound { .. } => "token_not_found",
            QueueError::UnknownWard { .. } => "unknown_ward",
            QueueError::DoctorOnBreak { .. } => "doctor_on_break",
            QueueError::NoArrivedPatients { .. } => "no_arrived_patients",
            QueueError::InvalidCredentials => "invalid_credentials",
            QueueError::Configuration { .. } => "configuration",
            QueueError::Internal { .. } => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downcast_from_anyhow() {
        let err: anyhow::Error = QueueError::DuplicateBooking {
            phone: "1111111111".to_string(),
        }
        .into();

        assert_eq!(
            QueueError::from_anyhow(&err),
            Some(&QueueError::DuplicateBooking {
                phone: "1111111111".to_string()
            })
        );

        let other = anyhow::anyhow!("plain failure");
        assert!(QueueError::from_anyhow(&other).is_none());
    }

    #[test]
    fn test_messages_are_user_displayable() {
        let err = QueueError::DoctorOnBreak {
            ward: "General".to_string(),
        };
        assert_eq!(err.to_string(), "Doctor in the General ward is on break");
        assert_eq!(err.code(), "doctor_on_break");
    }
}
