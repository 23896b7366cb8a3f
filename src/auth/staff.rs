//! Staff login for doctor and reception screens
//!
//! Credentials come from the `[staff]` configuration section. There is no
//! session handling; a successful login only tells the screen who the user is
//! and, for doctors, which ward they run.

use crate::config::StaffSettings;
use crate::error::{QueueError, Result};
use crate::types::Ward;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// What a staff member may do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StaffRole {
    Doctor,
    Receptionist,
}

/// Authenticated staff member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffIdentity {
    pub username: String,
    pub role: StaffRole,
    /// Ward run by a doctor; reception covers every ward
    pub ward: Option<Ward>,
}

/// Trait for staff authentication services
#[async_trait]
pub trait StaffAuthenticator: Send + Sync {
    /// Authenticate a doctor and resolve their ward
    async fn authenticate_doctor(&self, username: &str, password: &str) -> Result<StaffIdentity>;

    /// Authenticate a reception desk user
    async fn authenticate_receptionist(
        &self,
        username: &str,
        password: &str,
    ) -> Result<StaffIdentity>;
}

struct Account {
    password: String,
    ward: Option<Ward>,
}

/// Authenticator backed by accounts loaded at startup
#[derive(Default)]
pub struct StaticStaffAuthenticator {
    doctors: HashMap<String, Account>,
    receptionists: HashMap<String, Account>,
}

impl StaticStaffAuthenticator {
    /// Create an authenticator with no accounts
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from the `[staff]` configuration section
    pub fn from_settings(settings: &StaffSettings) -> Self {
        let mut authenticator = Self::new();
        for doctor in &settings.doctors {
            authenticator.add_doctor(&doctor.username, &doctor.password, doctor.ward);
        }
        for receptionist in &settings.receptionists {
            authenticator.add_receptionist(&receptionist.username, &receptionist.password);
        }
        authenticator
    }

    /// Add or replace a doctor account
    pub fn add_doctor(&mut self, username: &str, password: &str, ward: Ward) {
        self.doctors.insert(
            normalize_username(username),
            Account {
                password: password.to_string(),
                ward: Some(ward),
            },
        );
    }

    /// Add or replace a reception account
    pub fn add_receptionist(&mut self, username: &str, password: &str) {
        self.receptionists.insert(
            normalize_username(username),
            Account {
                password: password.to_string(),
                ward: None,
            },
        );
    }

    fn verify(
        accounts: &HashMap<String, Account>,
        role: StaffRole,
        username: &str,
        password: &str,
    ) -> Result<StaffIdentity> {
        let key = normalize_username(username);
        if key.is_empty() || password.is_empty() {
            warn!("{:?} login rejected: missing credentials", role);
            return Err(QueueError::InvalidCredentials.into());
        }

        match accounts.get(&key) {
            Some(account) if account.password == password => {
                debug!("{:?} {} authenticated", role, key);
                Ok(StaffIdentity {
                    username: key,
                    role,
                    ward: account.ward,
                })
            }
            _ => {
                warn!("{:?} login rejected for '{}'", role, key);
                Err(QueueError::InvalidCredentials.into())
            }
        }
    }
}

fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

#[async_trait]
impl StaffAuthenticator for StaticStaffAuthenticator {
    async fn authenticate_doctor(&self, username: &str, password: &str) -> Result<StaffIdentity> {
        Self::verify(&self.doctors, StaffRole::Doctor, username, password)
    }

    async fn authenticate_receptionist(
        &self,
        username: &str,
        password: &str,
    ) -> Result<StaffIdentity> {
        Self::verify(
            &self.receptionists,
            StaffRole::Receptionist,
            username,
            password,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_authenticator() -> StaticStaffAuthenticator {
        StaticStaffAuthenticator::from_settings(&StaffSettings::default())
    }

    fn is_invalid_credentials(result: &Result<StaffIdentity>) -> bool {
        matches!(
            result.as_ref().map_err(QueueError::from_anyhow),
            Err(Some(QueueError::InvalidCredentials))
        )
    }

    #[tokio::test]
    async fn test_doctor_login_resolves_ward() {
        let auth = create_test_authenticator();

        let identity = auth
            .authenticate_doctor("Dr.Orthopedic", "opd-doctor")
            .await
            .unwrap();
        assert_eq!(identity.username, "dr.orthopedic");
        assert_eq!(identity.role, StaffRole::Doctor);
        assert_eq!(identity.ward, Some(Ward::Orthopedic));
    }

    #[tokio::test]
    async fn test_receptionist_login() {
        let auth = create_test_authenticator();

        let identity = auth
            .authenticate_receptionist("reception", "opd-reception")
            .await
            .unwrap();
        assert_eq!(identity.role, StaffRole::Receptionist);
        assert_eq!(identity.ward, None);
    }

    #[tokio::test]
    async fn test_rejected_logins() {
        let auth = create_test_authenticator();

        assert!(is_invalid_credentials(
            &auth.authenticate_doctor("dr.general", "wrong").await
        ));
        assert!(is_invalid_credentials(
            &auth.authenticate_doctor("", "").await
        ));
        // Reception accounts cannot open the doctor dashboard
        assert!(is_invalid_credentials(
            &auth.authenticate_doctor("reception", "opd-reception").await
        ));
    }

    #[tokio::test]
    async fn test_added_accounts() {
        let mut auth = StaticStaffAuthenticator::new();
        auth.add_doctor("DOC-992", "s3cret", Ward::Dermatology);

        let identity = auth.authenticate_doctor("doc-992", "s3cret").await.unwrap();
        assert_eq!(identity.ward, Some(Ward::Dermatology));
        assert!(auth
            .authenticate_receptionist("doc-992", "s3cret")
            .await
            .is_err());
    }
}
