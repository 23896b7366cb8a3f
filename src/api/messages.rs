//! JSON bodies exchanged with the reception, doctor, and display screens

use crate::auth::StaffRole;
use crate::types::{DoctorStatus, EstimatedTime, PatientToken, TokenId, Vitals, Ward};
use crate::ward::QueueStats;
use serde::{Deserialize, Serialize};

pub const BOOKED_MESSAGE: &str = "Token booked successfully";
pub const CHECKED_IN_MESSAGE: &str = "Patient checked in";
pub const FINISHED_MESSAGE: &str = "Consultation finished";
pub const RECEPTION_LOGIN_MESSAGE: &str = "Reception login successful";

/// `POST /api/book`
///
/// Missing fields deserialize to empty values so the engine reports them as
/// validation failures instead of the extractor rejecting the body.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BookRequest {
    pub name: String,
    pub phone: String,
    pub ward: String,
    pub emergency: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookResponse {
    pub token: TokenId,
    pub estimated_time: EstimatedTime,
    pub position: usize,
    pub message: String,
    pub patient: PatientToken,
}

/// `POST /api/checkin`, accepting either a scanned QR payload or a typed token
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CheckInRequest {
    pub qr_data: Option<String>,
    pub token: Option<String>,
    pub vitals: Option<Vitals>,
}

impl CheckInRequest {
    /// QR payload if present, else the typed token
    pub fn code(&self) -> Option<&str> {
        self.qr_data
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.token.as_deref().filter(|s| !s.trim().is_empty()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInResponse {
    pub message: String,
    pub patient: PatientToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishResponse {
    pub message: String,
    /// Token whose consultation just ended, if one was in progress
    pub token: Option<TokenId>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorLoginResponse {
    pub username: String,
    pub ward: Ward,
    pub doctor: DoctorStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceptionLoginResponse {
    pub username: String,
    pub role: StaffRole,
    pub message: String,
}

/// Query string of `GET /api/events`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsQuery {
    pub ward: Option<String>,
}

/// `GET /stats`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_served: u64,
    #[serde(flatten)]
    pub stats: QueueStats,
}

impl From<QueueStats> for StatsResponse {
    fn from(stats: QueueStats) -> Self {
        Self {
            total_served: stats.patients_served_today,
            stats,
        }
    }
}

/// Body of every failed request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_request_tolerates_missing_fields() {
        let request: BookRequest = serde_json::from_str(r#"{"name":"Asha"}"#).unwrap();
        assert_eq!(request.name, "Asha");
        assert!(request.phone.is_empty());
        assert!(!request.emergency);
    }

    #[test]
    fn test_check_in_code_prefers_qr_payload() {
        let request: CheckInRequest = serde_json::from_str(
            r#"{"qrData":"OPD-G3-9876543210","token":"G4","vitals":{"temp":"98.6","bp":"120/80"}}"#,
        )
        .unwrap();
        assert_eq!(request.code(), Some("OPD-G3-9876543210"));
        assert_eq!(
            request.vitals.as_ref().and_then(|v| v.blood_pressure.as_deref()),
            Some("120/80")
        );

        let typed: CheckInRequest = serde_json::from_str(r#"{"qrData":"  ","token":"g4"}"#).unwrap();
        assert_eq!(typed.code(), Some("g4"));

        assert_eq!(CheckInRequest::default().code(), None);
    }
}
