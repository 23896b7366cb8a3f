//! Common types used throughout the queue service

use crate::error::QueueError;
use chrono::{DateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Token identifier, e.g. `G12`
pub type TokenId = String;

/// Outpatient wards served by the department
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Ward {
    Gynecologist,
    Orthopedic,
    Dermatology,
    General,
}

impl Ward {
    /// Every ward, in lock-acquisition order
    pub const ALL: [Ward; 4] = [
        Ward::Gynecologist,
        Ward::Orthopedic,
        Ward::Dermatology,
        Ward::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Ward::Gynecologist => "Gynecologist",
            Ward::Orthopedic => "Orthopedic",
            Ward::Dermatology => "Dermatology",
            Ward::General => "General",
        }
    }

    /// Lowercase form used for metric labels
    pub fn label(&self) -> &'static str {
        match self {
            Ward::Gynecologist => "gynecologist",
            Ward::Orthopedic => "orthopedic",
            Ward::Dermatology => "dermatology",
            Ward::General => "general",
        }
    }
}

impl fmt::Display for Ward {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Ward {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(QueueError::validation("ward is required"));
        }

        Ward::ALL
            .iter()
            .copied()
            .find(|ward| ward.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| QueueError::UnknownWard {
                ward: trimmed.to_string(),
            })
    }
}

/// Minutes since local midnight
///
/// Values past 23:59 are legal while a ward clock runs past the end of the day;
/// they only ever reach the wire as `Closed` estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MinuteOfDay(u32);

impl MinuteOfDay {
    pub const MIDNIGHT: MinuteOfDay = MinuteOfDay(0);
    /// 23:59, the last minute that can be written as a wall-clock time
    pub const LAST_MINUTE: MinuteOfDay = MinuteOfDay(23 * 60 + 59);

    pub fn new(minutes: u32) -> Self {
        Self(minutes)
    }

    pub fn from_hm(hour: u32, minute: u32) -> Self {
        Self(hour * 60 + minute)
    }

    pub fn minutes(&self) -> u32 {
        self.0
    }

    pub fn hour(&self) -> u32 {
        self.0 / 60
    }

    pub fn minute(&self) -> u32 {
        self.0 % 60
    }

    pub fn plus(&self, minutes: u32) -> Self {
        Self(self.0.saturating_add(minutes))
    }

    /// Minute of day for a wall-clock time
    pub fn of<T: Timelike>(time: &T) -> Self {
        Self::from_hm(time.hour(), time.minute())
    }
}

impl fmt::Display for MinuteOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for MinuteOfDay {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map(|time| MinuteOfDay::of(&time))
            .map_err(|_| QueueError::validation(format!("invalid time of day '{}'", s)))
    }
}

impl Serialize for MinuteOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MinuteOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Projected consultation start for a queued token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatedTime {
    At(MinuteOfDay),
    /// The ward closes before this token can be seen
    Closed,
}

impl EstimatedTime {
    pub const CLOSED_LABEL: &'static str = "Closed";

    pub fn minute(&self) -> Option<MinuteOfDay> {
        match self {
            EstimatedTime::At(minute) => Some(*minute),
            EstimatedTime::Closed => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, EstimatedTime::Closed)
    }
}

impl fmt::Display for EstimatedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimatedTime::At(minute) => minute.fmt(f),
            EstimatedTime::Closed => f.write_str(Self::CLOSED_LABEL),
        }
    }
}

impl FromStr for EstimatedTime {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case(Self::CLOSED_LABEL) {
            Ok(EstimatedTime::Closed)
        } else {
            s.parse().map(EstimatedTime::At)
        }
    }
}

impl Serialize for EstimatedTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EstimatedTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// How token numbers are allocated within a ward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenNumbering {
    /// Per-ward counter, never reused within a service day
    #[default]
    Monotonic,
    /// Queue length plus one; numbers repeat once patients are called
    QueueLength,
}

impl FromStr for TokenNumbering {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "monotonic" => Ok(TokenNumbering::Monotonic),
            "queue_length" | "queue-length" => Ok(TokenNumbering::QueueLength),
            other => Err(QueueError::Configuration {
                message: format!("unknown token numbering scheme '{}'", other),
            }),
        }
    }
}

/// Vitals recorded by reception at check-in
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    #[serde(rename = "temp", alias = "temperature", default)]
    pub temperature: Option<String>,
    #[serde(rename = "bp", alias = "bloodPressure", default)]
    pub blood_pressure: Option<String>,
}

impl Vitals {
    pub fn is_empty(&self) -> bool {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
        blank(&self.temperature) && blank(&self.blood_pressure)
    }
}

/// One registration in a ward queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientToken {
    pub token: TokenId,
    pub name: String,
    pub phone: String,
    pub ward: Ward,
    pub emergency: bool,
    pub checked_in: bool,
    pub vitals: Option<Vitals>,
    pub estimated_time: EstimatedTime,
    pub booked_at: DateTime<Utc>,
}

/// Doctor attached to a ward
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorProfile {
    pub name: String,
    pub opens_at: MinuteOfDay,
    pub closes_at: MinuteOfDay,
}

/// Doctor break state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakState {
    pub on_break: bool,
    pub break_ends_at: Option<MinuteOfDay>,
}

/// Doctor profile together with current availability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorStatus {
    #[serde(flatten)]
    pub profile: DoctorProfile,
    #[serde(flatten)]
    pub break_state: BreakState,
}

/// Result of a successful booking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingReceipt {
    pub token: PatientToken,
    /// 1-based position in the ward queue right after insertion
    pub position: usize,
}

/// Consistent read of one ward
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub ward: Ward,
    pub queue: Vec<PatientToken>,
    pub now_serving: Option<PatientToken>,
    pub doctor: DoctorStatus,
}

/// Per-ward figures for the statistics board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WardSummary {
    pub ward: Ward,
    pub waiting: usize,
    pub checked_in: usize,
    pub on_break: bool,
    pub now_serving: Option<TokenId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ward_parsing() {
        assert_eq!("General".parse::<Ward>().unwrap(), Ward::General);
        assert_eq!(" dermatology ".parse::<Ward>().unwrap(), Ward::Dermatology);
        assert_eq!(
            "Cardiology".parse::<Ward>(),
            Err(QueueError::UnknownWard {
                ward: "Cardiology".to_string()
            })
        );
        assert!(matches!(
            "".parse::<Ward>(),
            Err(QueueError::Validation { .. })
        ));
    }

    #[test]
    fn test_minute_of_day_formatting() {
        let minute = MinuteOfDay::from_hm(9, 5);
        assert_eq!(minute.minutes(), 545);
        assert_eq!(minute.to_string(), "09:05");
        assert_eq!("17:30".parse::<MinuteOfDay>().unwrap(), MinuteOfDay::from_hm(17, 30));
        assert!("25:00".parse::<MinuteOfDay>().is_err());
    }

    #[test]
    fn test_estimated_time_serialization() {
        let at = EstimatedTime::At(MinuteOfDay::from_hm(10, 20));
        assert_eq!(serde_json::to_string(&at).unwrap(), "\"10:20\"");
        assert_eq!(
            serde_json::to_string(&EstimatedTime::Closed).unwrap(),
            "\"Closed\""
        );

        let parsed: EstimatedTime = serde_json::from_str("\"Closed\"").unwrap();
        assert!(parsed.is_closed());
    }

    #[test]
    fn test_doctor_status_flattens() {
        let status = DoctorStatus {
            profile: DoctorProfile {
                name: "Arun Sharma".to_string(),
                opens_at: MinuteOfDay::from_hm(10, 0),
                closes_at: MinuteOfDay::from_hm(17, 0),
            },
            break_state: BreakState {
                on_break: true,
                break_ends_at: Some(MinuteOfDay::from_hm(11, 0)),
            },
        };

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["name"], "Arun Sharma");
        assert_eq!(json["onBreak"], true);
        assert_eq!(json["breakEndsAt"], "11:00");
        assert_eq!(json["opensAt"], "10:00");
    }

    #[test]
    fn test_vitals_wire_names() {
        let vitals: Vitals = serde_json::from_str(r#"{"temp":"98.6","bp":"120/80"}"#).unwrap();
        assert_eq!(vitals.temperature.as_deref(), Some("98.6"));
        assert_eq!(vitals.blood_pressure.as_deref(), Some("120/80"));
        assert!(!vitals.is_empty());
        assert!(Vitals::default().is_empty());
    }

    #[test]
    fn test_token_numbering_parsing() {
        assert_eq!(
            "queue_length".parse::<TokenNumbering>().unwrap(),
            TokenNumbering::QueueLength
        );
        assert_eq!(
            "Monotonic".parse::<TokenNumbering>().unwrap(),
            TokenNumbering::Monotonic
        );
        assert!("random".parse::<TokenNumbering>().is_err());
    }
}
