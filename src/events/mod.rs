//! Queue events
//!
//! Every change to a ward queue is described by a `QueueEvent`. Events are wrapped
//! in an `EventEnvelope` carrying an id and a timestamp before they leave the
//! engine, and display boards receive them through the publisher.

pub mod publisher;

pub use publisher::{BroadcastEventPublisher, EventPublisher, RecordingEventPublisher};

use crate::error::{QueueError, Result};
use crate::types::{EstimatedTime, MinuteOfDay, TokenId, Ward};
use crate::utils::{current_timestamp, generate_event_id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Something that happened to a ward queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum QueueEvent {
    TokenBooked {
        ward: Ward,
        token: TokenId,
        emergency: bool,
        position: usize,
        estimated_time: EstimatedTime,
        timestamp: DateTime<Utc>,
    },
    PatientCheckedIn {
        ward: Ward,
        token: TokenId,
        timestamp: DateTime<Utc>,
    },
    PatientCalled {
        ward: Ward,
        token: TokenId,
        emergency: bool,
        timestamp: DateTime<Utc>,
    },
    ConsultationFinished {
        ward: Ward,
        token: Option<TokenId>,
        timestamp: DateTime<Utc>,
    },
    BreakToggled {
        ward: Ward,
        on_break: bool,
        break_ends_at: Option<MinuteOfDay>,
        timestamp: DateTime<Utc>,
    },
}

impl QueueEvent {
    /// Ward the event belongs to
    pub fn ward(&self) -> Ward {
        match self {
            QueueEvent::TokenBooked { ward, .. }
            | QueueEvent::PatientCheckedIn { ward, .. }
            | QueueEvent::PatientCalled { ward, .. }
            | QueueEvent::ConsultationFinished { ward, .. }
            | QueueEvent::BreakToggled { ward, .. } => *ward,
        }
    }

    /// Event type name, as written in the `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            QueueEvent::TokenBooked { .. } => "TokenBooked",
            QueueEvent::PatientCheckedIn { .. } => "PatientCheckedIn",
            QueueEvent::PatientCalled { .. } => "PatientCalled",
            QueueEvent::ConsultationFinished { .. } => "ConsultationFinished",
            QueueEvent::BreakToggled { .. } => "BreakToggled",
        }
    }
}

/// Event with delivery metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event: QueueEvent,
}

impl EventEnvelope {
    /// Wrap an event with a fresh id
    pub fn new(event: QueueEvent) -> Self {
        Self {
            event_id: generate_event_id(),
            timestamp: current_timestamp(),
            event,
        }
    }

    /// Serialize the envelope to a JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            QueueError::Internal {
                message: format!("Failed to serialize event: {}", e),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = QueueEvent::BreakToggled {
            ward: Ward::Dermatology,
            on_break: true,
            break_ends_at: Some(MinuteOfDay::from_hm(12, 30)),
            timestamp: current_timestamp(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "BreakToggled");
        assert_eq!(json["ward"], "Dermatology");
        assert_eq!(json["onBreak"], true);
        assert_eq!(json["breakEndsAt"], "12:30");
    }

    #[test]
    fn test_envelope_round_trip() {
        let envelope = EventEnvelope::new(QueueEvent::PatientCalled {
            ward: Ward::General,
            token: "G3".to_string(),
            emergency: false,
            timestamp: current_timestamp(),
        });

        let json = envelope.to_json().unwrap();
        assert!(json.contains("\"eventId\""));

        let parsed: EventEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, envelope);
        assert_eq!(parsed.event.ward(), Ward::General);
        assert_eq!(parsed.event.kind(), "PatientCalled");
    }
}
