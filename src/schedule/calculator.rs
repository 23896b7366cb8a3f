//! Estimated-time calculation for ward queues
//!
//! The estimate is a full pass over the queue: a cursor starts at the ward clock
//! and walks the tokens in order, handing out fixed-length slots inside the
//! doctor's operating window. Every mutation reruns the pass for the whole queue.

use crate::error::{QueueError, Result};
use crate::types::{BreakState, DoctorProfile, EstimatedTime, MinuteOfDay, PatientToken};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// Longest slot or break a ward can be configured with
const MAX_CONFIGURED_MINUTES: u32 = 24 * 60;

/// Slot lengths used when projecting consultation times
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Minutes reserved for a regular consultation
    pub normal_slot_minutes: u32,
    /// Minutes reserved for an emergency consultation
    pub emergency_slot_minutes: u32,
    /// Length of a doctor break
    pub break_minutes: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            normal_slot_minutes: 10,
            emergency_slot_minutes: 20,
            break_minutes: 30,
        }
    }
}

impl ScheduleConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("normal_slot_minutes", self.normal_slot_minutes),
            ("emergency_slot_minutes", self.emergency_slot_minutes),
            ("break_minutes", self.break_minutes),
        ] {
            if value == 0 || value > MAX_CONFIGURED_MINUTES {
                return Err(QueueError::Configuration {
                    message: format!(
                        "{} must be between 1 and {}",
                        name, MAX_CONFIGURED_MINUTES
                    ),
                }
                .into());
            }
        }

        Ok(())
    }
}

/// Trait for projecting consultation times onto a ward queue
pub trait EstimateCalculator: Send + Sync {
    /// Bring the ward clock up to date before a pass.
    ///
    /// A break that is still running holds the clock at the break end; otherwise the
    /// clock catches up with `now`. The result is never earlier than `clock`.
    fn settle_clock(
        &self,
        clock: MinuteOfDay,
        now: MinuteOfDay,
        break_state: &BreakState,
    ) -> MinuteOfDay;

    /// Rewrite the estimate of every token, starting from `start`.
    ///
    /// Returns the cursor after the last token that received a slot.
    fn estimate_queue(
        &self,
        tokens: &mut VecDeque<PatientToken>,
        start: MinuteOfDay,
        hours: &DoctorProfile,
    ) -> MinuteOfDay;

    /// Consultation length for a token
    fn slot_minutes(&self, emergency: bool) -> u32;

    /// Get the current configuration
    fn config(&self) -> &ScheduleConfig;
}

/// Fixed-slot calculator
#[derive(Debug, Clone)]
pub struct SlotEstimateCalculator {
    config: ScheduleConfig,
}

impl SlotEstimateCalculator {
    /// Create a new calculator after validating the configuration
    pub fn new(config: ScheduleConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl Default for SlotEstimateCalculator {
    fn default() -> Self {
        Self {
            config: ScheduleConfig::default(),
        }
    }
}

impl EstimateCalculator for SlotEstimateCalculator {
    fn settle_clock(
        &self,
        clock: MinuteOfDay,
        now: MinuteOfDay,
        break_state: &BreakState,
    ) -> MinuteOfDay {
        match break_state.break_ends_at {
            Some(ends_at) if break_state.on_break && ends_at > now => clock.max(ends_at),
            _ => clock.max(now),
        }
    }

    fn estimate_queue(
        &self,
        tokens: &mut VecDeque<PatientToken>,
        start: MinuteOfDay,
        hours: &DoctorProfile,
    ) -> MinuteOfDay {
        let mut cursor = start;
        let mut closed = 0usize;

        for token in tokens.iter_mut() {
            cursor = cursor.max(hours.opens_at);

            if cursor >= hours.closes_at {
                token.estimated_time = EstimatedTime::Closed;
                closed += 1;
                continue;
            }

            token.estimated_time = EstimatedTime::At(cursor);
            cursor = cursor.plus(self.slot_minutes(token.emergency));
        }

        debug!(
            "Estimated {} tokens from {} ({} past closing {})",
            tokens.len(),
            start,
            closed,
            hours.closes_at
        );

        cursor
    }

    fn slot_minutes(&self, emergency: bool) -> u32 {
        if emergency {
            self.config.emergency_slot_minutes
        } else {
            self.config.normal_slot_minutes
        }
    }

    fn config(&self) -> &ScheduleConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Ward;
    use crate::utils::current_timestamp;

    fn hours(open: (u32, u32), close: (u32, u32)) -> DoctorProfile {
        DoctorProfile {
            name: "Arun Sharma".to_string(),
            opens_at: MinuteOfDay::from_hm(open.0, open.1),
            closes_at: MinuteOfDay::from_hm(close.0, close.1),
        }
    }

    fn token(id: &str, emergency: bool) -> PatientToken {
        PatientToken {
            token: id.to_string(),
            name: format!("Patient {}", id),
            phone: "9000000000".to_string(),
            ward: Ward::General,
            emergency,
            checked_in: false,
            vitals: None,
            estimated_time: EstimatedTime::Closed,
            booked_at: current_timestamp(),
        }
    }

    fn times(tokens: &VecDeque<PatientToken>) -> Vec<String> {
        tokens.iter().map(|t| t.estimated_time.to_string()).collect()
    }

    #[test]
    fn test_schedule_config_default() {
        let config = ScheduleConfig::default();
        assert_eq!(config.normal_slot_minutes, 10);
        assert_eq!(config.emergency_slot_minutes, 20);
        assert_eq!(config.break_minutes, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_schedule_config_validation() {
        let mut config = ScheduleConfig::default();
        config.normal_slot_minutes = 0;
        assert!(config.validate().is_err());

        config = ScheduleConfig::default();
        config.break_minutes = 24 * 60 + 1;
        assert!(config.validate().is_err());

        assert!(SlotEstimateCalculator::new(config).is_err());
    }

    #[test]
    fn test_slots_are_sequential() {
        let calculator = SlotEstimateCalculator::default();
        let mut queue: VecDeque<_> =
            vec![token("G1", true), token("G2", false), token("G3", false)].into();

        let end = calculator.estimate_queue(
            &mut queue,
            MinuteOfDay::from_hm(10, 0),
            &hours((10, 0), (17, 0)),
        );

        assert_eq!(times(&queue), vec!["10:00", "10:20", "10:30"]);
        assert_eq!(end, MinuteOfDay::from_hm(10, 40));
    }

    #[test]
    fn test_cursor_clamped_to_opening() {
        let calculator = SlotEstimateCalculator::default();
        let mut queue: VecDeque<_> = vec![token("G1", false), token("G2", true)].into();

        calculator.estimate_queue(
            &mut queue,
            MinuteOfDay::from_hm(7, 45),
            &hours((10, 0), (17, 0)),
        );

        assert_eq!(times(&queue), vec!["10:00", "10:10"]);
    }

    #[test]
    fn test_tokens_past_closing_are_closed() {
        let calculator = SlotEstimateCalculator::default();
        let mut queue: VecDeque<_> = vec![
            token("G1", false),
            token("G2", false),
            token("G3", true),
            token("G4", false),
        ]
        .into();

        calculator.estimate_queue(
            &mut queue,
            MinuteOfDay::from_hm(16, 45),
            &hours((10, 0), (17, 0)),
        );

        assert_eq!(times(&queue), vec!["16:45", "16:55", "Closed", "Closed"]);
    }

    #[test]
    fn test_settle_clock_catches_up_with_now() {
        let calculator = SlotEstimateCalculator::default();
        let settled = calculator.settle_clock(
            MinuteOfDay::from_hm(9, 0),
            MinuteOfDay::from_hm(11, 0),
            &BreakState::default(),
        );
        assert_eq!(settled, MinuteOfDay::from_hm(11, 0));

        // A clock already ahead of now stays put
        let ahead = calculator.settle_clock(
            MinuteOfDay::from_hm(11, 30),
            MinuteOfDay::from_hm(11, 0),
            &BreakState::default(),
        );
        assert_eq!(ahead, MinuteOfDay::from_hm(11, 30));
    }

    #[test]
    fn test_settle_clock_honours_running_break() {
        let calculator = SlotEstimateCalculator::default();
        let on_break = BreakState {
            on_break: true,
            break_ends_at: Some(MinuteOfDay::from_hm(12, 30)),
        };

        let settled = calculator.settle_clock(
            MinuteOfDay::from_hm(12, 0),
            MinuteOfDay::from_hm(12, 5),
            &on_break,
        );
        assert_eq!(settled, MinuteOfDay::from_hm(12, 30));

        // Once the break end has passed, now wins again
        let overdue = calculator.settle_clock(
            MinuteOfDay::from_hm(12, 0),
            MinuteOfDay::from_hm(12, 45),
            &on_break,
        );
        assert_eq!(overdue, MinuteOfDay::from_hm(12, 45));
    }
}
