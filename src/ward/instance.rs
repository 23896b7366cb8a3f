//! Ward queue state
//!
//! A `WardQueue` holds everything that belongs to one ward: the ordered token
//! queue, the patient currently with the doctor, the ward clock, and the doctor's
//! break state. It has no locking of its own; `QueueManager` wraps each ward in
//! a lock and decides which wards a mutation may touch.

use crate::schedule::EstimateCalculator;
use crate::types::{
    BreakState, DoctorStatus, MinuteOfDay, PatientToken, QueueSnapshot, TokenId, TokenNumbering,
    Ward, WardSummary,
};
use crate::utils::format_token_id;
use crate::ward::provider::WardConfiguration;
use chrono::NaiveDate;
use std::collections::VecDeque;
use tracing::debug;

/// State of a single ward
#[derive(Debug, Clone)]
pub struct WardQueue {
    config: WardConfiguration,
    tokens: VecDeque<PatientToken>,
    now_serving: Option<PatientToken>,
    /// Earliest minute the doctor can start the next consultation
    clock: MinuteOfDay,
    /// Service day the clock and the token counter belong to
    clock_date: Option<NaiveDate>,
    break_state: BreakState,
    /// Last number handed out under monotonic numbering
    last_number: u32,
}

impl WardQueue {
    /// Create an empty ward queue
    pub fn new(config: WardConfiguration) -> Self {
        Self {
            config,
            tokens: VecDeque::new(),
            now_serving: None,
            clock: MinuteOfDay::MIDNIGHT,
            clock_date: None,
            break_state: BreakState::default(),
            last_number: 0,
        }
    }

    pub fn ward(&self) -> Ward {
        self.config.ward
    }

    pub fn config(&self) -> &WardConfiguration {
        &self.config
    }

    /// Tokens in service order
    pub fn tokens(&self) -> &VecDeque<PatientToken> {
        &self.tokens
    }

    pub fn now_serving(&self) -> Option<&PatientToken> {
        self.now_serving.as_ref()
    }

    pub fn clock(&self) -> MinuteOfDay {
        self.clock
    }

    pub fn break_state(&self) -> BreakState {
        self.break_state
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Start a new service day if `today` differs from the clock's day.
    ///
    /// The clock goes back to midnight, the token counter restarts, and a break
    /// left running overnight is dropped. Queued tokens are kept. Returns true
    /// when a previous day was closed.
    pub fn roll_over(&mut self, today: NaiveDate) -> bool {
        match self.clock_date {
            Some(date) if date == today => false,
            previous => {
                self.clock_date = Some(today);
                self.clock = MinuteOfDay::MIDNIGHT;
                self.last_number = 0;
                self.break_state = BreakState::default();
                if previous.is_some() {
                    debug!("Ward {} rolled over to {}", self.ward(), today);
                }
                previous.is_some()
            }
        }
    }

    /// Allocate the identifier for the next booking
    pub fn next_token_id(&mut self, numbering: TokenNumbering) -> TokenId {
        match numbering {
            TokenNumbering::QueueLength => {
                format_token_id(&self.config.token_prefix, self.tokens.len() as u32 + 1)
            }
            TokenNumbering::Monotonic => loop {
                // Tokens carried over from an earlier day may hold low numbers
                self.last_number += 1;
                let candidate = format_token_id(&self.config.token_prefix, self.last_number);
                if !self.holds_token(&candidate) {
                    break candidate;
                }
            },
        }
    }

    /// Whether a token id is queued or being served here
    pub fn holds_token(&self, token: &str) -> bool {
        self.tokens
            .iter()
            .chain(self.now_serving.iter())
            .any(|t| t.token.eq_ignore_ascii_case(token))
    }

    /// Whether a phone number holds a queued token in this ward
    pub fn contains_phone(&self, phone: &str) -> bool {
        self.tokens.iter().any(|t| t.phone == phone)
    }

    /// Insert a token and return its 1-based position.
    ///
    /// Emergencies go to the head of the queue, everyone else to the tail.
    pub fn insert(&mut self, token: PatientToken) -> usize {
        if token.emergency {
            self.tokens.push_front(token);
            1
        } else {
            self.tokens.push_back(token);
            self.tokens.len()
        }
    }

    /// 1-based position of a token
    pub fn position_of(&self, token: &str) -> Option<usize> {
        self.tokens
            .iter()
            .position(|t| t.token.eq_ignore_ascii_case(token))
            .map(|index| index + 1)
    }

    pub fn find_token(&self, token: &str) -> Option<&PatientToken> {
        self.tokens
            .iter()
            .find(|t| t.token.eq_ignore_ascii_case(token))
    }

    pub fn find_token_mut(&mut self, token: &str) -> Option<&mut PatientToken> {
        self.tokens
            .iter_mut()
            .find(|t| t.token.eq_ignore_ascii_case(token))
    }

    /// Remove the first token that has checked in, leaving others in place
    pub fn take_next_arrived(&mut self) -> Option<PatientToken> {
        let index = self.tokens.iter().position(|t| t.checked_in)?;
        self.tokens.remove(index)
    }

    /// Put a called token in the consultation room and move the clock to the end
    /// of its slot
    pub fn start_consultation(&mut self, token: PatientToken, ends_at: MinuteOfDay) {
        self.clock = ends_at;
        self.now_serving = Some(token);
    }

    /// Clear the consultation room, returning who was in it
    pub fn finish_consultation(&mut self) -> Option<PatientToken> {
        self.now_serving.take()
    }

    /// Flip the doctor's break flag.
    ///
    /// The planned end stays on the current day; a late break ends at 23:59.
    pub fn toggle_break(&mut self, now: MinuteOfDay, break_minutes: u32) -> BreakState {
        self.break_state = if self.break_state.on_break {
            BreakState::default()
        } else {
            BreakState {
                on_break: true,
                break_ends_at: Some(now.plus(break_minutes).min(MinuteOfDay::LAST_MINUTE)),
            }
        };
        self.break_state
    }

    /// Settle the clock against `now` and recompute every estimate
    pub fn refresh_estimates(&mut self, calculator: &dyn EstimateCalculator, now: MinuteOfDay) {
        self.clock = calculator.settle_clock(self.clock, now, &self.break_state);
        calculator.estimate_queue(&mut self.tokens, self.clock, &self.config.doctor);
    }

    pub fn doctor_status(&self) -> DoctorStatus {
        DoctorStatus {
            profile: self.config.doctor.clone(),
            break_state: self.break_state,
        }
    }

    /// Consistent copy of the ward for readers
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            ward: self.ward(),
            queue: self.tokens.iter().cloned().collect(),
            now_serving: self.now_serving.clone(),
            doctor: self.doctor_status(),
        }
    }

    pub fn summary(&self) -> WardSummary {
        WardSummary {
            ward: self.ward(),
            waiting: self.tokens.len(),
            checked_in: self.tokens.iter().filter(|t| t.checked_in).count(),
            on_break: self.break_state.on_break,
            now_serving: self.now_serving.as_ref().map(|t| t.token.clone()),
        }
    }
}
