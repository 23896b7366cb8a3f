//! Queue manager for all wards
//!
//! This module provides the `QueueManager`, which owns every ward queue and
//! implements booking, check-in, calling patients, doctor breaks, and the
//! statistics board.
//!
//! Each ward sits behind its own `RwLock`. Locks are always taken in `Ward`
//! order, the statistics lock is never held while a ward lock is being
//! acquired, and no guard survives an `.await`.

use crate::clock::Clock;
use crate::error::{QueueError, Result};
use crate::events::{EventPublisher, QueueEvent};
use crate::metrics::MetricsCollector;
use crate::schedule::{EstimateCalculator, ScheduleConfig, SlotEstimateCalculator};
use crate::types::{
    BookingReceipt, BreakState, DoctorStatus, EstimatedTime, MinuteOfDay, PatientToken,
    QueueSnapshot, TokenNumbering, Vitals, Ward, WardSummary,
};
use crate::utils::{current_timestamp, normalize_phone, parse_check_in_code, validate_name};
use crate::ward::instance::WardQueue;
use crate::ward::provider::WardProvider;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Statistics board for the whole department
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    /// Patients called in since local midnight
    pub patients_served_today: u64,
    /// Total tokens issued
    pub tokens_booked: u64,
    /// Total emergency tokens issued
    pub emergency_bookings: u64,
    /// Total first-time check-ins
    pub check_ins: u64,
    /// Current state of every ward
    pub wards: Vec<WardSummary>,
}

/// Running counters behind the statistics board
#[derive(Debug, Default)]
struct Counters {
    served_today: u64,
    served_date: Option<NaiveDate>,
    tokens_booked: u64,
    emergency_bookings: u64,
    check_ins: u64,
}

impl Counters {
    fn served_on(&self, today: NaiveDate) -> u64 {
        if self.served_date == Some(today) {
            self.served_today
        } else {
            0
        }
    }
}

/// Ward lock held during a booking: write on the target, read elsewhere
enum WardGuard<'a> {
    Read(RwLockReadGuard<'a, WardQueue>),
    Write(RwLockWriteGuard<'a, WardQueue>),
}

impl WardGuard<'_> {
    fn as_write_mut(&mut self) -> Option<&mut WardQueue> {
        match self {
            WardGuard::Write(guard) => Some(&mut **guard),
            WardGuard::Read(_) => None,
        }
    }
}

impl Deref for WardGuard<'_> {
    type Target = WardQueue;

    fn deref(&self) -> &WardQueue {
        match self {
            WardGuard::Read(guard) => &**guard,
            WardGuard::Write(guard) => &**guard,
        }
    }
}

/// Outcome of a check-in, collected while the ward locks are held
struct CheckInOutcome {
    patient: PatientToken,
    first_time: bool,
    summary: WardSummary,
}

/// The main queue manager
#[derive(Clone)]
pub struct QueueManager {
    /// Ward state, keyed and therefore iterated in lock order
    wards: Arc<BTreeMap<Ward, RwLock<WardQueue>>>,
    /// Ward provider for configurations
    ward_provider: Arc<dyn WardProvider>,
    /// Estimated-time calculator
    calculator: Arc<dyn EstimateCalculator>,
    /// Source of local time
    clock: Arc<dyn Clock>,
    /// Token numbering scheme
    numbering: TokenNumbering,
    /// Event publisher for queue events
    event_publisher: Arc<dyn EventPublisher>,
    /// Statistics counters
    counters: Arc<RwLock<Counters>>,
    /// Metrics collector for recording performance data
    metrics_collector: Arc<MetricsCollector>,
}

impl QueueManager {
    /// Create a new queue manager with default scheduling
    pub fn new(
        ward_provider: Arc<dyn WardProvider>,
        event_publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let metrics_collector = Arc::new(MetricsCollector::new()?);
        Self::with_metrics(ward_provider, event_publisher, clock, metrics_collector)
    }

    /// Create a new queue manager with metrics collector
    pub fn with_metrics(
        ward_provider: Arc<dyn WardProvider>,
        event_publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Result<Self> {
        Self::with_components(
            ward_provider,
            Arc::new(SlotEstimateCalculator::default()),
            clock,
            event_publisher,
            metrics_collector,
            TokenNumbering::default(),
        )
    }

    /// Create with a custom calculator, numbering scheme, and metrics
    pub fn with_components(
        ward_provider: Arc<dyn WardProvider>,
        calculator: Arc<dyn EstimateCalculator>,
        clock: Arc<dyn Clock>,
        event_publisher: Arc<dyn EventPublisher>,
        metrics_collector: Arc<MetricsCollector>,
        numbering: TokenNumbering,
    ) -> Result<Self> {
        let mut wards = BTreeMap::new();
        for ward in Ward::ALL {
            let config = ward_provider.get_ward_config(ward).map_err(|e| {
                QueueError::Configuration {
                    message: format!("Ward {} is not configured: {}", ward, e),
                }
            })?;
            ward_provider.validate_config(&config)?;
            wards.insert(ward, RwLock::new(WardQueue::new(config)));
        }

        info!(
            "Queue manager ready - wards: {}, numbering: {:?}, slots: {}/{} min, break: {} min",
            wards.len(),
            numbering,
            calculator.config().normal_slot_minutes,
            calculator.config().emergency_slot_minutes,
            calculator.config().break_minutes
        );

        Ok(Self {
            wards: Arc::new(wards),
            ward_provider,
            calculator,
            clock,
            numbering,
            event_publisher,
            counters: Arc::new(RwLock::new(Counters::default())),
            metrics_collector,
        })
    }

    /// Book a token for a patient.
    ///
    /// The duplicate-phone scan across all wards and the insertion into the
    /// target ward happen under the same set of locks.
    pub async fn book_token(
        &self,
        name: &str,
        phone: &str,
        ward: Ward,
        emergency: bool,
    ) -> Result<BookingReceipt> {
        let timer = self.metrics_collector.start_timer();

        let (receipt, summary) = match self.insert_booking(name, phone, ward, emergency) {
            Ok(booked) => booked,
            Err(e) => {
                let reason = QueueError::from_anyhow(&e).map_or("internal", QueueError::code);
                self.metrics_collector.record_booking_rejected(reason);
                warn!("Booking rejected - ward: {}, reason: {}", ward, e);
                return Err(e);
            }
        };

        {
            let mut counters = self.write_counters()?;
            counters.tokens_booked += 1;
            if emergency {
                counters.emergency_bookings += 1;
            }
        }

        info!(
            "Token booked - token: {}, ward: {}, emergency: {}, position: {}, estimated: {}",
            receipt.token.token, ward, emergency, receipt.position, receipt.token.estimated_time
        );

        self.metrics_collector.record_booking(ward, emergency);
        self.metrics_collector.update_ward(&summary);

        self.publish(QueueEvent::TokenBooked {
            ward,
            token: receipt.token.token.clone(),
            emergency,
            position: receipt.position,
            estimated_time: receipt.token.estimated_time,
            timestamp: current_timestamp(),
        })
        .await;

        self.metrics_collector
            .record_operation("book_token", timer.stop());
        Ok(receipt)
    }

    /// Mark a patient as arrived, attaching vitals when supplied.
    ///
    /// Accepts a bare token id or a slip QR payload. Checking in twice is
    /// allowed and may replace the vitals; the queue order and estimates are
    /// left alone.
    pub async fn check_in(&self, code: &str, vitals: Option<Vitals>) -> Result<PatientToken> {
        let timer = self.metrics_collector.start_timer();

        let outcome = match self.mark_checked_in(code, vitals) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Check-in rejected - code: '{}', reason: {}", code, e);
                return Err(e);
            }
        };
        let patient = outcome.patient;

        if outcome.first_time {
            self.write_counters()?.check_ins += 1;
            self.metrics_collector.record_check_in(patient.ward);
        }

        info!(
            "Patient checked in - token: {}, ward: {}, first_time: {}, vitals: {}",
            patient.token,
            patient.ward,
            outcome.first_time,
            patient.vitals.is_some()
        );

        self.metrics_collector.update_ward(&outcome.summary);

        // Display boards only announce the arrival once
        if outcome.first_time {
            self.publish(QueueEvent::PatientCheckedIn {
                ward: patient.ward,
                token: patient.token.clone(),
                timestamp: current_timestamp(),
            })
            .await;
        }

        self.metrics_collector
            .record_operation("check_in", timer.stop());
        Ok(patient)
    }

    /// Call the first checked-in patient of a ward in to the doctor.
    ///
    /// Patients who booked but have not arrived keep their place. Fails without
    /// touching the queue while the doctor is on break or nobody has arrived.
    pub async fn call_next(&self, ward: Ward) -> Result<PatientToken> {
        let timer = self.metrics_collector.start_timer();
        let now = self.clock.now();
        let minute = MinuteOfDay::of(&now);

        let (patient, summary) = {
            let mut queue = self.write_ward(ward)?;
            queue.roll_over(now.date_naive());

            if queue.break_state().on_break {
                warn!("Call rejected - ward: {}, doctor on break", ward);
                return Err(QueueError::DoctorOnBreak {
                    ward: ward.to_string(),
                }
                .into());
            }

            let Some(patient) = queue.take_next_arrived() else {
                warn!(
                    "Call rejected - ward: {}, none of {} waiting have checked in",
                    ward,
                    queue.len()
                );
                return Err(QueueError::NoArrivedPatients {
                    ward: ward.to_string(),
                }
                .into());
            };

            let slot = self.calculator.slot_minutes(patient.emergency);
            queue.start_consultation(patient.clone(), minute.plus(slot));
            queue.refresh_estimates(self.calculator.as_ref(), minute);

            (patient, queue.summary())
        };

        {
            let mut counters = self.write_counters()?;
            let today = now.date_naive();
            if counters.served_date != Some(today) {
                counters.served_date = Some(today);
                counters.served_today = 0;
            }
            counters.served_today += 1;
        }

        info!(
            "Patient called - token: {}, ward: {}, emergency: {}, remaining: {}",
            patient.token, ward, patient.emergency, summary.waiting
        );

        self.metrics_collector.record_patient_served(ward);
        self.metrics_collector.update_ward(&summary);

        self.publish(QueueEvent::PatientCalled {
            ward,
            token: patient.token.clone(),
            emergency: patient.emergency,
            timestamp: current_timestamp(),
        })
        .await;

        self.metrics_collector
            .record_operation("call_next", timer.stop());
        Ok(patient)
    }

    /// Start or end a doctor break
    pub async fn toggle_break(&self, ward: Ward) -> Result<BreakState> {
        let timer = self.metrics_collector.start_timer();
        let now = self.clock.now();
        let minute = MinuteOfDay::of(&now);

        let (state, summary) = {
            let mut queue = self.write_ward(ward)?;
            queue.roll_over(now.date_naive());
            let state = queue.toggle_break(minute, self.calculator.config().break_minutes);
            queue.refresh_estimates(self.calculator.as_ref(), minute);
            (state, queue.summary())
        };

        match state.break_ends_at {
            Some(ends_at) if state.on_break => {
                info!("Doctor break started - ward: {}, until: {}", ward, ends_at)
            }
            _ => info!("Doctor break ended - ward: {}", ward),
        }

        self.metrics_collector.update_ward(&summary);

        self.publish(QueueEvent::BreakToggled {
            ward,
            on_break: state.on_break,
            break_ends_at: state.break_ends_at,
            timestamp: current_timestamp(),
        })
        .await;

        self.metrics_collector
            .record_operation("toggle_break", timer.stop());
        Ok(state)
    }

    /// Clear the patient currently with the doctor.
    ///
    /// The queue and the ward clock are not touched. Returns the patient who was
    /// being seen, if any.
    pub async fn finish_consultation(&self, ward: Ward) -> Result<Option<PatientToken>> {
        let (finished, summary) = {
            let mut queue = self.write_ward(ward)?;
            let finished = queue.finish_consultation();
            (finished, queue.summary())
        };

        match &finished {
            Some(patient) => info!(
                "Consultation finished - token: {}, ward: {}",
                patient.token, ward
            ),
            None => debug!("Consultation finished with nobody being seen - ward: {}", ward),
        }

        self.metrics_collector.update_ward(&summary);

        self.publish(QueueEvent::ConsultationFinished {
            ward,
            token: finished.as_ref().map(|p| p.token.clone()),
            timestamp: current_timestamp(),
        })
        .await;

        Ok(finished)
    }

    /// Read one ward: queue in service order, now serving, and doctor status
    pub async fn get_queue(&self, ward: Ward) -> Result<QueueSnapshot> {
        let snapshot = self.read_ward(ward)?.snapshot();
        debug!(
            "Queue read - ward: {}, waiting: {}",
            ward,
            snapshot.queue.len()
        );
        Ok(snapshot)
    }

    /// Doctor profile and break state for a ward
    pub async fn doctor_status(&self, ward: Ward) -> Result<DoctorStatus> {
        Ok(self.read_ward(ward)?.doctor_status())
    }

    /// Get current statistics
    pub async fn stats(&self) -> Result<QueueStats> {
        let mut wards = Vec::with_capacity(self.wards.len());
        for ward in self.wards.keys() {
            wards.push(self.read_ward(*ward)?.summary());
        }

        let today = self.clock.today();
        let counters = self
            .counters
            .read()
            .map_err(|_| QueueError::lock_failed("stats"))?;

        Ok(QueueStats {
            patients_served_today: counters.served_on(today),
            tokens_booked: counters.tokens_booked,
            emergency_bookings: counters.emergency_bookings,
            check_ins: counters.check_ins,
            wards,
        })
    }

    /// Wards served by this manager, in lock order
    pub fn wards(&self) -> Vec<Ward> {
        self.wards.keys().copied().collect()
    }

    /// Ward provider backing this manager
    pub fn ward_provider(&self) -> Arc<dyn WardProvider> {
        self.ward_provider.clone()
    }

    /// Slot and break lengths in use
    pub fn schedule_config(&self) -> &ScheduleConfig {
        self.calculator.config()
    }

    pub fn numbering(&self) -> TokenNumbering {
        self.numbering
    }

    /// Validate, dedupe, and insert a booking while holding the ward locks
    fn insert_booking(
        &self,
        name: &str,
        phone: &str,
        ward: Ward,
        emergency: bool,
    ) -> Result<(BookingReceipt, WardSummary)> {
        let name = validate_name(name)?;
        let phone = normalize_phone(phone)?;
        let now = self.clock.now();
        let minute = MinuteOfDay::of(&now);

        let mut guards = Vec::with_capacity(self.wards.len());
        for (candidate, lock) in self.wards.iter() {
            let guard = if *candidate == ward {
                WardGuard::Write(
                    lock.write()
                        .map_err(|_| QueueError::lock_failed(candidate.as_str()))?,
                )
            } else {
                WardGuard::Read(
                    lock.read()
                        .map_err(|_| QueueError::lock_failed(candidate.as_str()))?,
                )
            };
            guards.push(guard);
        }

        if guards.iter().any(|guard| guard.contains_phone(&phone)) {
            return Err(QueueError::DuplicateBooking { phone }.into());
        }

        let queue = guards
            .iter_mut()
            .find_map(WardGuard::as_write_mut)
            .ok_or_else(|| QueueError::UnknownWard {
                ward: ward.to_string(),
            })?;

        queue.roll_over(now.date_naive());
        let token_id = queue.next_token_id(self.numbering);

        let position = queue.insert(PatientToken {
            token: token_id.clone(),
            name,
            phone,
            ward,
            emergency,
            checked_in: false,
            vitals: None,
            estimated_time: EstimatedTime::Closed,
            booked_at: current_timestamp(),
        });
        queue.refresh_estimates(self.calculator.as_ref(), minute);

        let token = queue
            .find_token(&token_id)
            .cloned()
            .ok_or_else(|| QueueError::Internal {
                message: format!("Token {} vanished after insertion", token_id),
            })?;

        Ok((BookingReceipt { token, position }, queue.summary()))
    }

    /// Find a token across all wards and mark it arrived
    fn mark_checked_in(&self, code: &str, vitals: Option<Vitals>) -> Result<CheckInOutcome> {
        let code = parse_check_in_code(code)?;
        let slip_phone = code
            .phone
            .as_deref()
            .map(|phone| normalize_phone(phone).unwrap_or_else(|_| phone.to_string()));

        let mut guards = Vec::with_capacity(self.wards.len());
        for (ward, lock) in self.wards.iter() {
            guards.push(
                lock.write()
                    .map_err(|_| QueueError::lock_failed(ward.as_str()))?,
            );
        }

        for queue in guards.iter_mut() {
            let Some(token) = queue.find_token_mut(&code.token) else {
                continue;
            };

            if let Some(phone) = &slip_phone {
                if token.phone != *phone {
                    debug!("Check-in phone mismatch for token {}", token.token);
                    break;
                }
            }

            let first_time = !token.checked_in;
            token.checked_in = true;
            if let Some(vitals) = vitals.filter(|v| !v.is_empty()) {
                token.vitals = Some(vitals);
            }

            let patient = token.clone();
            return Ok(CheckInOutcome {
                patient,
                first_time,
                summary: queue.summary(),
            });
        }

        Err(QueueError::TokenNotFound { token: code.token }.into())
    }

    fn read_ward(&self, ward: Ward) -> Result<RwLockReadGuard<'_, WardQueue>> {
        self.ward_lock(ward)?
            .read()
            .map_err(|_| QueueError::lock_failed(ward.as_str()).into())
    }

    fn write_ward(&self, ward: Ward) -> Result<RwLockWriteGuard<'_, WardQueue>> {
        self.ward_lock(ward)?
            .write()
            .map_err(|_| QueueError::lock_failed(ward.as_str()).into())
    }

    fn ward_lock(&self, ward: Ward) -> Result<&RwLock<WardQueue>> {
        self.wards.get(&ward).ok_or_else(|| {
            QueueError::UnknownWard {
                ward: ward.to_string(),
            }
            .into()
        })
    }

    fn write_counters(&self) -> Result<RwLockWriteGuard<'_, Counters>> {
        self.counters
            .write()
            .map_err(|_| QueueError::lock_failed("stats").into())
    }

    /// Publish an event; delivery problems are logged, never returned
    async fn publish(&self, event: QueueEvent) {
        let kind = event.kind();
        if let Err(e) = self.event_publisher.publish(event).await {
            warn!("Failed to publish {} event: {}", kind, e);
        }
    }
}
