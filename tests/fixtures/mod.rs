//! Shared setup for integration tests

#![allow(dead_code)]

use opd_queue::clock::ManualClock;
use opd_queue::config::AppConfig;
use opd_queue::events::RecordingEventPublisher;
use opd_queue::metrics::MetricsCollector;
use opd_queue::service::AppState;
use opd_queue::types::{BookingReceipt, Ward};
use opd_queue::ward::{QueueManager, StaticWardProvider};
use std::sync::Arc;

/// Queue engine wired to a manual clock and a recording publisher
pub struct TestSystem {
    pub manager: QueueManager,
    pub clock: Arc<ManualClock>,
    pub events: Arc<RecordingEventPublisher>,
    pub metrics: Arc<MetricsCollector>,
}

impl TestSystem {
    /// Build with default ward configuration, clock set to `hour:minute`
    pub fn at(hour: u32, minute: u32) -> Self {
        let clock = Arc::new(ManualClock::at(hour, minute));
        let events = Arc::new(RecordingEventPublisher::new());
        let metrics = Arc::new(MetricsCollector::new().expect("Failed to create collector"));
        let manager = QueueManager::with_metrics(
            Arc::new(StaticWardProvider::new()),
            events.clone(),
            clock.clone(),
            metrics.clone(),
        )
        .expect("Failed to create queue manager");

        Self {
            manager,
            clock,
            events,
            metrics,
        }
    }

    /// Book a normal token with a generated phone number
    pub async fn book(&self, name: &str, ward: Ward) -> BookingReceipt {
        self.book_with(name, ward, false).await
    }

    pub async fn book_with(&self, name: &str, ward: Ward, emergency: bool) -> BookingReceipt {
        self.manager
            .book_token(name, &phone_for(name), ward, emergency)
            .await
            .expect("booking failed")
    }

    /// Book and immediately check the patient in
    pub async fn arrive(&self, name: &str, ward: Ward, emergency: bool) -> BookingReceipt {
        let receipt = self.book_with(name, ward, emergency).await;
        self.manager
            .check_in(&receipt.token.token, None)
            .await
            .expect("check-in failed");
        receipt
    }

    /// Token ids of a ward queue, in service order
    pub async fn order(&self, ward: Ward) -> Vec<String> {
        self.manager
            .get_queue(ward)
            .await
            .expect("queue read failed")
            .queue
            .into_iter()
            .map(|t| t.token)
            .collect()
    }
}

/// Running `AppState` on a manual clock, for HTTP tests
pub async fn create_test_state(hour: u32, minute: u32) -> (Arc<AppState>, Arc<ManualClock>) {
    create_test_state_with(AppConfig::default(), hour, minute).await
}

pub async fn create_test_state_with(
    config: AppConfig,
    hour: u32,
    minute: u32,
) -> (Arc<AppState>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::at(hour, minute));
    let state = AppState::with_clock(config, clock.clone())
        .await
        .expect("Failed to create app state");
    state.start().await.expect("Failed to start app state");
    (Arc::new(state), clock)
}

/// Stable ten-digit phone number derived from a name
pub fn phone_for(name: &str) -> String {
    let hash = name
        .bytes()
        .fold(7_u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
    format!("9{:09}", hash % 1_000_000_000)
}

/// Phone number for the n-th generated patient
pub fn nth_phone(n: usize) -> String {
    format!("98{:08}", n)
}
