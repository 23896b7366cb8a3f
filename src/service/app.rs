//! Main application state and service coordination
//!
//! `AppState` wires the queue engine to its collaborators (clock, event
//! publisher, staff authenticator, metrics) and owns the background tasks that
//! keep gauges fresh while the service runs.

use crate::auth::{StaffAuthenticator, StaticStaffAuthenticator};
use crate::clock::{Clock, SystemClock};
use crate::config::{validate_config, AppConfig};
use crate::events::BroadcastEventPublisher;
use crate::metrics::MetricsCollector;
use crate::schedule::SlotEstimateCalculator;
use crate::service::health::{HealthCheck, HealthStatus};
use crate::ward::{QueueManager, StaticWardProvider};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, info, warn};

/// How often the gauge refresher runs
const GAUGE_REFRESH_INTERVAL: Duration = Duration::from_secs(15);

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Queue engine shared by every request handler
    queue_manager: Arc<QueueManager>,

    /// Fan-out of queue events to display boards
    event_publisher: Arc<BroadcastEventPublisher>,

    /// Doctor and reception login
    authenticator: Arc<dyn StaffAuthenticator>,

    /// Prometheus metrics
    metrics_collector: Arc<MetricsCollector>,

    /// Hospital-local time source
    clock: Arc<dyn Clock>,

    /// Background task handles
    background_tasks: Mutex<Vec<JoinHandle<()>>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,

    started_at: Instant,
}

impl AppState {
    /// Initialize the application with the system clock at the configured offset
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        let clock = SystemClock::new(config.service.utc_offset_minutes).map_err(|e| {
            ServiceError::Configuration {
                message: e.to_string(),
            }
        })?;
        Self::with_clock(config, Arc::new(clock)).await
    }

    /// Initialize the application with an explicit clock
    pub async fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> Result<Self, ServiceError> {
        info!("Initializing {} service", config.service.name);

        validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let event_publisher = Arc::new(BroadcastEventPublisher::new(
            config.service.event_buffer_size,
        ));

        let queue_manager =
            Self::initialize_queue_engine(&config, clock.clone(), &event_publisher, &metrics_collector)?;

        let authenticator: Arc<dyn StaffAuthenticator> =
            Arc::new(StaticStaffAuthenticator::from_settings(&config.staff));

        info!(
            "Configuration: wards={}, numbering={:?}, utc_offset={}min, doctors={}, receptionists={}",
            config.wards.len(),
            config.scheduling.token_numbering,
            config.service.utc_offset_minutes,
            config.staff.doctors.len(),
            config.staff.receptionists.len()
        );

        Ok(Self {
            config,
            queue_manager,
            event_publisher,
            authenticator,
            metrics_collector,
            clock,
            background_tasks: Mutex::new(Vec::new()),
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
        })
    }

    /// Mark the service as running and start background tasks
    pub async fn start(&self) -> Result<(), ServiceError> {
        info!("Starting {} service", self.config.service.name);

        *self.is_running.write().await = true;

        self.start_background_tasks().await?;

        info!("✅ {} service started successfully", self.config.service.name);
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of {}", self.config.service.name);

        *self.is_running.write().await = false;

        self.stop_background_tasks().await;

        let final_stats =
            self.queue_manager
                .stats()
                .await
                .map_err(|e| ServiceError::BackgroundTask {
                    message: format!("Failed to get final stats: {}", e),
                })?;

        info!(
            "Final statistics: served today {}, booked {}, emergencies {}, check-ins {}",
            final_stats.patients_served_today,
            final_stats.tokens_booked,
            final_stats.emergency_bookings,
            final_stats.check_ins
        );
        for ward in &final_stats.wards {
            if ward.waiting > 0 {
                warn!(
                    "Ward {} still had {} patients waiting at shutdown",
                    ward.ward, ward.waiting
                );
            }
        }
        info!("✅ {} shutdown completed", self.config.service.name);

        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Queue engine for request handlers
    pub fn queue_manager(&self) -> Arc<QueueManager> {
        self.queue_manager.clone()
    }

    /// Event fan-out used by the SSE endpoint
    pub fn event_publisher(&self) -> Arc<BroadcastEventPublisher> {
        self.event_publisher.clone()
    }

    pub fn authenticator(&self) -> Arc<dyn StaffAuthenticator> {
        self.authenticator.clone()
    }

    /// Get metrics collector
    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Time since the state was built
    pub fn uptime(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    fn initialize_queue_engine(
        config: &AppConfig,
        clock: Arc<dyn Clock>,
        event_publisher: &Arc<BroadcastEventPublisher>,
        metrics_collector: &Arc<MetricsCollector>,
    ) -> Result<Arc<QueueManager>, ServiceError> {
        let init_error = |e: anyhow::Error| ServiceError::Initialization {
            message: format!("Failed to initialize queue engine: {:#}", e),
        };

        let ward_provider = StaticWardProvider::from_settings(&config.wards).map_err(init_error)?;
        let calculator =
            SlotEstimateCalculator::new(config.scheduling.schedule_config()).map_err(init_error)?;

        let manager = QueueManager::with_components(
            Arc::new(ward_provider),
            Arc::new(calculator),
            clock,
            event_publisher.clone(),
            metrics_collector.clone(),
            config.scheduling.token_numbering,
        )
        .map_err(init_error)?;

        Ok(Arc::new(manager))
    }

    /// Start background maintenance tasks
    async fn start_background_tasks(&self) -> Result<(), ServiceError> {
        info!("Starting background tasks");

        let queue_manager = self.queue_manager.clone();
        let metrics_collector = self.metrics_collector.clone();
        let is_running = self.is_running.clone();
        let started_at = self.started_at;

        let gauge_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(GAUGE_REFRESH_INTERVAL);

            while *is_running.read().await {
                interval.tick().await;

                metrics_collector.update_uptime(started_at.elapsed());
                match queue_manager.stats().await {
                    Ok(stats) => {
                        for summary in &stats.wards {
                            metrics_collector.update_ward(summary);
                        }
                        metrics_collector.update_component_health("queue_manager", true);
                        debug!(
                            "Gauges refreshed - served today: {}, waiting: {}",
                            stats.patients_served_today,
                            stats.wards.iter().map(|w| w.waiting).sum::<usize>()
                        );
                    }
                    Err(e) => {
                        metrics_collector.update_component_health("queue_manager", false);
                        warn!("Failed to refresh ward gauges: {}", e);
                    }
                }
            }
        });

        self.background_tasks.lock().await.push(gauge_task);

        info!("✅ Background tasks started");
        Ok(())
    }

    /// Stop all background tasks
    async fn stop_background_tasks(&self) {
        info!("Stopping background tasks");

        let mut tasks = self.background_tasks.lock().await;
        for task in tasks.drain(..) {
            task.abort();
        }

        info!("✅ Background tasks stopped");
    }

    /// Run a health check and publish the result to the health gauge
    pub async fn record_health(self: &Arc<Self>) -> HealthStatus {
        let status = match HealthCheck::check(self.clone()).await {
            Ok(health) => health.status,
            Err(e) => {
                warn!("Health check failed: {}", e);
                HealthStatus::Unhealthy
            }
        };
        self.metrics_collector.update_health_status(status.gauge_value());
        status
    }
}
