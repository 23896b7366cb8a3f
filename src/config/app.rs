//! Main application configuration
//!
//! This module defines the configuration structures for the OPD queue service,
//! including TOML file loading, environment variable overrides, and validation.

use crate::schedule::ScheduleConfig;
use crate::types::{MinuteOfDay, TokenNumbering, Ward};
use crate::ward::provider::WardConfiguration;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceSettings,
    #[serde(default)]
    pub scheduling: SchedulingSettings,
    #[serde(default = "default_wards")]
    pub wards: Vec<WardSettings>,
    #[serde(default)]
    pub staff: StaffSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Address the HTTP API binds to
    pub http_host: String,
    /// Port for the HTTP API, health, and metrics endpoints
    pub http_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
    /// Hospital timezone as an offset from UTC, in minutes
    pub utc_offset_minutes: i32,
    /// Events a slow display board may fall behind before it misses some
    pub event_buffer_size: usize,
    /// Browser origins allowed to call the API; empty allows any origin
    pub cors_allowed_origins: Vec<String>,
}

/// Consultation scheduling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingSettings {
    /// Minutes reserved for a regular consultation
    pub normal_slot_minutes: u32,
    /// Minutes reserved for an emergency consultation
    pub emergency_slot_minutes: u32,
    /// Length of a doctor break in minutes
    pub break_duration_minutes: u32,
    /// How token numbers are allocated
    pub token_numbering: TokenNumbering,
}

/// Per-ward settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WardSettings {
    pub ward: Ward,
    pub token_prefix: String,
    pub doctor_name: String,
    pub opens_at: MinuteOfDay,
    pub closes_at: MinuteOfDay,
}

/// Staff accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StaffSettings {
    pub doctors: Vec<DoctorAccount>,
    pub receptionists: Vec<StaffAccount>,
}

/// Doctor login, bound to the ward the doctor runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorAccount {
    pub username: String,
    pub password: String,
    pub ward: Ward,
}

/// Reception desk login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffAccount {
    pub username: String,
    pub password: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service: ServiceSettings::default(),
            scheduling: SchedulingSettings::default(),
            wards: default_wards(),
            staff: StaffSettings::default(),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "opd-queue".to_string(),
            log_level: "info".to_string(),
            http_host: "0.0.0.0".to_string(),
            http_port: 5055,
            shutdown_timeout_seconds: 30,
            utc_offset_minutes: 330, // IST
            event_buffer_size: 256,
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl Default for SchedulingSettings {
    fn default() -> Self {
        let schedule = ScheduleConfig::default();
        Self {
            normal_slot_minutes: schedule.normal_slot_minutes,
            emergency_slot_minutes: schedule.emergency_slot_minutes,
            break_duration_minutes: schedule.break_minutes,
            token_numbering: TokenNumbering::default(),
        }
    }
}

impl Default for StaffSettings {
    fn default() -> Self {
        Self {
            doctors: Ward::ALL
                .iter()
                .map(|ward| DoctorAccount {
                    username: format!("dr.{}", ward.label()),
                    password: "opd-doctor".to_string(),
                    ward: *ward,
                })
                .collect(),
            receptionists: vec![StaffAccount {
                username: "reception".to_string(),
                password: "opd-reception".to_string(),
            }],
        }
    }
}

impl WardSettings {
    /// Default settings for a ward
    pub fn default_for(ward: Ward) -> Self {
        WardConfiguration::default_for(ward).into()
    }
}

impl From<WardConfiguration> for WardSettings {
    fn from(config: WardConfiguration) -> Self {
        Self {
            ward: config.ward,
            token_prefix: config.token_prefix,
            doctor_name: config.doctor.name,
            opens_at: config.doctor.opens_at,
            closes_at: config.doctor.closes_at,
        }
    }
}

impl SchedulingSettings {
    /// Slot lengths for the estimate calculator
    pub fn schedule_config(&self) -> ScheduleConfig {
        ScheduleConfig {
            normal_slot_minutes: self.normal_slot_minutes,
            emergency_slot_minutes: self.emergency_slot_minutes,
            break_minutes: self.break_duration_minutes,
        }
    }
}

fn default_wards() -> Vec<WardSettings> {
    Ward::ALL.iter().map(|w| WardSettings::default_for(*w)).collect()
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Parse configuration from TOML text without validating it
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(host) = env::var("HTTP_HOST") {
            self.service.http_host = host;
        }
        if let Ok(port) = env::var("HTTP_PORT") {
            self.service.http_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid HTTP_PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }
        if let Ok(offset) = env::var("UTC_OFFSET_MINUTES") {
            self.service.utc_offset_minutes = offset
                .parse()
                .map_err(|_| anyhow!("Invalid UTC_OFFSET_MINUTES value: {}", offset))?;
        }
        if let Ok(origins) = env::var("CORS_ALLOWED_ORIGINS") {
            self.service.cors_allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }

        // Scheduling settings
        if let Ok(slot) = env::var("NORMAL_SLOT_MINUTES") {
            self.scheduling.normal_slot_minutes = slot
                .parse()
                .map_err(|_| anyhow!("Invalid NORMAL_SLOT_MINUTES value: {}", slot))?;
        }
        if let Ok(slot) = env::var("EMERGENCY_SLOT_MINUTES") {
            self.scheduling.emergency_slot_minutes = slot
                .parse()
                .map_err(|_| anyhow!("Invalid EMERGENCY_SLOT_MINUTES value: {}", slot))?;
        }
        if let Ok(minutes) = env::var("BREAK_DURATION_MINUTES") {
            self.scheduling.break_duration_minutes = minutes
                .parse()
                .map_err(|_| anyhow!("Invalid BREAK_DURATION_MINUTES value: {}", minutes))?;
        }
        if let Ok(numbering) = env::var("TOKEN_NUMBERING") {
            self.scheduling.token_numbering = numbering.parse()?;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get break length as Duration
    pub fn break_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.scheduling.break_duration_minutes) * 60)
    }

    /// Address for the HTTP listener
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.service.http_host, self.service.http_port)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate listener
    if config.service.http_host.trim().is_empty() {
        return Err(anyhow!("HTTP host cannot be empty"));
    }
    if config.service.http_port == 0 {
        return Err(anyhow!("HTTP port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.service.utc_offset_minutes.abs() >= 24 * 60 {
        return Err(anyhow!(
            "UTC offset must be within a day, got {} minutes",
            config.service.utc_offset_minutes
        ));
    }
    if config.service.event_buffer_size == 0 {
        return Err(anyhow!("Event buffer size must be greater than 0"));
    }
    for origin in &config.service.cors_allowed_origins {
        let origin = origin.trim();
        let has_scheme = origin.starts_with("http://") || origin.starts_with("https://");
        if !has_scheme || origin.ends_with('/') || origin.contains(char::is_whitespace) {
            return Err(anyhow!("Invalid CORS origin: '{}'", origin));
        }
    }

    // Validate scheduling
    config.scheduling.schedule_config().validate()?;

    // Validate wards: every ward once, distinct prefixes, sane hours
    let mut seen = HashSet::new();
    let mut prefixes = HashSet::new();
    for ward in &config.wards {
        if !seen.insert(ward.ward) {
            return Err(anyhow!("Ward {} is configured more than once", ward.ward));
        }
        if !prefixes.insert(ward.token_prefix.trim().to_uppercase()) {
            return Err(anyhow!(
                "Token prefix '{}' is used by more than one ward",
                ward.token_prefix
            ));
        }
        if ward.opens_at >= ward.closes_at {
            return Err(anyhow!(
                "Ward {} must open before it closes ({} >= {})",
                ward.ward,
                ward.opens_at,
                ward.closes_at
            ));
        }
    }
    if let Some(missing) = Ward::ALL.iter().find(|w| !seen.contains(*w)) {
        return Err(anyhow!("Ward {} has no configuration", missing));
    }

    // Validate staff accounts
    let mut usernames = HashSet::new();
    let accounts = config
        .staff
        .doctors
        .iter()
        .map(|d| (&d.username, &d.password))
        .chain(
            config
                .staff
                .receptionists
                .iter()
                .map(|r| (&r.username, &r.password)),
        );
    for (username, password) in accounts {
        if username.trim().is_empty() || password.is_empty() {
            return Err(anyhow!("Staff accounts need a username and a password"));
        }
        if !usernames.insert(username.trim().to_lowercase()) {
            return Err(anyhow!("Staff username '{}' is used more than once", username));
        }
    }

    Ok(())
}
