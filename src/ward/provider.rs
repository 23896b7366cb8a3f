//! Ward provider traits and implementations
//!
//! This module defines the interface for looking up ward configuration (token
//! prefix, doctor, operating hours), along with the static implementation that
//! is built once at startup.

use crate::config::WardSettings;
use crate::error::{QueueError, Result};
use crate::types::{DoctorProfile, MinuteOfDay, Ward};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Configuration for a single ward
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WardConfiguration {
    pub ward: Ward,
    /// Prefix for token identifiers, e.g. `G` for `G12`
    pub token_prefix: String,
    pub doctor: DoctorProfile,
}

impl WardConfiguration {
    /// Default configuration for a ward: 10:00 to 17:00
    pub fn default_for(ward: Ward) -> Self {
        let (prefix, doctor_name) = match ward {
            Ward::Gynecologist => ("GY", "Anjali Mehta"),
            Ward::Orthopedic => ("O", "Rakesh Verma"),
            Ward::Dermatology => ("D", "Sneha Kapoor"),
            Ward::General => ("G", "Arun Sharma"),
        };

        Self {
            ward,
            token_prefix: prefix.to_string(),
            doctor: DoctorProfile {
                name: doctor_name.to_string(),
                opens_at: MinuteOfDay::from_hm(10, 0),
                closes_at: MinuteOfDay::from_hm(17, 0),
            },
        }
    }
}

/// Trait for providing ward configurations
pub trait WardProvider: Send + Sync {
    /// Get configuration for a specific ward
    fn get_ward_config(&self, ward: Ward) -> Result<WardConfiguration>;

    /// Get all configured wards, in lock-acquisition order
    fn available_wards(&self) -> Vec<Ward>;

    /// Validate a single ward configuration
    fn validate_config(&self, config: &WardConfiguration) -> Result<()>;
}

/// Static ward provider
///
/// Every ward in `Ward::ALL` must be configured exactly once, and token prefixes
/// must be distinct so that token ids stay unique across wards.
#[derive(Debug, Clone)]
pub struct StaticWardProvider {
    configs: BTreeMap<Ward, WardConfiguration>,
}

impl StaticWardProvider {
    /// Create a provider with the default configuration for every ward
    pub fn new() -> Self {
        Self {
            configs: Ward::ALL
                .iter()
                .map(|ward| (*ward, WardConfiguration::default_for(*ward)))
                .collect(),
        }
    }

    /// Create with custom configurations
    pub fn with_configs(configs: Vec<WardConfiguration>) -> Result<Self> {
        let mut provider = Self {
            configs: BTreeMap::new(),
        };

        for config in configs {
            provider.validate_config(&config)?;
            if provider.configs.insert(config.ward, config.clone()).is_some() {
                return Err(QueueError::Configuration {
                    message: format!("Ward {} is configured more than once", config.ward),
                }
                .into());
            }
        }

        if let Some(missing) = Ward::ALL
            .iter()
            .find(|ward| !provider.configs.contains_key(ward))
        {
            return Err(QueueError::Configuration {
                message: format!("Ward {} has no configuration", missing),
            }
            .into());
        }

        let mut prefixes = HashSet::new();
        for config in provider.configs.values() {
            if !prefixes.insert(config.token_prefix.to_uppercase()) {
                return Err(QueueError::Configuration {
                    message: format!(
                        "Token prefix '{}' is used by more than one ward",
                        config.token_prefix
                    ),
                }
                .into());
            }
        }

        Ok(provider)
    }

    /// Create from the `[[wards]]` section of the service configuration
    pub fn from_settings(settings: &[WardSettings]) -> Result<Self> {
        Self::with_configs(
            settings
                .iter()
                .map(|ward| WardConfiguration {
                    ward: ward.ward,
                    token_prefix: ward.token_prefix.trim().to_string(),
                    doctor: DoctorProfile {
                        name: ward.doctor_name.trim().to_string(),
                        opens_at: ward.opens_at,
                        closes_at: ward.closes_at,
                    },
                })
                .collect(),
        )
    }

    /// Update a single ward's configuration
    pub fn update_ward_config(&mut self, config: WardConfiguration) -> Result<()> {
        self.validate_config(&config)?;

        let clash = self.configs.values().any(|existing| {
            existing.ward != config.ward
                && existing
                    .token_prefix
                    .eq_ignore_ascii_case(&config.token_prefix)
        });
        if clash {
            return Err(QueueError::Configuration {
                message: format!(
                    "Token prefix '{}' is used by more than one ward",
                    config.token_prefix
                ),
            }
            .into());
        }

        self.configs.insert(config.ward, config);
        Ok(())
    }
}

impl Default for StaticWardProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl WardProvider for StaticWardProvider {
    fn get_ward_config(&self, ward: Ward) -> Result<WardConfiguration> {
        self.configs.get(&ward).cloned().ok_or_else(|| {
            QueueError::UnknownWard {
                ward: ward.to_string(),
            }
            .into()
        })
    }

    fn available_wards(&self) -> Vec<Ward> {
        self.configs.keys().copied().collect()
    }

    fn validate_config(&self, config: &WardConfiguration) -> Result<()> {
        let prefix = config.token_prefix.trim();
        if prefix.is_empty() {
            return Err(QueueError::Configuration {
                message: format!("Ward {} needs a token prefix", config.ward),
            }
            .into());
        }

        // A trailing digit would let `<prefix><n>` of one ward spell another ward's id
        if !prefix.chars().all(|c| c.is_ascii_alphanumeric())
            || prefix.ends_with(|c: char| c.is_ascii_digit())
        {
            return Err(QueueError::Configuration {
                message: format!(
                    "Token prefix '{}' must be alphanumeric and must not end in a digit",
                    prefix
                ),
            }
            .into());
        }

        if config.doctor.name.trim().is_empty() {
            return Err(QueueError::Configuration {
                message: format!("Ward {} needs a doctor name", config.ward),
            }
            .into());
        }

        if config.doctor.opens_at >= config.doctor.closes_at {
            return Err(QueueError::Configuration {
                message: format!(
                    "Ward {} opens at {} but closes at {}",
                    config.ward, config.doctor.opens_at, config.doctor.closes_at
                ),
            }
            .into());
        }

        if config.doctor.closes_at > MinuteOfDay::from_hm(24, 0) {
            return Err(QueueError::Configuration {
                message: format!("Ward {} must close by midnight", config.ward),
            }
            .into());
        }

        Ok(())
    }
}
