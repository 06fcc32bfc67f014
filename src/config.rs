//! Configuration for the subscriber session.
//!
//! Credentials and the device identity come from `TTS_*` environment
//! variables (a `.env` file in the working directory is loaded first); the
//! QoS level and persistence toggle come from the command line. Everything is
//! validated here, before any network activity.

use std::env;
use thiserror::Error;

/// Environment variable names recognized at startup.
pub const ENV_HOST: &str = "TTS_HOST";
pub const ENV_PORT: &str = "TTS_PORT";
pub const ENV_USERNAME: &str = "TTS_USERNAME";
pub const ENV_PASSWORD: &str = "TTS_PASSWORD";
pub const ENV_APPLICATION_ID: &str = "TTS_APPLICATION_ID";
pub const ENV_TENANT_ID: &str = "TTS_TENANT_ID";
pub const ENV_DEVICE_ID: &str = "TTS_DEVICE_ID";

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is missing or empty")]
    MissingVar(&'static str),
    #[error("environment variable {0} is invalid: {1}")]
    InvalidVar(&'static str, String),
    #[error("QoS must be 0, 1 or 2, got {0}")]
    InvalidQos(u8),
}

/// MQTT delivery guarantee level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QosLevel {
    /// 0 - fire and forget
    AtMostOnce,
    /// 1 - acknowledged delivery
    AtLeastOnce,
    /// 2 - assured delivery
    ExactlyOnce,
}

impl TryFrom<u8> for QosLevel {
    type Error = ConfigError;

    fn try_from(level: u8) -> Result<Self, ConfigError> {
        match level {
            0 => Ok(QosLevel::AtMostOnce),
            1 => Ok(QosLevel::AtLeastOnce),
            2 => Ok(QosLevel::ExactlyOnce),
            other => Err(ConfigError::InvalidQos(other)),
        }
    }
}

/// Immutable session configuration.
///
/// Every field is populated and validated before the session controller is
/// constructed; the controller and its event task only ever read it.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Broker host name or address
    pub host: String,
    /// Broker port
    pub port: u16,
    /// Broker username (for TTS: `{application_id}@{tenant_id}`)
    pub username: String,
    /// Broker password (a TTS API key)
    pub password: String,
    /// Application identifier, used to compose topic names
    pub application_id: String,
    /// Tenant identifier, used to compose topic names
    pub tenant_id: String,
    /// Device identifier, used to compose topic names
    pub device_id: String,
    /// Delivery guarantee for every subscription
    pub qos: QosLevel,
    /// Ask the broker to keep session state across disconnects
    pub persistent: bool,
}

impl Settings {
    /// Load settings from the process environment, reading a `.env` file
    /// from the working directory first if one exists.
    pub fn from_env(qos: u8, persistent: bool) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok(), qos, persistent)
    }

    /// Build settings from an arbitrary variable lookup.
    ///
    /// An empty value counts as missing. Split out from [`Settings::from_env`]
    /// so validation can be tested without touching process environment.
    pub fn from_lookup<F>(lookup: F, qos: u8, persistent: bool) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::MissingVar(name))
        };

        let port = require(ENV_PORT)?.parse::<u16>().map_err(|_| {
            ConfigError::InvalidVar(ENV_PORT, "must be a number between 1 and 65535".to_string())
        })?;

        Ok(Settings {
            host: require(ENV_HOST)?,
            port,
            username: require(ENV_USERNAME)?,
            password: require(ENV_PASSWORD)?,
            application_id: require(ENV_APPLICATION_ID)?,
            tenant_id: require(ENV_TENANT_ID)?,
            device_id: require(ENV_DEVICE_ID)?,
            qos: QosLevel::try_from(qos)?,
            persistent,
        })
    }
}
