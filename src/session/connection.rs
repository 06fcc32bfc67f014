//! Pure connection state and configuration for the subscriber session.
//!
//! Everything in this module is side-effect free: transport options are
//! derived from [`Settings`], topic names are composed from the device
//! identity, and the session state enum describes the lifecycle the
//! controller publishes through its watch channel.

use crate::config::{QosLevel, Settings};
use rumqttc::{MqttOptions, QoS};
use std::time::Duration;
use thiserror::Error;

/// Lifecycle of one subscriber session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Waiting for the broker to acknowledge the connection
    Connecting,
    /// Connected and subscribed (or subscribing)
    Connected,
    /// Connection lost after it was established; the transport retries
    Reconnecting(String),
    /// Terminal failure, with the broker- or transport-reported reason
    Failed(String),
    /// Shut down by the caller
    Closed,
}

/// Session controller errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session event loop already started")]
    AlreadyStarted,
}

impl From<QosLevel> for QoS {
    fn from(level: QosLevel) -> Self {
        match level {
            QosLevel::AtMostOnce => QoS::AtMostOnce,
            QosLevel::AtLeastOnce => QoS::AtLeastOnce,
            QosLevel::ExactlyOnce => QoS::ExactlyOnce,
        }
    }
}

/// Derive transport options from the session configuration.
///
/// The client id embeds the process id so concurrent invocations against the
/// same broker do not evict each other's sessions. `persistent` maps to the
/// MQTT clean-session flag: a persistent session asks the broker to keep
/// subscriptions and undelivered messages across disconnects.
pub fn configure_mqtt_options(settings: &Settings) -> MqttOptions {
    let client_id = format!("tts-subscriber-{}", std::process::id());
    let mut mqtt_options = MqttOptions::new(client_id, &settings.host, settings.port);

    mqtt_options.set_credentials(&settings.username, &settings.password);
    mqtt_options.set_keep_alive(Duration::from_secs(60));
    mqtt_options.set_clean_session(!settings.persistent);

    mqtt_options
}

/// Per-device topic suffixes published by The Things Stack, in the order
/// they are subscribed.
pub const TOPIC_SUFFIXES: [&str; 9] = [
    "join",
    "up",
    "down/queued",
    "down/sent",
    "down/ack",
    "down/nack",
    "down/failed",
    "service/data",
    "location/solved",
];

/// Topic construction for the TTS v3 MQTT namespace.
pub struct TopicBuilder;

impl TopicBuilder {
    /// Build the device topic root: `v3/{application_id}@{tenant_id}/devices/{device_id}`
    pub fn device_root(application_id: &str, tenant_id: &str, device_id: &str) -> String {
        format!("v3/{application_id}@{tenant_id}/devices/{device_id}")
    }

    /// Build the full set of nine per-device topics for a session.
    pub fn build_all(settings: &Settings) -> Vec<String> {
        let root = Self::device_root(
            &settings.application_id,
            &settings.tenant_id,
            &settings.device_id,
        );
        TOPIC_SUFFIXES
            .iter()
            .map(|suffix| format!("{root}/{suffix}"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> Settings {
        Settings {
            host: "localhost".to_string(),
            port: 1883,
            username: "my-app@ttn".to_string(),
            password: "secret".to_string(),
            application_id: "my-app".to_string(),
            tenant_id: "ttn".to_string(),
            device_id: "sensor-01".to_string(),
            qos: QosLevel::AtMostOnce,
            persistent: false,
        }
    }

    #[test]
    fn test_device_root_construction() {
        assert_eq!(
            TopicBuilder::device_root("my-app", "ttn", "sensor-01"),
            "v3/my-app@ttn/devices/sensor-01"
        );
        // Dots, underscores and dashes pass through untouched
        assert_eq!(
            TopicBuilder::device_root("app_1", "eu1.cloud", "dev-eui-0042"),
            "v3/app_1@eu1.cloud/devices/dev-eui-0042"
        );
    }

    #[test]
    fn test_all_nine_topics_in_subscription_order() {
        let topics = TopicBuilder::build_all(&test_settings());

        assert_eq!(
            topics,
            vec![
                "v3/my-app@ttn/devices/sensor-01/join",
                "v3/my-app@ttn/devices/sensor-01/up",
                "v3/my-app@ttn/devices/sensor-01/down/queued",
                "v3/my-app@ttn/devices/sensor-01/down/sent",
                "v3/my-app@ttn/devices/sensor-01/down/ack",
                "v3/my-app@ttn/devices/sensor-01/down/nack",
                "v3/my-app@ttn/devices/sensor-01/down/failed",
                "v3/my-app@ttn/devices/sensor-01/service/data",
                "v3/my-app@ttn/devices/sensor-01/location/solved",
            ]
        );
    }

    #[test]
    fn test_qos_level_mapping() {
        assert_eq!(QoS::from(QosLevel::AtMostOnce), QoS::AtMostOnce);
        assert_eq!(QoS::from(QosLevel::AtLeastOnce), QoS::AtLeastOnce);
        assert_eq!(QoS::from(QosLevel::ExactlyOnce), QoS::ExactlyOnce);
    }

    #[test]
    fn test_configure_mqtt_options() {
        let options = configure_mqtt_options(&test_settings());

        assert_eq!(
            options.broker_address(),
            ("localhost".to_string(), 1883)
        );
        assert!(options.client_id().starts_with("tts-subscriber-"));
        assert_eq!(options.keep_alive(), Duration::from_secs(60));
        assert!(options.credentials().is_some());
        // Ephemeral by default
        assert!(options.clean_session());
    }

    #[test]
    fn test_persistent_flag_disables_clean_session() {
        let mut settings = test_settings();
        settings.persistent = true;

        let options = configure_mqtt_options(&settings);
        assert!(!options.clean_session());
    }

    #[test]
    fn test_session_state_equality() {
        assert_eq!(SessionState::Connected, SessionState::Connected);
        assert_ne!(
            SessionState::Connected,
            SessionState::Failed("refused".to_string())
        );
    }
}
