//! MQTT subscriber session for The Things Stack.
//!
//! The module is split into three focused sub-modules, separating pure
//! functions from I/O:
//!
//! - [`connection`] - pure session state, transport options and topic
//!   construction
//! - [`events`] - pure event routing, uplink decoding and output formatting
//! - [`controller`] - the I/O side: client ownership, the poll task and
//!   shutdown coordination
//!
//! # Usage
//!
//! ```rust,no_run
//! use tts_subscriber::config::{QosLevel, Settings};
//! use tts_subscriber::session::SessionController;
//!
//! # tokio_test::block_on(async {
//! let settings = Settings {
//!     host: "eu1.cloud.thethings.network".to_string(),
//!     port: 1883,
//!     username: "my-app@ttn".to_string(),
//!     password: "NNSXS.XXXXXXXX".to_string(),
//!     application_id: "my-app".to_string(),
//!     tenant_id: "ttn".to_string(),
//!     device_id: "sensor-01".to_string(),
//!     qos: QosLevel::AtMostOnce,
//!     persistent: false,
//! };
//!
//! let mut session = SessionController::new(settings);
//! session.start()?;
//! // ... wait for an interrupt ...
//! session.stop().await;
//! # Ok::<(), tts_subscriber::session::SessionError>(())
//! # });
//! ```

pub mod connection;
pub mod controller;
pub mod events;

// Re-export public types for convenience
pub use connection::{SessionError, SessionState, TopicBuilder, TOPIC_SUFFIXES};
pub use controller::SessionController;
pub use events::{decode_uplink, format_uplink, route_event, DecodeError, EventRoute};
