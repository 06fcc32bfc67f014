//! TTS Subscriber
//!
//! A command-line subscriber for The Things Stack MQTT integration: it
//! connects to the network server's broker, subscribes to the nine
//! per-device topics and prints decoded uplink payloads to the console.
//!
//! # Overview
//!
//! - [`config`] - settings loaded from `TTS_*` environment variables (via a
//!   `.env` file if present) and the two command-line flags
//! - [`session`] - the session controller: connection lifecycle, topic
//!   subscription, message dispatch and graceful shutdown

pub mod config;
pub mod session;

pub use config::{ConfigError, QosLevel, Settings};
pub use session::{SessionController, SessionError, SessionState, TopicBuilder};
