//! Pure routing and decoding for broker events.
//!
//! [`route_event`] classifies raw `rumqttc` events into the small closed set
//! of cases the session controller reacts to; the rest of the module decodes
//! uplink payloads and formats the console output. None of it performs I/O.

use rumqttc::{ConnectReturnCode, Event, Packet, SubscribeReasonCode};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Routing decisions for broker events.
#[derive(Debug, Clone)]
pub enum EventRoute {
    /// Broker accepted the connection - subscribe now
    ConnectionAcknowledged { session_present: bool },
    /// Broker refused the connection, with the return code
    ConnectionRefused(String),
    /// Message delivered on a subscribed topic
    MessageReceived { topic: String, payload: Vec<u8> },
    /// Broker answered a subscribe request
    SubscriptionConfirmed {
        packet_id: u16,
        return_codes: Vec<SubscribeReasonCode>,
    },
    /// Broker answered an unsubscribe request
    UnsubscribeAcknowledged,
    /// Protocol housekeeping (ping responses, ack bookkeeping, ...)
    InfrastructureEvent(String),
    /// Outgoing traffic, handled by the transport
    OutgoingEvent,
}

/// Classify a transport event (pure function).
pub fn route_event(event: &Event) -> EventRoute {
    match event {
        Event::Incoming(incoming) => match incoming {
            Packet::ConnAck(connack) => match connack.code {
                ConnectReturnCode::Success => EventRoute::ConnectionAcknowledged {
                    session_present: connack.session_present,
                },
                refused => EventRoute::ConnectionRefused(format!("{refused:?}")),
            },
            Packet::Publish(publish) => EventRoute::MessageReceived {
                topic: publish.topic.clone(),
                payload: publish.payload.to_vec(),
            },
            Packet::SubAck(suback) => EventRoute::SubscriptionConfirmed {
                packet_id: suback.pkid,
                return_codes: suback.return_codes.clone(),
            },
            Packet::UnsubAck(_) => EventRoute::UnsubscribeAcknowledged,
            other => EventRoute::InfrastructureEvent(format!("{other:?}")),
        },
        Event::Outgoing(_) => EventRoute::OutgoingEvent,
    }
}

/// Check a subscription acknowledgment for rejected topics (pure function).
pub fn validate_subscription(return_codes: &[SubscribeReasonCode]) -> Result<(), String> {
    let rejected = return_codes
        .iter()
        .filter(|code| matches!(code, SubscribeReasonCode::Failure))
        .count();

    if rejected > 0 {
        Err(format!(
            "broker rejected {rejected} of {} subscription(s)",
            return_codes.len()
        ))
    } else {
        Ok(())
    }
}

/// Message body published by the network server.
///
/// Only the uplink branch is modeled; join accepts, downlink acks and the
/// other control messages on the device topics share none of these fields
/// and deserialize to an empty envelope.
#[derive(Debug, Deserialize)]
pub struct UplinkEnvelope {
    pub uplink_message: Option<UplinkMessage>,
}

#[derive(Debug, Deserialize)]
pub struct UplinkMessage {
    pub decoded_payload: Option<Value>,
}

/// Payload decoding errors
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Extract the decoded uplink payload from a message body (pure function).
///
/// `Ok(None)` means the body parsed fine but carries no
/// `uplink_message.decoded_payload` - a control message to drop silently.
pub fn decode_uplink(payload: &[u8]) -> Result<Option<Value>, DecodeError> {
    let text = std::str::from_utf8(payload)?;
    let envelope: UplinkEnvelope = serde_json::from_str(text)?;

    Ok(envelope
        .uplink_message
        .and_then(|uplink| uplink.decoded_payload))
}

/// Format the console line for a decoded uplink (pure function).
pub fn format_uplink(topic: &str, decoded: &Value) -> String {
    format!("@{topic}: {decoded}")
}
