//! Session lifecycle I/O.
//!
//! [`SessionController`] owns the `rumqttc` client and event loop for one
//! broker connection. All broker events are handled inline in a single
//! spawned poll task, so the connect, message and unsubscribe paths can never
//! interleave with each other.

use super::connection::{configure_mqtt_options, SessionError, SessionState, TopicBuilder};
use super::events::{
    decode_uplink, format_uplink, route_event, validate_subscription, EventRoute,
};
use crate::config::Settings;
use rumqttc::{AsyncClient, EventLoop, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Pause before polling again after a post-establishment transport error,
/// so a flapping link does not spin the loop.
const RECONNECT_PAUSE: Duration = Duration::from_secs(1);

/// Controls one MQTT subscriber session end-to-end.
pub struct SessionController {
    client: AsyncClient,
    event_loop: Option<EventLoop>,
    settings: Arc<Settings>,
    event_loop_handle: Option<JoinHandle<()>>,
    state_tx: watch::Sender<SessionState>,
    state_rx: watch::Receiver<SessionState>,
    shutdown_tx: watch::Sender<bool>,
}

impl SessionController {
    /// Build a controller from validated settings.
    ///
    /// The transport connects lazily: nothing touches the network until
    /// [`SessionController::start`] spawns the poll task.
    pub fn new(settings: Settings) -> Self {
        let mqtt_options = configure_mqtt_options(&settings);
        let (client, event_loop) = AsyncClient::new(mqtt_options, 10);
        let ((state_tx, state_rx), (shutdown_tx, _shutdown_rx)) = Self::setup_channels();

        SessionController {
            client,
            event_loop: Some(event_loop),
            settings: Arc::new(settings),
            event_loop_handle: None,
            state_tx,
            state_rx,
            shutdown_tx,
        }
    }

    /// Create the session state and shutdown channels (pure function).
    #[allow(clippy::type_complexity)]
    fn setup_channels() -> (
        (watch::Sender<SessionState>, watch::Receiver<SessionState>),
        (watch::Sender<bool>, watch::Receiver<bool>),
    ) {
        (
            watch::channel(SessionState::Connecting),
            watch::channel(false),
        )
    }

    /// Spawn the poll task servicing the connection and return immediately.
    ///
    /// The task drives connection establishment, issues the nine
    /// subscriptions on every connect acknowledgment (initial connect and
    /// every transport-level reconnect), dispatches publishes to the
    /// decoder/printer and honors the shutdown signal.
    pub fn start(&mut self) -> Result<(), SessionError> {
        let event_loop = self.event_loop.take().ok_or(SessionError::AlreadyStarted)?;

        let client = self.client.clone();
        let settings = Arc::clone(&self.settings);
        let state_tx = self.state_tx.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(Self::run_event_loop(
            event_loop,
            client,
            settings,
            state_tx,
            shutdown_rx,
        ));
        self.event_loop_handle = Some(handle);

        Ok(())
    }

    async fn run_event_loop(
        mut event_loop: EventLoop,
        client: AsyncClient,
        settings: Arc<Settings>,
        state_tx: watch::Sender<SessionState>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut established = false;

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }

                polled = event_loop.poll() => match polled {
                    Ok(event) => match route_event(&event) {
                        EventRoute::ConnectionAcknowledged { session_present } => {
                            established = true;
                            let _ = state_tx.send(SessionState::Connected);
                            info!(session_present, "connected to MQTT broker");
                            Self::subscribe_all(&client, &settings).await;
                        }
                        EventRoute::ConnectionRefused(reason) => {
                            error!("broker refused connection: {reason}");
                            let _ = state_tx.send(SessionState::Failed(reason));
                            break;
                        }
                        EventRoute::MessageReceived { topic, payload } => {
                            Self::handle_message(&topic, &payload);
                        }
                        EventRoute::SubscriptionConfirmed { packet_id, return_codes } => {
                            match validate_subscription(&return_codes) {
                                Ok(()) => debug!(packet_id, "subscription confirmed"),
                                Err(reason) => warn!(packet_id, "{reason}"),
                            }
                        }
                        EventRoute::UnsubscribeAcknowledged => {
                            info!("unsubscribe acknowledged, closing connection");
                            if let Err(e) = client.disconnect().await {
                                warn!("disconnect after unsubscribe failed: {e}");
                            }
                        }
                        EventRoute::InfrastructureEvent(event) => {
                            debug!("transport event: {event}");
                        }
                        EventRoute::OutgoingEvent => {}
                    },
                    Err(e) => {
                        if !established {
                            error!("failed to reach broker: {e}");
                            let _ = state_tx.send(SessionState::Failed(e.to_string()));
                            break;
                        }
                        warn!("connection lost: {e}");
                        let _ = state_tx.send(SessionState::Reconnecting(e.to_string()));
                        tokio::time::sleep(RECONNECT_PAUSE).await;
                    }
                }
            }
        }

        debug!("session event loop stopped");
    }

    /// Issue one subscribe request per device topic at the configured QoS.
    ///
    /// Requests are independent: a failed request is logged and the rest are
    /// still issued.
    async fn subscribe_all(client: &AsyncClient, settings: &Settings) {
        info!("subscribing to device topics");
        let qos = QoS::from(settings.qos);

        for topic in TopicBuilder::build_all(settings) {
            if let Err(e) = client.subscribe(topic.clone(), qos).await {
                warn!("failed to request subscription to {topic}: {e}");
            }
        }
    }

    /// Decode one inbound message and print its uplink payload, if any.
    fn handle_message(topic: &str, payload: &[u8]) {
        match decode_uplink(payload) {
            Ok(Some(decoded)) => {
                println!("{}", format_uplink(topic, &decoded));
                println!();
            }
            Ok(None) => debug!("no decoded payload on {topic}, dropping"),
            Err(e) => warn!("failed to decode message on topic {topic}: {e}"),
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state_rx.borrow().clone()
    }

    /// Wait until the session fails terminally and return the reason.
    ///
    /// Resolves only for terminal failures (connection refused, transport
    /// unreachable before establishment); transient reconnects do not wake
    /// the caller.
    pub async fn wait_until_failed(&self) -> String {
        let mut state_rx = self.state_rx.clone();
        loop {
            if let SessionState::Failed(reason) = &*state_rx.borrow() {
                return reason.clone();
            }
            if state_rx.changed().await.is_err() {
                return "session event loop ended unexpectedly".to_string();
            }
        }
    }

    /// Disconnect from the broker and stop the poll task.
    ///
    /// Safe to call any number of times: only the first call performs the
    /// disconnect sequence and prints the termination notice.
    pub async fn stop(&mut self) {
        if *self.shutdown_tx.borrow() {
            return;
        }

        info!("disconnecting from MQTT broker");
        if let Err(e) = self.client.disconnect().await {
            debug!("disconnect request during shutdown failed: {e}");
        }
        self.shutdown_tx.send_replace(true);

        if let Some(handle) = self.event_loop_handle.take() {
            match tokio::time::timeout(Duration::from_secs(2), handle).await {
                Ok(Ok(())) => debug!("event loop task shut down gracefully"),
                Ok(Err(e)) if !e.is_cancelled() => {
                    warn!("event loop task ended with error: {e}");
                }
                Err(_) => warn!("event loop task did not stop in time"),
                _ => {}
            }
        }

        let _ = self.state_tx.send(SessionState::Closed);
        println!("\nExiting ...");
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
        if let Some(handle) = self.event_loop_handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QosLevel;
    use tokio::time::timeout;

    /// Settings pointing at a port nothing listens on, so connection
    /// attempts are refused immediately.
    fn unreachable_settings() -> Settings {
        Settings {
            host: "127.0.0.1".to_string(),
            port: 1,
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
    fn test_setup_channels_initial_state() {
        let ((state_tx, state_rx), (shutdown_tx, shutdown_rx)) =
            SessionController::setup_channels();

        assert_eq!(*state_rx.borrow(), SessionState::Connecting);
        assert!(!(*shutdown_rx.borrow()));

        state_tx.send(SessionState::Connected).unwrap();
        assert_eq!(*state_rx.borrow(), SessionState::Connected);

        shutdown_tx.send(true).unwrap();
        assert!(*shutdown_rx.borrow());
    }

    #[tokio::test]
    async fn test_state_before_start() {
        let session = SessionController::new(unreachable_settings());
        assert_eq!(session.state(), SessionState::Connecting);
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let mut session = SessionController::new(unreachable_settings());

        session.start().unwrap();
        assert!(matches!(
            session.start(),
            Err(SessionError::AlreadyStarted)
        ));

        session.stop().await;
    }

    #[tokio::test]
    async fn test_unreachable_broker_fails_the_session() {
        let mut session = SessionController::new(unreachable_settings());
        session.start().unwrap();

        let reason = timeout(Duration::from_secs(5), session.wait_until_failed())
            .await
            .expect("session should fail quickly against a closed port");
        assert!(!reason.is_empty());
        assert!(matches!(session.state(), SessionState::Failed(_)));

        session.stop().await;
    }

    #[tokio::test]
    async fn test_stop_without_start_is_safe() {
        let mut session = SessionController::new(unreachable_settings());

        session.stop().await;
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let mut session = SessionController::new(unreachable_settings());
        session.start().unwrap();

        session.stop().await;
        let state_after_first = session.state();

        // A repeated interrupt while shutdown is in progress must be a no-op
        session.stop().await;
        assert_eq!(session.state(), state_after_first);
    }
}
