//! MQTT client wrapper for the Home Assistant broker.

use crate::config::MqttConfig;
use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::time::Duration;
use tokio::sync::mpsc;

/// Message received from MQTT broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: String,
}

/// What the event loop reports to the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MqttEvent {
    /// Broker accepted the connection (first connect or reconnect).
    Connected,
    Message(MqttMessage),
}

/// MQTT client for discovery, telemetry and switch commands.
pub struct MqttClient {
    client: AsyncClient,
    event_loop: EventLoop,
}

impl MqttClient {
    /// Create a new MQTT client from configuration.
    pub fn new(config: &MqttConfig) -> Self {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

        // Set credentials if provided
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, config.queue_capacity);

        Self { client, event_loop }
    }

    /// Get a clone of the async client for publishing from other tasks.
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }

    /// Run the MQTT event loop and forward events to the provided channel.
    ///
    /// Runs until the receiving side of the channel is dropped or the client
    /// disconnects. Connection errors are logged and retried after
    /// `retry_delay`; rumqttc reconnects on the next poll.
    pub async fn run(mut self, tx: mpsc::Sender<MqttEvent>, retry_delay: Duration) {
        info!("[MQTT] Starting event loop");

        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    info!("[MQTT] Connected ({:?})", ack.code);
                    if tx.send(MqttEvent::Connected).await.is_err() {
                        break;
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let topic = publish.topic.clone();
                    let payload = match String::from_utf8(publish.payload.to_vec()) {
                        Ok(s) => s,
                        Err(e) => {
                            warn!("[MQTT] Invalid UTF-8 in payload on {}: {}", topic, e);
                            continue;
                        }
                    };

                    debug!("[MQTT] Received on {}: {}", topic, payload);

                    let msg = MqttMessage { topic, payload };
                    if tx.send(MqttEvent::Message(msg)).await.is_err() {
                        error!("[MQTT] Event channel closed");
                        break;
                    }
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    info!("[MQTT] Disconnected");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    error!("[MQTT] Connection error: {:?}", e);
                    // Wait before reconnecting
                    tokio::time::sleep(retry_delay).await;
                }
            }
        }
    }
}

/// QoS used for every publish and subscription.
pub(crate) const QOS: QoS = QoS::AtMostOnce;
