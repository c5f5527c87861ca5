//! [`Transport`] over a rumqttc client.

use super::client::QOS;
use crate::error::Result;
use crate::transport::{StreamedPublish, Transport};
use log::{debug, info, warn};
use rumqttc::AsyncClient;

/// Publishes through the rumqttc request queue.
///
/// rumqttc takes whole payloads, so a streamed publish is collected until
/// `end_publish` and handed over once its length matches the declared one.
/// Requests are queued without blocking; the event loop task sends them.
pub struct MqttTransport {
    client: AsyncClient,
    stream: StreamedPublish,
    retain: bool,
}

impl MqttTransport {
    pub fn new(client: AsyncClient) -> Self {
        Self {
            client,
            stream: StreamedPublish::default(),
            retain: false,
        }
    }

    /// Retain discovery and state messages on the broker.
    pub fn with_retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }
}

impl Transport for MqttTransport {
    fn begin_publish(&mut self, topic: &str, length: usize) -> Result<()> {
        self.stream.begin(topic, length)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write(bytes)
    }

    fn end_publish(&mut self) -> Result<()> {
        let (topic, payload) = self.stream.finish()?;
        debug!("[MQTT] Publishing {} bytes to {}", payload.len(), topic);
        self.client.try_publish(topic, QOS, self.retain, payload)?;
        Ok(())
    }

    fn abort_publish(&mut self) {
        if self.stream.in_progress() {
            warn!("[MQTT] Dropping incomplete publish");
        }
        self.stream.abort();
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<()> {
        debug!(
            "[MQTT] Publishing to {}: {}",
            topic,
            String::from_utf8_lossy(payload)
        );
        self.client.try_publish(topic, QOS, self.retain, payload.to_vec())?;
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<()> {
        info!("[MQTT] Subscribing to {}", topic);
        self.client.try_subscribe(topic, QOS)?;
        Ok(())
    }
}
