//! MQTT broker connection.
//!
//! [`MqttClient`] owns the rumqttc event loop and forwards connection and
//! command events to the bridge; [`MqttTransport`] implements the publish
//! side on top of the same client.

mod client;
mod transport;

pub use client::{MqttClient, MqttEvent, MqttMessage};
pub use transport::MqttTransport;
