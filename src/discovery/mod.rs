//! Home Assistant MQTT discovery.
//!
//! [`document`] builds the discovery document for a sensor or probe from a
//! snapshot of its current state; [`encoder`] streams it to a
//! length-prefixed transport in two passes (measure, then write).

pub mod document;
pub mod encoder;

pub use document::{DeviceInfo, DiscoveryDocument};
pub use encoder::{generate, measure, publish_discovery};
