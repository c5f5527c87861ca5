//! pinwatch library.
//!
//! Turns GPIO door/motion/switch sensors and one-wire temperature probes
//! into Home Assistant entities announced and updated over MQTT.

pub mod bridge;
pub mod config;
pub mod discovery;
pub mod error;
pub mod hardware;
pub mod identity;
pub mod mqtt;
pub mod naming;
pub mod sensors;
pub mod service;
pub mod switch;
pub mod transport;
