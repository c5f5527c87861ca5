//! Identifiers and MQTT topics.
//!
//! Every function here is pure: the same descriptor and device identity
//! always produce byte-identical strings. The discovery encoder relies on
//! that because it renders each document twice.
//!
//! Topic layout:
//! - discovery: `{discovery_root}/{class}/{sensor_id}/config`
//! - state: `{data_root}/{class}/{device_id}/{sensor_id}/state`
//! - commands: `{data_root}/switch/{device_id}/cmd`

use crate::error::{BridgeError, Result};
use crate::identity::DeviceIdentity;
use crate::sensors::{Family, ProbeAddress, SensorDescriptor};

pub const DEFAULT_DISCOVERY_ROOT: &str = "homeassistant";
pub const DEFAULT_DATA_ROOT: &str = "aha";

pub const MAX_DEVICE_ID_LEN: usize = 24;
pub const MAX_SENSOR_ID_LEN: usize = 48;
pub const MAX_TOPIC_LEN: usize = 96;

/// Root topics for discovery and data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRoots {
    pub discovery: String,
    pub data: String,
}

impl Default for TopicRoots {
    fn default() -> Self {
        Self {
            discovery: DEFAULT_DISCOVERY_ROOT.to_string(),
            data: DEFAULT_DATA_ROOT.to_string(),
        }
    }
}

fn bounded(value: String, max: usize) -> Result<String> {
    if value.len() > max {
        return Err(BridgeError::NameTooLong {
            len: value.len(),
            value,
            max,
        });
    }
    Ok(value)
}

/// Payload that turns the switch on `pin` on (`switch_07-ON`).
pub fn switch_payload_on(pin: i8) -> String {
    format!("switch_{pin:02}-ON")
}

/// Payload that turns the switch on `pin` off (`switch_07-OFF`).
pub fn switch_payload_off(pin: i8) -> String {
    format!("switch_{pin:02}-OFF")
}

/// Derives identifiers and topics for one device.
#[derive(Debug, Clone)]
pub struct TopicNamer {
    identity: DeviceIdentity,
    roots: TopicRoots,
    device_id: String,
    mac_suffix: String,
}

impl TopicNamer {
    /// Fails when the device identifier exceeds its bound.
    pub fn new(identity: DeviceIdentity, roots: TopicRoots) -> Result<Self> {
        let mac_suffix = identity.mac.suffix();
        let device_id = bounded(
            format!("{}_{}", identity.board, mac_suffix),
            MAX_DEVICE_ID_LEN,
        )?;
        Ok(Self {
            identity,
            roots,
            device_id,
            mac_suffix,
        })
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn roots(&self) -> &TopicRoots {
        &self.roots
    }

    /// `{board}_{last 3 MAC bytes}`, e.g. `uno_AABBCC`.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// `door_0506_AABBCC`, or `switch_07_AABBCC` for switches.
    pub fn sensor_id(&self, sensor: &SensorDescriptor) -> Result<String> {
        let info = sensor.variant.info().ok_or_else(|| {
            BridgeError::InvalidConfig(format!("{} has no identifier", sensor.variant))
        })?;

        let id = match info.family {
            Family::SwitchLike => format!("{}_{:02}_{}", info.prefix, sensor.pin1, self.mac_suffix),
            Family::DoorLike | Family::MotionLike => format!(
                "{}_{:02}{:02}_{}",
                info.prefix, sensor.pin1, sensor.pin2, self.mac_suffix
            ),
        };
        bounded(id, MAX_SENSOR_ID_LEN)
    }

    /// Probe address as 16 lowercase hex digits.
    pub fn probe_id(&self, address: &ProbeAddress) -> String {
        address.to_string()
    }

    /// `{device_id}_{sensor_id}`, used for `unique_id` and `object_id`.
    pub fn unique_id(&self, sensor_id: &str) -> String {
        format!("{}_{}", self.device_id, sensor_id)
    }

    fn discovery_topic(&self, class: &str, id: &str) -> Result<String> {
        bounded(
            format!("{}/{}/{}/config", self.roots.discovery, class, id),
            MAX_TOPIC_LEN,
        )
    }

    fn state_topic(&self, class: &str, id: &str) -> Result<String> {
        bounded(
            format!("{}/{}/{}/{}/state", self.roots.data, class, self.device_id, id),
            MAX_TOPIC_LEN,
        )
    }

    pub fn sensor_discovery_topic(&self, sensor: &SensorDescriptor) -> Result<String> {
        let class = topic_class(sensor)?;
        self.discovery_topic(class, &self.sensor_id(sensor)?)
    }

    pub fn sensor_state_topic(&self, sensor: &SensorDescriptor) -> Result<String> {
        let class = topic_class(sensor)?;
        self.state_topic(class, &self.sensor_id(sensor)?)
    }

    pub fn probe_discovery_topic(&self, address: &ProbeAddress) -> Result<String> {
        self.discovery_topic("sensor", &self.probe_id(address))
    }

    pub fn probe_state_topic(&self, address: &ProbeAddress) -> Result<String> {
        self.state_topic("sensor", &self.probe_id(address))
    }

    /// Shared command topic of every switch on this device.
    pub fn command_topic(&self) -> Result<String> {
        bounded(
            format!("{}/switch/{}/cmd", self.roots.data, self.device_id),
            MAX_TOPIC_LEN,
        )
    }
}

fn topic_class(sensor: &SensorDescriptor) -> Result<&'static str> {
    sensor
        .variant
        .family()
        .map(Family::topic_class)
        .ok_or_else(|| BridgeError::InvalidConfig(format!("{} has no topic", sensor.variant)))
}
