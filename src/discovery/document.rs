//! Discovery document model.
//!
//! Field order is the serialization order, so the same snapshot always
//! renders to the same bytes.

use crate::error::{BridgeError, Result};
use crate::identity::MANUFACTURER;
use crate::naming::{TopicNamer, switch_payload_off, switch_payload_on};
use crate::sensors::{Family, ProbeAddress, SensorDescriptor, SensorState, state_icon};
use serde::Serialize;

/// Seconds after which the hub marks an entity unavailable without updates.
pub const EXPIRE_AFTER_SECS: u32 = 60;

pub const TEMPERATURE_ICON: &str = "mdi:thermometer";
pub const TEMPERATURE_UNIT: &str = "°F";

/// Device registry block shared by every entity of this device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<String>,
    pub name: String,
    /// Network address of the device, shown as the model in the hub.
    pub model: String,
    pub hw_version: String,
    pub manufacturer: &'static str,
    pub sw_version: String,
    /// `[["mac", ...], ["ip", ...]]`
    pub connections: Vec<(&'static str, String)>,
}

impl DeviceInfo {
    pub fn from_namer(namer: &TopicNamer) -> Self {
        let identity = namer.identity();
        let ip = identity.ip.to_string();
        Self {
            identifiers: vec![namer.device_id().to_string()],
            name: namer.device_id().to_string(),
            model: ip.clone(),
            hw_version: identity.hw_version.clone(),
            manufacturer: MANUFACTURER,
            sw_version: identity.sw_version.clone(),
            connections: vec![("mac", identity.mac.to_string()), ("ip", ip)],
        }
    }
}

/// Discovery/config document for one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryDocument {
    pub name: String,
    pub unique_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    pub state_topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimistic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_off: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_off: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_on: Option<&'static str>,
    /// Serialized as `null` when absent.
    pub device_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_after: Option<u32>,
    pub icon: &'static str,
    pub device: DeviceInfo,
}

impl DiscoveryDocument {
    /// Snapshot the document for a pin sensor in `state`.
    ///
    /// The icon follows the state, so callers must pass the same state they
    /// are about to publish.
    pub fn for_sensor(
        namer: &TopicNamer,
        sensor: &SensorDescriptor,
        state: SensorState,
    ) -> Result<Self> {
        let info = sensor.variant.info().ok_or_else(|| {
            BridgeError::InvalidConfig(format!("{} cannot be announced", sensor.variant))
        })?;
        let sensor_id = namer.sensor_id(sensor)?;
        let unique_id = namer.unique_id(&sensor_id);
        let (label1, label2) = info.family.pin_labels();

        let name = match info.family {
            Family::SwitchLike => format!(
                "{} {} {}:{:02}",
                namer.device_id(),
                info.label,
                label1,
                sensor.pin1
            ),
            Family::DoorLike | Family::MotionLike => format!(
                "{} {} {}:{:02} {}:{:02}",
                namer.device_id(),
                info.label,
                label1,
                sensor.pin1,
                label2,
                sensor.pin2
            ),
        };

        let mut doc = Self {
            name,
            unique_id: unique_id.clone(),
            object_id: Some(unique_id),
            state_topic: namer.sensor_state_topic(sensor)?,
            command_topic: None,
            optimistic: None,
            payload_off: None,
            payload_on: None,
            state_off: None,
            state_on: None,
            device_class: None,
            unit_of_measurement: None,
            expire_after: Some(EXPIRE_AFTER_SECS),
            icon: state_icon(sensor.variant, state),
            device: DeviceInfo::from_namer(namer),
        };

        if info.family == Family::SwitchLike {
            doc.command_topic = Some(namer.command_topic()?);
            doc.optimistic = Some(false);
            doc.payload_off = Some(switch_payload_off(sensor.pin1));
            doc.payload_on = Some(switch_payload_on(sensor.pin1));
            doc.state_off = Some("OFF");
            doc.state_on = Some("ON");
            doc.device_class = Some("switch");
        }

        Ok(doc)
    }

    /// Snapshot the document for a one-wire temperature probe.
    pub fn for_probe(namer: &TopicNamer, address: &ProbeAddress) -> Result<Self> {
        let probe_id = namer.probe_id(address);
        Ok(Self {
            name: probe_id.clone(),
            unique_id: probe_id,
            object_id: None,
            state_topic: namer.probe_state_topic(address)?,
            command_topic: None,
            optimistic: None,
            payload_off: None,
            payload_on: None,
            state_off: None,
            state_on: None,
            device_class: Some("temperature"),
            unit_of_measurement: Some(TEMPERATURE_UNIT),
            expire_after: None,
            icon: TEMPERATURE_ICON,
            device: DeviceInfo::from_namer(namer),
        })
    }

    /// Render the whole document in memory.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
