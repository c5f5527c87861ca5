//! Semantic state derivation from the pin bus.

use super::pin_bus::PinStateBus;
use super::registry::SensorDescriptor;
use super::variant::{Family, SensorVariant};
use strum::Display;

pub const ICON_UNKNOWN: &str = "mdi:help-circle";
pub const ICON_FAULT: &str = "mdi:alert-circle-outline";
pub const ICON_NO_POWER: &str = "mdi:power-plug-off";

/// Semantic state of a sensor for the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SensorState {
    Open,
    Closed,
    Motion,
    Quiet,
    On,
    Off,
    Fault,
    Offline,
    Unknown,
}

impl SensorState {
    /// Offline and unknown sensors are neither announced nor published.
    pub fn is_suppressed(self) -> bool {
        matches!(self, SensorState::Offline | SensorState::Unknown)
    }

    /// Value published on the state topic.
    pub fn payload(self, family: Family) -> &'static str {
        match self {
            SensorState::Open => "open",
            SensorState::Closed => "closed",
            SensorState::Motion => "motion",
            SensorState::Quiet => "quiet",
            SensorState::On => "ON",
            SensorState::Off => "OFF",
            SensorState::Fault if family == Family::MotionLike => "motion-fault",
            SensorState::Fault => "wiringfault",
            SensorState::Offline => "offline",
            SensorState::Unknown => "unknown",
        }
    }
}

/// Truth table lookup for a family over `(bit(pin1), bit(pin2))`.
///
/// Total over both booleans; switches never consult pin2.
pub fn state_for_bits(family: Family, pin1: bool, pin2: bool) -> SensorState {
    match family {
        Family::DoorLike => match (pin1, pin2) {
            (false, false) => SensorState::Offline,
            (true, false) => SensorState::Open,
            (false, true) => SensorState::Closed,
            (true, true) => SensorState::Fault,
        },
        Family::MotionLike => match (pin1, pin2) {
            (false, false) => SensorState::Offline,
            (true, false) => SensorState::Fault,
            (false, true) => SensorState::Quiet,
            (true, true) => SensorState::Motion,
        },
        Family::SwitchLike => {
            if pin1 {
                SensorState::On
            } else {
                SensorState::Off
            }
        }
    }
}

/// Derive the state of `sensor` from the current bus.
pub fn derive_state(sensor: &SensorDescriptor, bus: PinStateBus) -> SensorState {
    let Some(family) = sensor.variant.family() else {
        return SensorState::Unknown;
    };

    let pin1 = bus.get_bit(sensor.pin1);
    let pin2 = family != Family::SwitchLike && bus.get_bit(sensor.pin2);
    state_for_bits(family, pin1, pin2)
}

/// Icon hint for a variant in a given state.
pub fn state_icon(variant: SensorVariant, state: SensorState) -> &'static str {
    let Some(info) = variant.info() else {
        return ICON_UNKNOWN;
    };

    match (info.family, state) {
        (_, SensorState::Fault) => ICON_FAULT,
        (_, SensorState::Offline) => ICON_NO_POWER,
        (Family::DoorLike, SensorState::Open)
        | (Family::MotionLike, SensorState::Motion)
        | (Family::SwitchLike, SensorState::On) => info.icon_active,
        (Family::DoorLike, SensorState::Closed)
        | (Family::MotionLike, SensorState::Quiet)
        | (Family::SwitchLike, SensorState::Off) => info.icon_idle,
        _ => ICON_UNKNOWN,
    }
}
