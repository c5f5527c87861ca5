//! Sensor variants and their per-variant descriptor table.
//!
//! Everything that depends on "what kind of sensor is this" (state table,
//! identifier prefix, topic class, display label, icons) is looked up here
//! instead of being re-enumerated by each component.

use strum::{Display, EnumIter, EnumString};

/// Semantic type of a configured sensor or actuator.
///
/// Parses both the firmware-style names (`door2`, `switch1_fan`) and the
/// short names (`door`, `fan`) used in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum SensorVariant {
    #[default]
    #[strum(to_string = "unused", serialize = "reserved")]
    Unused,
    #[strum(to_string = "door", serialize = "door2")]
    Door,
    #[strum(to_string = "garagedoor", serialize = "garagedoor2", serialize = "garage_door")]
    GarageDoor,
    #[strum(to_string = "window", serialize = "window2")]
    Window,
    #[strum(to_string = "motion", serialize = "motion2")]
    Motion,
    #[strum(to_string = "laser", serialize = "motion2_laser", serialize = "motion_laser")]
    MotionLaser,
    #[strum(to_string = "switch", serialize = "switch1")]
    Switch,
    #[strum(to_string = "radiator", serialize = "switch1_radiator", serialize = "switch_radiator")]
    SwitchRadiator,
    #[strum(to_string = "fan", serialize = "switch1_fan", serialize = "switch_fan")]
    SwitchFan,
    #[strum(to_string = "fire", serialize = "switch1_fire", serialize = "switch_fire")]
    SwitchFire,
    #[strum(
        to_string = "alarmlight",
        serialize = "switch1_alarmlight",
        serialize = "switch_alarmlight"
    )]
    SwitchAlarmLight,
}

/// Variant family, selects the truth table used to derive state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// Normally-open + normally-closed reed pair.
    DoorLike,
    /// Data line + power-sense line.
    MotionLike,
    /// Single output pin, pin2 unused.
    SwitchLike,
}

impl Family {
    /// Number of pins read for this family.
    pub fn pin_count(self) -> usize {
        match self {
            Family::DoorLike | Family::MotionLike => 2,
            Family::SwitchLike => 1,
        }
    }

    /// Home Assistant component class used in topics.
    pub fn topic_class(self) -> &'static str {
        match self {
            Family::SwitchLike => "switch",
            Family::DoorLike | Family::MotionLike => "sensor",
        }
    }

    /// Labels of pin1/pin2 in display names.
    pub fn pin_labels(self) -> (&'static str, &'static str) {
        match self {
            Family::DoorLike => ("NOPin", "NCPin"),
            Family::MotionLike => ("Pin", "PwrSns"),
            Family::SwitchLike => ("Pin", ""),
        }
    }
}

/// Static facts about a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantInfo {
    pub family: Family,
    /// Prefix of the sensor identifier (`door_0506_AABBCC`).
    pub prefix: &'static str,
    /// Word used in the display name (`uno_AABBCC Door NOPin:05 NCPin:06`).
    pub label: &'static str,
    /// Icon for open / motion / on.
    pub icon_active: &'static str,
    /// Icon for closed / quiet / off.
    pub icon_idle: &'static str,
}

const fn info(
    family: Family,
    prefix: &'static str,
    label: &'static str,
    icon_active: &'static str,
    icon_idle: &'static str,
) -> VariantInfo {
    VariantInfo {
        family,
        prefix,
        label,
        icon_active,
        icon_idle,
    }
}

const DOOR: VariantInfo = info(
    Family::DoorLike,
    "door",
    "Door",
    "mdi:door-open",
    "mdi:door-closed",
);
const GARAGE_DOOR: VariantInfo = info(
    Family::DoorLike,
    "garagedoor",
    "GarageDoor",
    "mdi:garage-open",
    "mdi:garage",
);
const WINDOW: VariantInfo = info(
    Family::DoorLike,
    "window",
    "Window",
    "mdi:window-open",
    "mdi:window-closed",
);
const MOTION: VariantInfo = info(
    Family::MotionLike,
    "motion",
    "Motion",
    "mdi:motion-sensor",
    "mdi:meditation",
);
const MOTION_LASER: VariantInfo = info(
    Family::MotionLike,
    "laser",
    "Laser",
    "mdi:motion-sensor",
    "mdi:laser-pointer",
);
const SWITCH: VariantInfo = info(
    Family::SwitchLike,
    "switch",
    "Switch",
    "mdi:light-switch",
    "mdi:light-switch-off",
);
const SWITCH_RADIATOR: VariantInfo = info(
    Family::SwitchLike,
    "switch",
    "RadiatorSwitch",
    "mdi:radiator",
    "mdi:radiator-off",
);
const SWITCH_FAN: VariantInfo = info(
    Family::SwitchLike,
    "switch",
    "FanSwitch",
    "mdi:fan",
    "mdi:fan-off",
);
const SWITCH_FIRE: VariantInfo = info(
    Family::SwitchLike,
    "switch",
    "FireSwitch",
    "mdi:fire",
    "mdi:fire-off",
);
const SWITCH_ALARM_LIGHT: VariantInfo = info(
    Family::SwitchLike,
    "switch",
    "AlarmSwitch",
    "mdi:alarm-light-outline",
    "mdi:alarm-light-off",
);

impl SensorVariant {
    /// Descriptor table entry, `None` for [`SensorVariant::Unused`].
    pub fn info(self) -> Option<&'static VariantInfo> {
        match self {
            SensorVariant::Unused => None,
            SensorVariant::Door => Some(&DOOR),
            SensorVariant::GarageDoor => Some(&GARAGE_DOOR),
            SensorVariant::Window => Some(&WINDOW),
            SensorVariant::Motion => Some(&MOTION),
            SensorVariant::MotionLaser => Some(&MOTION_LASER),
            SensorVariant::Switch => Some(&SWITCH),
            SensorVariant::SwitchRadiator => Some(&SWITCH_RADIATOR),
            SensorVariant::SwitchFan => Some(&SWITCH_FAN),
            SensorVariant::SwitchFire => Some(&SWITCH_FIRE),
            SensorVariant::SwitchAlarmLight => Some(&SWITCH_ALARM_LIGHT),
        }
    }

    pub fn family(self) -> Option<Family> {
        self.info().map(|i| i.family)
    }

    pub fn is_switch(self) -> bool {
        self.family() == Some(Family::SwitchLike)
    }

    /// Parse a configuration name, falling back to `Unused` for anything unknown.
    pub fn from_config_name(name: &str) -> Self {
        name.trim().parse().unwrap_or_default()
    }
}
