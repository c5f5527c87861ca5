//! Configured sensor descriptors.

use super::variant::{Family, SensorVariant};
use crate::error::{BridgeError, Result};

/// Maximum number of digital sensors on one device.
pub const MAX_SENSORS: usize = 64;

/// Pin number meaning "not connected".
pub const UNUSED_PIN: i8 = -1;

/// One configured sensor or actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SensorDescriptor {
    pub variant: SensorVariant,
    pub pin1: i8,
    pub pin2: i8,
}

impl SensorDescriptor {
    pub const fn new(variant: SensorVariant, pin1: i8, pin2: i8) -> Self {
        Self {
            variant,
            pin1,
            pin2,
        }
    }

    pub const fn unused() -> Self {
        Self::new(SensorVariant::Unused, UNUSED_PIN, UNUSED_PIN)
    }

    pub fn is_used(&self) -> bool {
        self.variant != SensorVariant::Unused
    }

    /// Pins read each poll cycle: both for door/motion families, pin1 for switches.
    pub fn monitored_pins(self) -> impl Iterator<Item = i8> {
        let count = self.variant.family().map_or(0, Family::pin_count);
        [self.pin1, self.pin2]
            .into_iter()
            .take(count)
            .filter(|pin| *pin >= 0)
    }

    /// Check the pins against the bus width and the reserved set.
    ///
    /// Door and motion sensors need both pins, switches need pin1.
    pub fn validate(&self, reserved: &[i8]) -> Result<()> {
        for pin in self.monitored_pins() {
            if pin >= super::pin_bus::BUS_WIDTH {
                return Err(BridgeError::PinOutOfRange {
                    pin,
                    variant: self.variant.to_string(),
                });
            }
            if reserved.contains(&pin) {
                return Err(BridgeError::ReservedPin {
                    pin,
                    variant: self.variant.to_string(),
                });
            }
        }
        for pin in [self.pin1, self.pin2] {
            if pin < UNUSED_PIN {
                return Err(BridgeError::PinOutOfRange {
                    pin,
                    variant: self.variant.to_string(),
                });
            }
        }
        let count = self.variant.family().map_or(0, Family::pin_count);
        if [self.pin1, self.pin2][..count].contains(&UNUSED_PIN) {
            return Err(BridgeError::MissingPin {
                variant: self.variant.to_string(),
            });
        }
        Ok(())
    }
}

impl Default for SensorDescriptor {
    fn default() -> Self {
        Self::unused()
    }
}

/// Ordered, fixed-capacity list of sensor descriptors.
///
/// Unused slots are kept so indexes stay stable across reloads of the
/// same configuration.
#[derive(Debug, Clone, Default)]
pub struct SensorRegistry {
    sensors: heapless::Vec<SensorDescriptor, MAX_SENSORS>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sensor: SensorDescriptor) -> Result<()> {
        self.sensors
            .push(sensor)
            .map_err(|_| BridgeError::RegistryFull(MAX_SENSORS))
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SensorDescriptor> {
        self.sensors.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SensorDescriptor> {
        self.sensors.iter()
    }

    /// Configured switches, in registry order.
    pub fn switches(&self) -> impl Iterator<Item = &SensorDescriptor> {
        self.sensors.iter().filter(|s| s.variant.is_switch())
    }

    pub fn has_switches(&self) -> bool {
        self.switches().next().is_some()
    }

    /// Registry slot of the switch driven by `pin`, if any.
    pub fn switch_index(&self, pin: i8) -> Option<usize> {
        self.sensors
            .iter()
            .position(|s| s.variant.is_switch() && s.pin1 == pin)
    }
}

impl TryFrom<Vec<SensorDescriptor>> for SensorRegistry {
    type Error = BridgeError;

    fn try_from(sensors: Vec<SensorDescriptor>) -> Result<Self> {
        let mut registry = SensorRegistry::new();
        for sensor in sensors {
            registry.push(sensor)?;
        }
        Ok(registry)
    }
}
