//! Bit-packed digital readings of every monitored pin.

use super::registry::SensorRegistry;
use crate::hardware::DigitalIo;
use std::fmt;

/// Number of pins a bus can hold.
pub const BUS_WIDTH: i8 = 64;

/// Most recent digital value of every pin, bit *i* = pin *i*.
///
/// Updates are read-modify-write: bits of pins nobody reads keep their
/// previous value. Methods return a new bus so the owner assigns the whole
/// 64-bit value at once.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PinStateBus(u64);

impl PinStateBus {
    pub const fn new(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Set or clear the bit for `pin`.
    ///
    /// A negative pin is the "unused" sentinel and leaves the bus unchanged,
    /// as does a pin beyond the bus width.
    pub fn set_bit(self, pin: i8, value: bool) -> Self {
        if !(0..BUS_WIDTH).contains(&pin) {
            return self;
        }
        let mask = 1u64 << pin;
        if value {
            Self(self.0 | mask)
        } else {
            Self(self.0 & !mask)
        }
    }

    /// Value of the bit for `pin`. Pins outside 0..64 read as low.
    pub fn get_bit(self, pin: i8) -> bool {
        if !(0..BUS_WIDTH).contains(&pin) {
            return false;
        }
        (self.0 >> pin) & 1 == 1
    }

    /// Read every pin the registry monitors and fold the readings in.
    pub fn read_sensors(self, registry: &SensorRegistry, io: &mut impl DigitalIo) -> Self {
        registry
            .iter()
            .flat_map(|sensor| sensor.monitored_pins())
            .fold(self, |bus, pin| bus.set_bit(pin, io.read_pin(pin)))
    }
}

impl fmt::Debug for PinStateBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PinStateBus({:#018x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::SimulatedBoard;
    use crate::sensors::{SensorDescriptor, SensorVariant};

    #[test]
    fn test_set_bit_only_touches_target() {
        let bus = PinStateBus::new(0xA5A5_0F0F_1234_8001);
        for target in 0..BUS_WIDTH {
            for value in [false, true] {
                let updated = bus.set_bit(target, value);
                assert_eq!(updated.get_bit(target), value);
                for other in (0..BUS_WIDTH).filter(|p| *p != target) {
                    assert_eq!(updated.get_bit(other), bus.get_bit(other));
                }
            }
        }
    }

    #[test]
    fn test_negative_pin_is_noop() {
        let bus = PinStateBus::new(0xFF);
        assert_eq!(bus.set_bit(-1, false), bus);
        assert_eq!(bus.set_bit(-1, true), bus);
        assert!(!bus.get_bit(-1));
    }

    #[test]
    fn test_high_pin() {
        let bus = PinStateBus::default().set_bit(63, true);
        assert_eq!(bus.bits(), 1 << 63);
        assert!(bus.get_bit(63));
    }

    #[test]
    fn test_read_sensors_preserves_unmonitored_bits() {
        let mut registry = SensorRegistry::new();
        registry
            .push(SensorDescriptor::new(SensorVariant::Door, 5, 6))
            .unwrap();
        registry
            .push(SensorDescriptor::new(SensorVariant::Switch, 7, -1))
            .unwrap();

        let mut board = SimulatedBoard::new();
        board.set_pin(5, true);
        board.set_pin(6, false);
        board.set_pin(7, true);
        // Not monitored, must not be read into the bus
        board.set_pin(20, true);

        let before = PinStateBus::default().set_bit(40, true).set_bit(6, true);
        let after = before.read_sensors(&registry, &mut board);

        assert!(after.get_bit(5));
        assert!(!after.get_bit(6));
        assert!(after.get_bit(7));
        assert!(!after.get_bit(20));
        assert!(after.get_bit(40));
    }
}
