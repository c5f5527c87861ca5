//! Simulated board for development and testing.
//!
//! Outputs loop back to inputs, so a switch driven high reads back as on.

use super::{DigitalIo, OneWireBus};
use crate::sensors::ProbeAddress;
use crate::sensors::probe::SENTINEL_TEMPERATURE_F;
use log::debug;

/// In-memory GPIO bank plus one-wire bus.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBoard {
    levels: u64,
    probes: Vec<(ProbeAddress, f32)>,
}

impl SimulatedBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the input level of `pin`. Negative or out-of-range pins are ignored.
    pub fn set_pin(&mut self, pin: i8, high: bool) {
        if !(0..64).contains(&pin) {
            return;
        }
        if high {
            self.levels |= 1 << pin;
        } else {
            self.levels &= !(1 << pin);
        }
    }

    pub fn pin(&self, pin: i8) -> bool {
        (0..64).contains(&pin) && (self.levels >> pin) & 1 == 1
    }

    /// Attach a probe, or update its temperature if already attached.
    pub fn set_probe(&mut self, address: ProbeAddress, temp_f: f32) {
        match self.probes.iter_mut().find(|(a, _)| *a == address) {
            Some(entry) => entry.1 = temp_f,
            None => self.probes.push((address, temp_f)),
        }
    }

    /// Make the next conversions of `address` fail.
    pub fn fail_probe(&mut self, address: ProbeAddress) {
        self.set_probe(address, SENTINEL_TEMPERATURE_F);
    }

    pub fn remove_probe(&mut self, address: ProbeAddress) {
        self.probes.retain(|(a, _)| *a != address);
    }
}

impl DigitalIo for SimulatedBoard {
    fn read_pin(&mut self, pin: i8) -> bool {
        self.pin(pin)
    }

    fn write_pin(&mut self, pin: i8, high: bool) {
        debug!("[Sim] Pin {} driven {}", pin, if high { "high" } else { "low" });
        self.set_pin(pin, high);
    }
}

impl OneWireBus for SimulatedBoard {
    fn scan(&mut self) -> Vec<(ProbeAddress, f32)> {
        self.probes.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE: ProbeAddress = ProbeAddress([0x28, 0, 0, 0, 0, 0, 0, 1]);

    #[test]
    fn test_write_reads_back() {
        let mut board = SimulatedBoard::new();
        assert!(!board.read_pin(7));
        board.write_pin(7, true);
        assert!(board.read_pin(7));
        board.write_pin(7, false);
        assert!(!board.read_pin(7));
    }

    #[test]
    fn test_invalid_pins_ignored() {
        let mut board = SimulatedBoard::new();
        board.set_pin(-1, true);
        board.set_pin(64, true);
        assert!(!board.read_pin(-1));
        assert!(!board.read_pin(64));
    }

    #[test]
    fn test_probe_lifecycle() {
        let mut board = SimulatedBoard::new();
        board.set_probe(PROBE, 70.0);
        board.set_probe(PROBE, 71.0);
        assert_eq!(board.scan(), vec![(PROBE, 71.0)]);

        board.fail_probe(PROBE);
        assert_eq!(board.scan(), vec![(PROBE, SENTINEL_TEMPERATURE_F)]);

        board.remove_probe(PROBE);
        assert!(board.scan().is_empty());
    }
}
