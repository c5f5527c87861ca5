//! Hardware access seams.
//!
//! GPIO and one-wire access live behind these traits so the sensor model
//! can be driven by real hardware, the simulator, or tests.

mod simulation;

pub use simulation::SimulatedBoard;

use crate::sensors::ProbeAddress;

/// Digital pin access.
pub trait DigitalIo {
    /// Current level of `pin`.
    fn read_pin(&mut self, pin: i8) -> bool;

    /// Drive an output `pin` high or low.
    fn write_pin(&mut self, pin: i8, high: bool);
}

/// One-wire temperature bus.
pub trait OneWireBus {
    /// Enumerate every probe on the bus and read its temperature in °F.
    ///
    /// A failed conversion is reported as the sentinel temperature.
    fn scan(&mut self) -> Vec<(ProbeAddress, f32)>;
}
