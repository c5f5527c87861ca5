//! Sensor state model.
//!
//! Pin readings are packed into a [`PinStateBus`], each configured
//! [`SensorDescriptor`] maps the bus to a [`SensorState`] through its
//! variant's truth table, and one-wire probes are filtered by
//! [`ProbeHistory`] before anything is published.

pub mod pin_bus;
pub mod probe;
pub mod registry;
pub mod state;
pub mod variant;

pub use pin_bus::PinStateBus;
pub use probe::{ProbeAddress, ProbeHistory, ProbeSample};
pub use registry::{MAX_SENSORS, SensorDescriptor, SensorRegistry, UNUSED_PIN};
pub use state::{SensorState, derive_state, state_icon};
pub use variant::{Family, SensorVariant, VariantInfo};
