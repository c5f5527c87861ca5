//! Poll/derive/publish cycle.
//!
//! [`SensorBridge`] owns all per-device state: the sensor registry, the pin
//! bus, the probe history and what has been announced so far. One cycle
//! reads the hardware, derives every sensor's state and publishes
//! discovery documents and state values. A failure on one sensor is logged
//! and the cycle moves on to the next.

use crate::discovery::{DiscoveryDocument, publish_discovery};
use crate::error::Result;
use crate::hardware::{DigitalIo, OneWireBus};
use crate::naming::TopicNamer;
use crate::sensors::{
    PinStateBus, ProbeAddress, ProbeHistory, ProbeSample, SensorDescriptor, SensorRegistry,
    SensorState, derive_state,
};
use crate::switch::SwitchCommand;
use crate::transport::Transport;
use log::{debug, info, warn};
use std::collections::HashSet;

/// What a publish pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub discoveries: usize,
    pub states: usize,
    pub suppressed: usize,
    pub failed: usize,
}

/// Outcome of publishing one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Published {
    Suppressed,
    State,
    DiscoveryAndState,
}

/// Per-device context driving the sensor model.
#[derive(Debug)]
pub struct SensorBridge {
    registry: SensorRegistry,
    namer: TopicNamer,
    bus: PinStateBus,
    probes: ProbeHistory,
    /// Last announced state per registry slot; `None` means announce next time.
    announced: Vec<Option<SensorState>>,
    announced_probes: HashSet<ProbeAddress>,
}

impl SensorBridge {
    pub fn new(registry: SensorRegistry, namer: TopicNamer) -> Self {
        let announced = vec![None; registry.len()];
        Self {
            registry,
            namer,
            bus: PinStateBus::default(),
            probes: ProbeHistory::new(),
            announced,
            announced_probes: HashSet::new(),
        }
    }

    pub fn registry(&self) -> &SensorRegistry {
        &self.registry
    }

    pub fn namer(&self) -> &TopicNamer {
        &self.namer
    }

    pub fn bus(&self) -> PinStateBus {
        self.bus
    }

    pub fn probes(&self) -> &ProbeHistory {
        &self.probes
    }

    /// Current state of the sensor in registry slot `index`.
    pub fn state(&self, index: usize) -> Option<SensorState> {
        self.registry
            .get(index)
            .map(|sensor| derive_state(sensor, self.bus))
    }

    /// Drive every switch low and subscribe to the device command topic.
    pub fn setup(&mut self, io: &mut impl DigitalIo, transport: &mut dyn Transport) -> Result<()> {
        for switch in self.registry.switches() {
            io.write_pin(switch.pin1, false);
            self.bus = self.bus.set_bit(switch.pin1, false);
        }
        self.subscribe(transport)?;
        info!(
            "[Poll] {} sensor slot(s), {} switch(es), device {}",
            self.registry.iter().filter(|s| s.is_used()).count(),
            self.registry.switches().count(),
            self.namer.device_id()
        );
        Ok(())
    }

    /// Subscribe to the command topic when any switch is configured.
    ///
    /// Needed again after every reconnect since sessions are not persistent.
    pub fn subscribe(&self, transport: &mut dyn Transport) -> Result<()> {
        if self.registry.has_switches() {
            transport.subscribe(&self.namer.command_topic()?)?;
        }
        Ok(())
    }

    /// Announce everything again on the next publish (e.g. after a reconnect).
    pub fn force_announce(&mut self) {
        self.announced.iter_mut().for_each(|slot| *slot = None);
        self.announced_probes.clear();
    }

    fn read_pins(&mut self, io: &mut impl DigitalIo) {
        // Computed aside and assigned once so readers never see a partial update
        let bus = self.bus.read_sensors(&self.registry, io);
        self.bus = bus;
    }

    fn scan_probes(&mut self, onewire: &mut impl OneWireBus) {
        self.probes.rescan(&onewire.scan());
    }

    /// Publish discovery (when due) and state for every sensor and probe.
    pub fn publish(&mut self, transport: &mut dyn Transport) -> CycleReport {
        let mut report = CycleReport::default();

        for index in 0..self.registry.len() {
            let Some(sensor) = self.registry.get(index).copied() else {
                continue;
            };
            if !sensor.is_used() {
                continue;
            }
            match self.publish_sensor(index, &sensor, transport) {
                Ok(outcome) => report.count(outcome),
                Err(e) => {
                    warn!(
                        "[Poll] Skipping {} ({}, {}): {}",
                        sensor.variant, sensor.pin1, sensor.pin2, e
                    );
                    self.announced[index] = None;
                    report.failed += 1;
                }
            }
        }

        let probes: Vec<ProbeSample> = self.probes.iter().copied().collect();
        self.announced_probes
            .retain(|address| probes.iter().any(|p| p.address == *address && p.is_valid()));
        for probe in &probes {
            match self.publish_probe(probe, transport) {
                Ok(outcome) => report.count(outcome),
                Err(e) => {
                    warn!("[Probe] Skipping {}: {}", probe.address, e);
                    self.announced_probes.remove(&probe.address);
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// One full cycle: read all monitored pins, rescan the one-wire bus,
    /// then publish.
    pub fn run_cycle<H>(&mut self, hardware: &mut H, transport: &mut dyn Transport) -> CycleReport
    where
        H: DigitalIo + OneWireBus,
    {
        self.read_pins(hardware);
        self.scan_probes(hardware);
        debug!("[Poll] {:?}, {} probe(s)", self.bus, self.probes.len());
        self.publish(transport)
    }

    fn publish_sensor(
        &mut self,
        index: usize,
        sensor: &SensorDescriptor,
        transport: &mut dyn Transport,
    ) -> Result<Published> {
        let Some(family) = sensor.variant.family() else {
            self.announced[index] = None;
            return Ok(Published::Suppressed);
        };
        // Snapshot once: discovery icon and state payload must agree
        let state = derive_state(sensor, self.bus);
        if state.is_suppressed() {
            self.announced[index] = None;
            return Ok(Published::Suppressed);
        }

        let mut outcome = Published::State;
        if self.announced[index] != Some(state) {
            let doc = DiscoveryDocument::for_sensor(&self.namer, sensor, state)?;
            let topic = self.namer.sensor_discovery_topic(sensor)?;
            publish_discovery(&topic, &doc, transport)?;
            self.announced[index] = Some(state);
            outcome = Published::DiscoveryAndState;
        }

        let topic = self.namer.sensor_state_topic(sensor)?;
        transport.publish(&topic, state.payload(family).as_bytes())?;
        Ok(outcome)
    }

    fn publish_probe(
        &mut self,
        probe: &ProbeSample,
        transport: &mut dyn Transport,
    ) -> Result<Published> {
        if !probe.is_valid() {
            debug!(
                "[Probe] {} invalid read: {} {} {}",
                probe.address, probe.temp_f, probe.temp_f_prev, probe.temp_f_prev2
            );
            return Ok(Published::Suppressed);
        }

        let mut outcome = Published::State;
        if !self.announced_probes.contains(&probe.address) {
            let doc = DiscoveryDocument::for_probe(&self.namer, &probe.address)?;
            let topic = self.namer.probe_discovery_topic(&probe.address)?;
            publish_discovery(&topic, &doc, transport)?;
            self.announced_probes.insert(probe.address);
            outcome = Published::DiscoveryAndState;
        }

        let topic = self.namer.probe_state_topic(&probe.address)?;
        transport.publish(&topic, probe.payload().as_bytes())?;
        Ok(outcome)
    }

    /// Apply a payload received on the command topic.
    ///
    /// Returns `true` when a switch was driven. The bus is updated right
    /// away and the switch re-announced so its icon follows.
    pub fn handle_command(&mut self, payload: &str, io: &mut impl DigitalIo) -> bool {
        let command = match payload.parse::<SwitchCommand>() {
            Ok(command) => command,
            Err(e) => {
                warn!("[Switch] {}", e);
                return false;
            }
        };

        let Some(index) = self.registry.switch_index(command.pin) else {
            warn!("[Switch] No switch configured on pin {}", command.pin);
            return false;
        };

        io.write_pin(command.pin, command.on);
        self.bus = self.bus.set_bit(command.pin, command.on);
        self.announced[index] = None;
        info!(
            "[Switch] Pin {:02} {}",
            command.pin,
            if command.on { "ON" } else { "OFF" }
        );
        true
    }
}

impl CycleReport {
    fn count(&mut self, outcome: Published) {
        match outcome {
            Published::Suppressed => self.suppressed += 1,
            Published::State => self.states += 1,
            Published::DiscoveryAndState => {
                self.discoveries += 1;
                self.states += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::SimulatedBoard;
    use crate::identity::{DeviceIdentity, MacAddress};
    use crate::naming::TopicRoots;
    use crate::sensors::SensorVariant;
    use crate::transport::MemoryTransport;
    use serde_json::Value;
    use std::net::Ipv4Addr;

    const DOOR_STATE: &str = "aha/sensor/uno_AABBCC/door_0506_AABBCC/state";
    const DOOR_CONFIG: &str = "homeassistant/sensor/door_0506_AABBCC/config";

    fn namer() -> TopicNamer {
        let identity = DeviceIdentity::new(
            "uno",
            MacAddress([0xDE, 0xAD, 0xBE, 0xAA, 0xBB, 0xCC]),
            Ipv4Addr::new(192, 168, 1, 50),
        );
        TopicNamer::new(identity, TopicRoots::default()).unwrap()
    }

    fn bridge(sensors: Vec<SensorDescriptor>) -> SensorBridge {
        SensorBridge::new(SensorRegistry::try_from(sensors).unwrap(), namer())
    }

    fn door_bridge() -> SensorBridge {
        bridge(vec![SensorDescriptor::new(SensorVariant::Door, 5, 6)])
    }

    fn topics(transport: &MemoryTransport) -> Vec<&str> {
        transport
            .messages()
            .iter()
            .map(|m| m.topic.as_str())
            .collect()
    }

    #[test]
    fn test_open_door_announced_then_published() {
        let mut bridge = door_bridge();
        let mut board = SimulatedBoard::new();
        let mut transport = MemoryTransport::new();
        board.set_pin(5, true);
        board.set_pin(6, false);

        let report = bridge.run_cycle(&mut board, &mut transport);

        assert_eq!(topics(&transport), [DOOR_CONFIG, DOOR_STATE]);
        assert_eq!(transport.messages()[1].payload_str(), "open");
        assert_eq!(report.discoveries, 1);
        assert_eq!(report.states, 1);

        let doc: Value = serde_json::from_slice(&transport.messages()[0].payload).unwrap();
        assert_eq!(doc["icon"], "mdi:door-open");
    }

    #[test]
    fn test_offline_door_publishes_nothing() {
        let mut bridge = door_bridge();
        let mut board = SimulatedBoard::new();
        let mut transport = MemoryTransport::new();

        let report = bridge.run_cycle(&mut board, &mut transport);

        assert!(transport.messages().is_empty());
        assert_eq!(report.suppressed, 1);
    }

    #[test]
    fn test_unchanged_state_skips_discovery() {
        let mut bridge = door_bridge();
        let mut board = SimulatedBoard::new();
        let mut transport = MemoryTransport::new();
        board.set_pin(6, true);

        bridge.run_cycle(&mut board, &mut transport);
        transport.take();
        bridge.run_cycle(&mut board, &mut transport);

        assert_eq!(topics(&transport), [DOOR_STATE]);
        assert_eq!(transport.messages()[0].payload_str(), "closed");
    }

    #[test]
    fn test_state_change_reannounces() {
        let mut bridge = door_bridge();
        let mut board = SimulatedBoard::new();
        let mut transport = MemoryTransport::new();
        board.set_pin(6, true);
        bridge.run_cycle(&mut board, &mut transport);
        transport.take();

        board.set_pin(5, true);
        bridge.run_cycle(&mut board, &mut transport);

        assert_eq!(topics(&transport), [DOOR_CONFIG, DOOR_STATE]);
        assert_eq!(transport.messages()[1].payload_str(), "wiringfault");
        let doc: Value = serde_json::from_slice(&transport.messages()[0].payload).unwrap();
        assert_eq!(doc["icon"], "mdi:alert-circle-outline");
    }

    #[test]
    fn test_force_announce_after_reconnect() {
        let mut bridge = door_bridge();
        let mut board = SimulatedBoard::new();
        let mut transport = MemoryTransport::new();
        board.set_pin(5, true);
        bridge.run_cycle(&mut board, &mut transport);
        transport.take();

        bridge.force_announce();
        bridge.run_cycle(&mut board, &mut transport);

        assert_eq!(topics(&transport), [DOOR_CONFIG, DOOR_STATE]);
    }

    #[test]
    fn test_coming_back_online_reannounces() {
        let mut bridge = door_bridge();
        let mut board = SimulatedBoard::new();
        let mut transport = MemoryTransport::new();
        board.set_pin(5, true);
        bridge.run_cycle(&mut board, &mut transport);

        board.set_pin(5, false);
        bridge.run_cycle(&mut board, &mut transport);
        transport.take();

        board.set_pin(5, true);
        bridge.run_cycle(&mut board, &mut transport);
        assert_eq!(topics(&transport), [DOOR_CONFIG, DOOR_STATE]);
    }

    #[test]
    fn test_motion_fault_payload() {
        let mut bridge = bridge(vec![SensorDescriptor::new(SensorVariant::Motion, 2, 3)]);
        let mut board = SimulatedBoard::new();
        let mut transport = MemoryTransport::new();
        board.set_pin(2, true);

        bridge.run_cycle(&mut board, &mut transport);

        let state = transport
            .find("aha/sensor/uno_AABBCC/motion_0203_AABBCC/state")
            .unwrap();
        assert_eq!(state.payload_str(), "motion-fault");
    }

    #[test]
    fn test_unused_slots_are_skipped() {
        let mut bridge = bridge(vec![
            SensorDescriptor::unused(),
            SensorDescriptor::new(SensorVariant::Door, 5, 6),
        ]);
        let mut board = SimulatedBoard::new();
        let mut transport = MemoryTransport::new();
        board.set_pin(5, true);

        let report = bridge.run_cycle(&mut board, &mut transport);
        assert_eq!(report.discoveries, 1);
        assert_eq!(report.suppressed, 0);
        assert_eq!(transport.messages().len(), 2);
    }

    #[test]
    fn test_setup_drives_switches_low_and_subscribes() {
        let mut bridge = bridge(vec![
            SensorDescriptor::new(SensorVariant::SwitchFan, 7, -1),
            SensorDescriptor::new(SensorVariant::Door, 5, 6),
        ]);
        let mut board = SimulatedBoard::new();
        let mut transport = MemoryTransport::new();
        board.set_pin(7, true);

        bridge.setup(&mut board, &mut transport).unwrap();

        assert!(!board.pin(7));
        assert_eq!(transport.subscriptions(), ["aha/switch/uno_AABBCC/cmd"]);
    }

    #[test]
    fn test_setup_without_switches_does_not_subscribe() {
        let mut bridge = door_bridge();
        let mut board = SimulatedBoard::new();
        let mut transport = MemoryTransport::new();

        bridge.setup(&mut board, &mut transport).unwrap();
        assert!(transport.subscriptions().is_empty());
    }

    #[test]
    fn test_switch_command_round_trip() {
        let mut bridge = bridge(vec![SensorDescriptor::new(SensorVariant::SwitchFan, 7, -1)]);
        let mut board = SimulatedBoard::new();
        let mut transport = MemoryTransport::new();
        bridge.setup(&mut board, &mut transport).unwrap();
        bridge.run_cycle(&mut board, &mut transport);
        transport.take();

        assert!(bridge.handle_command("switch_07-ON", &mut board));
        assert!(board.pin(7));
        assert_eq!(bridge.state(0), Some(SensorState::On));

        bridge.run_cycle(&mut board, &mut transport);
        assert_eq!(
            topics(&transport),
            [
                "homeassistant/switch/switch_07_AABBCC/config",
                "aha/switch/uno_AABBCC/switch_07_AABBCC/state"
            ]
        );
        assert_eq!(transport.messages()[1].payload_str(), "ON");
        let doc: Value = serde_json::from_slice(&transport.messages()[0].payload).unwrap();
        assert_eq!(doc["icon"], "mdi:fan");
    }

    #[test]
    fn test_command_for_unknown_pin_ignored() {
        let mut bridge = bridge(vec![SensorDescriptor::new(SensorVariant::Switch, 7, -1)]);
        let mut board = SimulatedBoard::new();

        assert!(!bridge.handle_command("switch_08-ON", &mut board));
        assert!(!bridge.handle_command("garbage", &mut board));
        assert!(!board.pin(8));
    }

    #[test]
    fn test_probe_published_when_quorum_agrees() {
        let mut bridge = door_bridge();
        let mut board = SimulatedBoard::new();
        let mut transport = MemoryTransport::new();
        let address = ProbeAddress([0x28, 0xff, 0x64, 0x1e, 0x0f, 0x84, 0x03, 0x9a]);
        let state_topic = "aha/sensor/uno_AABBCC/28ff641e0f84039a/state";

        for temp in [70.0, 71.0] {
            board.set_probe(address, temp);
            bridge.run_cycle(&mut board, &mut transport);
        }
        assert!(transport.find(state_topic).is_none());

        board.set_probe(address, 69.5);
        bridge.run_cycle(&mut board, &mut transport);
        assert_eq!(
            topics(&transport),
            ["homeassistant/sensor/28ff641e0f84039a/config", state_topic]
        );
        assert_eq!(transport.messages()[1].payload_str(), "69.50");
    }

    #[test]
    fn test_probe_spike_suppressed() {
        let mut bridge = door_bridge();
        let mut board = SimulatedBoard::new();
        let mut transport = MemoryTransport::new();
        let address = ProbeAddress([0x28, 1, 2, 3, 4, 5, 6, 7]);

        for temp in [70.0, 95.0, 69.0] {
            board.set_probe(address, temp);
            bridge.run_cycle(&mut board, &mut transport);
        }
        assert!(transport.messages().is_empty());
    }

    /// Rejects publishes to one topic.
    struct RejectingTransport {
        inner: MemoryTransport,
        reject: &'static str,
    }

    impl Transport for RejectingTransport {
        fn begin_publish(&mut self, topic: &str, length: usize) -> Result<()> {
            self.inner.begin_publish(topic, length)
        }

        fn write(&mut self, bytes: &[u8]) -> Result<()> {
            self.inner.write(bytes)
        }

        fn end_publish(&mut self) -> Result<()> {
            self.inner.end_publish()
        }

        fn abort_publish(&mut self) {
            self.inner.abort_publish()
        }

        fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<()> {
            if topic == self.reject {
                return Err(crate::error::BridgeError::Transport("rejected".to_string()));
            }
            self.inner.publish(topic, payload)
        }

        fn subscribe(&mut self, topic: &str) -> Result<()> {
            self.inner.subscribe(topic)
        }
    }

    #[test]
    fn test_failed_sensor_does_not_stop_cycle() {
        let mut bridge = bridge(vec![
            SensorDescriptor::new(SensorVariant::Door, 5, 6),
            SensorDescriptor::new(SensorVariant::Window, 11, 12),
        ]);
        let mut board = SimulatedBoard::new();
        let mut transport = RejectingTransport {
            inner: MemoryTransport::new(),
            reject: DOOR_STATE,
        };
        board.set_pin(5, true);
        board.set_pin(11, true);

        let report = bridge.run_cycle(&mut board, &mut transport);

        assert_eq!(report.failed, 1);
        assert!(
            transport
                .inner
                .find("aha/sensor/uno_AABBCC/window_1112_AABBCC/state")
                .is_some()
        );

        // The failed sensor is announced again once the transport recovers
        transport.reject = "";
        transport.inner.take();
        bridge.run_cycle(&mut board, &mut transport);
        assert!(transport.inner.find(DOOR_CONFIG).is_some());
    }
}
