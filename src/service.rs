//! Async glue between the MQTT event loop, the poll timer and the bridge.
//!
//! The bridge, the hardware and the transport live together behind one
//! mutex, so a switch command and a poll cycle never interleave.

use crate::bridge::{CycleReport, SensorBridge};
use crate::error::Result;
use crate::hardware::{DigitalIo, OneWireBus};
use crate::mqtt::MqttEvent;
use crate::transport::Transport;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Everything one device needs to run a cycle.
pub struct Station<H, T> {
    pub bridge: SensorBridge,
    pub hardware: H,
    pub transport: T,
}

pub type SharedStation<H, T> = Arc<Mutex<Station<H, T>>>;

impl<H, T> Station<H, T>
where
    H: DigitalIo + OneWireBus,
    T: Transport,
{
    pub fn new(bridge: SensorBridge, hardware: H, transport: T) -> Self {
        Self {
            bridge,
            hardware,
            transport,
        }
    }

    pub fn shared(self) -> SharedStation<H, T> {
        Arc::new(Mutex::new(self))
    }

    pub fn setup(&mut self) -> Result<()> {
        self.bridge.setup(&mut self.hardware, &mut self.transport)
    }

    pub fn cycle(&mut self) -> CycleReport {
        self.bridge.run_cycle(&mut self.hardware, &mut self.transport)
    }

    pub fn handle_event(&mut self, event: MqttEvent) {
        match event {
            MqttEvent::Connected => {
                self.bridge.force_announce();
                if let Err(e) = self.bridge.subscribe(&mut self.transport) {
                    warn!("[MQTT] Failed to subscribe to commands: {}", e);
                }
            }
            MqttEvent::Message(msg) => {
                let is_command = self
                    .bridge
                    .namer()
                    .command_topic()
                    .is_ok_and(|topic| topic == msg.topic);
                if !is_command {
                    debug!("[MQTT] Ignoring message on {}", msg.topic);
                    return;
                }
                self.bridge.handle_command(&msg.payload, &mut self.hardware);
            }
        }
    }
}

/// Apply MQTT events until the sending side closes.
pub async fn dispatch_events<H, T>(station: SharedStation<H, T>, mut rx: mpsc::Receiver<MqttEvent>)
where
    H: DigitalIo + OneWireBus,
    T: Transport,
{
    while let Some(event) = rx.recv().await {
        station.lock().handle_event(event);
    }
    debug!("[MQTT] Event channel closed");
}

/// Run a cycle every `period`. With `once`, stop after the first cycle.
pub async fn poll_loop<H, T>(station: SharedStation<H, T>, period: Duration, once: bool)
where
    H: DigitalIo + OneWireBus,
    T: Transport,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let report = station.lock().cycle();
        if report.discoveries > 0 || report.failed > 0 {
            info!(
                "[Poll] {} announced, {} published, {} suppressed, {} failed",
                report.discoveries, report.states, report.suppressed, report.failed
            );
        } else {
            debug!("[Poll] {:?}", report);
        }
        if once {
            break;
        }
    }
}
