use crate::error::{BridgeError, Result};
use crate::identity::{DeviceIdentity, MacAddress};
use crate::naming::{DEFAULT_DATA_ROOT, DEFAULT_DISCOVERY_ROOT, TopicNamer, TopicRoots};
use crate::sensors::{MAX_SENSORS, SensorDescriptor, SensorRegistry, SensorVariant, UNUSED_PIN};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

/// File name looked up in the working directory and the user config dir.
pub const CONFIG_FILE_NAME: &str = "pinwatch.json";

/// UART 0/1, SPI 50-53 and the chip selects on 4 and 10.
pub const DEFAULT_RESERVED_PINS: [i8; 8] = [0, 1, 4, 10, 50, 51, 52, 53];

pub const DEFAULT_ONEWIRE_PIN: i8 = 2;
pub const DEFAULT_POLL_SECS: u64 = 1;

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for line in content.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let mut value = value.trim();

            if (value.starts_with('"') && value.ends_with('"') && value.len() >= 2)
                || (value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2)
            {
                value = &value[1..value.len() - 1];
            }

            // Only set if not already set (env vars take precedence)
            if std::env::var(key).is_err() {
                // SAFETY: called from main before the tokio runtime starts any threads
                unsafe { std::env::set_var(key, value) };
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub device: DeviceConfig,
    pub mqtt: MqttConfig,
    pub topics: TopicConfig,
    pub poll: PollConfig,
    pub sensors: Vec<SensorEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub board: String,
    pub mac: MacAddress,
    pub ip: Ipv4Addr,
    pub hw_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u64,
    /// Capacity of the rumqttc request queue.
    pub queue_capacity: usize,
    /// Retain discovery documents on the broker.
    pub retain_discovery: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicConfig {
    pub discovery_root: String,
    pub data_root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    pub interval_secs: u64,
    pub onewire_pin: i8,
    /// Pins no sensor may claim. The one-wire pin is always added.
    pub reserved_pins: Vec<i8>,
}

/// One entry of the `sensors` array: `{"type": "door2", "pin1": 5, "pin2": 6}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "unused_pin")]
    pub pin1: i8,
    #[serde(default = "unused_pin")]
    pub pin2: i8,
}

fn unused_pin() -> i8 {
    UNUSED_PIN
}

fn default_mqtt_port() -> u16 {
    1883
}

/// On-disk layout, flat as the board firmware writes it.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub macaddress: MacAddress,
    pub ip_address: Ipv4Addr,
    #[serde(default)]
    pub board: Option<String>,
    #[serde(default)]
    pub hw_version: Option<String>,
    pub mqtt_address: String,
    #[serde(default = "default_mqtt_port")]
    pub mqtt_port: u16,
    #[serde(default)]
    pub mqtt_username: Option<String>,
    #[serde(default)]
    pub mqtt_password: Option<String>,
    #[serde(default)]
    pub poll_secs: Option<u64>,
    #[serde(default)]
    pub onewire_pin: Option<i8>,
    #[serde(default)]
    pub reserved_pins: Option<Vec<i8>>,
    #[serde(default)]
    pub sensors: Vec<SensorEntry>,
}

fn host_board_name() -> String {
    gethostname::gethostname()
        .to_string_lossy()
        .split('.')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("pinwatch")
        .to_string()
}

impl Default for Config {
    fn default() -> Self {
        let board = host_board_name();
        Self {
            device: DeviceConfig {
                board: board.clone(),
                mac: MacAddress::default(),
                ip: Ipv4Addr::UNSPECIFIED,
                hw_version: "unknown".to_string(),
            },
            mqtt: MqttConfig {
                broker_host: "127.0.0.1".to_string(),
                broker_port: default_mqtt_port(),
                client_id: format!("pinwatch-{board}"),
                username: None,
                password: None,
                keep_alive_secs: 30,
                queue_capacity: 128,
                retain_discovery: true,
            },
            topics: TopicConfig {
                discovery_root: DEFAULT_DISCOVERY_ROOT.to_string(),
                data_root: DEFAULT_DATA_ROOT.to_string(),
            },
            poll: PollConfig {
                interval_secs: DEFAULT_POLL_SECS,
                onewire_pin: DEFAULT_ONEWIRE_PIN,
                reserved_pins: DEFAULT_RESERVED_PINS.to_vec(),
            },
            sensors: Vec::new(),
        }
    }
}

impl From<ConfigFile> for Config {
    fn from(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(board) = file.board.filter(|b| !b.is_empty()) {
            config.set_board(board);
        }
        config.device.mac = file.macaddress;
        config.device.ip = file.ip_address;
        if let Some(hw_version) = file.hw_version {
            config.device.hw_version = hw_version;
        }

        config.mqtt.broker_host = file.mqtt_address;
        config.mqtt.broker_port = file.mqtt_port;
        config.mqtt.username = file.mqtt_username;
        config.mqtt.password = file.mqtt_password;

        if let Some(secs) = file.poll_secs {
            config.poll.interval_secs = secs;
        }
        if let Some(pin) = file.onewire_pin {
            config.poll.onewire_pin = pin;
        }
        if let Some(reserved) = file.reserved_pins {
            config.poll.reserved_pins = reserved;
        }
        config.sensors = file.sensors;
        config
    }
}

impl Config {
    /// Parse the flat JSON file layout.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(json)?;
        Ok(file.into())
    }

    /// Load `path`, or the first config file found in the default locations,
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path(),
        };

        let mut config = match path {
            Some(path) => {
                info!("[Config] Loading {}", path.display());
                let json = fs::read_to_string(&path).map_err(|e| {
                    BridgeError::InvalidConfig(format!("{}: {}", path.display(), e))
                })?;
                Self::from_json(&json)?
            }
            None => {
                warn!("[Config] No {} found, using defaults", CONFIG_FILE_NAME);
                Self::default()
            }
        };
        config.apply_env();
        Ok(config)
    }

    /// `./pinwatch.json`, else `<config dir>/pinwatch/pinwatch.json`.
    pub fn default_path() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join("pinwatch").join(CONFIG_FILE_NAME))
            .filter(|path| path.exists())
    }

    /// Rename the board; the MQTT client id follows it.
    pub fn set_board(&mut self, board: String) {
        self.mqtt.client_id = format!("pinwatch-{board}");
        self.device.board = board;
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides looked up by environment variable name.
    ///
    /// An explicit `MQTT_CLIENT_ID` wins over the one derived from the board.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(board) = lookup("PINWATCH_BOARD")
            && !board.is_empty()
        {
            self.set_board(board);
        }
        if let Some(secs) = lookup("PINWATCH_POLL_SECS")
            && let Ok(s) = secs.parse()
        {
            self.poll.interval_secs = s;
        }

        // MQTT configuration
        if let Some(host) = lookup("MQTT_BROKER_HOST") {
            self.mqtt.broker_host = host;
        }
        if let Some(port) = lookup("MQTT_BROKER_PORT")
            && let Ok(p) = port.parse()
        {
            self.mqtt.broker_port = p;
        }
        if let Some(client_id) = lookup("MQTT_CLIENT_ID") {
            self.mqtt.client_id = client_id;
        }
        if let Some(username) = lookup("MQTT_USERNAME") {
            self.mqtt.username = Some(username);
        }
        if let Some(password) = lookup("MQTT_PASSWORD") {
            self.mqtt.password = Some(password);
        }
    }

    /// Reserved pins including the one-wire pin.
    pub fn reserved_pins(&self) -> Vec<i8> {
        let mut reserved = self.poll.reserved_pins.clone();
        if self.poll.onewire_pin >= 0 && !reserved.contains(&self.poll.onewire_pin) {
            reserved.push(self.poll.onewire_pin);
        }
        reserved
    }

    /// Build the validated sensor registry.
    ///
    /// Entries past [`MAX_SENSORS`] are ignored with a warning. Any entry
    /// that claims a reserved or out-of-range pin fails the whole load.
    pub fn registry(&self) -> Result<SensorRegistry> {
        if self.sensors.len() > MAX_SENSORS {
            warn!(
                "[Config] {} sensors configured, ignoring all past the first {}",
                self.sensors.len(),
                MAX_SENSORS
            );
        }

        let reserved = self.reserved_pins();
        let mut registry = SensorRegistry::new();
        for (index, entry) in self.sensors.iter().take(MAX_SENSORS).enumerate() {
            let variant = SensorVariant::from_config_name(&entry.kind);
            if variant == SensorVariant::Unused && !entry.kind.eq_ignore_ascii_case("unused") {
                warn!("[Config] Sensor {}: unknown type {:?}, slot unused", index, entry.kind);
            }
            let sensor = SensorDescriptor::new(variant, entry.pin1, entry.pin2);
            sensor
                .validate(&reserved)
                .map_err(|e| BridgeError::InvalidConfig(format!("sensor {index}: {e}")))?;
            registry.push(sensor)?;
        }
        Ok(registry)
    }

    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(
            self.device.board.clone(),
            self.device.mac,
            self.device.ip,
        )
        .with_hw_version(self.device.hw_version.clone())
    }

    pub fn roots(&self) -> TopicRoots {
        TopicRoots {
            discovery: self.topics.discovery_root.clone(),
            data: self.topics.data_root.clone(),
        }
    }

    pub fn namer(&self) -> Result<TopicNamer> {
        TopicNamer::new(self.identity(), self.roots())
    }
}
