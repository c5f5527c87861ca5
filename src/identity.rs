//! Device identity: board name, MAC and IP address, version strings.

use crate::error::BridgeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Reported as the device manufacturer in discovery documents.
pub const MANUFACTURER: &str = "pinwatch";

/// Ethernet MAC address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Last three bytes, uppercase hex without separators (`AABBCC`).
    pub fn suffix(&self) -> String {
        let [.., a, b, c] = self.0;
        format!("{a:02X}{b:02X}{c:02X}")
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddress({self})")
    }
}

impl FromStr for MacAddress {
    type Err = BridgeError;

    /// Accepts `AA:BB:CC:DD:EE:FF` or `AA-BB-CC-DD-EE-FF`, any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BridgeError::InvalidMacAddress(s.to_string());
        let mut bytes = [0u8; 6];
        let mut parts = s.trim().split([':', '-']);
        for byte in bytes.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(MacAddress(bytes))
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Who this device is on the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Board make, first part of the device identifier.
    pub board: String,
    pub mac: MacAddress,
    pub ip: Ipv4Addr,
    pub hw_version: String,
    pub sw_version: String,
}

impl DeviceIdentity {
    pub fn new(board: impl Into<String>, mac: MacAddress, ip: Ipv4Addr) -> Self {
        Self {
            board: board.into(),
            mac,
            ip,
            hw_version: String::from("unknown"),
            sw_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_hw_version(mut self, hw_version: impl Into<String>) -> Self {
        self.hw_version = hw_version.into();
        self
    }
}
