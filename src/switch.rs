//! Switch command payloads.
//!
//! All switches of a device share one command topic, so each payload names
//! its target pin: `switch_07-ON` / `switch_07-OFF`.

use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized switch command: {0:?}")]
pub struct ParseCommandError(pub String);

/// Decoded switch command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchCommand {
    pub pin: i8,
    pub on: bool,
}

impl FromStr for SwitchCommand {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseCommandError(s.to_string());
        let rest = s.trim().strip_prefix("switch_").ok_or_else(invalid)?;
        let (pin, action) = rest.split_once('-').ok_or_else(invalid)?;
        if pin.is_empty() || !pin.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let pin: i8 = pin.parse().map_err(|_| invalid())?;
        let on = match action {
            "ON" => true,
            "OFF" => false,
            _ => return Err(invalid()),
        };
        Ok(SwitchCommand { pin, on })
    }
}
