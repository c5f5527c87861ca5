//! One-wire temperature probes and the quorum noise filter.
//!
//! Each poll rescans the bus and pushes the new reading into a three-deep
//! history carried forward by probe address. A probe is only trusted once
//! three consecutive samples are plausible and close to each other.

use log::debug;
use std::fmt;

/// Reading reported for a failed or absent conversion (degrees Fahrenheit).
pub const SENTINEL_TEMPERATURE_F: f32 = 222.22;

/// Largest believable change across three consecutive polls.
pub const TOLERANCE_F: f32 = 20.0;

/// 64-bit one-wire ROM address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProbeAddress(pub [u8; 8]);

impl fmt::Display for ProbeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ProbeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProbeAddress({self})")
    }
}

/// Latest reading of a probe plus the two readings before it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeSample {
    pub address: ProbeAddress,
    pub temp_f: f32,
    pub temp_f_prev: f32,
    pub temp_f_prev2: f32,
}

impl ProbeSample {
    /// A probe seen for the first time, with no usable history.
    pub fn first(address: ProbeAddress, temp_f: f32) -> Self {
        Self {
            address,
            temp_f,
            temp_f_prev: SENTINEL_TEMPERATURE_F,
            temp_f_prev2: SENTINEL_TEMPERATURE_F,
        }
    }

    /// Shift the history by one and record `temp_f` as the latest reading.
    pub fn advance(&self, temp_f: f32) -> Self {
        Self {
            address: self.address,
            temp_f,
            temp_f_prev: self.temp_f,
            temp_f_prev2: self.temp_f_prev,
        }
    }

    /// True when all three samples are plausible and pairwise within tolerance.
    ///
    /// NaN readings fail the magnitude check.
    pub fn is_valid(&self) -> bool {
        let samples = [self.temp_f, self.temp_f_prev, self.temp_f_prev2];
        if !samples.iter().all(|t| t.abs() < SENTINEL_TEMPERATURE_F) {
            return false;
        }
        (self.temp_f - self.temp_f_prev).abs() <= TOLERANCE_F
            && (self.temp_f - self.temp_f_prev2).abs() <= TOLERANCE_F
            && (self.temp_f_prev - self.temp_f_prev2).abs() <= TOLERANCE_F
    }

    /// Value published on the state topic: the latest raw sample, two decimals.
    pub fn payload(&self) -> String {
        format!("{:.2}", self.temp_f)
    }
}

/// Rolling history of every probe found on the last scan.
#[derive(Debug, Clone, Default)]
pub struct ProbeHistory {
    probes: Vec<ProbeSample>,
}

impl ProbeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the history with the result of a fresh bus scan.
    ///
    /// Probes keep their history when their address was present last cycle;
    /// probes missing from `scan` are dropped.
    pub fn rescan(&mut self, scan: &[(ProbeAddress, f32)]) {
        let next = scan
            .iter()
            .map(|&(address, temp_f)| {
                match self.probes.iter().find(|p| p.address == address) {
                    Some(previous) => previous.advance(temp_f),
                    None => {
                        debug!("[Probe] New probe {} on bus", address);
                        ProbeSample::first(address, temp_f)
                    }
                }
            })
            .collect();
        self.probes = next;
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProbeSample> {
        self.probes.iter()
    }

    pub fn get(&self, address: &ProbeAddress) -> Option<&ProbeSample> {
        self.probes.iter().find(|p| p.address == *address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: ProbeAddress = ProbeAddress([0x28, 0xff, 0x64, 0x1e, 0x0f, 0x84, 0x03, 0x9a]);
    const B: ProbeAddress = ProbeAddress([0x28, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07]);

    fn sample(t0: f32, t1: f32, t2: f32) -> ProbeSample {
        ProbeSample {
            address: A,
            temp_f: t0,
            temp_f_prev: t1,
            temp_f_prev2: t2,
        }
    }

    #[test]
    fn test_consistent_samples_are_valid() {
        assert!(sample(70.0, 71.0, 69.5).is_valid());
        assert!(sample(70.0, 90.0, 80.0).is_valid());
    }

    #[test]
    fn test_outlier_is_invalid() {
        assert!(!sample(70.0, 95.0, 69.0).is_valid());
        assert!(!sample(95.0, 70.0, 70.0).is_valid());
        assert!(!sample(70.0, 70.0, 49.0).is_valid());
    }

    #[test]
    fn test_sentinel_and_nan_are_invalid() {
        assert!(!sample(SENTINEL_TEMPERATURE_F, 70.0, 70.0).is_valid());
        assert!(!sample(70.0, -SENTINEL_TEMPERATURE_F, 70.0).is_valid());
        assert!(!sample(f32::NAN, 70.0, 70.0).is_valid());
    }

    #[test]
    fn test_new_probe_needs_three_cycles() {
        let mut history = ProbeHistory::new();

        history.rescan(&[(A, 70.0)]);
        assert!(!history.get(&A).unwrap().is_valid());

        history.rescan(&[(A, 70.5)]);
        assert!(!history.get(&A).unwrap().is_valid());

        history.rescan(&[(A, 71.0)]);
        let probe = history.get(&A).unwrap();
        assert!(probe.is_valid());
        assert_eq!(probe.temp_f, 71.0);
        assert_eq!(probe.temp_f_prev, 70.5);
        assert_eq!(probe.temp_f_prev2, 70.0);
    }

    #[test]
    fn test_history_shifts_even_when_invalid() {
        let mut history = ProbeHistory::new();
        for t in [70.0, 70.0, 150.0, 70.0, 70.0] {
            history.rescan(&[(A, t)]);
        }
        // 150.0 has now rolled out of the window
        assert!(!history.get(&A).unwrap().is_valid());
        history.rescan(&[(A, 70.0)]);
        assert!(history.get(&A).unwrap().is_valid());
    }

    #[test]
    fn test_missing_probe_is_dropped() {
        let mut history = ProbeHistory::new();
        history.rescan(&[(A, 70.0), (B, 60.0)]);
        history.rescan(&[(A, 70.0), (B, 60.0)]);
        history.rescan(&[(B, 60.0)]);
        assert_eq!(history.len(), 1);
        assert!(history.get(&A).is_none());

        // Reappearing starts from scratch
        history.rescan(&[(A, 70.0), (B, 60.0)]);
        assert!(!history.get(&A).unwrap().is_valid());
        assert!(history.get(&B).unwrap().is_valid());
    }

    #[test]
    fn test_address_renders_lowercase_hex() {
        assert_eq!(A.to_string(), "28ff641e0f84039a");
        assert_eq!(B.to_string(), "2801020304050607");
    }

    #[test]
    fn test_payload_is_latest_sample() {
        assert_eq!(sample(70.25, 60.0, 50.0).payload(), "70.25");
        assert_eq!(sample(-3.5, -3.0, -3.0).payload(), "-3.50");
    }
}
