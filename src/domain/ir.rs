//! IR remote signal set and pulse-timing tables
//!
//! Each AC command maps to a fixed command frame which is expanded once into
//! a pulse-timing table: alternating mark/space durations in microseconds,
//! transmitted at a 38 kHz carrier. The transmitter treats tables as opaque;
//! selection happens in the dispatcher, expansion and caching here.

use crate::domain::types::{AcMode, PowerState};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Carrier frequency the AC unit demodulates.
pub const CARRIER_HZ: u32 = 38_000;

/// Inclusive target temperature range supported by the remote protocol.
pub const MIN_TEMP_C: u8 = 16;
pub const MAX_TEMP_C: u8 = 25;

// Frame timing, microseconds. Leader pulse, then 8 bits per byte LSB-first
// (constant mark, space length encodes the bit), then a trailing mark.
const LEADER_MARK_US: u16 = 3300;
const LEADER_SPACE_US: u16 = 1600;
const BIT_MARK_US: u16 = 420;
const ZERO_SPACE_US: u16 = 420;
const ONE_SPACE_US: u16 = 1250;
const TRAILER_MARK_US: u16 = 420;

/// Protocol header shared by every frame.
const FRAME_HEADER: [u8; 3] = [0x23, 0xcb, 0x26];

const CMD_POWER: u8 = 0x01;
const CMD_MODE: u8 = 0x02;
const CMD_TEMP: u8 = 0x03;

/// One selectable remote-control signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcSignal {
    Power(PowerState),
    Mode(AcMode),
    /// Target temperature preset, 16..=25 inclusive.
    Temp(u8),
}

impl AcSignal {
    /// Build a temperature signal from the second character of a temp
    /// command argument.
    ///
    /// The ten presets are keyed by their trailing digit: '6'..'9' select
    /// 16-19 and '0'..'5' select 20-25, so both "17" and "t7" select 17.
    pub fn temp_from_code_digit(digit: char) -> Option<Self> {
        let d = digit.to_digit(10)? as u8;
        let temp = if d >= 6 { 10 + d } else { 20 + d };
        Some(AcSignal::Temp(temp))
    }

    /// Short name used in log notices.
    pub fn name(&self) -> String {
        match self {
            AcSignal::Power(p) => format!("power_{}", p.as_str()),
            AcSignal::Mode(m) => format!("mode_{}", m.as_str()),
            AcSignal::Temp(t) => format!("temp_{t}"),
        }
    }

    /// The 6-byte command frame for this signal: header, command, argument,
    /// checksum (low byte of the sum of the first five).
    fn frame(&self) -> [u8; 6] {
        let (cmd, arg) = match self {
            AcSignal::Power(PowerState::On) => (CMD_POWER, 0x01),
            AcSignal::Power(PowerState::Off) => (CMD_POWER, 0x00),
            AcSignal::Mode(AcMode::Cooling) => (CMD_MODE, 0x01),
            AcSignal::Mode(AcMode::Super) => (CMD_MODE, 0x02),
            AcSignal::Mode(AcMode::Quiet) => (CMD_MODE, 0x03),
            AcSignal::Temp(t) => (CMD_TEMP, *t),
        };
        let mut frame = [FRAME_HEADER[0], FRAME_HEADER[1], FRAME_HEADER[2], cmd, arg, 0];
        let sum: u16 = frame[..5].iter().map(|&b| b as u16).sum();
        frame[5] = (sum & 0xff) as u8;
        frame
    }
}

/// Precomputed pulse-timing table: alternating mark/space durations in
/// microseconds, starting with a mark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulseTable {
    pulses: Vec<u16>,
}

impl PulseTable {
    fn from_frame(frame: &[u8]) -> Self {
        // leader + 2 entries per bit + trailer
        let mut pulses = Vec::with_capacity(2 + frame.len() * 16 + 1);
        pulses.push(LEADER_MARK_US);
        pulses.push(LEADER_SPACE_US);
        for &byte in frame {
            for bit in 0..8 {
                pulses.push(BIT_MARK_US);
                if byte & (1 << bit) != 0 {
                    pulses.push(ONE_SPACE_US);
                } else {
                    pulses.push(ZERO_SPACE_US);
                }
            }
        }
        pulses.push(TRAILER_MARK_US);
        Self { pulses }
    }

    pub fn pulses(&self) -> &[u16] {
        &self.pulses
    }

    pub fn len(&self) -> usize {
        self.pulses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pulses.is_empty()
    }
}

/// Lookup of precomputed pulse tables, built lazily and cached per signal.
pub struct SignalBank {
    cache: FxHashMap<AcSignal, Arc<PulseTable>>,
}

impl SignalBank {
    pub fn new() -> Self {
        Self { cache: FxHashMap::default() }
    }

    /// Fetch the pulse table for a signal, expanding its frame on first use.
    pub fn table(&mut self, signal: AcSignal) -> Arc<PulseTable> {
        self.cache
            .entry(signal)
            .or_insert_with(|| Arc::new(PulseTable::from_frame(&signal.frame())))
            .clone()
    }
}

impl Default for SignalBank {
    fn default() -> Self {
        Self::new()
    }
}
