use std::fmt;
use std::str::FromStr;

use crate::constants::*;
use crate::error::ProtocolError;

/// Power supply selection for the open node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerSupply {
    /// Powered from battery
    Battery,
    /// Powered from DC
    Dc,
    /// Powered from DC, charging the battery
    DcCharge,
}

impl PowerSupply {
    /// Wire code of this supply.
    pub fn code(&self) -> u8 {
        match self {
            PowerSupply::Battery => ALIM_BATTERY,
            PowerSupply::Dc => ALIM_DC,
            PowerSupply::DcCharge => ALIM_DC_CHARGE,
        }
    }
}

impl FromStr for PowerSupply {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "battery" => Ok(PowerSupply::Battery),
            "dc" => Ok(PowerSupply::Dc),
            "dc_charge" => Ok(PowerSupply::DcCharge),
            other => Err(ProtocolError::InvalidArgument {
                command: "start/stop".to_string(),
                reason: format!("unknown power supply '{}'", other),
            }),
        }
    }
}

/// Open node architecture for `set_node_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeArchi {
    /// M3 open node
    M3,
    /// A8 open node
    A8,
}

impl NodeArchi {
    /// Wire code placed in the top nibble of the node id word.
    pub fn code(&self) -> u16 {
        match self {
            NodeArchi::M3 => 0x1,
            NodeArchi::A8 => 0x2,
        }
    }
}

impl FromStr for NodeArchi {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "m3" => Ok(NodeArchi::M3),
            "a8" => Ok(NodeArchi::A8),
            other => Err(ProtocolError::InvalidArgument {
                command: "set_node_id".to_string(),
                reason: format!("unknown architecture '{}'", other),
            }),
        }
    }
}

/// Power source measured by the INA226 for consumption measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerSource {
    /// 3.3V rail
    V3_3,
    /// 5V supply
    V5,
    /// Battery
    Batt,
}

impl PowerSource {
    /// Bit of this source in the consumption configuration byte.
    pub fn bit(&self) -> u8 {
        match self {
            PowerSource::V3_3 => PW_SRC_3_3V,
            PowerSource::V5 => PW_SRC_5V,
            PowerSource::Batt => PW_SRC_BATT,
        }
    }
}

impl FromStr for PowerSource {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "3.3V" => Ok(PowerSource::V3_3),
            "5V" => Ok(PowerSource::V5),
            "BATT" => Ok(PowerSource::Batt),
            other => Err(ProtocolError::InvalidArgument {
                command: "config_consumption_measure".to_string(),
                reason: format!("unknown power source '{}'", other),
            }),
        }
    }
}

/// INA226 conversion period per channel, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplePeriod {
    Us140,
    Us204,
    Us332,
    Us588,
    Us1100,
    Us2116,
    Us4156,
    Us8244,
}

impl SamplePeriod {
    /// Wire code, low nibble of the timing byte.
    pub fn code(&self) -> u8 {
        match self {
            SamplePeriod::Us140 => 0,
            SamplePeriod::Us204 => 1,
            SamplePeriod::Us332 => 2,
            SamplePeriod::Us588 => 3,
            SamplePeriod::Us1100 => 4,
            SamplePeriod::Us2116 => 5,
            SamplePeriod::Us4156 => 6,
            SamplePeriod::Us8244 => 7,
        }
    }
}

impl FromStr for SamplePeriod {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "140" => Ok(SamplePeriod::Us140),
            "204" => Ok(SamplePeriod::Us204),
            "332" => Ok(SamplePeriod::Us332),
            "588" => Ok(SamplePeriod::Us588),
            "1100" => Ok(SamplePeriod::Us1100),
            "2116" => Ok(SamplePeriod::Us2116),
            "4156" => Ok(SamplePeriod::Us4156),
            "8244" => Ok(SamplePeriod::Us8244),
            other => Err(ProtocolError::InvalidArgument {
                command: "config_consumption_measure".to_string(),
                reason: format!("unknown period '{}'", other),
            }),
        }
    }
}

/// Number of hardware samples averaged per reported value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleAverage {
    X1,
    X4,
    X16,
    X64,
    X128,
    X256,
    X512,
    X1024,
}

impl SampleAverage {
    /// Wire code, shifted into the high nibble of the timing byte.
    pub fn code(&self) -> u8 {
        match self {
            SampleAverage::X1 => 0,
            SampleAverage::X4 => 1,
            SampleAverage::X16 => 2,
            SampleAverage::X64 => 3,
            SampleAverage::X128 => 4,
            SampleAverage::X256 => 5,
            SampleAverage::X512 => 6,
            SampleAverage::X1024 => 7,
        }
    }
}

impl FromStr for SampleAverage {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" => Ok(SampleAverage::X1),
            "4" => Ok(SampleAverage::X4),
            "16" => Ok(SampleAverage::X16),
            "64" => Ok(SampleAverage::X64),
            "128" => Ok(SampleAverage::X128),
            "256" => Ok(SampleAverage::X256),
            "512" => Ok(SampleAverage::X512),
            "1024" => Ok(SampleAverage::X1024),
            other => Err(ProtocolError::InvalidArgument {
                command: "config_consumption_measure".to_string(),
                reason: format!("unknown average '{}'", other),
            }),
        }
    }
}

/// Radio transmit power for the ping-pong test.
///
/// The firmware exposes sixteen discrete levels; the text form is the dBm
/// value with one decimal, exactly as printed on the radio datasheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxPower(u8);

const TX_POWER_TABLE: [(&str, u8); 16] = [
    ("3.0", 0x0),
    ("2.8", 0x1),
    ("2.3", 0x2),
    ("1.8", 0x3),
    ("1.3", 0x4),
    ("0.7", 0x5),
    ("0.0", 0x6),
    ("-1.0", 0x7),
    ("-2.0", 0x8),
    ("-3.0", 0x9),
    ("-4.0", 0xA),
    ("-5.0", 0xB),
    ("-7.0", 0xC),
    ("-9.0", 0xD),
    ("-12.0", 0xE),
    ("-17.0", 0xF),
];

impl TxPower {
    /// Wire code of this power level.
    pub fn code(&self) -> u8 {
        self.0
    }
}

impl FromStr for TxPower {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TX_POWER_TABLE
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, code)| TxPower(*code))
            .ok_or_else(|| ProtocolError::InvalidArgument {
                command: "test_radio_ping_pong".to_string(),
                reason: format!("unknown tx power '{}'", s),
            })
    }
}

/// Set of radio channels encoded as a 32-bit bitmap, bit N for channel N.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSet {
    bitmap: u32,
    count: u8,
}

impl ChannelSet {
    /// Parse a comma-separated channel list, e.g. `11,15,26`.
    ///
    /// Every channel must be in the 802.15.4 range 11..=26. Duplicates
    /// collapse into the bitmap.
    pub fn parse(list: &str, command: &str) -> Result<Self, ProtocolError> {
        let mut bitmap = 0u32;
        for part in list.split(',') {
            let channel: u8 =
                part.parse()
                    .map_err(|_| ProtocolError::InvalidArgument {
                        command: command.to_string(),
                        reason: format!("invalid channel '{}'", part),
                    })?;
            if !(CHANNEL_MIN..=CHANNEL_MAX).contains(&channel) {
                return Err(ProtocolError::InvalidArgument {
                    command: command.to_string(),
                    reason: format!("channel {} out of range 11..=26", channel),
                });
            }
            bitmap |= 1 << channel;
        }
        Ok(ChannelSet {
            bitmap,
            count: bitmap.count_ones() as u8,
        })
    }

    /// Bitmap sent on the wire, little-endian.
    pub fn bitmap(&self) -> u32 {
        self.bitmap
    }

    /// Number of distinct channels in the set.
    pub fn len(&self) -> u8 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Measure timestamp: shared seconds reference plus a normalized
/// microsecond part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub secs: u32,
    pub micros: u32,
}

impl Timestamp {
    /// Combine a frame's seconds reference with a sample's microsecond
    /// offset, carrying whole seconds out of the offset.
    ///
    /// Both values come off the wire; the seconds carry wraps modulo u32.
    pub fn from_ref_and_offset(ref_secs: u32, offset_micros: u32) -> Self {
        Timestamp {
            secs: ref_secs.wrapping_add(offset_micros / 1_000_000),
            micros: offset_micros % 1_000_000,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.secs, self.micros)
    }
}
