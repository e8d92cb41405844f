//! Protocol constants
//!
//! These constants define the frame sync byte, command types, asynchronous
//! frame types, and the configuration code tables used by the control node
//! serial protocol.

// ============================================================================
// Framing
// ============================================================================

/// Sync byte preceding every frame in both directions.
pub const SYNC_BYTE: u8 = 0x80;
/// Maximum payload length of a frame (the length field is one byte).
pub const MAX_PAYLOAD_SIZE: usize = 255;
/// Mask selecting asynchronous measurement/event frames: a type byte whose
/// top nibble is all ones is unsolicited; anything else answers a command.
pub const ASYNC_FRAME_MASK: u8 = 0xF0;

// ============================================================================
// Command Types (gateway → control node)
// ============================================================================

/// Power up the open node.
pub const OPEN_NODE_START: u8 = 0x70;
/// Power down the open node.
pub const OPEN_NODE_STOP: u8 = 0x71;
/// Set the control node clock from gateway wall-clock time.
pub const SET_TIME: u8 = 0x72;
/// Set the open node identifier (architecture + number).
pub const SET_NODE_ID: u8 = 0x73;
/// Stop all radio measures.
pub const CONFIG_RADIO_STOP: u8 = 0x74;
/// Configure RSSI polling on a channel set.
pub const CONFIG_RADIO_MEAS: u8 = 0x75;
/// Query whether a PPS pulse was seen.
pub const TEST_GOT_PPS: u8 = 0x76;
/// Configure radio sniffer capture on a channel set.
pub const CONFIG_RADIO_SNIFFER: u8 = 0x77;
/// Configure consumption measures (INA226).
pub const CONFIG_CONSUMPTION: u8 = 0x79;
/// Blink the green LED.
pub const GREEN_LED_BLINK: u8 = 0x7A;
/// Force the green LED on.
pub const GREEN_LED_ON: u8 = 0x7B;
/// Radio ping-pong hardware test.
pub const TEST_RADIO_PING_PONG: u8 = 0x7C;
/// GPIO loopback hardware test.
pub const TEST_GPIO: u8 = 0x7D;
/// I2C loopback hardware test.
pub const TEST_I2C: u8 = 0x7E;
/// PPS input hardware test.
pub const TEST_PPS: u8 = 0x7F;

// ============================================================================
// Asynchronous Frame Types (control node → gateway, unsolicited)
// ============================================================================

/// Configuration acknowledgement carrying a config echo.
pub const ACK_FRAME: u8 = 0xFA;
/// Radio sniffer capture frame.
pub const RADIO_SNIFFER_FRAME: u8 = 0xFD;
/// Radio RSSI polling measure frame.
pub const RADIO_MEAS_FRAME: u8 = 0xFE;
/// Consumption measure frame.
pub const CONSUMPTION_FRAME: u8 = 0xFF;

// ============================================================================
// Answer-path Frame Types (control node → gateway, command-correlated)
// ============================================================================

/// Firmware logger frame; second byte is a signed error code.
pub const LOGGER_FRAME: u8 = 0xEE;
/// Acknowledgement value.
pub const ACK: u8 = 0x0A;
/// Negative acknowledgement value.
pub const NACK: u8 = 0x02;

// ============================================================================
// Power Supply (alim) Codes
// ============================================================================

/// Open node powered from battery.
pub const ALIM_BATTERY: u8 = 0x0;
/// Open node powered from DC.
pub const ALIM_DC: u8 = 0x1;
/// Open node powered from DC while charging the battery.
pub const ALIM_DC_CHARGE: u8 = 0x2;

// ============================================================================
// Consumption Configuration Byte
// ============================================================================

/// Measure power (watts channel present in records).
pub const MEASURE_POWER: u8 = 1 << 0;
/// Measure voltage.
pub const MEASURE_VOLTAGE: u8 = 1 << 1;
/// Measure current.
pub const MEASURE_CURRENT: u8 = 1 << 2;
/// Source under measure: 3.3V rail.
pub const PW_SRC_3_3V: u8 = 1 << 4;
/// Source under measure: 5V supply.
pub const PW_SRC_5V: u8 = 1 << 5;
/// Source under measure: battery.
pub const PW_SRC_BATT: u8 = 1 << 6;

/// Consumption command state byte: start measuring.
pub const CONSUMPTION_START: u8 = 0x80;
/// Consumption command state byte: stop measuring.
pub const CONSUMPTION_STOP: u8 = 0x00;

// ============================================================================
// Test Command State Byte
// ============================================================================

/// Start a hardware test.
pub const TEST_START: u8 = 0x01;
/// Stop a hardware test.
pub const TEST_STOP: u8 = 0x00;

// ============================================================================
// Radio Channels
// ============================================================================

/// Lowest valid IEEE 802.15.4 channel.
pub const CHANNEL_MIN: u8 = 11;
/// Highest valid IEEE 802.15.4 channel.
pub const CHANNEL_MAX: u8 = 26;

// ============================================================================
// Measurement Envelope
// ============================================================================

/// Bytes of a measure frame before the samples: type byte, sample count,
/// and the shared seconds reference.
pub const MEASURE_HEADER_LEN: usize = 2 + 4;
/// Per-sample microsecond offset width.
pub const SAMPLE_TIME_LEN: usize = 4;
/// Fixed record width of a radio polling sample (channel + rssi).
pub const RADIO_RECORD_LEN: usize = 2;

// ============================================================================
// ZEP / NTP
// ============================================================================

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970).
pub const JAN_1970: u32 = 2_208_988_800;
/// ZEP v2 preamble bytes.
pub const ZEP_PREAMBLE: [u8; 2] = [b'E', b'X'];
/// ZEP version byte.
pub const ZEP_V2: u8 = b'2';
/// ZEP packet type: data.
pub const ZEP_TYPE_DATA: u8 = 1;
/// ZEP LQI/CRC mode byte: the LQI field carries link quality.
pub const ZEP_MODE_LQI: u8 = 0;
/// Airtime of one byte at 250 kbit/s (802.15.4, 2.4 GHz), in microseconds.
pub const BYTE_AIRTIME_US: u16 = 32;
