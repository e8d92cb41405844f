//! Measure frame decoding
//!
//! Unsolicited frames from the control node carry consumption measures,
//! radio RSSI measures, sniffer captures, and configuration
//! acknowledgements. Consumption records have no self-describing layout:
//! their width follows from the last acknowledged consumption
//! configuration, so decoding is stateful and owned by [`MeasureDecoder`].

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::constants::*;
use crate::error::ProtocolError;
use crate::types::{PowerSource, Timestamp};

// ============================================================================
// Time Reference
// ============================================================================

/// Shared reference instant for measuring the `set_time` round trip.
///
/// The writer thread arms it when the command leaves, the reader thread
/// takes it when the acknowledgement arrives. Arming twice overwrites.
#[derive(Clone, Default)]
pub struct SharedTimeRef {
    inner: Arc<Mutex<Option<Instant>>>,
}

impl SharedTimeRef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record now as the reference instant.
    pub fn arm(&self) {
        *self.inner.lock() = Some(Instant::now());
    }

    /// Take the reference and return the time elapsed since it was armed.
    pub fn take_elapsed(&self) -> Option<Duration> {
        self.inner.lock().take().map(|armed| armed.elapsed())
    }
}

// ============================================================================
// Consumption Configuration
// ============================================================================

/// Active consumption measure configuration, rebuilt from each
/// consumption acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumptionConfig {
    /// Power source under measure
    pub source: Option<PowerSource>,
    /// Power values present in records
    pub power: bool,
    /// Voltage values present in records
    pub voltage: bool,
    /// Current values present in records
    pub current: bool,
}

impl ConsumptionConfig {
    /// Rebuild the configuration from the acknowledged config byte.
    ///
    /// A zero byte means measuring stopped and clears the configuration.
    pub fn from_config_byte(byte: u8) -> Option<Self> {
        if byte == 0 {
            return None;
        }
        let source = if byte & PW_SRC_3_3V != 0 {
            Some(PowerSource::V3_3)
        } else if byte & PW_SRC_5V != 0 {
            Some(PowerSource::V5)
        } else if byte & PW_SRC_BATT != 0 {
            Some(PowerSource::Batt)
        } else {
            None
        };
        Some(ConsumptionConfig {
            source,
            power: byte & MEASURE_POWER != 0,
            voltage: byte & MEASURE_VOLTAGE != 0,
            current: byte & MEASURE_CURRENT != 0,
        })
    }

    /// Width in bytes of the value part of one record.
    pub fn values_len(&self) -> usize {
        4 * (self.power as usize + self.voltage as usize + self.current as usize)
    }
}

// ============================================================================
// Decoded Measures
// ============================================================================

/// One consumption record. Disabled values decode to `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsumptionSample {
    pub timestamp: Timestamp,
    pub power: Option<f32>,
    pub voltage: Option<f32>,
    pub current: Option<f32>,
}

/// One radio RSSI polling record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioSample {
    pub timestamp: Timestamp,
    pub channel: u8,
    pub rssi: i8,
}

/// One captured radio packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnifferCapture {
    pub timestamp: Timestamp,
    pub channel: u8,
    pub rssi: i8,
    pub lqi: u8,
    pub crc_ok: bool,
    pub payload: Vec<u8>,
}

/// Acknowledged configuration change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAck {
    /// Clock set; carries the command round-trip time
    SetTime { rtt: Duration },
    Consumption,
    RadioStop,
    RadioMeasure,
    RadioSniffer,
}

impl fmt::Display for ConfigAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigAck::SetTime { rtt } => write!(
                f,
                "config_ack set_time {}.{:06}",
                rtt.as_secs(),
                rtt.subsec_micros()
            ),
            ConfigAck::Consumption => write!(f, "config_ack config_consumption_measure"),
            ConfigAck::RadioStop => write!(f, "config_ack config_radio_stop"),
            ConfigAck::RadioMeasure => write!(f, "config_ack config_radio_measure"),
            ConfigAck::RadioSniffer => write!(f, "config_ack config_radio_sniffer"),
        }
    }
}

/// A decoded unsolicited frame.
#[derive(Debug, Clone, PartialEq)]
pub enum MeasureEvent {
    ConfigAck(ConfigAck),
    Consumption(Vec<ConsumptionSample>),
    Radio(Vec<RadioSample>),
    Sniffer(SnifferCapture),
}

// ============================================================================
// Decoder
// ============================================================================

/// Stateful decoder for unsolicited frames.
///
/// A frame either decodes completely or is rejected whole; a length
/// mismatch never yields partial samples.
pub struct MeasureDecoder {
    time_ref: SharedTimeRef,
    consumption: Option<ConsumptionConfig>,
}

impl MeasureDecoder {
    pub fn new(time_ref: SharedTimeRef) -> Self {
        MeasureDecoder {
            time_ref,
            consumption: None,
        }
    }

    /// Currently acknowledged consumption configuration.
    pub fn consumption_config(&self) -> Option<&ConsumptionConfig> {
        self.consumption.as_ref()
    }

    /// Decode an unsolicited frame (type + payload, framing stripped).
    pub fn decode(&mut self, frame: &[u8]) -> Result<MeasureEvent, ProtocolError> {
        if frame.is_empty() {
            return Err(ProtocolError::FrameTooShort {
                expected: 1,
                actual: 0,
            });
        }
        match frame[0] {
            ACK_FRAME => self.decode_config_ack(frame),
            CONSUMPTION_FRAME => self.decode_consumption(frame),
            RADIO_MEAS_FRAME => Self::decode_radio(frame),
            RADIO_SNIFFER_FRAME => Self::decode_sniffer(frame),
            other => Err(ProtocolError::UnknownFrameType(other)),
        }
    }

    fn decode_config_ack(&mut self, frame: &[u8]) -> Result<MeasureEvent, ProtocolError> {
        if frame.len() < 2 {
            return Err(ProtocolError::FrameTooShort {
                expected: 2,
                actual: frame.len(),
            });
        }
        let ack = match frame[1] {
            SET_TIME => {
                let rtt = self.time_ref.take_elapsed().unwrap_or_default();
                ConfigAck::SetTime { rtt }
            }
            CONFIG_CONSUMPTION => {
                if frame.len() < 3 {
                    return Err(ProtocolError::FrameTooShort {
                        expected: 3,
                        actual: frame.len(),
                    });
                }
                self.consumption = ConsumptionConfig::from_config_byte(frame[2]);
                ConfigAck::Consumption
            }
            CONFIG_RADIO_STOP => ConfigAck::RadioStop,
            CONFIG_RADIO_MEAS => ConfigAck::RadioMeasure,
            CONFIG_RADIO_SNIFFER => ConfigAck::RadioSniffer,
            other => return Err(ProtocolError::UnknownAck(other)),
        };
        Ok(MeasureEvent::ConfigAck(ack))
    }

    fn decode_consumption(&self, frame: &[u8]) -> Result<MeasureEvent, ProtocolError> {
        let config = self.consumption.ok_or(ProtocolError::NotConfigured)?;

        if frame.len() < MEASURE_HEADER_LEN {
            return Err(ProtocolError::FrameTooShort {
                expected: MEASURE_HEADER_LEN,
                actual: frame.len(),
            });
        }
        let count = frame[1] as usize;
        let expected = MEASURE_HEADER_LEN + count * (SAMPLE_TIME_LEN + config.values_len());
        if frame.len() != expected {
            return Err(ProtocolError::FrameLengthMismatch {
                kind: "consumption",
                expected,
                actual: frame.len(),
            });
        }

        let ref_secs = u32::from_le_bytes([frame[2], frame[3], frame[4], frame[5]]);
        let mut samples = Vec::with_capacity(count);
        let mut offset = MEASURE_HEADER_LEN;
        for _ in 0..count {
            let offset_micros = read_u32(frame, &mut offset);
            let timestamp = Timestamp::from_ref_and_offset(ref_secs, offset_micros);
            let power = config.power.then(|| read_f32(frame, &mut offset));
            let voltage = config.voltage.then(|| read_f32(frame, &mut offset));
            let current = config.current.then(|| read_f32(frame, &mut offset));
            samples.push(ConsumptionSample {
                timestamp,
                power,
                voltage,
                current,
            });
        }
        Ok(MeasureEvent::Consumption(samples))
    }

    fn decode_radio(frame: &[u8]) -> Result<MeasureEvent, ProtocolError> {
        if frame.len() < MEASURE_HEADER_LEN {
            return Err(ProtocolError::FrameTooShort {
                expected: MEASURE_HEADER_LEN,
                actual: frame.len(),
            });
        }
        let count = frame[1] as usize;
        let expected = MEASURE_HEADER_LEN + count * (SAMPLE_TIME_LEN + RADIO_RECORD_LEN);
        if frame.len() != expected {
            return Err(ProtocolError::FrameLengthMismatch {
                kind: "radio",
                expected,
                actual: frame.len(),
            });
        }

        let ref_secs = u32::from_le_bytes([frame[2], frame[3], frame[4], frame[5]]);
        let mut samples = Vec::with_capacity(count);
        let mut offset = MEASURE_HEADER_LEN;
        for _ in 0..count {
            let offset_micros = read_u32(frame, &mut offset);
            let channel = frame[offset];
            let rssi = frame[offset + 1] as i8;
            offset += RADIO_RECORD_LEN;
            samples.push(RadioSample {
                timestamp: Timestamp::from_ref_and_offset(ref_secs, offset_micros),
                channel,
                rssi,
            });
        }
        Ok(MeasureEvent::Radio(samples))
    }

    fn decode_sniffer(frame: &[u8]) -> Result<MeasureEvent, ProtocolError> {
        // type + timeval + channel + rssi + lqi + crc_ok + payload length
        const HEADER: usize = 1 + 8 + 4 + 1;
        if frame.len() < HEADER {
            return Err(ProtocolError::FrameTooShort {
                expected: HEADER,
                actual: frame.len(),
            });
        }
        let secs = u32::from_le_bytes([frame[1], frame[2], frame[3], frame[4]]);
        let micros = u32::from_le_bytes([frame[5], frame[6], frame[7], frame[8]]);
        let channel = frame[9];
        let rssi = frame[10] as i8;
        let lqi = frame[11];
        let crc_ok = frame[12] != 0;
        let payload_len = frame[13] as usize;

        let expected = HEADER + payload_len;
        if frame.len() != expected {
            return Err(ProtocolError::FrameLengthMismatch {
                kind: "sniffer",
                expected,
                actual: frame.len(),
            });
        }

        Ok(MeasureEvent::Sniffer(SnifferCapture {
            timestamp: Timestamp::from_ref_and_offset(secs, micros),
            channel,
            rssi,
            lqi,
            crc_ok,
            payload: frame[HEADER..].to_vec(),
        }))
    }
}

fn read_u32(frame: &[u8], offset: &mut usize) -> u32 {
    let value = u32::from_le_bytes([
        frame[*offset],
        frame[*offset + 1],
        frame[*offset + 2],
        frame[*offset + 3],
    ]);
    *offset += 4;
    value
}

fn read_f32(frame: &[u8], offset: &mut usize) -> f32 {
    let value = f32::from_le_bytes([
        frame[*offset],
        frame[*offset + 1],
        frame[*offset + 2],
        frame[*offset + 3],
    ]);
    *offset += 4;
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder() -> MeasureDecoder {
        MeasureDecoder::new(SharedTimeRef::new())
    }

    fn consumption_frame(count: u8, ref_secs: u32, records: &[(u32, &[f32])]) -> Vec<u8> {
        let mut frame = vec![CONSUMPTION_FRAME, count];
        frame.extend_from_slice(&ref_secs.to_le_bytes());
        for (offset_us, values) in records {
            frame.extend_from_slice(&offset_us.to_le_bytes());
            for v in *values {
                frame.extend_from_slice(&v.to_le_bytes());
            }
        }
        frame
    }

    #[test]
    fn time_ref_is_take_once() {
        let time_ref = SharedTimeRef::new();
        assert!(time_ref.take_elapsed().is_none());
        time_ref.arm();
        assert!(time_ref.take_elapsed().is_some());
        assert!(time_ref.take_elapsed().is_none());
    }

    #[test]
    fn consumption_before_config_is_an_error() {
        let mut dec = decoder();
        let frame = consumption_frame(1, 100, &[(500, &[1.0])]);
        assert_eq!(dec.decode(&frame), Err(ProtocolError::NotConfigured));
    }

    #[test]
    fn config_ack_enables_consumption_decode() {
        let mut dec = decoder();
        // 3.3V source, all three values
        let config = PW_SRC_3_3V | MEASURE_POWER | MEASURE_VOLTAGE | MEASURE_CURRENT;
        let event = dec.decode(&[ACK_FRAME, CONFIG_CONSUMPTION, config]).unwrap();
        assert_eq!(event, MeasureEvent::ConfigAck(ConfigAck::Consumption));

        let frame = consumption_frame(
            2,
            1000,
            &[(250, &[0.5, 3.3, 0.15]), (750, &[0.6, 3.29, 0.18])],
        );
        let event = dec.decode(&frame).unwrap();
        match event {
            MeasureEvent::Consumption(samples) => {
                assert_eq!(samples.len(), 2);
                assert_eq!(samples[0].timestamp.to_string(), "1000.000250");
                assert_eq!(samples[0].power, Some(0.5));
                assert_eq!(samples[0].voltage, Some(3.3));
                assert_eq!(samples[0].current, Some(0.15));
                assert_eq!(samples[1].timestamp.to_string(), "1000.000750");
            }
            other => panic!("expected consumption, got {:?}", other),
        }
    }

    #[test]
    fn disabled_values_decode_to_none() {
        let mut dec = decoder();
        let config = PW_SRC_BATT | MEASURE_VOLTAGE;
        dec.decode(&[ACK_FRAME, CONFIG_CONSUMPTION, config]).unwrap();

        let frame = consumption_frame(1, 42, &[(10, &[3.31])]);
        match dec.decode(&frame).unwrap() {
            MeasureEvent::Consumption(samples) => {
                assert_eq!(samples[0].power, None);
                assert_eq!(samples[0].voltage, Some(3.31));
                assert_eq!(samples[0].current, None);
            }
            other => panic!("expected consumption, got {:?}", other),
        }
    }

    #[test]
    fn time_reference_at_u32_max_wraps_the_carry() {
        let mut dec = decoder();
        let config = PW_SRC_3_3V | MEASURE_POWER | MEASURE_VOLTAGE | MEASURE_CURRENT;
        dec.decode(&[ACK_FRAME, CONFIG_CONSUMPTION, config]).unwrap();

        let frame = consumption_frame(1, u32::MAX, &[(1_500_000, &[0.5, 3.3, 0.15])]);
        match dec.decode(&frame).unwrap() {
            MeasureEvent::Consumption(samples) => {
                assert_eq!(samples[0].timestamp.to_string(), "0.500000");
                assert_eq!(samples[0].power, Some(0.5));
            }
            other => panic!("expected consumption, got {:?}", other),
        }
    }

    #[test]
    fn length_mismatch_rejects_whole_frame() {
        let mut dec = decoder();
        let config = PW_SRC_3_3V | MEASURE_POWER;
        dec.decode(&[ACK_FRAME, CONFIG_CONSUMPTION, config]).unwrap();

        // claims two records but carries one
        let mut frame = consumption_frame(2, 100, &[(500, &[1.0])]);
        assert!(matches!(
            dec.decode(&frame),
            Err(ProtocolError::FrameLengthMismatch {
                kind: "consumption",
                expected: 22,
                actual: 14,
            })
        ));

        // one trailing byte too many
        frame = consumption_frame(1, 100, &[(500, &[1.0])]);
        frame.push(0x00);
        assert!(matches!(
            dec.decode(&frame),
            Err(ProtocolError::FrameLengthMismatch { .. })
        ));
    }

    #[test]
    fn config_is_rebuilt_atomically() {
        let mut dec = decoder();
        dec.decode(&[ACK_FRAME, CONFIG_CONSUMPTION, PW_SRC_3_3V | MEASURE_POWER])
            .unwrap();
        let power_only = consumption_frame(1, 7, &[(0, &[1.5])]);
        assert!(dec.decode(&power_only).is_ok());

        // new ack widens the record; the old frame size no longer fits
        dec.decode(&[
            ACK_FRAME,
            CONFIG_CONSUMPTION,
            PW_SRC_3_3V | MEASURE_POWER | MEASURE_VOLTAGE | MEASURE_CURRENT,
        ])
        .unwrap();
        assert!(matches!(
            dec.decode(&power_only),
            Err(ProtocolError::FrameLengthMismatch { .. })
        ));
    }

    #[test]
    fn stop_ack_clears_the_config() {
        let mut dec = decoder();
        dec.decode(&[ACK_FRAME, CONFIG_CONSUMPTION, PW_SRC_5V | MEASURE_POWER])
            .unwrap();
        assert!(dec.consumption_config().is_some());

        dec.decode(&[ACK_FRAME, CONFIG_CONSUMPTION, 0x00]).unwrap();
        assert!(dec.consumption_config().is_none());

        let frame = consumption_frame(1, 7, &[(0, &[1.5])]);
        assert_eq!(dec.decode(&frame), Err(ProtocolError::NotConfigured));
    }

    #[test]
    fn microsecond_overflow_carries_into_seconds() {
        let mut dec = decoder();
        dec.decode(&[ACK_FRAME, CONFIG_CONSUMPTION, PW_SRC_3_3V | MEASURE_POWER])
            .unwrap();
        let frame = consumption_frame(1, 100, &[(2_500_000, &[1.0])]);
        match dec.decode(&frame).unwrap() {
            MeasureEvent::Consumption(samples) => {
                assert_eq!(samples[0].timestamp.secs, 102);
                assert_eq!(samples[0].timestamp.micros, 500_000);
            }
            other => panic!("expected consumption, got {:?}", other),
        }
    }

    #[test]
    fn radio_frame_decodes_channel_and_rssi() {
        let mut dec = decoder();
        let mut frame = vec![RADIO_MEAS_FRAME, 2];
        frame.extend_from_slice(&500u32.to_le_bytes());
        frame.extend_from_slice(&100u32.to_le_bytes());
        frame.push(11);
        frame.push(0xC5); // -59 dBm
        frame.extend_from_slice(&200u32.to_le_bytes());
        frame.push(26);
        frame.push(0x9C); // -100 dBm

        match dec.decode(&frame).unwrap() {
            MeasureEvent::Radio(samples) => {
                assert_eq!(samples.len(), 2);
                assert_eq!(samples[0].channel, 11);
                assert_eq!(samples[0].rssi, -59);
                assert_eq!(samples[0].timestamp.to_string(), "500.000100");
                assert_eq!(samples[1].channel, 26);
                assert_eq!(samples[1].rssi, -100);
            }
            other => panic!("expected radio, got {:?}", other),
        }

        // radio frames need no prior configuration
        frame[1] = 3;
        assert!(matches!(
            dec.decode(&frame),
            Err(ProtocolError::FrameLengthMismatch { kind: "radio", .. })
        ));
    }

    #[test]
    fn sniffer_frame_decodes_exactly() {
        let mut dec = decoder();
        let payload = [0xDE, 0xAD, 0xBE, 0xEF];
        let mut frame = vec![RADIO_SNIFFER_FRAME];
        frame.extend_from_slice(&1234u32.to_le_bytes());
        frame.extend_from_slice(&56789u32.to_le_bytes());
        frame.push(15); // channel
        frame.push(0xD3); // rssi -45
        frame.push(200); // lqi
        frame.push(1); // crc ok
        frame.push(payload.len() as u8);
        frame.extend_from_slice(&payload);

        match dec.decode(&frame).unwrap() {
            MeasureEvent::Sniffer(capture) => {
                assert_eq!(capture.timestamp.to_string(), "1234.056789");
                assert_eq!(capture.channel, 15);
                assert_eq!(capture.rssi, -45);
                assert_eq!(capture.lqi, 200);
                assert!(capture.crc_ok);
                assert_eq!(capture.payload, payload);
            }
            other => panic!("expected sniffer, got {:?}", other),
        }

        // truncated payload
        frame.pop();
        assert!(matches!(
            dec.decode(&frame),
            Err(ProtocolError::FrameLengthMismatch { kind: "sniffer", .. })
        ));
    }

    #[test]
    fn set_time_ack_consumes_the_reference() {
        let time_ref = SharedTimeRef::new();
        let mut dec = MeasureDecoder::new(time_ref.clone());
        time_ref.arm();

        match dec.decode(&[ACK_FRAME, SET_TIME, 0x00]).unwrap() {
            MeasureEvent::ConfigAck(ConfigAck::SetTime { .. }) => {}
            other => panic!("expected set_time ack, got {:?}", other),
        }
        assert!(time_ref.take_elapsed().is_none());
    }

    #[test]
    fn radio_config_acks_decode() {
        let mut dec = decoder();
        assert_eq!(
            dec.decode(&[ACK_FRAME, CONFIG_RADIO_STOP, 0x00]).unwrap(),
            MeasureEvent::ConfigAck(ConfigAck::RadioStop)
        );
        assert_eq!(
            dec.decode(&[ACK_FRAME, CONFIG_RADIO_MEAS, 0x00]).unwrap(),
            MeasureEvent::ConfigAck(ConfigAck::RadioMeasure)
        );
        assert_eq!(
            dec.decode(&[ACK_FRAME, CONFIG_RADIO_SNIFFER, 0x00]).unwrap(),
            MeasureEvent::ConfigAck(ConfigAck::RadioSniffer)
        );

        // acks repeat on firmware retry without changing decoder state
        assert_eq!(
            dec.decode(&[ACK_FRAME, CONFIG_RADIO_SNIFFER, 0x00]).unwrap(),
            MeasureEvent::ConfigAck(ConfigAck::RadioSniffer)
        );
        assert!(dec.consumption_config().is_none());
    }

    #[test]
    fn unknown_acks_and_frames_are_errors() {
        let mut dec = decoder();
        assert_eq!(
            dec.decode(&[ACK_FRAME, 0x42, 0x00]),
            Err(ProtocolError::UnknownAck(0x42))
        );
        assert_eq!(
            dec.decode(&[0xFB, 0x00]),
            Err(ProtocolError::UnknownFrameType(0xFB))
        );
    }

    #[test]
    fn config_ack_display() {
        assert_eq!(
            ConfigAck::SetTime {
                rtt: Duration::from_micros(1_200_042)
            }
            .to_string(),
            "config_ack set_time 1.200042"
        );
        assert_eq!(
            ConfigAck::Consumption.to_string(),
            "config_ack config_consumption_measure"
        );
        assert_eq!(
            ConfigAck::RadioSniffer.to_string(),
            "config_ack config_radio_sniffer"
        );
    }
}
