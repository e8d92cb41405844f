use crate::constants::{BYTE_AIRTIME_US, JAN_1970, ZEP_MODE_LQI, ZEP_PREAMBLE, ZEP_TYPE_DATA, ZEP_V2};
use crate::measures::SnifferCapture;

/// ZEP v2 header length in bytes.
const ZEP_HEADER_LEN: usize = 32;

/// Builds ZEP v2 datagrams from sniffer captures.
///
/// ZEP is the Zigbee Encapsulation Protocol understood by Wireshark. Each
/// capture becomes one datagram with a monotonically increasing sequence
/// number, so the encapsulator is stateful per connection lifetime.
pub struct ZepEncapsulator {
    seqno: u32,
}

impl ZepEncapsulator {
    pub fn new() -> Self {
        ZepEncapsulator { seqno: 0 }
    }

    /// Encapsulate one capture. The first datagram carries sequence 1.
    pub fn encapsulate(&mut self, capture: &SnifferCapture) -> Vec<u8> {
        self.seqno = self.seqno.wrapping_add(1);

        // 802.15.4 frames carry a 2-byte FCS the capture strips; ZEP
        // counts it back in.
        let frame_len = capture.payload.len() as u16 + 2;
        let rx_duration_us = frame_len * BYTE_AIRTIME_US;
        let ntp_secs = capture.timestamp.secs.wrapping_add(JAN_1970);
        let ntp_frac = ((capture.timestamp.micros as u64) << 32) / 1_000_000;

        let mut datagram = Vec::with_capacity(ZEP_HEADER_LEN + capture.payload.len() + 2);
        datagram.extend_from_slice(&ZEP_PREAMBLE);
        datagram.push(ZEP_V2);
        datagram.push(ZEP_TYPE_DATA);
        datagram.push(capture.channel);
        datagram.extend_from_slice(&0u16.to_be_bytes()); // device id
        datagram.push(ZEP_MODE_LQI);
        datagram.push(capture.lqi);
        datagram.extend_from_slice(&ntp_secs.to_be_bytes());
        datagram.extend_from_slice(&(ntp_frac as u32).to_be_bytes());
        datagram.extend_from_slice(&self.seqno.to_be_bytes());
        // reserved block: rx duration, rssi, padding
        datagram.extend_from_slice(&rx_duration_us.to_be_bytes());
        datagram.push(capture.rssi as u8);
        datagram.extend_from_slice(&[0u8; 7]);
        datagram.push(frame_len as u8);
        datagram.extend_from_slice(&capture.payload);
        // placeholder FCS
        datagram.extend_from_slice(&[0xFF, 0xFF]);
        datagram
    }
}

impl Default for ZepEncapsulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;

    fn capture(payload: Vec<u8>) -> SnifferCapture {
        SnifferCapture {
            timestamp: Timestamp {
                secs: 1_000,
                micros: 500_000,
            },
            channel: 15,
            rssi: -45,
            lqi: 200,
            crc_ok: true,
            payload,
        }
    }

    #[test]
    fn header_layout() {
        let mut zep = ZepEncapsulator::new();
        let datagram = zep.encapsulate(&capture(vec![0xAA, 0xBB, 0xCC]));

        assert_eq!(&datagram[0..2], b"EX");
        assert_eq!(datagram[2], b'2');
        assert_eq!(datagram[3], 1); // data
        assert_eq!(datagram[4], 15); // channel
        assert_eq!(&datagram[5..7], &[0, 0]); // device id
        assert_eq!(datagram[7], 0); // LQI mode
        assert_eq!(datagram[8], 200); // lqi

        let ntp_secs = u32::from_be_bytes([datagram[9], datagram[10], datagram[11], datagram[12]]);
        assert_eq!(ntp_secs, 1_000 + 2_208_988_800);
        let ntp_frac =
            u32::from_be_bytes([datagram[13], datagram[14], datagram[15], datagram[16]]);
        assert_eq!(ntp_frac, 0x8000_0000); // half a second

        let seqno = u32::from_be_bytes([datagram[17], datagram[18], datagram[19], datagram[20]]);
        assert_eq!(seqno, 1);

        // reserved: rx duration for 5 on-air bytes, then rssi
        let duration = u16::from_be_bytes([datagram[21], datagram[22]]);
        assert_eq!(duration, 5 * 32);
        assert_eq!(datagram[23] as i8, -45);
        assert_eq!(&datagram[24..31], &[0u8; 7]);

        assert_eq!(datagram[31], 5); // payload + FCS
        assert_eq!(&datagram[32..35], &[0xAA, 0xBB, 0xCC]);
        assert_eq!(&datagram[35..], &[0xFF, 0xFF]);
        assert_eq!(datagram.len(), 32 + 3 + 2);
    }

    #[test]
    fn sequence_numbers_increment() {
        let mut zep = ZepEncapsulator::new();
        let c = capture(vec![0x01]);
        let first = zep.encapsulate(&c);
        let second = zep.encapsulate(&c);
        assert_eq!(first[20], 1);
        assert_eq!(second[20], 2);
    }
}
