//! Frame dispatch.
//!
//! Feeds serial bytes through the framer and routes each recovered frame:
//! answer frames are printed on stdout for the controlling process,
//! measure frames become telemetry samples, and sniffer captures are
//! additionally re-encapsulated for the rebroadcast server.

use std::sync::Arc;

use metrics::counter;
use tracing::{trace, warn};

use cngate_protocol::{
    is_async_frame, Answer, FirmwareError, FrameCodec, MeasureDecoder, MeasureEvent,
    SharedTimeRef, SnifferCapture, ZepEncapsulator,
};
use cngate_telemetry::counters::{
    FRAMES_DECODED, FRAMES_INVALID, SAMPLES_EMITTED, SNIFFER_DROPPED,
};
use cngate_telemetry::TelemetrySink;

use crate::sniffer_server::SnifferServer;

/// Routes decoded frames to stdout, the telemetry sink, and the sniffer
/// server.
pub struct Dispatcher {
    codec: FrameCodec,
    decoder: MeasureDecoder,
    zep: ZepEncapsulator,
    sink: Arc<dyn TelemetrySink>,
    sniffer: Option<SnifferServer>,
}

impl Dispatcher {
    pub fn new(
        time_ref: SharedTimeRef,
        sink: Arc<dyn TelemetrySink>,
        sniffer: Option<SnifferServer>,
    ) -> Dispatcher {
        Dispatcher {
            codec: FrameCodec::new(),
            decoder: MeasureDecoder::new(time_ref),
            zep: ZepEncapsulator::new(),
            sink,
            sniffer,
        }
    }

    /// Feed raw serial bytes and process every frame they complete.
    pub fn ingest(&mut self, bytes: &[u8]) {
        self.codec.push(bytes);
        while let Some(frame) = self.codec.decode() {
            self.handle_frame(&frame);
        }
    }

    fn handle_frame(&mut self, frame: &[u8]) {
        let Some(&kind) = frame.first() else {
            counter!(FRAMES_INVALID, "kind" => "empty").increment(1);
            warn!("empty frame from node");
            return;
        };

        if is_async_frame(kind) {
            match self.decoder.decode(frame) {
                Ok(event) => self.handle_event(event),
                Err(err) => {
                    counter!(FRAMES_INVALID, "kind" => "measure").increment(1);
                    warn!("measure frame rejected: {}", err);
                }
            }
        } else {
            match Answer::decode(frame) {
                Ok(answer) => {
                    counter!(FRAMES_DECODED, "kind" => "answer").increment(1);
                    if let Answer::LoggerError { code } = &answer {
                        warn!("firmware error {}: {}", code, FirmwareError::from(*code));
                    }
                    println!("{}", answer);
                }
                Err(err) => {
                    counter!(FRAMES_INVALID, "kind" => "answer").increment(1);
                    warn!("answer frame rejected: {}", err);
                }
            }
        }
    }

    fn handle_event(&mut self, event: MeasureEvent) {
        match event {
            MeasureEvent::ConfigAck(ack) => {
                counter!(FRAMES_DECODED, "kind" => "config_ack").increment(1);
                println!("{}", ack);
            }
            MeasureEvent::Consumption(samples) => {
                counter!(FRAMES_DECODED, "kind" => "consumption").increment(1);
                counter!(SAMPLES_EMITTED, "stream" => "consumption")
                    .increment(samples.len() as u64);
                for sample in samples {
                    self.sink.emit_consumption(
                        sample.timestamp.secs,
                        sample.timestamp.micros,
                        sample.power.unwrap_or(f32::NAN),
                        sample.voltage.unwrap_or(f32::NAN),
                        sample.current.unwrap_or(f32::NAN),
                    );
                }
            }
            MeasureEvent::Radio(samples) => {
                counter!(FRAMES_DECODED, "kind" => "radio").increment(1);
                counter!(SAMPLES_EMITTED, "stream" => "radio").increment(samples.len() as u64);
                for sample in samples {
                    self.sink.emit_radio(
                        sample.timestamp.secs,
                        sample.timestamp.micros,
                        sample.channel,
                        sample.rssi,
                    );
                }
            }
            MeasureEvent::Sniffer(capture) => {
                counter!(FRAMES_DECODED, "kind" => "sniffer").increment(1);
                counter!(SAMPLES_EMITTED, "stream" => "sniffer").increment(1);
                trace!(
                    "sniffer capture chan {} len {}: {}",
                    capture.channel,
                    capture.payload.len(),
                    hex::encode(&capture.payload)
                );
                self.sink.emit_sniffer(
                    capture.timestamp.secs,
                    capture.timestamp.micros,
                    capture.channel,
                    capture.rssi,
                    capture.lqi,
                    capture.crc_ok,
                    capture.payload.len(),
                );
                self.forward_capture(&capture);
            }
        }
    }

    /// Re-encapsulate a capture and hand it to the rebroadcast server.
    /// Frames that failed the hardware CRC stay out of the pcap stream.
    fn forward_capture(&mut self, capture: &SnifferCapture) {
        if !capture.crc_ok {
            return;
        }
        let Some(sniffer) = self.sniffer.as_ref() else {
            return;
        };
        if !sniffer.has_client() {
            counter!(SNIFFER_DROPPED, "reason" => "no_client").increment(1);
            return;
        }
        let datagram = self.zep.encapsulate(capture);
        sniffer.send_capture(datagram);
    }
}
