//! End-to-end dispatch tests: raw serial bytes in, telemetry sink calls out.

use std::sync::Arc;

use parking_lot::Mutex;

use cngate_daemon::dispatch::Dispatcher;
use cngate_protocol::SharedTimeRef;
use cngate_telemetry::TelemetrySink;

#[derive(Default)]
struct RecordingSink {
    consumption: Mutex<Vec<(u32, u32, f32, f32, f32)>>,
    radio: Mutex<Vec<(u32, u32, u8, i8)>>,
    sniffer: Mutex<Vec<(u32, u32, u8, i8, u8, bool, usize)>>,
    events: Mutex<Vec<(u32, u32, u32, String)>>,
}

impl TelemetrySink for RecordingSink {
    fn emit_consumption(&self, ts_s: u32, ts_us: u32, power: f32, voltage: f32, current: f32) {
        self.consumption
            .lock()
            .push((ts_s, ts_us, power, voltage, current));
    }

    fn emit_radio(&self, ts_s: u32, ts_us: u32, channel: u8, rssi: i8) {
        self.radio.lock().push((ts_s, ts_us, channel, rssi));
    }

    fn emit_sniffer(
        &self,
        ts_s: u32,
        ts_us: u32,
        channel: u8,
        rssi: i8,
        lqi: u8,
        crc_ok: bool,
        length: usize,
    ) {
        self.sniffer
            .lock()
            .push((ts_s, ts_us, channel, rssi, lqi, crc_ok, length));
    }

    fn emit_event(&self, ts_s: u32, ts_us: u32, value: u32, name: &str) {
        self.events.lock().push((ts_s, ts_us, value, name.to_string()));
    }
}

fn frame(payload: &[u8]) -> Vec<u8> {
    let mut wire = vec![0x80, payload.len() as u8];
    wire.extend_from_slice(payload);
    wire
}

/// Consumption config ack for 3.3V with power, voltage and current.
fn consumption_config_ack() -> Vec<u8> {
    frame(&[0xFA, 0x79, 0x17])
}

fn consumption_frame() -> Vec<u8> {
    let mut payload = vec![0xFF, 0x01];
    payload.extend_from_slice(&100u32.to_le_bytes());
    payload.extend_from_slice(&250_000u32.to_le_bytes());
    payload.extend_from_slice(&1.5f32.to_le_bytes());
    payload.extend_from_slice(&3.3f32.to_le_bytes());
    payload.extend_from_slice(&0.25f32.to_le_bytes());
    frame(&payload)
}

fn radio_frame() -> Vec<u8> {
    let mut payload = vec![0xFE, 0x02];
    payload.extend_from_slice(&200u32.to_le_bytes());
    payload.extend_from_slice(&1_000u32.to_le_bytes());
    payload.extend_from_slice(&[11, (-60i8) as u8]);
    payload.extend_from_slice(&2_000u32.to_le_bytes());
    payload.extend_from_slice(&[26, (-70i8) as u8]);
    frame(&payload)
}

fn sniffer_frame() -> Vec<u8> {
    let mut payload = vec![0xFD];
    payload.extend_from_slice(&300u32.to_le_bytes());
    payload.extend_from_slice(&500_000u32.to_le_bytes());
    payload.extend_from_slice(&[15, (-55i8) as u8, 200, 1, 4]);
    payload.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
    frame(&payload)
}

fn full_stream() -> Vec<u8> {
    let mut stream = Vec::new();
    stream.extend_from_slice(&consumption_config_ack());
    // line noise between frames
    stream.extend_from_slice(&[0x13, 0x37]);
    stream.extend_from_slice(&consumption_frame());
    stream.extend_from_slice(&radio_frame());
    // answer to a start command, routed to stdout only
    stream.extend_from_slice(&frame(&[0x70, 0x0A]));
    stream.extend_from_slice(&sniffer_frame());
    stream
}

fn new_dispatcher() -> (Dispatcher, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let dispatcher = Dispatcher::new(SharedTimeRef::new(), sink.clone(), None);
    (dispatcher, sink)
}

#[test]
fn decodes_a_mixed_stream_into_telemetry() {
    let (mut dispatcher, sink) = new_dispatcher();
    dispatcher.ingest(&full_stream());

    assert_eq!(
        *sink.consumption.lock(),
        vec![(100, 250_000, 1.5, 3.3, 0.25)]
    );
    assert_eq!(
        *sink.radio.lock(),
        vec![(200, 1_000, 11, -60), (200, 2_000, 26, -70)]
    );
    assert_eq!(
        *sink.sniffer.lock(),
        vec![(300, 500_000, 15, -55, 200, true, 4)]
    );
    assert!(sink.events.lock().is_empty());
}

#[test]
fn byte_at_a_time_feed_matches_single_push() {
    let stream = full_stream();

    let (mut all_at_once, sink_a) = new_dispatcher();
    all_at_once.ingest(&stream);

    let (mut chunked, sink_b) = new_dispatcher();
    for byte in &stream {
        chunked.ingest(std::slice::from_ref(byte));
    }

    assert_eq!(*sink_a.consumption.lock(), *sink_b.consumption.lock());
    assert_eq!(*sink_a.radio.lock(), *sink_b.radio.lock());
    assert_eq!(*sink_a.sniffer.lock(), *sink_b.sniffer.lock());
}

#[test]
fn truncated_consumption_frame_emits_nothing() {
    let (mut dispatcher, sink) = new_dispatcher();
    dispatcher.ingest(&consumption_config_ack());

    // claims two samples but carries one record
    let mut payload = vec![0xFF, 0x02];
    payload.extend_from_slice(&100u32.to_le_bytes());
    payload.extend_from_slice(&250_000u32.to_le_bytes());
    payload.extend_from_slice(&1.5f32.to_le_bytes());
    payload.extend_from_slice(&3.3f32.to_le_bytes());
    payload.extend_from_slice(&0.25f32.to_le_bytes());
    dispatcher.ingest(&frame(&payload));

    assert!(sink.consumption.lock().is_empty());
}

#[test]
fn consumption_without_config_emits_nothing() {
    let (mut dispatcher, sink) = new_dispatcher();
    dispatcher.ingest(&consumption_frame());
    assert!(sink.consumption.lock().is_empty());
}

#[test]
fn answer_frames_never_touch_the_sink() {
    let (mut dispatcher, sink) = new_dispatcher();
    dispatcher.ingest(&frame(&[0x70, 0x0A]));
    dispatcher.ingest(&frame(&[0x71, 0x02]));
    dispatcher.ingest(&frame(&[0xEE, (-2i8) as u8]));

    assert!(sink.consumption.lock().is_empty());
    assert!(sink.radio.lock().is_empty());
    assert!(sink.sniffer.lock().is_empty());
    assert!(sink.events.lock().is_empty());
}
