use std::sync::Arc;

/// Destination for decoded measures and protocol events.
///
/// Every method is fire-and-forget: implementations count and log their
/// own failures and never propagate them back into the decode path. A
/// stopped sink silently drops everything.
///
/// Consumption channels that were not configured arrive as NaN so records
/// keep their fixed power, voltage, current order.
pub trait TelemetrySink: Send + Sync {
    fn emit_consumption(&self, ts_s: u32, ts_us: u32, power: f32, voltage: f32, current: f32);

    fn emit_radio(&self, ts_s: u32, ts_us: u32, channel: u8, rssi: i8);

    #[allow(clippy::too_many_arguments)]
    fn emit_sniffer(
        &self,
        ts_s: u32,
        ts_us: u32,
        channel: u8,
        rssi: i8,
        lqi: u8,
        crc_ok: bool,
        length: usize,
    );

    /// Protocol-level event, e.g. a sniffer client connecting (value 1)
    /// or disconnecting (value 0).
    fn emit_event(&self, ts_s: u32, ts_us: u32, value: u32, name: &str);

    /// Stop the sink and flush whatever it buffers. Emits after this are
    /// dropped.
    fn stop(&self) {}
}

/// Sink that drops everything. Used when no measure output is configured.
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn emit_consumption(&self, _ts_s: u32, _ts_us: u32, _power: f32, _voltage: f32, _current: f32) {
    }

    fn emit_radio(&self, _ts_s: u32, _ts_us: u32, _channel: u8, _rssi: i8) {}

    fn emit_sniffer(
        &self,
        _ts_s: u32,
        _ts_us: u32,
        _channel: u8,
        _rssi: i8,
        _lqi: u8,
        _crc_ok: bool,
        _length: usize,
    ) {
    }

    fn emit_event(&self, _ts_s: u32, _ts_us: u32, _value: u32, _name: &str) {}
}

/// Decorator that echoes every sample to stdout as a `measures_debug:`
/// line before forwarding it, for the supervising process to inspect.
pub struct DebugSink {
    inner: Arc<dyn TelemetrySink>,
}

impl DebugSink {
    pub fn wrap(inner: Arc<dyn TelemetrySink>) -> Self {
        DebugSink { inner }
    }
}

impl TelemetrySink for DebugSink {
    fn emit_consumption(&self, ts_s: u32, ts_us: u32, power: f32, voltage: f32, current: f32) {
        println!(
            "measures_debug: consumption_measure {}.{:06}: {:.6} {:.6} {:.6}",
            ts_s, ts_us, power, voltage, current
        );
        self.inner.emit_consumption(ts_s, ts_us, power, voltage, current);
    }

    fn emit_radio(&self, ts_s: u32, ts_us: u32, channel: u8, rssi: i8) {
        println!(
            "measures_debug: radio_measure {}.{:06}: {} {}",
            ts_s, ts_us, channel, rssi
        );
        self.inner.emit_radio(ts_s, ts_us, channel, rssi);
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
        println!(
            "measures_debug: radio_sniffer {}.{:06}: {} {} {} {} {}",
            ts_s, ts_us, channel, rssi, lqi, crc_ok as u8, length
        );
        self.inner
            .emit_sniffer(ts_s, ts_us, channel, rssi, lqi, crc_ok, length);
    }

    fn emit_event(&self, ts_s: u32, ts_us: u32, value: u32, name: &str) {
        println!(
            "measures_debug: event {}.{:06}: {} {}",
            ts_s, ts_us, value, name
        );
        self.inner.emit_event(ts_s, ts_us, value, name);
    }

    fn stop(&self) {
        self.inner.stop();
    }
}
