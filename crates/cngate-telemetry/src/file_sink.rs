use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use metrics::counter;
use parking_lot::Mutex;
use serde::Deserialize;
use thiserror::Error;

use crate::counters::SINK_WRITE_ERRORS;
use crate::sink::TelemetrySink;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sink config error: {0}")]
    Config(#[from] serde_yaml::Error),
}

/// Per-stream output paths. An absent stream stays disabled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SinkConfig {
    pub consumption: Option<PathBuf>,
    pub radio: Option<PathBuf>,
    pub sniffer: Option<PathBuf>,
    pub event: Option<PathBuf>,
}

impl SinkConfig {
    /// Load the stream configuration from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, SinkError> {
        let file = File::open(path)?;
        Ok(serde_yaml::from_reader(file)?)
    }
}

type Stream = Mutex<LineWriter<File>>;

/// Append-only per-stream text files, one line per sample.
///
/// Each stream opens lazily at construction with a header naming the
/// stream, its fields, and the start time. Write failures are counted and
/// logged; the decode path never sees them.
pub struct FileSink {
    consumption: Option<Stream>,
    radio: Option<Stream>,
    sniffer: Option<Stream>,
    event: Option<Stream>,
    stopped: AtomicBool,
}

impl FileSink {
    pub fn open(config: &SinkConfig) -> Result<Self, SinkError> {
        Ok(FileSink {
            consumption: open_stream(
                config.consumption.as_deref(),
                "consumption",
                "timestamp power_w voltage_v current_a",
            )?,
            radio: open_stream(
                config.radio.as_deref(),
                "radio",
                "timestamp channel rssi_dbm",
            )?,
            sniffer: open_stream(
                config.sniffer.as_deref(),
                "sniffer",
                "timestamp channel rssi_dbm lqi crc_ok length",
            )?,
            event: open_stream(config.event.as_deref(), "event", "timestamp value name")?,
            stopped: AtomicBool::new(false),
        })
    }

    fn append(&self, stream: &Option<Stream>, name: &'static str, line: &str) {
        if self.stopped.load(Ordering::Relaxed) {
            return;
        }
        if let Some(writer) = stream {
            if let Err(err) = writeln!(writer.lock(), "{}", line) {
                counter!(SINK_WRITE_ERRORS, "stream" => name).increment(1);
                log::warn!("{} stream write failed: {}", name, err);
            }
        }
    }
}

fn open_stream(
    path: Option<&Path>,
    name: &str,
    fields: &str,
) -> Result<Option<Stream>, SinkError> {
    let path = match path {
        Some(path) => path,
        None => return Ok(None),
    };
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = LineWriter::new(file);
    writeln!(
        writer,
        "# {} {} started {}",
        name,
        fields,
        Utc::now().to_rfc3339()
    )?;
    Ok(Some(Mutex::new(writer)))
}

impl TelemetrySink for FileSink {
    fn emit_consumption(&self, ts_s: u32, ts_us: u32, power: f32, voltage: f32, current: f32) {
        self.append(
            &self.consumption,
            "consumption",
            &format!(
                "{}.{:06} {:.6} {:.6} {:.6}",
                ts_s, ts_us, power, voltage, current
            ),
        );
    }

    fn emit_radio(&self, ts_s: u32, ts_us: u32, channel: u8, rssi: i8) {
        self.append(
            &self.radio,
            "radio",
            &format!("{}.{:06} {} {}", ts_s, ts_us, channel, rssi),
        );
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
        self.append(
            &self.sniffer,
            "sniffer",
            &format!(
                "{}.{:06} {} {} {} {} {}",
                ts_s, ts_us, channel, rssi, lqi, crc_ok as u8, length
            ),
        );
    }

    fn emit_event(&self, ts_s: u32, ts_us: u32, value: u32, name: &str) {
        self.append(
            &self.event,
            "event",
            &format!("{}.{:06} {} {}", ts_s, ts_us, value, name),
        );
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
        for stream in [&self.consumption, &self.radio, &self.sniffer, &self.event] {
            if let Some(writer) = stream {
                if let Err(err) = writer.lock().flush() {
                    log::warn!("stream flush failed: {}", err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("cngate-sink-{}-{}", std::process::id(), tag))
    }

    #[test]
    fn writes_header_and_samples_to_configured_streams() {
        let consumption = temp_path("consumption");
        let config = SinkConfig {
            consumption: Some(consumption.clone()),
            ..Default::default()
        };

        let sink = FileSink::open(&config).unwrap();
        sink.emit_consumption(1000, 250, 0.5, 3.3, 0.15);
        // the radio stream is disabled, this must be a silent no-op
        sink.emit_radio(1000, 250, 11, -59);
        sink.stop();

        let content = fs::read_to_string(&consumption).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("# consumption timestamp power_w voltage_v current_a"));
        assert_eq!(lines[1], "1000.000250 0.500000 3.300000 0.150000");

        fs::remove_file(&consumption).ok();
    }

    #[test]
    fn stopped_sink_drops_samples() {
        let event = temp_path("event");
        let config = SinkConfig {
            event: Some(event.clone()),
            ..Default::default()
        };

        let sink = FileSink::open(&config).unwrap();
        sink.stop();
        sink.emit_event(42, 0, 1, "sniffer_client");

        let content = fs::read_to_string(&event).unwrap();
        assert_eq!(content.lines().count(), 1); // header only

        fs::remove_file(&event).ok();
    }

    #[test]
    fn config_parses_partial_yaml() {
        let config: SinkConfig =
            serde_yaml::from_str("consumption: /tmp/c.txt\nsniffer: /tmp/s.txt\n").unwrap();
        assert_eq!(config.consumption.as_deref(), Some(Path::new("/tmp/c.txt")));
        assert_eq!(config.sniffer.as_deref(), Some(Path::new("/tmp/s.txt")));
        assert!(config.radio.is_none());
        assert!(config.event.is_none());
    }
}
