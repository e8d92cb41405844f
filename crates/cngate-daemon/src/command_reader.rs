//! Command ingestion thread.
//!
//! Reads one command per stdin line, encodes it, and writes the wire
//! frame to the serial port in a single blocking write. Parse failures
//! report a `cn_serial_error:` line to the supervisor and send nothing.
//! stdin EOF requests a controlled shutdown of the whole daemon.

use std::io::{self, BufRead, Write};
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use metrics::counter;
use tracing::{debug, error, info};

use cngate_protocol::{Command, FrameCodec, SharedTimeRef};
use cngate_telemetry::counters::{COMMANDS_SENT, COMMAND_PARSE_ERRORS};

use crate::ShutdownReason;

/// Spawn the stdin command-reader thread.
///
/// `writer` is an independent clone of the serial handle; the thread
/// never touches the read side.
pub fn spawn(
    writer: Box<dyn serialport::SerialPort>,
    time_ref: SharedTimeRef,
    shutdown: Sender<ShutdownReason>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("command-reader".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            run(stdin.lock(), writer, &time_ref);
            info!("stdin closed, requesting shutdown");
            let _ = shutdown.send(ShutdownReason::StdinClosed);
        })
}

/// Process command lines until EOF or a read failure. Empty lines are
/// skipped.
fn run(reader: impl BufRead, mut writer: impl Write, time_ref: &SharedTimeRef) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                error!("stdin read failed: {}", err);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        handle_line(&line, &mut writer, time_ref);
    }
}

fn handle_line(line: &str, writer: &mut impl Write, time_ref: &SharedTimeRef) {
    let command = match Command::parse(line) {
        Ok(command) => command,
        Err(err) => {
            counter!(COMMAND_PARSE_ERRORS).increment(1);
            println!("cn_serial_error: {}", err);
            return;
        }
    };
    let frame = match FrameCodec::encode(&command.encode()) {
        Ok(frame) => frame,
        Err(err) => {
            counter!(COMMAND_PARSE_ERRORS).increment(1);
            println!("cn_serial_error: {}", err);
            return;
        }
    };

    // Arm the round-trip reference as the command leaves.
    if matches!(command, Command::SetTime { .. }) {
        time_ref.arm();
    }

    debug!("sending {} ({} bytes)", command.name(), frame.len());
    if let Err(err) = writer.write_all(&frame).and_then(|()| writer.flush()) {
        error!("serial write failed for {}: {}", command.name(), err);
        return;
    }
    counter!(COMMANDS_SENT).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_lines_and_skips_blanks() {
        let input = b"start dc\n\n   \ngreen_led_on\n";
        let mut out = Vec::new();
        run(&input[..], &mut out, &SharedTimeRef::new());
        assert_eq!(out, [0x80, 0x02, 0x70, 0x01, 0x80, 0x01, 0x7B]);
    }

    #[test]
    fn parse_failure_sends_nothing() {
        let input = b"bogus majig\nconfig_radio_measure 9 100 1\nstart dc\n";
        let mut out = Vec::new();
        run(&input[..], &mut out, &SharedTimeRef::new());
        // only the one valid line reaches the port
        assert_eq!(out, [0x80, 0x02, 0x70, 0x01]);
    }

    #[test]
    fn set_time_arms_the_reference() {
        let time_ref = SharedTimeRef::new();
        let mut out = Vec::new();
        run(&b"set_time\n"[..], &mut out, &time_ref);
        assert!(time_ref.take_elapsed().is_some());
        // sync + len + type + seconds + microseconds
        assert_eq!(out.len(), 11);
        assert_eq!(&out[..3], &[0x80, 0x09, 0x72]);
    }

    #[test]
    fn other_commands_leave_the_reference_unarmed() {
        let time_ref = SharedTimeRef::new();
        let mut out = Vec::new();
        run(&b"green_led_blink\n"[..], &mut out, &time_ref);
        assert!(time_ref.take_elapsed().is_none());
    }
}
