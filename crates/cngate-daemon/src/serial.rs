use std::io;
use std::time::Duration;

use crossbeam_channel::Receiver;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use thiserror::Error;
use tracing::trace;

use crate::dispatch::Dispatcher;
use crate::ShutdownReason;

/// Default control node device.
pub const DEFAULT_TTY: &str = "/dev/ttyCN";
/// Default baud rate of the control node link.
pub const DEFAULT_BAUD: u32 = 500_000;

/// Read timeout doubling as the shutdown poll interval.
const READ_POLL: Duration = Duration::from_millis(200);

#[derive(Error, Debug)]
pub enum SerialError {
    #[error("serial port error: {0}")]
    Port(#[from] serialport::Error),
    #[error("serial read error: {0}")]
    Io(#[from] io::Error),
    #[error("serial port closed")]
    Closed,
}

/// Open and configure the control node line: 8N1, no flow control, raw
/// bytes.
pub fn open(path: &str, baud: u32) -> Result<Box<dyn SerialPort>, SerialError> {
    Ok(serialport::new(path, baud)
        .data_bits(DataBits::Eight)
        .stop_bits(StopBits::One)
        .parity(Parity::None)
        .flow_control(FlowControl::None)
        .timeout(READ_POLL)
        .open()?)
}

/// Serial ingestion loop: blocking reads feed the dispatcher until a
/// shutdown request arrives or the link hard-fails.
///
/// Timeouts are poll ticks for the shutdown channel, not errors.
pub fn read_loop(
    port: &mut dyn SerialPort,
    dispatcher: &mut Dispatcher,
    shutdown: &Receiver<ShutdownReason>,
) -> Result<ShutdownReason, SerialError> {
    let mut buf = [0u8; 256];
    loop {
        if let Ok(reason) = shutdown.try_recv() {
            return Ok(reason);
        }
        match port.read(&mut buf) {
            Ok(0) => return Err(SerialError::Closed),
            Ok(n) => {
                trace!("read {} serial bytes", n);
                dispatcher.ingest(&buf[..n]);
            }
            Err(err) if err.kind() == io::ErrorKind::TimedOut => {}
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }
}
