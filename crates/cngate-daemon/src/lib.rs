//! Control node gateway daemon.
//!
//! Bridges a supervising host process and the control node firmware. Text
//! commands arrive on stdin and leave as binary frames on the serial
//! link; frames coming back are decoded into stdout answer lines,
//! telemetry samples, and ZEP datagrams for an attached sniffer client.
//!
//! # Architecture
//!
//! Two threads share the serial port through independent cloned handles:
//! the command-reader thread turns stdin lines into blocking writes, the
//! main thread runs the blocking read loop feeding [`dispatch::Dispatcher`].
//! The sniffer rebroadcast server runs on its own tokio runtime and is
//! reached from the read loop through a non-blocking queue, so measure
//! processing never waits on the network.

pub mod command_reader;
pub mod dispatch;
pub mod serial;
pub mod sniffer_server;

/// Why the daemon is shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// stdin reached EOF, the supervisor is done with us
    StdinClosed,
    /// interrupt signal
    Interrupted,
}
