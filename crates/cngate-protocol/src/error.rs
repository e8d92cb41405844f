use thiserror::Error;

/// Errors returned by frame, command, and measure handling.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// Frame is shorter than its header requires
    #[error("Frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort { expected: usize, actual: usize },

    /// Frame length does not match what its contents require
    #[error("Invalid {kind} frame length: {actual} != expected {expected}")]
    FrameLengthMismatch {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Payload would not fit in a one-byte length field
    #[error("Frame too long: max {max} bytes, got {actual}")]
    FrameTooLong { max: usize, actual: usize },

    /// Frame type byte is not a known asynchronous frame
    #[error("Unknown frame type: 0x{0:02X}")]
    UnknownFrameType(u8),

    /// Acknowledgement echoes a command type we never send
    #[error("Unknown ACK frame: 0x{0:02X}")]
    UnknownAck(u8),

    /// Acknowledgement frame does not carry exactly a type and a value
    #[error("Invalid ACK length: {0}")]
    InvalidAckLength(usize),

    /// Acknowledgement value is neither ACK nor NACK
    #[error("Invalid ACK value: 0x{0:02X}")]
    InvalidAckValue(u8),

    /// Consumption frame arrived before any consumption configuration ack
    #[error("Consumption measure received but no configuration is active")]
    NotConfigured,

    /// Command word is not part of the grammar
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Command line has a bad argument or the wrong argument count
    #[error("Invalid argument for {command}: {reason}")]
    InvalidArgument { command: String, reason: String },
}

/// Error codes reported by the control node firmware over logger frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareError {
    /// Firmware network-side queue overflowed
    NetworkQueueOverflow,
    /// Firmware application-side queue overflowed
    ApplicationQueueOverflow,
    /// Firmware defensive check tripped
    Defensive,
    /// Code not in the known table
    Unknown(i8),
}

impl From<i8> for FirmwareError {
    fn from(code: i8) -> Self {
        match code {
            -1 => FirmwareError::NetworkQueueOverflow,
            -2 => FirmwareError::ApplicationQueueOverflow,
            -3 => FirmwareError::Defensive,
            other => FirmwareError::Unknown(other),
        }
    }
}

impl From<FirmwareError> for i8 {
    fn from(err: FirmwareError) -> Self {
        match err {
            FirmwareError::NetworkQueueOverflow => -1,
            FirmwareError::ApplicationQueueOverflow => -2,
            FirmwareError::Defensive => -3,
            FirmwareError::Unknown(code) => code,
        }
    }
}

impl std::fmt::Display for FirmwareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FirmwareError::NetworkQueueOverflow => write!(f, "network queue overflow"),
            FirmwareError::ApplicationQueueOverflow => write!(f, "application queue overflow"),
            FirmwareError::Defensive => write!(f, "defensive error"),
            FirmwareError::Unknown(code) => write!(f, "unknown error {}", code),
        }
    }
}
