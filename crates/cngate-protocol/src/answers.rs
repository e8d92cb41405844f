use std::fmt;

use crate::constants::{ACK, ASYNC_FRAME_MASK, LOGGER_FRAME, NACK};
use crate::commands::Command;
use crate::error::ProtocolError;

/// True when a frame type byte marks an unsolicited measure/event frame.
///
/// Anything else answers a command the gateway sent.
pub fn is_async_frame(code: u8) -> bool {
    code & ASYNC_FRAME_MASK == ASYNC_FRAME_MASK
}

/// A command-correlated answer from the control node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Echo of a command type with its acknowledgement value
    CommandAck {
        /// Text name of the echoed command
        command: &'static str,
        /// True for ACK, false for NACK
        ack: bool,
    },
    /// Firmware logger frame carrying a signed error code
    LoggerError { code: i8 },
}

impl Answer {
    /// Decode an answer-path frame (type + payload, framing stripped).
    pub fn decode(frame: &[u8]) -> Result<Answer, ProtocolError> {
        if frame.is_empty() {
            return Err(ProtocolError::FrameTooShort {
                expected: 1,
                actual: 0,
            });
        }

        if frame[0] == LOGGER_FRAME {
            if frame.len() != 2 {
                return Err(ProtocolError::FrameLengthMismatch {
                    kind: "logger",
                    expected: 2,
                    actual: frame.len(),
                });
            }
            return Ok(Answer::LoggerError {
                code: frame[1] as i8,
            });
        }

        let command = Command::name_for_code(frame[0])
            .ok_or(ProtocolError::UnknownFrameType(frame[0]))?;
        if frame.len() != 2 {
            return Err(ProtocolError::InvalidAckLength(frame.len()));
        }
        let ack = match frame[1] {
            ACK => true,
            NACK => false,
            other => return Err(ProtocolError::InvalidAckValue(other)),
        };
        Ok(Answer::CommandAck { command, ack })
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::CommandAck { command, ack } => {
                write!(f, "{} {}", command, if *ack { "ACK" } else { "NACK" })
            }
            Answer::LoggerError { code } => write!(f, "error {}", code),
        }
    }
}
