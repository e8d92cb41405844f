//! Serial protocol for the control node firmware.
//!
//! The control node talks over a raw serial line in `[sync][len][type +
//! payload]` frames. This crate parses gateway text commands into typed
//! [`Command`] values and encodes them to wire frames, reassembles frames
//! from the byte stream with [`FrameCodec`], and decodes what the node
//! sends back: command answers ([`Answer`]) and unsolicited measure frames
//! ([`MeasureDecoder`]).
//!
//! # Example
//!
//! ```
//! use cngate_protocol::{Answer, Command, FrameCodec};
//!
//! # fn main() -> Result<(), cngate_protocol::ProtocolError> {
//! // text command to wire frame
//! let command = Command::parse("start dc")?;
//! let frame = FrameCodec::encode(&command.encode())?;
//! assert_eq!(frame, [0x80, 0x02, 0x70, 0x01]);
//!
//! // serial bytes back to a typed answer
//! let mut codec = FrameCodec::new();
//! codec.push(&[0x80, 0x02, 0x70, 0x0A]);
//! let answer = Answer::decode(&codec.decode().unwrap())?;
//! assert_eq!(answer.to_string(), "start ACK");
//! # Ok(())
//! # }
//! ```

mod answers;
mod commands;
mod constants;
mod error;
mod frame;
mod measures;
mod types;
mod zep;

pub use answers::*;
pub use commands::*;
pub use constants::*;
pub use error::*;
pub use frame::*;
pub use measures::*;
pub use types::*;
pub use zep::*;
