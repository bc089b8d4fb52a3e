//! Byte-exact wire frames for binary agreement messages.
//!
//! The transport exchanges opaque frames between authenticated peers; these functions translate
//! between frames and typed messages. Two frame layouts exist, both starting with the 16-byte
//! instance identifier:
//!
//! ```text
//! round frame:    [16: instance id] [1: kind, 'a' = BVal, 'b' = Aux] [2: round, LE u16] [1: value]
//! decision frame: [16: instance id] [1: value]
//! ```
//!
//! Value bytes must be `0` or `1`; anything else is rejected before it can reach a protocol
//! instance.

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error as ThisError;

use crate::binary_agreement::RoundMessage;
use crate::instance_id::InstanceId;

/// The length of an encoded round frame.
pub const ROUND_FRAME_BYTES: usize = InstanceId::BYTES + 4;

/// The length of an encoded decision frame.
pub const DECISION_FRAME_BYTES: usize = InstanceId::BYTES + 1;

const KIND_BVAL: u8 = b'a';
const KIND_AUX: u8 = b'b';

/// A frame decoding error.
#[derive(Clone, Eq, PartialEq, Debug, ThisError)]
pub enum Error {
    /// The frame is shorter than its layout requires.
    #[error("Frame ends unexpectedly")]
    UnexpectedEnd,
    /// The frame is longer than its layout requires.
    #[error("Frame has trailing bytes")]
    TrailingBytes,
    /// The kind byte does not denote a message kind.
    #[error("Unknown message kind byte {0:#04x}")]
    InvalidKind(u8),
    /// The value byte is not a bit.
    #[error("Invalid value byte {0:#04x}, expected 0 or 1")]
    InvalidValue(u8),
}

/// A codec result.
pub type Result<T> = std::result::Result<T, Error>;

/// Encodes a round message for the given instance and round.
pub fn encode_round_message(id: &InstanceId, round: u16, msg: &RoundMessage) -> Vec<u8> {
    let (kind, value) = match *msg {
        RoundMessage::BVal(b) => (KIND_BVAL, b),
        RoundMessage::Aux(b) => (KIND_AUX, b),
    };
    let mut frame = Vec::with_capacity(ROUND_FRAME_BYTES);
    frame.extend_from_slice(id.as_bytes());
    frame.push(kind);
    let mut round_bytes = [0; 2];
    LittleEndian::write_u16(&mut round_bytes, round);
    frame.extend_from_slice(&round_bytes);
    frame.push(value as u8);
    frame
}

/// Decodes a round frame into the instance identifier, round number and message.
pub fn decode_round_message(frame: &[u8]) -> Result<(InstanceId, u16, RoundMessage)> {
    check_len(frame, ROUND_FRAME_BYTES)?;
    let id = decode_instance_id(frame);
    let value = decode_value(frame[19])?;
    let round = LittleEndian::read_u16(&frame[17..19]);
    let msg = match frame[16] {
        KIND_BVAL => RoundMessage::BVal(value),
        KIND_AUX => RoundMessage::Aux(value),
        kind => return Err(Error::InvalidKind(kind)),
    };
    Ok((id, round, msg))
}

/// Encodes a decision echo for the given instance.
pub fn encode_decision(id: &InstanceId, decision: bool) -> Vec<u8> {
    let mut frame = Vec::with_capacity(DECISION_FRAME_BYTES);
    frame.extend_from_slice(id.as_bytes());
    frame.push(decision as u8);
    frame
}

/// Decodes a decision frame into the instance identifier and the echoed value.
pub fn decode_decision(frame: &[u8]) -> Result<(InstanceId, bool)> {
    check_len(frame, DECISION_FRAME_BYTES)?;
    let id = decode_instance_id(frame);
    let decision = decode_value(frame[16])?;
    Ok((id, decision))
}

fn check_len(frame: &[u8], expected: usize) -> Result<()> {
    if frame.len() < expected {
        Err(Error::UnexpectedEnd)
    } else if frame.len() > expected {
        Err(Error::TrailingBytes)
    } else {
        Ok(())
    }
}

fn decode_instance_id(frame: &[u8]) -> InstanceId {
    let mut id = [0; 16];
    id.copy_from_slice(&frame[..16]);
    InstanceId::from_bytes(id)
}

fn decode_value(byte: u8) -> Result<bool> {
    match byte {
        0 => Ok(false),
        1 => Ok(true),
        value => Err(Error::InvalidValue(value)),
    }
}
