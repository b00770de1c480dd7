//! Zero-copy message parser.
//!
//! Uses bytemuck for safe transmutation from raw bytes.

use bytemuck::{try_from_bytes, Pod};
use core::fmt;
use core::mem::size_of;
use crate::messages::*;

/// Parse error types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// Buffer doesn't have enough bytes.
    BufferTooSmall,
    /// Invalid message type in header.
    InvalidMessageType,
    /// Message length doesn't match expected.
    InvalidLength,
    /// Buffer is not properly aligned.
    MisalignedBuffer,
    /// Side byte is neither buy nor sell.
    InvalidSide,
    /// Instrument is not NUL-padded ASCII.
    InvalidInstrument,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ParseError::BufferTooSmall => "buffer too small",
            ParseError::InvalidMessageType => "invalid message type",
            ParseError::InvalidLength => "invalid message length",
            ParseError::MisalignedBuffer => "misaligned buffer",
            ParseError::InvalidSide => "invalid side",
            ParseError::InvalidInstrument => "invalid instrument",
        };
        f.write_str(msg)
    }
}

#[inline(always)]
fn cast<T: Pod>(buffer: &[u8]) -> Result<&T, ParseError> {
    if buffer.len() < size_of::<T>() {
        return Err(ParseError::BufferTooSmall);
    }

    try_from_bytes(&buffer[..size_of::<T>()]).map_err(|_| ParseError::MisalignedBuffer)
}

/// Decode a NUL-padded instrument field.
///
/// `Ok(None)` for an all-zero field. Interior NULs and non-ASCII bytes are
/// rejected.
pub fn instrument_str(field: &[u8; INSTRUMENT_LEN]) -> Result<Option<&str>, ParseError> {
    let len = field.iter().position(|&b| b == 0).unwrap_or(INSTRUMENT_LEN);
    let (code, padding) = field.split_at(len);
    if padding.iter().any(|&b| b != 0) || !code.is_ascii() {
        return Err(ParseError::InvalidInstrument);
    }
    if code.is_empty() {
        return Ok(None);
    }
    core::str::from_utf8(code)
        .map(Some)
        .map_err(|_| ParseError::InvalidInstrument)
}

/// Encode `code` as a NUL-padded instrument field.
pub fn instrument_field(code: &str) -> Result<[u8; INSTRUMENT_LEN], ParseError> {
    let bytes = code.as_bytes();
    if bytes.len() > INSTRUMENT_LEN || !code.is_ascii() || bytes.contains(&0) {
        return Err(ParseError::InvalidInstrument);
    }
    let mut field = [0u8; INSTRUMENT_LEN];
    field[..bytes.len()].copy_from_slice(bytes);
    Ok(field)
}

/// Zero-copy message parser.
pub struct MessageParser;

impl MessageParser {
    /// Parse a message header from raw bytes.
    #[inline(always)]
    pub fn parse_header(buffer: &[u8]) -> Result<&MessageHeader, ParseError> {
        cast(buffer)
    }

    /// Parse a NewOrder message (zero-copy), checking side and instrument.
    #[inline(always)]
    pub fn parse_new_order(buffer: &[u8]) -> Result<&NewOrderMessage, ParseError> {
        let msg: &NewOrderMessage = cast(buffer)?;
        let side = msg.side;
        if side != SIDE_BUY && side != SIDE_SELL {
            return Err(ParseError::InvalidSide);
        }
        let instrument = msg.instrument;
        instrument_str(&instrument)?;
        Ok(msg)
    }

    /// Parse a Cancel message (zero-copy).
    #[inline(always)]
    pub fn parse_cancel(buffer: &[u8]) -> Result<&CancelOrderMessage, ParseError> {
        let msg: &CancelOrderMessage = cast(buffer)?;
        let instrument = msg.instrument;
        instrument_str(&instrument)?;
        Ok(msg)
    }

    /// Parse an OrderAck (zero-copy).
    #[inline(always)]
    pub fn parse_ack(buffer: &[u8]) -> Result<&OrderAckMessage, ParseError> {
        cast(buffer)
    }

    #[inline(always)]
    pub fn parse_order_added(buffer: &[u8]) -> Result<&OrderAddedMessage, ParseError> {
        cast(buffer)
    }

    #[inline(always)]
    pub fn parse_order_deleted(buffer: &[u8]) -> Result<&OrderDeletedMessage, ParseError> {
        cast(buffer)
    }

    #[inline(always)]
    pub fn parse_order_executed(buffer: &[u8]) -> Result<&OrderExecutedMessage, ParseError> {
        cast(buffer)
    }

    /// Determine message type and validate length.
    ///
    /// Returns the total size of the frame at the start of `buffer`.
    #[inline]
    pub fn validate_message(buffer: &[u8]) -> Result<(MessageType, usize), ParseError> {
        let header = Self::parse_header(buffer)?;

        // Copy fields to avoid references to a packed struct
        let msg_type_byte = header.msg_type;
        let header_length = header.length as usize;

        let msg_type = MessageType::try_from(msg_type_byte)
            .map_err(|_| ParseError::InvalidMessageType)?;

        let expected_len = msg_type.wire_size();
        if size_of::<MessageHeader>() + header_length != expected_len {
            return Err(ParseError::InvalidLength);
        }

        if buffer.len() < expected_len {
            return Err(ParseError::BufferTooSmall);
        }

        Ok((msg_type, expected_len))
    }
}

/// Message builder for sequenced outbound and client messages.
pub struct MessageBuilder {
    sequence: u32,
}

impl MessageBuilder {
    /// Create a new message builder.
    pub const fn new() -> Self {
        Self { sequence: 0 }
    }

    /// Get next sequence number.
    #[inline(always)]
    pub fn next_sequence(&mut self) -> u32 {
        self.sequence = self.sequence.wrapping_add(1);
        self.sequence
    }

    #[inline(always)]
    fn write<T: Pod>(buffer: &mut [u8], msg: &T) -> Result<usize, ParseError> {
        let size = size_of::<T>();
        let dst = buffer.get_mut(..size).ok_or(ParseError::BufferTooSmall)?;
        dst.copy_from_slice(bytemuck::bytes_of(msg));
        Ok(size)
    }

    /// Build a new order into a buffer.
    pub fn build_new_order(
        &mut self,
        buffer: &mut [u8],
        order_id: u32,
        side: u8,
        price: u32,
        quantity: u32,
        instrument: [u8; INSTRUMENT_LEN],
    ) -> Result<usize, ParseError> {
        let msg = NewOrderMessage::new(self.next_sequence(), order_id, side, price, quantity, instrument);
        Self::write(buffer, &msg)
    }

    /// Build a cancel into a buffer.
    pub fn build_cancel(
        &mut self,
        buffer: &mut [u8],
        order_id: u32,
        instrument: [u8; INSTRUMENT_LEN],
    ) -> Result<usize, ParseError> {
        let msg = CancelOrderMessage::new(self.next_sequence(), order_id, instrument);
        Self::write(buffer, &msg)
    }

    /// Build an acknowledgement into a buffer.
    pub fn build_ack(
        &mut self,
        buffer: &mut [u8],
        order_id: u32,
        status: AckStatus,
        reason: u8,
        remaining: u32,
    ) -> Result<usize, ParseError> {
        let msg = OrderAckMessage::new(self.next_sequence(), order_id, status, reason, remaining);
        Self::write(buffer, &msg)
    }
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}
