//! Binary message definitions.
//!
//! All messages use fixed-size layouts for zero-copy parsing.
//! Little-endian byte order is used throughout.

use bytemuck::{Pod, Zeroable};
use core::mem::size_of;

/// Width of the NUL-padded instrument field.
pub const INSTRUMENT_LEN: usize = 16;

/// Side byte on the wire.
pub const SIDE_BUY: u8 = 0;
pub const SIDE_SELL: u8 = 1;

/// Message type discriminator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    // Inbound (client → engine)
    NewOrder = 0x01,
    CancelOrder = 0x02,

    // Outbound (engine → client)
    OrderAck = 0x11,

    // Market Data
    OrderAdded = 0x20,
    OrderDeleted = 0x21,
    OrderExecuted = 0x22,
}

impl TryFrom<u8> for MessageType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x01 => Ok(MessageType::NewOrder),
            0x02 => Ok(MessageType::CancelOrder),
            0x11 => Ok(MessageType::OrderAck),
            0x20 => Ok(MessageType::OrderAdded),
            0x21 => Ok(MessageType::OrderDeleted),
            0x22 => Ok(MessageType::OrderExecuted),
            _ => Err(()),
        }
    }
}

impl MessageType {
    /// Full wire size (header included) of this message type.
    pub const fn wire_size(self) -> usize {
        match self {
            MessageType::NewOrder => size_of::<NewOrderMessage>(),
            MessageType::CancelOrder => size_of::<CancelOrderMessage>(),
            MessageType::OrderAck => size_of::<OrderAckMessage>(),
            MessageType::OrderAdded => size_of::<OrderAddedMessage>(),
            MessageType::OrderDeleted => size_of::<OrderDeletedMessage>(),
            MessageType::OrderExecuted => size_of::<OrderExecutedMessage>(),
        }
    }
}

/// Fixed-size message header (8 bytes).
#[derive(Clone, Copy, Debug, Default)]
#[repr(C, packed)]
pub struct MessageHeader {
    /// Message type.
    pub msg_type: u8,
    /// Message flags (reserved).
    pub flags: u8,
    /// Payload length (excluding header).
    pub length: u16,
    /// Sequence number.
    pub sequence: u32,
}

const _: () = assert!(size_of::<MessageHeader>() == 8);

// SAFETY: MessageHeader is plain-old-data with no padding issues
unsafe impl Pod for MessageHeader {}
unsafe impl Zeroable for MessageHeader {}

impl MessageHeader {
    /// Header for a message of `msg_type`, length derived from the type.
    pub const fn new(msg_type: MessageType, sequence: u32) -> Self {
        Self {
            msg_type: msg_type as u8,
            flags: 0,
            length: (msg_type.wire_size() - size_of::<MessageHeader>()) as u16,
            sequence,
        }
    }

    /// Get total message size (header + payload).
    pub const fn total_size(&self) -> usize {
        size_of::<Self>() + self.length as usize
    }
}

/// New Order message (40 bytes total).
#[derive(Clone, Copy, Debug, Default)]
#[repr(C, packed)]
pub struct NewOrderMessage {
    pub header: MessageHeader,          // 8 bytes
    pub order_id: u32,                  // 4 bytes
    pub price: u32,                     // 4 bytes
    pub quantity: u32,                  // 4 bytes
    pub side: u8,                       // 1 byte (0=Buy, 1=Sell)
    pub _padding: [u8; 3],              // 3 bytes
    pub instrument: [u8; INSTRUMENT_LEN], // 16 bytes (NUL padded)
}

const _: () = assert!(size_of::<NewOrderMessage>() == 40);

unsafe impl Pod for NewOrderMessage {}
unsafe impl Zeroable for NewOrderMessage {}

impl NewOrderMessage {
    pub fn new(
        sequence: u32,
        order_id: u32,
        side: u8,
        price: u32,
        quantity: u32,
        instrument: [u8; INSTRUMENT_LEN],
    ) -> Self {
        Self {
            header: MessageHeader::new(MessageType::NewOrder, sequence),
            order_id,
            price,
            quantity,
            side,
            _padding: [0; 3],
            instrument,
        }
    }
}

/// Cancel Order message (32 bytes).
///
/// An all-zero instrument means the sender does not know it.
#[derive(Clone, Copy, Debug, Default)]
#[repr(C, packed)]
pub struct CancelOrderMessage {
    pub header: MessageHeader,          // 8 bytes
    pub order_id: u32,                  // 4 bytes
    pub _reserved: u32,                 // 4 bytes
    pub instrument: [u8; INSTRUMENT_LEN], // 16 bytes
}

const _: () = assert!(size_of::<CancelOrderMessage>() == 32);

unsafe impl Pod for CancelOrderMessage {}
unsafe impl Zeroable for CancelOrderMessage {}

impl CancelOrderMessage {
    pub fn new(sequence: u32, order_id: u32, instrument: [u8; INSTRUMENT_LEN]) -> Self {
        Self {
            header: MessageHeader::new(MessageType::CancelOrder, sequence),
            order_id,
            _reserved: 0,
            instrument,
        }
    }
}

/// Outcome carried in an [`OrderAckMessage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum AckStatus {
    Resting = 0,
    Filled = 1,
    Cancelled = 2,
    CancelRejected = 3,
    Rejected = 4,
    Dropped = 5,
}

impl TryFrom<u8> for AckStatus {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0 => Ok(AckStatus::Resting),
            1 => Ok(AckStatus::Filled),
            2 => Ok(AckStatus::Cancelled),
            3 => Ok(AckStatus::CancelRejected),
            4 => Ok(AckStatus::Rejected),
            5 => Ok(AckStatus::Dropped),
            other => Err(other),
        }
    }
}

/// Order acknowledgement (outbound, 24 bytes). One per request, in order.
#[derive(Clone, Copy, Debug, Default)]
#[repr(C, packed)]
pub struct OrderAckMessage {
    pub header: MessageHeader,      // 8 bytes
    pub order_id: u32,              // 4 bytes
    pub status: u8,                 // 1 byte (AckStatus)
    pub reason: u8,                 // 1 byte (reject reason, 0 if none)
    pub _padding: u16,              // 2 bytes
    pub remaining: u32,             // 4 bytes (resting quantity)
    pub _reserved: u32,             // 4 bytes
}

const _: () = assert!(size_of::<OrderAckMessage>() == 24);

unsafe impl Pod for OrderAckMessage {}
unsafe impl Zeroable for OrderAckMessage {}

impl OrderAckMessage {
    pub fn new(sequence: u32, order_id: u32, status: AckStatus, reason: u8, remaining: u32) -> Self {
        Self {
            header: MessageHeader::new(MessageType::OrderAck, sequence),
            order_id,
            status: status as u8,
            reason,
            _padding: 0,
            remaining,
            _reserved: 0,
        }
    }
}

/// Order added to a book (market data, 48 bytes).
#[derive(Clone, Copy, Debug, Default)]
#[repr(C, packed)]
pub struct OrderAddedMessage {
    pub header: MessageHeader,          // 8 bytes
    pub order_id: u32,                  // 4 bytes
    pub price: u32,                     // 4 bytes
    pub quantity: u32,                  // 4 bytes
    pub side: u8,                       // 1 byte
    pub _padding: [u8; 3],              // 3 bytes
    pub timestamp: u64,                 // 8 bytes
    pub instrument: [u8; INSTRUMENT_LEN], // 16 bytes
}

const _: () = assert!(size_of::<OrderAddedMessage>() == 48);

unsafe impl Pod for OrderAddedMessage {}
unsafe impl Zeroable for OrderAddedMessage {}

/// Cancel outcome (market data, 40 bytes).
#[derive(Clone, Copy, Debug, Default)]
#[repr(C, packed)]
pub struct OrderDeletedMessage {
    pub header: MessageHeader,          // 8 bytes
    pub order_id: u32,                  // 4 bytes
    pub success: u8,                    // 1 byte (1 = removed)
    pub _padding: [u8; 3],              // 3 bytes
    pub timestamp: u64,                 // 8 bytes
    pub instrument: [u8; INSTRUMENT_LEN], // 16 bytes (zero if unknown)
}

const _: () = assert!(size_of::<OrderDeletedMessage>() == 40);

unsafe impl Pod for OrderDeletedMessage {}
unsafe impl Zeroable for OrderDeletedMessage {}

/// Trade between a resting and an incoming order (market data, 40 bytes).
#[derive(Clone, Copy, Debug, Default)]
#[repr(C, packed)]
pub struct OrderExecutedMessage {
    pub header: MessageHeader,      // 8 bytes
    pub resting_id: u32,            // 4 bytes
    pub incoming_id: u32,           // 4 bytes
    pub execution_count: u32,       // 4 bytes
    pub price: u32,                 // 4 bytes (resting price)
    pub quantity: u32,              // 4 bytes
    pub _reserved: u32,             // 4 bytes
    pub timestamp: u64,             // 8 bytes
}

const _: () = assert!(size_of::<OrderExecutedMessage>() == 40);

unsafe impl Pod for OrderExecutedMessage {}
unsafe impl Zeroable for OrderExecutedMessage {}
