//! Market data publisher implementation.
//!
//! Uses UDP for low-latency market data dissemination. Every book event
//! becomes one datagram carrying one feed record.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use bytemuck::Pod;
use socket2::{Domain, Protocol, Socket, Type};
use tracing::warn;

use tandem_core::{EventSink, Instrument, Order, OrderId, Price, Quantity, Side};
use tandem_proto::{
    MessageHeader, MessageType, OrderAddedMessage, OrderDeletedMessage, OrderExecutedMessage,
    INSTRUMENT_LEN, SIDE_BUY, SIDE_SELL,
};

/// Multicast hop limit.
const MULTICAST_TTL: u32 = 4;

/// Market data publisher.
pub struct Publisher {
    socket: UdpSocket,
    dest_addr: SocketAddr,
    sequence: AtomicU32,
    send_errors: AtomicU64,
}

impl Publisher {
    /// Create a new publisher.
    ///
    /// For multicast, use a multicast group address (e.g., "239.255.0.1:12345").
    /// For unicast, use the destination address directly.
    pub fn new(dest_addr: SocketAddr) -> io::Result<Self> {
        let bind_addr = if dest_addr.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };

        let socket = Socket::new(Domain::for_address(dest_addr), Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_nonblocking(true)?;
        socket.bind(&bind_addr.into())?;

        // For multicast, set TTL
        if dest_addr.ip().is_multicast() {
            if dest_addr.is_ipv4() {
                socket.set_multicast_ttl_v4(MULTICAST_TTL)?;
            } else {
                socket.set_multicast_hops_v6(MULTICAST_TTL)?;
            }
        }

        Ok(Self {
            socket: socket.into(),
            dest_addr,
            sequence: AtomicU32::new(0),
            send_errors: AtomicU64::new(0),
        })
    }

    pub fn dest_addr(&self) -> SocketAddr {
        self.dest_addr
    }

    /// Sends that failed with something other than `WouldBlock`.
    pub fn send_errors(&self) -> u64 {
        self.send_errors.load(Ordering::Relaxed)
    }

    #[inline]
    fn header(&self, msg_type: MessageType) -> MessageHeader {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        MessageHeader::new(msg_type, sequence)
    }

    fn send<T: Pod>(&self, msg: &T) {
        match self.socket.send_to(bytemuck::bytes_of(msg), self.dest_addr) {
            Ok(_) => {}
            // Feed is best effort; a full socket buffer drops the record
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => {
                self.send_errors.fetch_add(1, Ordering::Relaxed);
                warn!(dest = %self.dest_addr, error = %e, "feed send failed");
            }
        }
    }
}

fn side_byte(side: Side) -> u8 {
    match side {
        Side::Buy => SIDE_BUY,
        Side::Sell => SIDE_SELL,
    }
}

fn instrument_bytes(instrument: Option<Instrument>) -> [u8; INSTRUMENT_LEN] {
    instrument.map(|i| i.to_padded()).unwrap_or([0; INSTRUMENT_LEN])
}

impl EventSink for Publisher {
    fn order_added(&self, order: &Order, timestamp: u64) {
        let msg = OrderAddedMessage {
            header: self.header(MessageType::OrderAdded),
            order_id: order.order_id.0,
            price: order.price.0,
            quantity: order.remaining.0,
            side: side_byte(order.side),
            _padding: [0; 3],
            timestamp,
            instrument: order.instrument.to_padded(),
        };
        self.send(&msg);
    }

    fn order_deleted(&self, order_id: OrderId, instrument: Option<Instrument>, success: bool, timestamp: u64) {
        let msg = OrderDeletedMessage {
            header: self.header(MessageType::OrderDeleted),
            order_id: order_id.0,
            success: u8::from(success),
            _padding: [0; 3],
            timestamp,
            instrument: instrument_bytes(instrument),
        };
        self.send(&msg);
    }

    fn order_executed(
        &self,
        resting_id: OrderId,
        incoming_id: OrderId,
        execution_count: u32,
        price: Price,
        quantity: Quantity,
        timestamp: u64,
    ) {
        let msg = OrderExecutedMessage {
            header: self.header(MessageType::OrderExecuted),
            resting_id: resting_id.0,
            incoming_id: incoming_id.0,
            execution_count,
            price: price.0,
            quantity: quantity.0,
            _reserved: 0,
            timestamp,
        };
        self.send(&msg);
    }
}
