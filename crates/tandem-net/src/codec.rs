//! Conversion between wire frames and engine requests/acks.

use tandem_core::{Ack, Instrument, OrderId, OrderKind, OrderRequest, Price, Quantity, Side};
use tandem_proto::{
    instrument_str, AckStatus, MessageBuilder, MessageParser, MessageType, ParseError,
    INSTRUMENT_LEN,
};

fn instrument(field: &[u8; INSTRUMENT_LEN]) -> Result<Option<Instrument>, ParseError> {
    match instrument_str(field)? {
        Some(code) => Instrument::new(code)
            .map(Some)
            .map_err(|_| ParseError::InvalidInstrument),
        None => Ok(None),
    }
}

/// Decode one complete inbound frame.
pub fn decode_request(msg_type: MessageType, frame: &[u8]) -> Result<OrderRequest, ParseError> {
    match msg_type {
        MessageType::NewOrder => {
            let msg = MessageParser::parse_new_order(frame)?;
            // Copy fields out of the packed struct
            let (order_id, side, price, quantity, field) =
                (msg.order_id, msg.side, msg.price, msg.quantity, msg.instrument);
            let side = Side::try_from(side).map_err(|_| ParseError::InvalidSide)?;
            Ok(OrderRequest {
                order_id: OrderId(order_id),
                instrument: instrument(&field)?,
                kind: OrderKind::from(side),
                price: Price(price),
                quantity: Quantity(quantity),
            })
        }
        MessageType::CancelOrder => {
            let msg = MessageParser::parse_cancel(frame)?;
            let (order_id, field) = (msg.order_id, msg.instrument);
            let mut request = OrderRequest::cancel(OrderId(order_id));
            request.instrument = instrument(&field)?;
            Ok(request)
        }
        _ => Err(ParseError::InvalidMessageType),
    }
}

/// Order id of a frame whose fields failed to decode, 0 if unreadable.
pub fn frame_order_id(frame: &[u8]) -> u32 {
    frame
        .get(8..12)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .unwrap_or(0)
}

/// Wire status, reject reason and resting quantity of an ack.
pub fn ack_fields(ack: Ack) -> (AckStatus, u8, u32) {
    match ack {
        Ack::Resting { remaining } => (AckStatus::Resting, 0, remaining.0),
        Ack::Filled => (AckStatus::Filled, 0, 0),
        Ack::Cancelled => (AckStatus::Cancelled, 0, 0),
        Ack::CancelRejected => (AckStatus::CancelRejected, 0, 0),
        Ack::Rejected(reason) => (AckStatus::Rejected, reason as u8, 0),
        Ack::Dropped => (AckStatus::Dropped, 0, 0),
    }
}

/// Append an `OrderAck` frame to `out`.
pub fn encode_ack(builder: &mut MessageBuilder, out: &mut Vec<u8>, order_id: u32, ack: Ack) {
    let (status, reason, remaining) = ack_fields(ack);
    let start = out.len();
    out.resize(start + MessageType::OrderAck.wire_size(), 0);
    // The slice was sized for the frame just above.
    let _ = builder.build_ack(&mut out[start..], order_id, status, reason, remaining);
}
