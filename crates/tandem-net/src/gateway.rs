//! Network gateway implementation using mio.
//!
//! A non-blocking TCP server that decodes client frames, submits them to
//! the engine and writes one `OrderAck` per request back, in request order.
//! Runs on its own thread; the engine runs on the tokio runtime.

use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info, warn};

use tandem_core::{Ack, EngineHandle, OrderRequest, Pending, RejectReason, TrySubmitError};
use tandem_proto::{MessageBuilder, MessageHeader, MessageParser, ParseError};

use crate::codec::{decode_request, encode_ack, frame_order_id};

const SERVER: Token = Token(0);
const MAX_CONNECTIONS: usize = 1024;
const READ_BUFFER_SIZE: usize = 4096;
/// Decoded requests a connection may hold before reading stops.
const MAX_QUEUED: usize = 1024;
const HEADER_SIZE: usize = std::mem::size_of::<MessageHeader>();

/// Gateway tuning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Listen backlog.
    pub backlog: i32,
    /// Upper bound on how long a poll waits before checking completions.
    pub poll_interval: Duration,
    /// Requests a connection may have submitted but not yet acknowledged.
    pub max_in_flight: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            backlog: 1024,
            poll_interval: Duration::from_millis(1),
            max_in_flight: 64,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("gateway i/o error: {0}")]
    Io(#[from] io::Error),
}

/// A decoded frame waiting for its turn.
#[derive(Debug)]
enum Inbound {
    Request(OrderRequest),
    Malformed { order_id: u32 },
}

/// Per-connection state.
struct Connection {
    stream: TcpStream,
    addr: SocketAddr,
    read_buffer: Box<[u8; READ_BUFFER_SIZE]>,
    read_pos: usize,
    queued: VecDeque<Inbound>,
    /// Submitted requests, oldest first. Acks leave in this order.
    in_flight: VecDeque<(u32, Pending)>,
    write_buffer: Vec<u8>,
    write_pos: usize,
    /// Socket read until `WouldBlock`. With edge-triggered polling, a
    /// connection that stopped early must be read again without an event.
    drained: bool,
    /// Peer finished sending; dropped once everything is answered.
    eof: bool,
    /// Set on a protocol or I/O error; the connection is dropped.
    closing: bool,
}

impl Connection {
    fn new(stream: TcpStream, addr: SocketAddr) -> Self {
        Self {
            stream,
            addr,
            read_buffer: Box::new([0; READ_BUFFER_SIZE]),
            read_pos: 0,
            queued: VecDeque::new(),
            in_flight: VecDeque::new(),
            write_buffer: Vec::with_capacity(READ_BUFFER_SIZE),
            write_pos: 0,
            drained: true,
            eof: false,
            closing: false,
        }
    }

    /// Read and decode until the socket is drained or the queue is full.
    fn fill(&mut self) {
        self.drained = false;
        while !self.eof && !self.closing {
            if self.queued.len() >= MAX_QUEUED {
                return;
            }
            if self.read_pos == READ_BUFFER_SIZE {
                // Frames are at most 48 bytes, so a full buffer holds complete ones
                self.decode_frames();
                continue;
            }
            match self.stream.read(&mut self.read_buffer[self.read_pos..]) {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(n) => self.read_pos += n,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(addr = %self.addr, error = %e, "read failed");
                    self.closing = true;
                    break;
                }
            }
        }
        self.drained = true;
        self.decode_frames();
    }

    /// Split complete frames off the read buffer.
    fn decode_frames(&mut self) {
        let mut consumed = 0;

        while self.read_pos - consumed >= HEADER_SIZE {
            let buffer = &self.read_buffer[consumed..self.read_pos];

            let (msg_type, msg_len) = match MessageParser::validate_message(buffer) {
                Ok(found) => found,
                // Incomplete frame
                Err(ParseError::BufferTooSmall) => break,
                Err(err) => {
                    // Framing is lost; nothing after this can be trusted
                    warn!(addr = %self.addr, error = %err, "bad frame header, closing");
                    self.closing = true;
                    break;
                }
            };

            let frame = &buffer[..msg_len];
            match decode_request(msg_type, frame) {
                Ok(request) => self.queued.push_back(Inbound::Request(request)),
                Err(ParseError::InvalidMessageType) => {
                    warn!(addr = %self.addr, ?msg_type, "unexpected message type, closing");
                    self.closing = true;
                    break;
                }
                Err(err) => {
                    let order_id = frame_order_id(frame);
                    warn!(addr = %self.addr, order_id, error = %err, "malformed frame");
                    self.queued.push_back(Inbound::Malformed { order_id });
                }
            }

            consumed += msg_len;
        }

        // Compact buffer
        if consumed > 0 {
            self.read_buffer.copy_within(consumed..self.read_pos, 0);
            self.read_pos -= consumed;
        }
    }

    /// Move completions to the write buffer and submit queued requests.
    fn pump(&mut self, engine: &EngineHandle, builder: &mut MessageBuilder, max_in_flight: usize) {
        loop {
            // Acks strictly in request order: only the oldest may complete.
            while let Some((order_id, pending)) = self.in_flight.front_mut() {
                let order_id = *order_id;
                match pending.try_ack() {
                    Ok(Some(ack)) => {
                        encode_ack(builder, &mut self.write_buffer, order_id, ack);
                        self.in_flight.pop_front();
                    }
                    Ok(None) => break,
                    Err(err) => {
                        debug!(addr = %self.addr, order_id, error = %err, "request abandoned");
                        self.closing = true;
                        return;
                    }
                }
            }

            if self.in_flight.len() >= max_in_flight {
                return;
            }

            match self.queued.pop_front() {
                None => return,
                Some(Inbound::Malformed { order_id }) if self.in_flight.is_empty() => {
                    encode_ack(builder, &mut self.write_buffer, order_id, Ack::Rejected(RejectReason::Malformed));
                }
                Some(malformed @ Inbound::Malformed { .. }) => {
                    // Wait for earlier requests so acks stay ordered
                    self.queued.push_front(malformed);
                    return;
                }
                Some(Inbound::Request(request)) => match engine.try_submit(request) {
                    Ok(pending) => self.in_flight.push_back((request.order_id.0, pending)),
                    Err(TrySubmitError::Full(request)) => {
                        // Backpressure: retry on the next pass
                        self.queued.push_front(Inbound::Request(request));
                        return;
                    }
                    Err(TrySubmitError::Closed(_)) => {
                        self.closing = true;
                        return;
                    }
                },
            }
        }
    }

    fn flush(&mut self) {
        while self.write_pos < self.write_buffer.len() {
            match self.stream.write(&self.write_buffer[self.write_pos..]) {
                Ok(0) => {
                    self.closing = true;
                    break;
                }
                Ok(n) => self.write_pos += n,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(addr = %self.addr, error = %e, "write failed");
                    self.closing = true;
                    break;
                }
            }
        }

        if self.write_pos == self.write_buffer.len() {
            self.write_pos = 0;
            self.write_buffer.clear();
        }
    }

    fn is_idle(&self) -> bool {
        self.queued.is_empty() && self.in_flight.is_empty()
    }

    fn is_finished(&self) -> bool {
        self.closing || (self.eof && self.is_idle() && self.write_buffer.is_empty())
    }
}

/// Network gateway.
pub struct Gateway {
    poll: Poll,
    listener: TcpListener,
    local_addr: SocketAddr,
    connections: HashMap<Token, Connection>,
    next_token: usize,
    engine: EngineHandle,
    builder: MessageBuilder,
    config: GatewayConfig,
    shutdown: Arc<AtomicBool>,
}

fn listen(addr: SocketAddr, backlog: i32) -> io::Result<std::net::TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;
    Ok(socket.into())
}

impl Gateway {
    /// Create a new gateway bound to the specified address.
    pub fn bind(addr: SocketAddr, engine: EngineHandle, config: GatewayConfig) -> Result<Self, GatewayError> {
        let poll = Poll::new()?;
        let std_listener = listen(addr, config.backlog).map_err(|source| GatewayError::Bind { addr, source })?;
        let local_addr = std_listener.local_addr()?;

        let mut listener = TcpListener::from_std(std_listener);
        poll.registry().register(&mut listener, SERVER, Interest::READABLE)?;

        Ok(Self {
            poll,
            listener,
            local_addr,
            connections: HashMap::with_capacity(MAX_CONNECTIONS),
            next_token: 1,
            engine,
            builder: MessageBuilder::new(),
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Address actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Setting the returned flag makes [`Gateway::run`] return.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Serve until the shutdown flag is set.
    pub fn run(&mut self) -> Result<(), GatewayError> {
        info!(addr = %self.local_addr, "gateway listening");
        let mut events = Events::with_capacity(256);
        while !self.shutdown.load(Ordering::Acquire) {
            self.poll_once(&mut events)?;
        }
        info!(connections = self.connections.len(), "gateway stopped");
        Ok(())
    }

    /// One poll, then progress every connection.
    pub fn poll_once(&mut self, events: &mut Events) -> Result<(), GatewayError> {
        match self.poll.poll(events, Some(self.config.poll_interval)) {
            Ok(()) => {}
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        for event in events.iter() {
            match event.token() {
                SERVER => self.accept_connections()?,
                token => {
                    if event.is_readable() {
                        if let Some(conn) = self.connections.get_mut(&token) {
                            conn.fill();
                        }
                    }
                }
            }
        }

        self.progress();
        Ok(())
    }

    fn accept_connections(&mut self) -> Result<(), GatewayError> {
        loop {
            match self.listener.accept() {
                Ok((mut stream, addr)) => {
                    if self.connections.len() >= MAX_CONNECTIONS {
                        warn!(%addr, "connection limit reached, refusing");
                        continue;
                    }
                    let token = Token(self.next_token);
                    self.next_token += 1;

                    stream.set_nodelay(true)?;
                    self.poll.registry().register(
                        &mut stream,
                        token,
                        Interest::READABLE | Interest::WRITABLE,
                    )?;

                    debug!(%addr, token = token.0, "connection accepted");
                    self.connections.insert(token, Connection::new(stream, addr));
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    fn progress(&mut self) {
        let mut closed = Vec::new();
        for (token, conn) in self.connections.iter_mut() {
            if !conn.drained {
                conn.fill();
            }
            conn.pump(&self.engine, &mut self.builder, self.config.max_in_flight);
            conn.flush();
            if conn.is_finished() {
                closed.push(*token);
            }
        }
        for token in closed {
            self.remove_connection(token);
        }
    }

    fn remove_connection(&mut self, token: Token) {
        if let Some(mut conn) = self.connections.remove(&token) {
            if !conn.is_idle() {
                debug!(addr = %conn.addr, pending = conn.in_flight.len() + conn.queued.len(), "dropping unanswered requests");
            }
            let _ = self.poll.registry().deregister(&mut conn.stream);
            debug!(addr = %conn.addr, "connection closed");
        }
    }
}
