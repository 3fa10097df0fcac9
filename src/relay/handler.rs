//! Blocking relay loop.
//!
//! One connection, one thread: read a line, sleep for the sampled jitter,
//! write the line back. Every I/O failure ends the relay.

use bytes::{Buf, BytesMut};
use std::convert::Infallible;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use tracing::{debug, info, trace};

use super::jitter::{as_millis_f64, Jitter};
use super::parser::{self, Line, ParseResult};

/// Read chunk size
const READ_CHUNK: usize = 4096;

/// Relay lifecycle. There are no transitions out of `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Connecting,
    Relaying,
    Failed,
}

impl std::fmt::Display for RelayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RelayState::Connecting => "connecting",
            RelayState::Relaying => "relaying",
            RelayState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Relay errors. All of them are terminal.
#[derive(Debug)]
pub enum RelayError {
    Resolve(String, io::Error),
    NoAddress(String),
    Connect(String, io::Error),
    Read(io::Error),
    Write(io::Error),
    /// Peer closed the connection; `partial` unterminated bytes were dropped.
    ConnectionClosed { partial: usize },
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayError::Resolve(addr, e) => write!(f, "Failed to resolve '{addr}': {e}"),
            RelayError::NoAddress(addr) => write!(f, "No addresses found for '{addr}'"),
            RelayError::Connect(addr, e) => write!(f, "Failed to connect to '{addr}': {e}"),
            RelayError::Read(e) => write!(f, "Failed to read from connection: {e}"),
            RelayError::Write(e) => write!(f, "Failed to write to connection: {e}"),
            RelayError::ConnectionClosed { partial: 0 } => {
                write!(f, "Connection closed by peer")
            }
            RelayError::ConnectionClosed { partial } => write!(
                f,
                "Connection closed by peer with {partial} unterminated bytes pending"
            ),
        }
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelayError::Resolve(_, e)
            | RelayError::Connect(_, e)
            | RelayError::Read(e)
            | RelayError::Write(e) => Some(e),
            RelayError::NoAddress(_) | RelayError::ConnectionClosed { .. } => None,
        }
    }
}

/// Open the outbound connection, trying each resolved address in turn.
pub fn connect(remote: &str, nodelay: bool) -> Result<TcpStream, RelayError> {
    debug!(state = %RelayState::Connecting, remote, "Connecting");

    let addrs = remote
        .to_socket_addrs()
        .map_err(|e| RelayError::Resolve(remote.to_string(), e))?;

    let mut last_err = None;
    for addr in addrs {
        match connect_addr(addr, nodelay) {
            Ok(stream) => {
                info!(peer = %addr, nodelay, "Connected");
                return Ok(stream);
            }
            Err(e) => {
                debug!(peer = %addr, error = %e, "Connect attempt failed");
                last_err = Some(e);
            }
        }
    }

    debug!(from = %RelayState::Connecting, to = %RelayState::Failed, "State change");
    Err(match last_err {
        Some(e) => RelayError::Connect(remote.to_string(), e),
        None => RelayError::NoAddress(remote.to_string()),
    })
}

/// Create a blocking TCP connection with the requested socket options.
fn connect_addr(addr: SocketAddr, nodelay: bool) -> io::Result<TcpStream> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.connect(&addr.into())?;
    socket.set_nodelay(nodelay)?;

    Ok(socket.into())
}

/// Delayed echo relay over a single stream.
pub struct Relay<S, J> {
    stream: S,
    jitter: J,
    state: RelayState,
    read_buf: BytesMut,
    write_buf: BytesMut,
    forwarded: u64,
}

impl<S: Read + Write, J: Jitter> Relay<S, J> {
    /// Wrap an established connection.
    pub fn new(stream: S, jitter: J) -> Self {
        debug!(from = %RelayState::Connecting, to = %RelayState::Relaying, "State change");
        Relay {
            stream,
            jitter,
            state: RelayState::Relaying,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            write_buf: BytesMut::with_capacity(READ_CHUNK),
            forwarded: 0,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Number of lines echoed so far.
    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }

    /// Relay until the connection fails. Never returns `Ok`.
    pub fn run(&mut self) -> Result<Infallible, RelayError> {
        loop {
            self.step()?;
        }
    }

    /// Process exactly one line.
    ///
    /// Returns the delay applied, or `None` when the line was blank and
    /// nothing was sent.
    pub fn step(&mut self) -> Result<Option<std::time::Duration>, RelayError> {
        match self.try_step() {
            Ok(delay) => Ok(delay),
            Err(e) => {
                if self.state != RelayState::Failed {
                    debug!(from = %self.state, to = %RelayState::Failed, error = %e, "State change");
                    self.state = RelayState::Failed;
                }
                Err(e)
            }
        }
    }

    fn try_step(&mut self) -> Result<Option<std::time::Duration>, RelayError> {
        let consumed = loop {
            match parser::parse(&self.read_buf) {
                ParseResult::Complete(line, consumed) => {
                    let content = match line {
                        Line::Echo(content) => content,
                        Line::Blank => {
                            trace!(len = consumed, "Skipping blank line");
                            self.read_buf.advance(consumed);
                            return Ok(None);
                        }
                    };
                    debug!(len = content.len(), data = %parser::escape(content), "Received line");
                    parser::response_echo(content, &mut self.write_buf);
                    break consumed;
                }
                ParseResult::Incomplete => self.fill()?,
            }
        };
        self.read_buf.advance(consumed);

        let delay = self.jitter.next_delay();
        info!("Delaying for {:.2} ms", as_millis_f64(delay));
        std::thread::sleep(delay);

        self.stream
            .write_all(&self.write_buf)
            .and_then(|()| self.stream.flush())
            .map_err(RelayError::Write)?;
        debug!(len = self.write_buf.len(), data = %parser::escape(&self.write_buf), "Sent line");

        self.forwarded += 1;
        Ok(Some(delay))
    }

    /// Read more bytes from the stream into the read buffer.
    fn fill(&mut self) -> Result<(), RelayError> {
        let start = self.read_buf.len();
        self.read_buf.resize(start + READ_CHUNK, 0);

        let result = loop {
            match self.stream.read(&mut self.read_buf[start..]) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => break other,
            }
        };

        match result {
            Ok(0) => {
                self.read_buf.truncate(start);
                trace!("Connection closed by peer");
                Err(RelayError::ConnectionClosed { partial: start })
            }
            Ok(n) => {
                self.read_buf.truncate(start + n);
                Ok(())
            }
            Err(e) => {
                self.read_buf.truncate(start);
                Err(RelayError::Read(e))
            }
        }
    }
}
