//! Byte-stream connections to the IPMB MUX.
//!
//! The MUX is a local TCP proxy that multiplexes IPMB traffic. A peer
//! registers as either a client (short-lived request/response exchanges) or
//! the responder (a persistent connection that receives unsolicited traffic).
//! After registration, every `send` and `recv` carries exactly one IPMB frame.

use std::{
    io::{self, Read, Write},
    net::{IpAddr, Ipv4Addr, Shutdown, SocketAddr, TcpStream},
    time::Duration,
};

use super::message::MAX_FRAME_LEN;

#[derive(Debug)]
pub enum MuxError {
    /// Nothing arrived within the read window.
    TimedOut,
    /// The peer closed the connection.
    Closed,
    /// The MUX refused the registration; carries its answer.
    Rejected(Vec<u8>),
    Io(io::Error),
}

impl MuxError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut)
    }
}

impl From<io::Error> for MuxError {
    fn from(value: io::Error) -> Self {
        match value.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Self::TimedOut,
            _ => Self::Io(value),
        }
    }
}

/// The registration role of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Client,
    Responder,
}

impl Role {
    fn registration_byte(&self) -> u8 {
        match self {
            Role::Client => b'C',
            Role::Responder => b'R',
        }
    }
}

/// One open, registered connection to the MUX.
pub trait MuxConnection: Send {
    fn send(&mut self, buffer: &[u8]) -> Result<(), MuxError>;

    /// Receive one frame of at most `max_len` bytes.
    ///
    /// An empty buffer means no data was read and is not an error.
    fn recv(&mut self, max_len: usize) -> Result<Vec<u8>, MuxError>;

    fn close(&mut self);
}

/// Opens [`MuxConnection`]s.
pub trait Connector: Send + Sync {
    type Connection: MuxConnection + 'static;

    fn connect(&self, port: u16, role: Role) -> Result<Self::Connection, MuxError>;
}

/// Opens TCP connections to a MUX listening on `address`.
#[derive(Clone, Debug)]
pub struct TcpConnector {
    address: IpAddr,
    client_timeout: Duration,
    responder_timeout: Duration,
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::LOCALHOST), Duration::from_secs(2))
    }
}

impl TcpConnector {
    /// Create a new connector. `timeout` bounds connecting, registering and every read.
    pub fn new(address: IpAddr, timeout: Duration) -> Self {
        Self {
            address,
            client_timeout: timeout,
            responder_timeout: timeout,
        }
    }

    /// Use a different read window for [`Role::Responder`] connections.
    pub fn with_responder_timeout(self, responder_timeout: Duration) -> Self {
        Self {
            responder_timeout,
            ..self
        }
    }

    fn timeout(&self, role: Role) -> Duration {
        match role {
            Role::Client => self.client_timeout,
            Role::Responder => self.responder_timeout,
        }
    }
}

impl Connector for TcpConnector {
    type Connection = TcpMux;

    fn connect(&self, port: u16, role: Role) -> Result<TcpMux, MuxError> {
        let address = SocketAddr::new(self.address, port);
        let timeout = self.timeout(role);
        log::trace!("Connecting to MUX at {address} as {role:?}");

        let stream = TcpStream::connect_timeout(&address, timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;

        let mut mux = TcpMux {
            stream: Some(stream),
        };

        if let Err(e) = mux.register(role) {
            mux.close();
            return Err(e);
        }

        Ok(mux)
    }
}

/// A registered TCP connection to the MUX.
#[derive(Debug)]
pub struct TcpMux {
    stream: Option<TcpStream>,
}

impl TcpMux {
    const ACK: &'static [u8] = b"OK";

    fn stream(&mut self) -> Result<&mut TcpStream, MuxError> {
        self.stream.as_mut().ok_or(MuxError::Closed)
    }

    fn register(&mut self, role: Role) -> Result<(), MuxError> {
        self.send(&[role.registration_byte()])?;

        let mut answer = [0u8; 3];
        let read = self.stream()?.read(&mut answer)?;

        if read == 0 {
            return Err(MuxError::Closed);
        }

        let answer = &answer[..read];
        if answer.starts_with(Self::ACK) {
            Ok(())
        } else {
            Err(MuxError::Rejected(answer.to_vec()))
        }
    }
}

impl MuxConnection for TcpMux {
    fn send(&mut self, buffer: &[u8]) -> Result<(), MuxError> {
        let stream = self.stream()?;
        stream.write_all(buffer)?;
        stream.flush()?;
        Ok(())
    }

    fn recv(&mut self, max_len: usize) -> Result<Vec<u8>, MuxError> {
        let mut buffer = vec![0u8; max_len.min(MAX_FRAME_LEN)];

        let read = self.stream()?.read(&mut buffer)?;
        if read == 0 {
            return Err(MuxError::Closed);
        }

        buffer.truncate(read);
        Ok(buffer)
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.shutdown(Shutdown::Both).ok();
        }
    }
}

impl Drop for TcpMux {
    fn drop(&mut self) {
        self.close();
    }
}
