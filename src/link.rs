//! Datagram session with the server's coach port.
//!
//! The server terminates every message with a NUL byte and may pack several messages in one
//! datagram or split one across several, so received bytes are accumulated in a buffer and
//! handed out one NUL-terminated message at a time. Any remainder stays buffered for the next
//! call.
//!
//! The trainer talks to the server through the [`Channel`] trait so the whole main loop can be
//! driven by a scripted channel in tests; [`ServerLink`] is the UDP implementation.

use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, instrument, trace, warn};

use crate::error::{Result, TrainerError};
use crate::message::Command;

/// How many empty receive attempts may be retried before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryBudget {
    /// At most this many retries after the first attempt
    Limited(u32),
    /// Retry forever
    Unbounded,
}

impl RetryBudget {
    /// A single attempt, no retry
    pub const NONE: RetryBudget = RetryBudget::Limited(0);

    /// `None` means unbounded
    pub fn from_option(retries: Option<u32>) -> RetryBudget {
        retries.map_or(RetryBudget::Unbounded, RetryBudget::Limited)
    }
}

/// Reply expected from the server after `(init ...)`.
pub const INIT_OK: &str = "(init ok)";

/// Message transport to the server.
pub trait Channel {
    /// Sends one message (the implementation adds the framing)
    fn send(&mut self, msg: &str) -> Result<()>;

    /// Returns the next message, trimmed, waiting up to the retry budget.
    ///
    /// # Errors
    /// [`TrainerError::Timeout`] once the budget is spent without a complete message.
    fn receive(&mut self, budget: RetryBudget) -> Result<String>;

    /// Closes the session. Idempotent.
    fn close(&mut self);

    /// Sends a [`Command`]
    fn send_command(&mut self, command: &Command) -> Result<()> {
        self.send(&command.to_string())
    }

    /// Coach handshake: `(init (version 8.0))`, expect `(init ok)`, then `(ear on)`.
    ///
    /// `budget` bounds how long the acknowledgement may take.
    ///
    /// # Errors
    /// [`TrainerError::Handshake`] if the first reply is anything else.
    fn handshake(&mut self, budget: RetryBudget) -> Result<()> {
        self.send_command(&Command::Init)?;
        let reply = self.receive(budget)?;
        if reply != INIT_OK {
            return Err(TrainerError::Handshake {
                expected: INIT_OK.to_string(),
                received: reply,
            });
        }
        self.send_command(&Command::EarOn)
    }
}

/// Receive timing of a [`ServerLink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTimings {
    /// Blocking deadline of one receive attempt
    pub receive_timeout: Duration,
    /// Pause after an empty attempt before retrying
    pub retry_pause: Duration,
}

impl Default for LinkTimings {
    fn default() -> Self {
        LinkTimings {
            receive_timeout: Duration::from_secs(5),
            retry_pause: Duration::from_millis(300),
        }
    }
}

/// UDP session with the coach port.
#[derive(Debug)]
pub struct ServerLink {
    socket: Option<UdpSocket>,
    server: SocketAddr,
    pending: Vec<u8>,
    timings: LinkTimings,
}

impl ServerLink {
    const DATAGRAM_SIZE: usize = 8192;

    /// Opens a local socket aimed at `address`.
    ///
    /// Nothing is sent yet; see [`Channel::handshake`].
    #[instrument(skip(address))]
    pub fn connect(address: impl ToSocketAddrs, timings: LinkTimings) -> Result<ServerLink> {
        let server = address.to_socket_addrs()?.next().ok_or_else(|| {
            TrainerError::Io(std::io::Error::new(
                ErrorKind::AddrNotAvailable,
                "server address did not resolve",
            ))
        })?;
        let local: SocketAddr = if server.is_ipv4() {
            ([0u8; 4], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local)?;
        socket.set_read_timeout(Some(timings.receive_timeout))?;
        info!(%server, local = %socket.local_addr()?, "coach link opened");
        Ok(ServerLink {
            socket: Some(socket),
            server,
            pending: Vec::new(),
            timings,
        })
    }

    /// Address the next message will be sent to.
    ///
    /// The server answers from a port dedicated to this client, so it changes after the first reply.
    pub fn server_addr(&self) -> SocketAddr {
        self.server
    }

    fn socket(&self) -> Result<&UdpSocket> {
        self.socket.as_ref().ok_or_else(|| {
            TrainerError::Io(std::io::Error::new(
                ErrorKind::NotConnected,
                "link is closed",
            ))
        })
    }

    fn take_buffered(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&b| b == 0)?;
        let rest = self.pending.split_off(end + 1);
        let mut msg = std::mem::replace(&mut self.pending, rest);
        msg.pop();
        Some(String::from_utf8_lossy(&msg).trim().to_string())
    }
}

impl Channel for ServerLink {
    fn send(&mut self, msg: &str) -> Result<()> {
        trace!(%msg, "send");
        let mut bytes = Vec::with_capacity(msg.len() + 1);
        bytes.extend_from_slice(msg.as_bytes());
        bytes.push(0);
        let server = self.server;
        self.socket()?.send_to(&bytes, server)?;
        Ok(())
    }

    fn receive(&mut self, budget: RetryBudget) -> Result<String> {
        let mut remaining = budget;
        let mut spent = 0;
        let mut buf = [0u8; Self::DATAGRAM_SIZE];
        loop {
            if let Some(msg) = self.take_buffered() {
                trace!(%msg, "recv");
                return Ok(msg);
            }
            let outcome = self.socket()?.recv_from(&mut buf);
            let received = match outcome {
                Ok((n, from)) => {
                    self.pending.extend_from_slice(&buf[..n]);
                    if n > 0 && from != self.server {
                        debug!(%from, "server answered from a new address");
                        self.server = from;
                    }
                    n
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => 0,
                Err(e) => return Err(e.into()),
            };
            if received > 0 {
                continue;
            }
            match remaining {
                RetryBudget::Limited(0) => return Err(TrainerError::Timeout { retries: spent }),
                RetryBudget::Limited(n) => remaining = RetryBudget::Limited(n - 1),
                RetryBudget::Unbounded => {}
            }
            spent += 1;
            warn!(retry = spent, "waiting for message");
            thread::sleep(self.timings.retry_pause);
        }
    }

    fn close(&mut self) {
        if self.socket.take().is_some() {
            info!("coach link closed");
        }
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn fast() -> LinkTimings {
        LinkTimings {
            receive_timeout: Duration::from_millis(30),
            retry_pause: Duration::from_millis(5),
        }
    }

    /// A bound socket standing in for the server, plus a link aimed at it.
    fn pair() -> (UdpSocket, ServerLink) {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let link = ServerLink::connect(server.local_addr().unwrap(), fast()).unwrap();
        (server, link)
    }

    #[test]
    fn unreachable_server_times_out_after_exact_retry_count() {
        let (_server, mut link) = pair();
        let start = Instant::now();
        let err = link.receive(RetryBudget::Limited(2)).unwrap_err();
        assert!(matches!(err, TrainerError::Timeout { retries: 2 }), "{err:?}");
        assert!(start.elapsed() >= Duration::from_millis(3 * 30));

        let err = link.receive(RetryBudget::NONE).unwrap_err();
        assert!(matches!(err, TrainerError::Timeout { retries: 0 }));
    }

    #[test]
    fn splits_on_nul_and_keeps_remainder() {
        let (server, mut link) = pair();
        link.send("(look)").unwrap();
        let mut buf = [0u8; 64];
        let (n, client) = server.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"(look)\0");

        server.send_to(b"(ok look 1)\0(ok mo", client).unwrap();
        server.send_to(b"ve)\0", client).unwrap();
        assert_eq!(link.receive(RetryBudget::NONE).unwrap(), "(ok look 1)");
        assert_eq!(link.receive(RetryBudget::Limited(3)).unwrap(), "(ok move)");
    }

    #[test]
    fn handshake_follows_server_port() {
        let (server, mut link) = pair();
        let dedicated = UdpSocket::bind("127.0.0.1:0").unwrap();
        let handle = thread::spawn(move || {
            let mut buf = [0u8; 64];
            let (n, client) = server.recv_from(&mut buf).unwrap();
            assert_eq!(&buf[..n], b"(init (version 8.0))\0");
            dedicated.send_to(b"(init ok)\0", client).unwrap();
            let (n, _) = dedicated.recv_from(&mut buf).unwrap();
            assert_eq!(&buf[..n], b"(ear on)\0");
            dedicated.local_addr().unwrap()
        });
        link.handshake(RetryBudget::Limited(20)).unwrap();
        let dedicated_addr = handle.join().unwrap();
        assert_eq!(link.server_addr(), dedicated_addr);
    }

    #[test]
    fn handshake_rejects_wrong_reply() {
        let (server, mut link) = pair();
        let handle = thread::spawn(move || {
            let mut buf = [0u8; 64];
            let (_, client) = server.recv_from(&mut buf).unwrap();
            server.send_to(b"(error no_such_command)\0", client).unwrap();
        });
        let err = link.handshake(RetryBudget::Limited(20)).unwrap_err();
        handle.join().unwrap();
        assert!(err.is_protocol_error());
    }

    #[test]
    fn closed_link_refuses_traffic() {
        let (_server, mut link) = pair();
        link.close();
        link.close();
        assert!(link.send("(look)").is_err());
        assert!(link.receive(RetryBudget::NONE).is_err());
    }
}
