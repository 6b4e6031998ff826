//! # Socket setup and time-bounded connect.
//!
//! [`Dialer`] is the seam between the connection supervisor and the platform
//! sockets. [`NetDialer`] is the std implementation:
//!
//! | role   | transport | `setup`                         | `connect`                          |
//! |--------|-----------|---------------------------------|------------------------------------|
//! | client | TCP       | resolve → `Pending(addr)`       | `connect_timeout` → `Tcp`          |
//! | client | UDP       | bind ephemeral + `connect(addr)`| not used                           |
//! | server | TCP       | bind listener → `Listener`      | accept within timeout → `Tcp`      |
//! | server | UDP       | bind → `Udp { peer: None }`     | not used                           |
//!
//! A server keeps its listener bound for the dialer's lifetime: `close` and a
//! successful accept park it, and the next `setup` takes it back, so peers
//! dialing in between accept windows wait in the backlog instead of being
//! refused.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::Endpoint;
use crate::connection::state::Role;

/// Accept poll interval while waiting for an inbound peer.
const ACCEPT_POLL: Duration = Duration::from_millis(20);

/// Socket setup and connect primitives used by the dial loop.
pub trait Dialer: Send + Sync {
    /// Socket produced by [`setup`](Self::setup).
    type Socket: Send + 'static;

    /// Human-readable target (`tcp://host:port`).
    fn target(&self) -> String;

    /// `true` when a time-bounded [`connect`](Self::connect) must follow setup.
    fn is_stream(&self) -> bool;

    /// Creates the socket.
    fn setup(&self) -> io::Result<Self::Socket>;

    /// Completes a stream connection within `timeout`.
    fn connect(&self, socket: &mut Self::Socket, timeout: Duration) -> io::Result<()>;

    /// Closes a socket that will not be used.
    fn close(&self, socket: Self::Socket) {
        drop(socket);
    }

    /// `true` when a failed connect only means no peer has dialed in yet.
    ///
    /// The dial loop retries such attempts at once, without backoff.
    fn awaits_peer(&self, _err: &io::Error) -> bool {
        false
    }
}

/// Socket in one of the shapes [`NetDialer`] produces.
#[derive(Debug)]
pub enum NetSocket {
    /// Resolved TCP target, not connected yet.
    Pending(SocketAddr),
    /// Bound TCP listener waiting for a peer.
    Listener(TcpListener),
    /// Connected TCP stream.
    Tcp(TcpStream),
    /// UDP socket; `peer` is known for clients and learned on first receive for servers.
    Udp {
        /// The socket.
        socket: UdpSocket,
        /// Remote address, if known.
        peer: Option<SocketAddr>,
    },
}

/// std-based [`Dialer`] for one role and endpoint.
#[derive(Debug)]
pub struct NetDialer {
    role: Role,
    endpoint: Endpoint,
    listener: Mutex<Option<TcpListener>>,
}

impl NetDialer {
    /// Creates a dialer. For [`Role::Server`] the endpoint is the local bind address.
    pub fn new(role: Role, endpoint: Endpoint) -> Self {
        Self {
            role,
            endpoint,
            listener: Mutex::new(None),
        }
    }

    /// Local address of the parked listener, if one is bound.
    pub fn listening_on(&self) -> Option<SocketAddr> {
        self.listener
            .lock()
            .as_ref()
            .and_then(|l| l.local_addr().ok())
    }

    fn park(&self, listener: TcpListener) {
        *self.listener.lock() = Some(listener);
    }

    fn resolve(&self) -> io::Result<SocketAddr> {
        (self.endpoint.host.as_str(), self.endpoint.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    format!("no address for {}", self.endpoint.host),
                )
            })
    }
}

impl Dialer for NetDialer {
    type Socket = NetSocket;

    fn target(&self) -> String {
        self.endpoint.to_string()
    }

    fn is_stream(&self) -> bool {
        self.endpoint.is_tcp
    }

    fn setup(&self) -> io::Result<NetSocket> {
        if let Some(listener) = self.listener.lock().take() {
            return Ok(NetSocket::Listener(listener));
        }
        let addr = self.resolve()?;
        match (self.role, self.endpoint.is_tcp) {
            (Role::Client, true) => Ok(NetSocket::Pending(addr)),
            (Role::Client, false) => {
                let local = if addr.is_ipv4() {
                    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
                } else {
                    SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
                };
                let socket = UdpSocket::bind(local)?;
                socket.connect(addr)?;
                Ok(NetSocket::Udp {
                    socket,
                    peer: Some(addr),
                })
            }
            (Role::Server, true) => Ok(NetSocket::Listener(TcpListener::bind(addr)?)),
            (Role::Server, false) => Ok(NetSocket::Udp {
                socket: UdpSocket::bind(addr)?,
                peer: None,
            }),
        }
    }

    fn connect(&self, socket: &mut NetSocket, timeout: Duration) -> io::Result<()> {
        let timeout = timeout.max(Duration::from_millis(1));
        let stream = match socket {
            NetSocket::Pending(addr) => TcpStream::connect_timeout(addr, timeout)?,
            NetSocket::Listener(listener) => accept_within(listener, timeout)?,
            NetSocket::Tcp(_) | NetSocket::Udp { .. } => return Ok(()),
        };
        if let NetSocket::Listener(listener) = std::mem::replace(socket, NetSocket::Tcp(stream)) {
            self.park(listener);
        }
        Ok(())
    }

    fn close(&self, socket: NetSocket) {
        if let NetSocket::Listener(listener) = socket {
            self.park(listener);
        }
    }

    fn awaits_peer(&self, err: &io::Error) -> bool {
        self.role == Role::Server && self.endpoint.is_tcp && err.kind() == io::ErrorKind::TimedOut
    }
}

fn accept_within(listener: &TcpListener, timeout: Duration) -> io::Result<TcpStream> {
    listener.set_nonblocking(true)?;
    let deadline = Instant::now() + timeout;
    loop {
        match listener.accept() {
            Ok((stream, _peer)) => {
                stream.set_nonblocking(false)?;
                return Ok(stream);
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "no inbound connection",
                    ));
                }
                std::thread::sleep(ACCEPT_POLL);
            }
            Err(e) => return Err(e),
        }
    }
}
