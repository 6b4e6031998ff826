//! # Comms group: the worker threads carrying one connection session.
//!
//! A [`CommsFactory`] turns a connected socket into a running [`CommsGroup`].
//! [`StreamComms`] is the std implementation: it runs `<ROLE>.RECEIVE` and
//! `<ROLE>.SEND` as members of a [`ThreadGroup`] sharing one [`SessionLink`].
//!
//! ```text
//!                       ┌──────────── SessionLink ────────────┐
//! <ROLE>.RECEIVE ──read─┤ socket      closed: AtomicBool      ├─write── <ROLE>.SEND
//!    EOF/error → close  │             activity: AtomicU64     │   every send_interval
//!    bytes → activity++ └─────────────────────────────────────┘   (when enabled)
//!
//! supervisor: wait(t) / is_closed() / has_recent_activity() / close(t) / cleanup()
//! ```
//!
//! ## Rules
//! - The closed flag only goes from `false` to `true` (atomic swap).
//! - Activity means bytes received from the peer since the previous check;
//!   our own sends never count, so a silent peer still exhausts the health check.
//! - `close` shuts the socket down so a blocked read returns, then stops the group.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::LinkSettings;
use crate::connection::dialer::NetSocket;
use crate::connection::state::Role;
use crate::core::{PollingSleeper, Sleeper, WorkerContext, spawn_worker};
use crate::error::{SessionError, SpawnError, WaitError};
use crate::threads::{ThreadDescriptor, ThreadGroup, Worker, WorkerRef};

/// Read timeout of the receive worker, bounding how long it misses a shutdown.
const RECV_POLL: Duration = Duration::from_millis(100);

/// Filler bytes sent by the send worker.
const TEST_PAYLOAD: &[u8] = b"threadvisor test data\n";

/// A running session, as seen by the connection supervisor.
pub trait CommsGroup: Send {
    /// Waits up to `timeout` for every member to finish.
    fn wait(&self, timeout: Duration) -> Result<(), WaitError>;

    /// `true` once the session was closed (peer gone, I/O error, or `close`).
    fn is_closed(&self) -> bool;

    /// `true` if the session made progress since the previous call.
    fn has_recent_activity(&self) -> bool;

    /// Closes the session and waits up to `timeout` for its members.
    fn close(&self, timeout: Duration) -> Result<(), WaitError>;

    /// Releases the group's bookkeeping.
    fn cleanup(&self);
}

/// Starts a [`CommsGroup`] over a socket of type `S`.
pub trait CommsFactory<S>: Send + Sync {
    /// Group produced by [`spawn`](Self::spawn).
    type Group: CommsGroup;

    /// Starts the session's workers. The socket is dropped (closed) on failure.
    fn spawn(&self, ctx: &WorkerContext, socket: S) -> Result<Self::Group, SessionError>;
}

enum LinkSocket {
    Tcp(TcpStream),
    Udp(UdpSocket),
}

/// Socket and shared flags of one session.
pub struct SessionLink {
    socket: LinkSocket,
    peer: Mutex<Option<SocketAddr>>,
    closed: AtomicBool,
    activity: AtomicU64,
}

impl SessionLink {
    fn new(socket: LinkSocket, peer: Option<SocketAddr>) -> Self {
        Self {
            socket,
            peer: Mutex::new(peer),
            closed: AtomicBool::new(false),
            activity: AtomicU64::new(0),
        }
    }

    /// `true` for TCP sessions.
    pub fn is_stream(&self) -> bool {
        matches!(self.socket, LinkSocket::Tcp(_))
    }

    /// `true` once closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Marks the link closed. Returns `true` for the call that closed it.
    pub fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    /// Records inbound bytes.
    pub fn touch(&self) {
        self.activity.fetch_add(1, Ordering::Relaxed);
    }

    /// Activity counter.
    pub fn activity(&self) -> u64 {
        self.activity.load(Ordering::Relaxed)
    }

    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        match &self.socket {
            LinkSocket::Tcp(stream) => (&*stream).read(buf),
            LinkSocket::Udp(socket) => {
                let (n, from) = socket.recv_from(buf)?;
                self.peer.lock().get_or_insert(from);
                Ok(n)
            }
        }
    }

    /// Sends `data`. Returns `Ok(false)` when a UDP server has no peer yet.
    /// A UDP server with no known peer yet drops the datagram.
    fn send(&self, data: &[u8]) -> io::Result<()> {
        match &self.socket {
            LinkSocket::Tcp(stream) => (&*stream).write_all(data),
            LinkSocket::Udp(socket) => match *self.peer.lock() {
                Some(peer) => socket.send_to(data, peer).map(|_| ()),
                None => Ok(()),
            },
        }
    }

    fn shutdown(&self) {
        if let LinkSocket::Tcp(stream) = &self.socket {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

struct ReceiveWorker {
    link: Arc<SessionLink>,
}

impl Worker for ReceiveWorker {
    fn run(&self, ctx: &WorkerContext) {
        let mut buf = [0u8; 2048];
        while !ctx.is_shutdown() && !self.link.is_closed() {
            match self.link.recv(&mut buf) {
                Ok(0) if self.link.is_stream() => {
                    tracing::debug!("peer closed the connection");
                    self.link.mark_closed();
                }
                Ok(_) => self.link.touch(),
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
                Err(e) => {
                    if self.link.mark_closed() {
                        tracing::debug!(error = %e, "receive failed");
                    }
                }
            }
        }
    }
}

struct SendWorker {
    link: Arc<SessionLink>,
    enabled: bool,
    interval: Duration,
    sleeper: PollingSleeper,
}

impl Worker for SendWorker {
    fn run(&self, ctx: &WorkerContext) {
        while !ctx.is_shutdown() && !self.link.is_closed() {
            if !self.sleeper.sleep(self.interval, ctx.token()) {
                break;
            }
            if !self.enabled {
                continue;
            }
            if let Err(e) = self.link.send(TEST_PAYLOAD) {
                if self.link.mark_closed() {
                    tracing::debug!(error = %e, "send failed");
                }
            }
        }
    }
}

/// std-socket comms group factory.
#[derive(Clone, Debug)]
pub struct StreamComms {
    role: Role,
    send_enabled: bool,
    send_interval: Duration,
    sleeper: PollingSleeper,
}

impl StreamComms {
    /// Creates a factory for `role`.
    ///
    /// Test data is sent only when `link.send_test_data` is set and
    /// `suppress_send` is not.
    pub fn new(role: Role, link: &LinkSettings, suppress_send: bool) -> Self {
        Self {
            role,
            send_enabled: link.send_test_data && !suppress_send,
            send_interval: link.send_interval(),
            sleeper: PollingSleeper::default(),
        }
    }

    /// Whether the send worker transmits data.
    pub fn sends_test_data(&self) -> bool {
        self.send_enabled
    }

    fn add_member(
        &self,
        group: &ThreadGroup,
        ctx: &WorkerContext,
        suffix: &str,
        worker: WorkerRef,
    ) -> Result<(), SessionError> {
        let label = format!("{}.{suffix}", self.role.label());
        let mut desc = ThreadDescriptor::new(label.clone(), worker);
        let member_ctx = ctx.for_worker(label, group.token().clone());
        spawn_worker(&mut desc, member_ctx)?;
        group.add(&desc).map_err(SpawnError::from)?;
        Ok(())
    }
}

impl CommsFactory<NetSocket> for StreamComms {
    type Group = StreamSession;

    fn spawn(&self, ctx: &WorkerContext, socket: NetSocket) -> Result<StreamSession, SessionError> {
        let (socket, peer) = match socket {
            NetSocket::Tcp(stream) => {
                stream.set_read_timeout(Some(RECV_POLL))?;
                (LinkSocket::Tcp(stream), None)
            }
            NetSocket::Udp { socket, peer } => {
                socket.set_read_timeout(Some(RECV_POLL))?;
                (LinkSocket::Udp(socket), peer)
            }
            other => {
                return Err(SessionError::GroupInit {
                    reason: format!("socket not connected: {other:?}"),
                });
            }
        };

        let link = Arc::new(SessionLink::new(socket, peer));
        let group = ThreadGroup::new(ctx.label(), ctx.token());
        let session = StreamSession {
            group,
            link: Arc::clone(&link),
            seen: AtomicU64::new(0),
        };

        let receive = Arc::new(ReceiveWorker {
            link: Arc::clone(&link),
        });
        let send = Arc::new(SendWorker {
            link,
            enabled: self.send_enabled,
            interval: self.send_interval,
            sleeper: self.sleeper,
        });

        let started = self
            .add_member(&session.group, ctx, "RECEIVE", receive)
            .and_then(|()| self.add_member(&session.group, ctx, "SEND", send));
        if let Err(e) = started {
            let _ = session.close(RECV_POLL * 5);
            session.cleanup();
            return Err(e);
        }
        Ok(session)
    }
}

/// Running [`StreamComms`] session.
pub struct StreamSession {
    group: ThreadGroup,
    link: Arc<SessionLink>,
    seen: AtomicU64,
}

impl StreamSession {
    /// Shared link of the session.
    pub fn link(&self) -> &Arc<SessionLink> {
        &self.link
    }

    /// Group running the session's workers.
    pub fn group(&self) -> &ThreadGroup {
        &self.group
    }
}

impl CommsGroup for StreamSession {
    fn wait(&self, timeout: Duration) -> Result<(), WaitError> {
        self.group.wait_all(timeout)
    }

    fn is_closed(&self) -> bool {
        self.link.is_closed()
    }

    fn has_recent_activity(&self) -> bool {
        let now = self.link.activity();
        self.seen.swap(now, Ordering::Relaxed) != now
    }

    fn close(&self, timeout: Duration) -> Result<(), WaitError> {
        self.link.mark_closed();
        self.link.shutdown();
        self.group.terminate_all(timeout)
    }

    fn cleanup(&self) {
        self.group.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::time::Instant;

    use tokio_util::sync::CancellationToken;

    use crate::core::ReadinessGate;
    use crate::events::Bus;

    fn ctx() -> WorkerContext {
        let gate = ReadinessGate::new(Duration::from_secs(5));
        gate.open();
        WorkerContext::new("CLIENT", CancellationToken::new(), gate, Bus::new(64))
    }

    fn tcp_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let client = TcpStream::connect(addr).expect("connect");
        let (server, _) = listener.accept().expect("accept");
        (client, server)
    }

    fn eventually(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_session_runs_send_and_receive_members() {
        let (client, _server) = tcp_pair();
        let comms = StreamComms::new(Role::Client, &LinkSettings::default(), true);
        let session = comms.spawn(&ctx(), NetSocket::Tcp(client)).expect("spawn");

        let mut labels: Vec<_> = session
            .group()
            .members()
            .expect("members")
            .into_iter()
            .map(|m| m.label)
            .collect();
        labels.sort();
        assert_eq!(labels, vec!["CLIENT.RECEIVE", "CLIENT.SEND"]);

        session.close(Duration::from_secs(5)).expect("closed");
        assert!(session.is_closed());
        session.cleanup();
    }

    #[test]
    fn test_inbound_bytes_count_as_activity() {
        let (client, mut server) = tcp_pair();
        let comms = StreamComms::new(Role::Client, &LinkSettings::default(), true);
        let session = comms.spawn(&ctx(), NetSocket::Tcp(client)).expect("spawn");

        assert!(!session.has_recent_activity());
        server.write_all(b"ping").expect("write");
        assert!(eventually(|| session.link().activity() > 0));
        assert!(session.has_recent_activity());
        assert!(!session.has_recent_activity(), "activity is consumed by a check");

        session.close(Duration::from_secs(5)).expect("closed");
    }

    #[test]
    fn test_own_sends_do_not_count_as_activity() {
        let (client, mut server) = tcp_pair();
        let link = LinkSettings {
            send_test_data: true,
            send_interval_ms: 10,
            ..LinkSettings::default()
        };
        let comms = StreamComms::new(Role::Client, &link, false);
        let session = comms.spawn(&ctx(), NetSocket::Tcp(client)).expect("spawn");

        let mut buf = [0u8; 64];
        let n = server.read(&mut buf).expect("peer reads our test data");
        assert!(n > 0);
        std::thread::sleep(Duration::from_millis(50));

        assert_eq!(session.link().activity(), 0);
        assert!(!session.has_recent_activity(), "silent peer shows no activity");
        assert!(!session.is_closed());

        session.close(Duration::from_secs(5)).expect("closed");
    }

    #[test]
    fn test_peer_hangup_closes_session() {
        let (client, server) = tcp_pair();
        let comms = StreamComms::new(Role::Client, &LinkSettings::default(), true);
        let session = comms.spawn(&ctx(), NetSocket::Tcp(client)).expect("spawn");

        drop(server);
        assert!(eventually(|| session.is_closed()));
        session.close(Duration::from_secs(5)).expect("closed");
    }

    #[test]
    fn test_unconnected_socket_is_rejected() {
        let comms = StreamComms::new(Role::Server, &LinkSettings::default(), false);
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let err = comms
            .spawn(&ctx(), NetSocket::Listener(listener))
            .err()
            .expect("rejected");
        assert_eq!(err.as_label(), "session_group_init");
    }

    #[test]
    fn test_send_flags() {
        let link = LinkSettings {
            send_test_data: true,
            ..LinkSettings::default()
        };
        assert!(!StreamComms::new(Role::Client, &link, true).sends_test_data());
        assert!(StreamComms::new(Role::Server, &link, false).sends_test_data());
    }
}
