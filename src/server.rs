//! Streams frame records to a single connected listener.
//!
//! The server owns a non-blocking TCP listener and a [`ConnectionSlot`] that holds at most one
//! peer. It runs on its own thread (see [`Server::spawn`]) and pulls records from a
//! [`FrameSubscriber`]. While the slot is occupied, further clients wait in the listen backlog and
//! are accepted once the current listener goes away.

use std::{
    fmt,
    io::{self, BufWriter, ErrorKind, Write},
    net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs},
    panic::resume_unwind,
    str::FromStr,
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{anyhow, bail, Context};
use crossbeam::channel::RecvTimeoutError;
use tungstenite::{protocol::WebSocket, Message};

use crate::{frame::FrameRecord, queue::FrameSubscriber};

/// How often the emitter thread checks for new clients while no frames arrive.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Wire format used towards the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    /// One WebSocket text message per frame.
    #[default]
    WebSocket,
    /// Plain TCP, one newline-terminated JSON document per frame.
    Lines,
}

impl Transport {
    fn scheme(self) -> &'static str {
        match self {
            Transport::WebSocket => "ws",
            Transport::Lines => "tcp",
        }
    }

    /// Performs the transport handshake on a freshly accepted connection.
    pub fn establish(
        self,
        stream: TcpStream,
        addr: SocketAddr,
        timeout: Duration,
    ) -> anyhow::Result<Box<dyn Peer>> {
        // Accepted sockets may inherit the listener's non-blocking mode on some platforms.
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;

        match self {
            Transport::WebSocket => {
                let ws = tungstenite::accept(stream)
                    .map_err(|e| anyhow!("websocket handshake with {addr} failed: {e}"))?;
                Ok(Box::new(WebSocketPeer { ws, addr }))
            }
            Transport::Lines => Ok(Box::new(LinePeer {
                writer: BufWriter::new(stream),
                addr,
            })),
        }
    }
}

impl FromStr for Transport {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ws" | "websocket" => Ok(Transport::WebSocket),
            "lines" | "tcp" => Ok(Transport::Lines),
            _ => bail!("unknown transport '{s}' (expected 'ws' or 'lines')"),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// A connected listener that receives one text message per frame.
pub trait Peer {
    /// Sends one complete message. On error, the peer is considered gone.
    fn send_text(&mut self, text: &str) -> anyhow::Result<()>;

    /// Closes the connection, ignoring errors.
    fn close(&mut self);

    fn addr(&self) -> SocketAddr;
}

/// A peer connected via WebSocket.
pub struct WebSocketPeer {
    ws: WebSocket<TcpStream>,
    addr: SocketAddr,
}

impl Peer for WebSocketPeer {
    fn send_text(&mut self, text: &str) -> anyhow::Result<()> {
        self.ws.send(Message::Text(text.to_string()))?;
        Ok(())
    }

    fn close(&mut self) {
        if self.ws.close(None).is_ok() {
            // Push out the close frame; the peer's reply is not awaited.
            self.ws.flush().ok();
        }
    }

    fn addr(&self) -> SocketAddr {
        self.addr
    }
}

/// A peer connected via plain TCP, receiving newline-delimited JSON.
pub struct LinePeer {
    writer: BufWriter<TcpStream>,
    addr: SocketAddr,
}

impl Peer for LinePeer {
    fn send_text(&mut self, text: &str) -> anyhow::Result<()> {
        self.writer.write_all(text.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    fn close(&mut self) {
        self.writer.flush().ok();
        self.writer
            .get_ref()
            .shutdown(std::net::Shutdown::Both)
            .ok();
    }

    fn addr(&self) -> SocketAddr {
        self.addr
    }
}

/// Outcome of [`ConnectionSlot::deliver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Nobody is connected; the message was discarded.
    NoListener,
    /// Sending failed. The peer has been removed from the slot.
    Disconnected,
}

/// Holds the single listener frames are streamed to.
#[derive(Default)]
pub struct ConnectionSlot {
    peer: Option<Box<dyn Peer>>,
    sent: u64,
}

impl ConnectionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_vacant(&self) -> bool {
        self.peer.is_none()
    }

    #[cfg(test)]
    fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer.as_ref().map(|p| p.addr())
    }

    #[cfg(test)]
    fn sent(&self) -> u64 {
        self.sent
    }

    /// Puts `peer` into the slot.
    ///
    /// If the slot is already occupied, the new peer is handed back unchanged.
    pub fn occupy(&mut self, peer: Box<dyn Peer>) -> Result<(), Box<dyn Peer>> {
        if self.peer.is_some() {
            return Err(peer);
        }
        log::info!("listener {} connected", peer.addr());
        self.peer = Some(peer);
        self.sent = 0;
        Ok(())
    }

    /// Sends `text` to the connected listener.
    pub fn deliver(&mut self, text: &str) -> Delivery {
        let Some(peer) = &mut self.peer else {
            return Delivery::NoListener;
        };
        match peer.send_text(text) {
            Ok(()) => {
                self.sent += 1;
                Delivery::Sent
            }
            Err(e) => {
                log::info!(
                    "listener {} disconnected after {} frames: {e}",
                    peer.addr(),
                    self.sent
                );
                self.peer = None;
                Delivery::Disconnected
            }
        }
    }

    /// Closes and removes the current listener, if any.
    pub fn vacate(&mut self) {
        if let Some(mut peer) = self.peer.take() {
            log::info!("closing listener {}", peer.addr());
            peer.close();
        }
    }
}

/// A bound, not yet running, frame server.
pub struct Server {
    listener: TcpListener,
    transport: Transport,
    io_timeout: Duration,
}

impl Server {
    /// Binds the listening socket.
    pub fn bind<A: ToSocketAddrs + fmt::Debug>(
        addr: A,
        transport: Transport,
        io_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(&addr).with_context(|| format!("failed to bind {addr:?}"))?;
        listener.set_nonblocking(true)?;
        let server = Self {
            listener,
            transport,
            io_timeout,
        };
        log::info!(
            "streaming hand data on {}://{}",
            transport,
            server.local_addr()?
        );
        Ok(server)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Accepts a pending client, if there is one, and performs the transport handshake.
    ///
    /// Failed handshakes are logged and yield `None`.
    pub fn poll_accept(&self) -> Option<Box<dyn Peer>> {
        match self.listener.accept() {
            Ok((stream, addr)) => match self.transport.establish(stream, addr, self.io_timeout) {
                Ok(peer) => Some(peer),
                Err(e) => {
                    log::warn!("{e:#}");
                    None
                }
            },
            Err(e) if e.kind() == ErrorKind::WouldBlock => None,
            Err(e) => {
                log::warn!("failed to accept connection: {e}");
                None
            }
        }
    }

    /// Streams records from `frames` until its publisher is dropped.
    pub fn serve(&self, frames: &FrameSubscriber<FrameRecord>) {
        let mut slot = ConnectionSlot::new();
        loop {
            if slot.is_vacant() {
                if let Some(peer) = self.poll_accept() {
                    // The slot was just checked to be vacant.
                    slot.occupy(peer).ok();
                }
            }

            match frames.recv_timeout(POLL_INTERVAL) {
                Ok(record) => {
                    let text = match serde_json::to_string(&record) {
                        Ok(text) => text,
                        Err(e) => {
                            log::error!("failed to serialize frame record: {e}");
                            continue;
                        }
                    };
                    if slot.deliver(&text) == Delivery::NoListener {
                        log::trace!("no listener connected, discarding frame");
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        slot.vacate();
    }

    /// Moves the server onto a named thread that runs [`Server::serve`].
    pub fn spawn(self, frames: FrameSubscriber<FrameRecord>) -> io::Result<Emitter> {
        let handle = thread::Builder::new()
            .name("frame emitter".into())
            .spawn(move || {
                log::trace!("frame emitter starting");
                self.serve(&frames);
                log::trace!("frame emitter exiting");
            })?;
        Ok(Emitter {
            handle: Some(handle),
        })
    }
}

/// Handle to the emitter thread started by [`Server::spawn`].
///
/// Dropping the handle joins the thread. The thread exits once the [`FramePublisher`] feeding it
/// has been dropped, so drop that first. If the thread panicked, the panic is forwarded to the
/// thread dropping the [`Emitter`].
///
/// [`FramePublisher`]: crate::queue::FramePublisher
pub struct Emitter {
    handle: Option<JoinHandle<()>>,
}

impl Emitter {
    /// Waits for the emitter thread to exit.
    pub fn join(mut self) {
        self.wait_for_exit();
    }

    fn wait_for_exit(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(payload) = handle.join() {
                if !thread::panicking() {
                    resume_unwind(payload);
                }
            }
        }
    }
}

impl Drop for Emitter {
    fn drop(&mut self) {
        self.wait_for_exit();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        net::{Ipv4Addr, SocketAddrV4},
        rc::Rc,
    };

    use super::*;

    #[derive(Default)]
    struct Log {
        sent: Vec<String>,
        closed: bool,
    }

    struct FakePeer {
        log: Rc<RefCell<Log>>,
        fail: bool,
        port: u16,
    }

    impl Peer for FakePeer {
        fn send_text(&mut self, text: &str) -> anyhow::Result<()> {
            if self.fail {
                bail!("broken pipe");
            }
            self.log.borrow_mut().sent.push(text.to_string());
            Ok(())
        }

        fn close(&mut self) {
            self.log.borrow_mut().closed = true;
        }

        fn addr(&self) -> SocketAddr {
            SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, self.port))
        }
    }

    fn fake(port: u16, fail: bool) -> (Box<dyn Peer>, Rc<RefCell<Log>>) {
        let log = Rc::new(RefCell::new(Log::default()));
        let peer = FakePeer {
            log: log.clone(),
            fail,
            port,
        };
        (Box::new(peer), log)
    }

    #[test]
    fn vacant_slot_discards() {
        let mut slot = ConnectionSlot::new();
        assert!(slot.is_vacant());
        assert_eq!(slot.deliver("x"), Delivery::NoListener);
    }

    #[test]
    fn single_occupant() {
        let mut slot = ConnectionSlot::new();
        let (first, first_log) = fake(1, false);
        let (second, _) = fake(2, false);

        slot.occupy(first).ok().unwrap();
        let rejected = slot.occupy(second).err().unwrap();
        assert_eq!(rejected.addr().port(), 2);
        assert_eq!(slot.peer_addr().unwrap().port(), 1);

        assert_eq!(slot.deliver("a"), Delivery::Sent);
        assert_eq!(slot.deliver("b"), Delivery::Sent);
        assert_eq!(slot.sent(), 2);
        assert_eq!(first_log.borrow().sent, ["a", "b"]);

        slot.vacate();
        assert!(slot.is_vacant());
        assert!(first_log.borrow().closed);
    }

    #[test]
    fn failed_send_vacates() {
        let mut slot = ConnectionSlot::new();
        let (broken, _) = fake(1, true);
        slot.occupy(broken).ok().unwrap();
        assert_eq!(slot.deliver("a"), Delivery::Disconnected);
        assert!(slot.is_vacant());

        let (next, next_log) = fake(2, false);
        slot.occupy(next).ok().unwrap();
        assert_eq!(slot.sent(), 0);
        assert_eq!(slot.deliver("b"), Delivery::Sent);
        assert_eq!(next_log.borrow().sent, ["b"]);
    }

    #[test]
    fn parse_transport() {
        assert_eq!("ws".parse::<Transport>().unwrap(), Transport::WebSocket);
        assert_eq!("lines".parse::<Transport>().unwrap(), Transport::Lines);
        assert!("udp".parse::<Transport>().is_err());
        assert_eq!(Transport::default(), Transport::WebSocket);
    }
}
