//! Datagram transport - connected UDP socket owned by the foreground

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

use socket2::SockRef;
use tracing::{debug, instrument};

use crate::error::DispatchError;

/// Something that can send one whole datagram, blocking until writable.
///
/// Implementations report a writability timeout as `WouldBlock` or
/// `TimedOut`, like a blocking socket with a write timeout does.
pub trait DatagramTransport: Send + Sync + 'static {
    fn send_datagram(&self, payload: &[u8]) -> io::Result<usize>;
}

impl DatagramTransport for UdpSocket {
    fn send_datagram(&self, payload: &[u8]) -> io::Result<usize> {
        self.send(payload)
    }
}

/// Connected OSC socket
///
/// The dispatch thread gets a shared reference for writing; only the owner
/// closes it, through [`OscSocket::disconnect`].
#[derive(Debug)]
pub struct OscSocket {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    write_timeout: Duration,
}

impl OscSocket {
    /// Resolve `host`, bind a local socket and connect it to the peer
    #[instrument(name = "osc_socket_connect", skip(write_timeout))]
    pub fn connect(host: &str, port: u16, write_timeout: Duration) -> Result<Self, DispatchError> {
        let peer = resolve(host, port)?;

        let local: SocketAddr = if peer.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket =
            UdpSocket::bind(local).map_err(|e| DispatchError::connect(host, port, e))?;
        socket
            .set_write_timeout(Some(write_timeout))
            .map_err(|e| DispatchError::connect(host, port, e))?;
        socket
            .connect(peer)
            .map_err(|e| DispatchError::connect(host, port, e))?;

        debug!(
            %peer,
            local = ?socket.local_addr().ok(),
            ?write_timeout,
            "OSC socket connected"
        );

        Ok(Self {
            socket: Arc::new(socket),
            peer,
            write_timeout,
        })
    }

    /// Remote endpoint
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Writability ceiling configured on the socket
    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// Shared handle for a dispatch thread
    pub(crate) fn shared(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }

    /// Shut down the write direction, then close the socket.
    ///
    /// Fails with [`DispatchError::SocketInUse`] while a dispatch thread
    /// still holds it; shut the dispatcher down first.
    #[instrument(name = "osc_socket_disconnect", skip(self), fields(peer = %self.peer))]
    pub fn disconnect(self) -> Result<(), DispatchError> {
        let socket = Arc::try_unwrap(self.socket).map_err(|_| DispatchError::SocketInUse)?;
        let half_closed = shutdown_write(&socket);
        drop(socket);
        debug!(half_closed = half_closed.is_ok(), "OSC socket closed");
        half_closed.map_err(DispatchError::Disconnect)
    }
}

/// Half-close a connected datagram socket; a peer-less socket has nothing to shut
fn shutdown_write(socket: &UdpSocket) -> io::Result<()> {
    match SockRef::from(socket).shutdown(Shutdown::Write) {
        Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
        other => other,
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, DispatchError> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| DispatchError::resolve(host, port, e.to_string()))?
        .collect();

    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| DispatchError::resolve(host, port, "no addresses found"))
}
