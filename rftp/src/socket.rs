//! Datagram transport abstraction.
//!
//! [`Transport`] is the seam between the protocol engine and the network:
//! the sessions and the ARQ engine only ever call `send_to` / `recv_from`.
//! [`Socket`] is the production implementation, a thin wrapper around
//! `tokio::net::UdpSocket`; [`crate::simulator::Simulator`] wraps any
//! transport with fault injection for tests.
//!
//! Deadlines are not part of this trait.  Callers bound a receive with
//! `tokio::time::timeout`, which is safe because `UdpSocket::recv_from` is
//! cancel-safe.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::message::Envelope;

/// A connectionless, unreliable datagram channel.
pub trait Transport {
    /// Send `bytes` as one datagram to `dest`, returning the bytes written.
    fn send_to(
        &self,
        bytes: &[u8],
        dest: SocketAddr,
    ) -> impl Future<Output = io::Result<usize>> + Send;

    /// Wait for the next datagram, copying it into `buf`.
    ///
    /// Returns `(length, source)`.  Datagrams larger than `buf` are truncated.
    fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send;
}

/// Receive one datagram into a fresh [`Envelope`].
pub async fn recv_envelope<T: Transport>(transport: &T) -> io::Result<(Envelope, SocketAddr)> {
    let mut env = Envelope::new();
    let (n, from) = transport.recv_from(env.recv_buffer()).await?;
    env.set_len(n);
    Ok((env, from))
}

// ---------------------------------------------------------------------------
// Socket
// ---------------------------------------------------------------------------

/// An async UDP socket.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing `0.0.0.0:0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> io::Result<Self> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self { local_addr, inner })
    }

    /// Bind an ephemeral port on the unspecified address of `peer`'s family.
    pub async fn bind_for(peer: SocketAddr) -> io::Result<Self> {
        let any: SocketAddr = if peer.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        Self::bind(any).await
    }
}

impl Transport for Socket {
    async fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> io::Result<usize> {
        self.inner.send_to(bytes, dest).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.inner.recv_from(buf).await
    }
}

impl<T: Transport + Sync> Transport for &T {
    async fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> io::Result<usize> {
        (**self).send_to(bytes, dest).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        (**self).recv_from(buf).await
    }
}
