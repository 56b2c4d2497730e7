pub(crate) mod handle;

#[cfg(test)]
pub(crate) mod socket_mock;
#[cfg(test)]
mod handle_test;

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use socket2::SockAddr;
use tokio::net::UdpSocket;

use crate::error::*;

pub(crate) const INBOUND_BUFFER_SIZE: usize = 65535;

/// AddressFamily selects the kind of UDP socket used to reach an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }

    /// Classifies an address by its syntax: a dotted quad is v4 and
    /// anything else is treated as v6.
    pub fn from_literal(addr: &str) -> Self {
        if addr.parse::<Ipv4Addr>().is_ok() {
            AddressFamily::V4
        } else {
            AddressFamily::V6
        }
    }

    fn unspecified(&self) -> SocketAddr {
        match self {
            AddressFamily::V4 => SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0),
            AddressFamily::V6 => SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), 0),
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AddressFamily::V4 => "udp4",
            AddressFamily::V6 => "udp6",
        };
        write!(f, "{s}")
    }
}

/// DatagramSocket is the UDP endpoint a browser request goes out on.
///
/// `close` must be idempotent; it releases the endpoint and makes any
/// further `send_to`/`recv` fail.
#[async_trait]
pub trait DatagramSocket {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize>;
    async fn recv(&self, buf: &mut [u8]) -> Result<usize>;
    fn close(&self) -> Result<()>;
}

/// SocketFactory creates one socket per candidate address.
pub trait SocketFactory {
    fn create(&self, family: AddressFamily) -> Result<Arc<dyn DatagramSocket + Send + Sync>>;
}

/// UdpSocketFactory binds an ephemeral OS socket of the requested family.
/// It must be used from within a tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct UdpSocketFactory;

impl SocketFactory for UdpSocketFactory {
    fn create(&self, family: AddressFamily) -> Result<Arc<dyn DatagramSocket + Send + Sync>> {
        let domain = match family {
            AddressFamily::V4 => socket2::Domain::IPV4,
            AddressFamily::V6 => socket2::Domain::IPV6,
        };
        let socket = socket2::Socket::new(
            domain,
            socket2::Type::DGRAM,
            Some(socket2::Protocol::UDP),
        )?;

        if family == AddressFamily::V6 {
            socket.set_only_v6(true)?;
        }
        socket.set_nonblocking(true)?;
        socket.bind(&SockAddr::from(family.unspecified()))?;

        let socket = UdpSocket::from_std(socket.into())?;
        log::trace!("created {} socket on {:?}", family, socket.local_addr());

        Ok(Arc::new(UdpConn {
            socket,
            closed: AtomicBool::new(false),
        }))
    }
}

/// UdpConn is a [`DatagramSocket`] over a tokio socket. The OS handle is
/// released once the last reference is dropped.
pub struct UdpConn {
    socket: UdpSocket,
    closed: AtomicBool,
}

#[async_trait]
impl DatagramSocket for UdpConn {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ErrSocketClosed);
        }
        Ok(self.socket.send_to(buf, target).await?)
    }

    async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ErrSocketClosed);
        }
        Ok(self.socket.recv(buf).await?)
    }

    fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            log::trace!("closing socket {:?}", self.socket.local_addr());
        }
        Ok(())
    }
}
