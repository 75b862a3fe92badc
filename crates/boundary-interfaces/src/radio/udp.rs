//! UDP datagram driver, for a host-side modem bridge or a simulated medium.

use std::io;
use std::net::{IpAddr, SocketAddr};

use tokio::net::UdpSocket;
use tracing::debug;

use super::RadioDriver;

pub struct UdpRadioDriver {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpRadioDriver {
    /// Bind `bind` and send every datagram to `target`. Broadcast is enabled
    /// when `target` is an IPv4 broadcast address.
    pub async fn bind(bind: SocketAddr, target: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(bind).await?;
        if let IpAddr::V4(ip) = target.ip()
            && ip.is_broadcast()
        {
            socket.set_broadcast(true)?;
        }
        debug!("radio driver bound to {}, sending to {}", socket.local_addr()?, target);
        Ok(Self { socket, target })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl RadioDriver for UdpRadioDriver {
    async fn send(&self, datagram: &[u8]) -> io::Result<()> {
        self.socket.send_to(datagram, self.target).await?;
        Ok(())
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let (n, _from) = self.socket.recv_from(buf).await?;
        Ok(n)
    }
}
