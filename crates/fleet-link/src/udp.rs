//! UDP transport for `udpin:` and `udpout:` addresses.
//!
//! Reads give up after [`READ_TIMEOUT`] so the reader thread can notice a
//! close even when the vehicle has gone silent, and the socket is released
//! with the session.

use mavlink::common::MavMessage;
use mavlink::error::{MessageReadError, MessageWriteError};
use mavlink::{read_versioned_msg, write_versioned_msg, MavConnection, MavHeader, MavlinkVersion};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub const READ_TIMEOUT: Duration = Duration::from_millis(100);

struct Rx {
    socket: UdpSocket,
    buf: Vec<u8>,
    start: usize,
    end: usize,
}

struct Tx {
    socket: UdpSocket,
    dest: Option<SocketAddr>,
}

pub struct UdpLink {
    rx: Mutex<Rx>,
    tx: Mutex<Tx>,
    /// `udpin`: replies go to whoever sent last.
    server: bool,
    version: MavlinkVersion,
}

impl UdpLink {
    /// `None` when `address` is not a UDP address.
    pub fn open(address: &str) -> io::Result<Option<Self>> {
        if let Some(addr) = address.strip_prefix("udpin:") {
            let socket = UdpSocket::bind(addr)?;
            return Self::new(socket, true, None).map(Some);
        }
        if let Some(addr) = address.strip_prefix("udpout:") {
            let dest = addr.to_socket_addrs()?.next().ok_or_else(|| {
                io::Error::new(io::ErrorKind::AddrNotAvailable, format!("no address for {}", addr))
            })?;
            let local = if dest.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
            return Self::new(UdpSocket::bind(local)?, false, Some(dest)).map(Some);
        }
        Ok(None)
    }

    fn new(socket: UdpSocket, server: bool, dest: Option<SocketAddr>) -> io::Result<Self> {
        socket.set_read_timeout(Some(READ_TIMEOUT))?;
        let rx = Rx { socket: socket.try_clone()?, buf: vec![0; 65536], start: 0, end: 0 };
        Ok(Self {
            rx: Mutex::new(rx),
            tx: Mutex::new(Tx { socket, dest }),
            server,
            version: MavlinkVersion::V2,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.lock_tx().socket.local_addr()
    }

    fn lock_tx(&self) -> MutexGuard<'_, Tx> {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MavConnection<MavMessage> for UdpLink {
    fn recv(&self) -> Result<(MavHeader, MavMessage), MessageReadError> {
        let mut guard = self.rx.lock().unwrap_or_else(PoisonError::into_inner);
        let rx = &mut *guard;
        loop {
            if rx.start >= rx.end {
                // WouldBlock/TimedOut after READ_TIMEOUT
                let (len, src) = rx.socket.recv_from(&mut rx.buf)?;
                rx.start = 0;
                rx.end = len;
                if self.server {
                    self.lock_tx().dest = Some(src);
                }
            }

            let mut window = &rx.buf[rx.start..rx.end];
            let before = window.len();
            let res = read_versioned_msg(&mut window, self.version);
            rx.start += before - window.len();
            if let ok @ Ok(..) = res {
                return ok;
            }
        }
    }

    fn send(&self, header: &MavHeader, data: &MavMessage) -> Result<usize, MessageWriteError> {
        let tx = self.lock_tx();
        // udpin before the first datagram: no peer yet
        let Some(dest) = tx.dest else {
            return Ok(0);
        };
        let mut buf = Vec::new();
        write_versioned_msg(&mut buf, self.version, *header, data)?;
        Ok(tx.socket.send_to(&buf, dest)?)
    }

    fn set_protocol_version(&mut self, version: MavlinkVersion) {
        self.version = version;
    }

    fn get_protocol_version(&self) -> MavlinkVersion {
        self.version
    }
}
