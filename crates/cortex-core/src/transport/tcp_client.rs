//! TCP client transport (§4.2): `TCP_NODELAY`, `SO_KEEPALIVE`, and the
//! platform's SIGPIPE protection, with `poll`-based receive timeouts.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::os::fd::AsRawFd;
use std::time::Duration;

use crate::error::TransportError;

use super::Transport;

/// A connected TCP transport, hardened the way an adapter-facing socket
/// must be to survive a flaky link without surprising the caller with a
/// `SIGPIPE`-induced process death.
pub struct TcpClientTransport {
    stream: TcpStream,
}

impl TcpClientTransport {
    pub fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        let stream = TcpStream::connect((host, port)).map_err(|_| TransportError::ConnectionReset)?;
        harden_socket(&stream)?;
        Ok(TcpClientTransport { stream })
    }

    /// Wrap an already-connected, already-accepted stream (the server
    /// side), applying the same socket hardening.
    pub fn from_accepted(stream: TcpStream) -> Result<Self, TransportError> {
        harden_socket(&stream)?;
        Ok(TcpClientTransport { stream })
    }
}

pub(super) fn harden_socket(stream: &TcpStream) -> Result<(), TransportError> {
    stream.set_nodelay(true)?;
    set_keepalive(stream)?;
    set_nosigpipe(stream)?;
    Ok(())
}

fn set_keepalive(stream: &TcpStream) -> Result<(), TransportError> {
    let fd = stream.as_raw_fd();
    let enable: libc::c_int = 1;
    let rc = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_KEEPALIVE,
            &enable as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(TransportError::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd", target_os = "netbsd", target_os = "openbsd"))]
fn set_nosigpipe(stream: &TcpStream) -> Result<(), TransportError> {
    let fd = stream.as_raw_fd();
    let enable: libc::c_int = 1;
    let rc = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_NOSIGPIPE,
            &enable as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(TransportError::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

// On Linux, SIGPIPE protection is per-send via MSG_NOSIGNAL in `send`
// below rather than a socket option.
#[cfg(not(any(target_os = "macos", target_os = "ios", target_os = "freebsd", target_os = "netbsd", target_os = "openbsd")))]
fn set_nosigpipe(_stream: &TcpStream) -> Result<(), TransportError> {
    Ok(())
}

/// Block up to `timeout` for the socket to become readable.
pub(super) fn poll_readable(fd: libc::c_int, timeout: Duration) -> Result<bool, TransportError> {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
    let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
    if rc < 0 {
        return Err(TransportError::Io(std::io::Error::last_os_error()));
    }
    Ok(rc > 0 && (pfd.revents & libc::POLLIN) != 0)
}

impl Transport for TcpClientTransport {
    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        if !poll_readable(self.stream.as_raw_fd(), timeout)? {
            return Err(TransportError::Timeout(timeout));
        }
        match self.stream.read(buf) {
            Ok(0) => Err(TransportError::ConnectionReset),
            Ok(n) => Ok(n),
            Err(e) => Err(TransportError::Io(e)),
        }
    }

    #[cfg(target_os = "linux")]
    fn send(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        let fd = self.stream.as_raw_fd();
        let mut sent = 0;
        while sent < buf.len() {
            let n = unsafe {
                libc::send(
                    fd,
                    buf[sent..].as_ptr() as *const libc::c_void,
                    buf.len() - sent,
                    libc::MSG_NOSIGNAL,
                )
            };
            if n < 0 {
                return Err(TransportError::Io(std::io::Error::last_os_error()));
            }
            sent += n as usize;
        }
        Ok(sent)
    }

    #[cfg(not(target_os = "linux"))]
    fn send(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        self.stream.write_all(buf)?;
        Ok(buf.len())
    }

    fn close(&mut self) {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}

impl Drop for TcpClientTransport {
    fn drop(&mut self) {
        self.close();
    }
}
