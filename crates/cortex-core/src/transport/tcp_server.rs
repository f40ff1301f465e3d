//! TCP server transport (§4.2): a listening socket with `SO_REUSEADDR`, a
//! backlog of 1, and `poll`-based accept timeouts. Has no `recv`/`send` of
//! its own; accepting yields a hardened [`TcpClientTransport`].

use std::net::TcpListener;
use std::os::fd::AsRawFd;
use std::time::Duration;

use crate::error::TransportError;

use super::tcp_client::poll_readable;
use super::TcpClientTransport;

pub struct TcpServerTransport {
    listener: TcpListener,
}

impl TcpServerTransport {
    /// Bind `0.0.0.0:port` with `SO_REUSEADDR` and `listen(backlog=1)`.
    pub fn bind(port: u16) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        set_reuseaddr(&listener)?;
        Ok(TcpServerTransport { listener })
    }

    /// Accept one connection, blocking up to `timeout`, then hardening the
    /// accepted socket the same way a client connection is hardened.
    pub fn accept(&self, timeout: Duration) -> Result<TcpClientTransport, TransportError> {
        if !poll_readable(self.listener.as_raw_fd(), timeout)? {
            return Err(TransportError::Timeout(timeout));
        }
        let (stream, _addr) = self.listener.accept()?;
        TcpClientTransport::from_accepted(stream)
    }

    pub fn local_port(&self) -> Result<u16, TransportError> {
        Ok(self.listener.local_addr()?.port())
    }

    pub fn close(&mut self) {
        // `TcpListener` has no explicit close; dropping releases the fd.
    }
}

fn set_reuseaddr(listener: &TcpListener) -> Result<(), TransportError> {
    let fd = listener.as_raw_fd();
    let enable: libc::c_int = 1;
    let rc = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &enable as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(TransportError::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_an_ephemeral_port_and_accepts_a_connection() {
        let server = TcpServerTransport::bind(0).unwrap();
        let port = server.local_port().unwrap();

        let handle = std::thread::spawn(move || {
            std::net::TcpStream::connect(("127.0.0.1", port)).unwrap();
        });

        let accepted = server.accept(Duration::from_secs(1));
        assert!(accepted.is_ok());
        handle.join().unwrap();
    }

    #[test]
    fn accept_times_out_with_no_connection() {
        let server = TcpServerTransport::bind(0).unwrap();
        let err = server.accept(Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
    }
}
