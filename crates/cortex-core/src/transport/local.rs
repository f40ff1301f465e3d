//! Local transport (§4.2): an anonymous bidirectional socket pair shared
//! with a spawned adapter child process.

use std::io::{Read, Write};
use std::os::fd::OwnedFd;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use crate::error::TransportError;

use super::Transport;

/// The harness side of a spawned-adapter connection. Holds the child
/// handle so teardown can close the socket and wait on the process.
pub struct LocalTransport {
    stream: UnixStream,
    child: Option<Child>,
}

impl LocalTransport {
    /// Create a socket pair, spawn `adapter_binary` with one end wired to
    /// its stdin/stdout, and keep the other end as the harness transport.
    pub fn spawn(adapter_binary: &Path, args: &[String]) -> Result<Self, TransportError> {
        let (host_end, child_end) = UnixStream::pair()?;
        let child_in: OwnedFd = child_end.try_clone()?.into();
        let child_out: OwnedFd = child_end.into();

        let child = Command::new(adapter_binary)
            .args(args)
            .stdin(Stdio::from(child_in))
            .stdout(Stdio::from(child_out))
            .spawn()?;

        Ok(LocalTransport {
            stream: host_end,
            child: Some(child),
        })
    }

    /// Wrap an already-connected end of a socket pair, e.g. the adapter
    /// side when it inherits its stdio from the harness.
    pub fn from_stream(stream: UnixStream) -> Self {
        LocalTransport { stream, child: None }
    }
}

impl Transport for LocalTransport {
    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        self.stream.set_read_timeout(Some(timeout))?;
        match self.stream.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                Err(TransportError::Timeout(timeout))
            }
            Err(e) => Err(TransportError::Io(e)),
        }
    }

    fn send(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        self.stream.write_all(buf)?;
        Ok(buf.len())
    }

    fn close(&mut self) {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
        if let Some(mut child) = self.child.take() {
            let _ = child.wait();
        }
    }
}

impl Drop for LocalTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_and_recv_round_trip_over_a_pair() {
        let (a, b) = UnixStream::pair().unwrap();
        let mut host = LocalTransport::from_stream(a);
        let mut adapter = LocalTransport::from_stream(b);

        host.send(b"hello").unwrap();
        let mut buf = [0u8; 5];
        adapter.recv(&mut buf, Duration::from_secs(1)).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn recv_times_out_with_no_data() {
        let (a, _b) = UnixStream::pair().unwrap();
        let mut host = LocalTransport::from_stream(a);
        let mut buf = [0u8; 5];
        let err = host.recv(&mut buf, Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
    }
}
