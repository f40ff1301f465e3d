//! Transport layer (§4.2): three byte-stream flavors that carry the frame
//! envelope of [`crate::frame`] between a host and an adapter.

mod local;
mod tcp_client;
mod tcp_server;

pub use local::LocalTransport;
pub use tcp_client::TcpClientTransport;
pub use tcp_server::TcpServerTransport;

use std::time::Duration;

use crate::error::TransportError;

/// Capability set every connected transport variant implements.
pub trait Transport {
    /// Read at most `buf.len()` bytes, blocking up to `timeout`.
    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError>;

    /// Read exactly `buf.len()` bytes, blocking up to `timeout` in total
    /// across however many underlying reads that requires.
    fn recv_exact(&mut self, buf: &mut [u8], timeout: Duration) -> Result<(), TransportError> {
        let deadline = std::time::Instant::now() + timeout;
        let mut filled = 0;
        while filled < buf.len() {
            let remaining = deadline
                .checked_duration_since(std::time::Instant::now())
                .ok_or(TransportError::Timeout(timeout))?;
            let n = self.recv(&mut buf[filled..], remaining)?;
            if n == 0 {
                return Err(TransportError::ConnectionReset);
            }
            filled += n;
        }
        Ok(())
    }

    /// Write all of `buf`.
    fn send(&mut self, buf: &[u8]) -> Result<usize, TransportError>;

    /// Idempotent teardown of the underlying OS handle.
    fn close(&mut self);

    /// Host-side monotonic clock, nanoseconds since an arbitrary epoch.
    fn monotonic_ns(&self) -> u64 {
        monotonic_ns()
    }
}

/// `CLOCK_MONOTONIC`-equivalent nanosecond timestamp, shared by every
/// transport and by the pacer/scheduler so all host-side timestamps in a
/// run come from the same clock (§5 Ordering).
pub fn monotonic_ns() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = *EPOCH.get_or_init(Instant::now);
    Instant::now().duration_since(epoch).as_nanos() as u64
}
