//! Host side of the protocol state machine: the harness end that drives an
//! adapter through handshake, the per-window loop, and teardown.

use std::time::Duration;

use crate::abi::ABI_VERSION;
use crate::config::StreamConfig;
use crate::error::CortexError;
use crate::frame::FrameType;
use crate::transport::Transport;

use super::messages::{Config, ConfigAck, ErrorMessage, Hello, Ping, Pong, WindowReq, WindowResult};
use super::{expect_frame, recv_frame, send_frame};

/// What the adapter reported back after accepting a `CONFIG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeAccepted {
    pub output_window_samples: u32,
    pub output_channels: u32,
}

/// Drives one adapter connection through §4.3's state machine from the
/// host's point of view.
pub struct HostProtocol {
    transport: Box<dyn Transport>,
    recv_timeout: Duration,
    next_seq: u16,
}

impl HostProtocol {
    pub fn new(transport: Box<dyn Transport>, recv_timeout: Duration) -> Self {
        HostProtocol {
            transport,
            recv_timeout,
            next_seq: 0,
        }
    }

    fn take_seq(&mut self) -> u16 {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        seq
    }

    /// Receive `HELLO`, validate it against `stream_config`/`spec_uri`, send
    /// `CONFIG`, and await `CONFIG_ACK` (§4.3.1).
    pub fn handshake(
        &mut self,
        stream_config: &StreamConfig,
        spec_uri: &str,
        kernel_params: &[u8],
        calibration_state: &[u8],
    ) -> Result<HandshakeAccepted, CortexError> {
        let hello_frame = recv_frame(&mut *self.transport, self.recv_timeout)?;
        expect_frame(&hello_frame, FrameType::Hello, None)?;
        let hello = Hello::decode(&hello_frame.payload)?;

        if hello.abi_version as u32 != ABI_VERSION {
            return Err(CortexError::ConfigInvalid(format!(
                "adapter abi_version {} != {ABI_VERSION}",
                hello.abi_version
            )));
        }
        if stream_config.window_length_samples > hello.max_window_samples {
            return Err(CortexError::ConfigInvalid(format!(
                "window_length_samples {} exceeds adapter max {}",
                stream_config.window_length_samples, hello.max_window_samples
            )));
        }
        if stream_config.channels > hello.max_channels {
            return Err(CortexError::ConfigInvalid(format!(
                "channels {} exceeds adapter max {}",
                stream_config.channels, hello.max_channels
            )));
        }
        if !hello.spec_uris.iter().any(|uri| uri == spec_uri) {
            return Err(CortexError::ConfigInvalid(format!(
                "adapter does not advertise requested kernel '{spec_uri}'"
            )));
        }

        let config = Config {
            spec_uri: spec_uri.to_string(),
            sample_rate_hz: stream_config.sample_rate_hz,
            window_samples: stream_config.window_length_samples,
            hop_samples: stream_config.hop_samples,
            channels: stream_config.channels,
            dtype: stream_config.dtype,
            plugin_params: kernel_params.to_vec(),
            calibration_state: calibration_state.to_vec(),
        };
        let seq = self.take_seq();
        send_frame(&mut *self.transport, FrameType::Config, seq, config.encode())?;

        let reply = recv_frame(&mut *self.transport, self.recv_timeout)?;
        if reply.frame_type == FrameType::Error {
            let err = ErrorMessage::decode(&reply.payload)?;
            return Err(CortexError::KernelRejectedConfig(err.message));
        }
        expect_frame(&reply, FrameType::ConfigAck, Some(seq))?;
        let ack = ConfigAck::decode(&reply.payload)?;
        if !ack.accepted() {
            return Err(CortexError::KernelRejectedConfig(format!(
                "CONFIG_ACK status {}",
                ack.status
            )));
        }

        Ok(HandshakeAccepted {
            output_window_samples: ack.output_window_samples,
            output_channels: ack.output_channels,
        })
    }

    /// Send one `WINDOW_REQ` and await its `RESULT` (§4.3.2), retransmitting
    /// once on a receive timeout before giving up (§4.3.5).
    pub fn dispatch_window(&mut self, tin_ns: u64, input: Vec<f32>) -> Result<WindowResult, CortexError> {
        let seq = self.take_seq();
        let req = WindowReq { tin_ns, input };
        send_frame(&mut *self.transport, FrameType::WindowReq, seq, req.encode())?;

        let frame = match recv_frame(&mut *self.transport, self.recv_timeout) {
            Ok(frame) => frame,
            Err(CortexError::Timeout(_)) => {
                send_frame(&mut *self.transport, FrameType::WindowReq, seq, req.encode())?;
                recv_frame(&mut *self.transport, self.recv_timeout)?
            }
            Err(e) => return Err(e),
        };

        expect_frame(&frame, FrameType::Result, Some(seq))?;
        WindowResult::decode(&frame.payload)
    }

    /// Interleave a `PING`/`PONG` drift-tracking exchange between windows
    /// (§4.3.3). Pings do not share sequence space with `WINDOW_REQ` in the
    /// protocol's logical model, but both ride the same per-direction wire
    /// `seq` counter here since nothing else observes it.
    pub fn ping(&mut self, host_tx_ns: u64) -> Result<Pong, CortexError> {
        let seq = self.take_seq();
        send_frame(&mut *self.transport, FrameType::Ping, seq, Ping { host_tx_ns }.encode())?;
        let frame = recv_frame(&mut *self.transport, self.recv_timeout)?;
        expect_frame(&frame, FrameType::Pong, Some(seq))?;
        Pong::decode(&frame.payload)
    }

    /// Send `BYE` and close the transport (§4.3.4).
    pub fn teardown(&mut self) -> Result<(), CortexError> {
        let seq = self.take_seq();
        send_frame(&mut *self.transport, FrameType::Bye, seq, Vec::new())?;
        self.transport.close();
        Ok(())
    }
}
