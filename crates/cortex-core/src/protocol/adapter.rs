//! Adapter side of the protocol state machine: the out-of-process kernel
//! host's end of §4.3, driven by [`crate::adapter::run_adapter`].

use std::time::Duration;

use crate::abi::ABI_VERSION;
use crate::error::CortexError;
use crate::frame::FrameType;
use crate::transport::Transport;

use super::messages::{Config, ConfigAck, ErrorMessage, Hello, Ping, Pong, WindowReq, WindowResult};
use super::{expect_frame, recv_frame, send_frame};

/// One event the adapter's main loop reacts to after the handshake.
pub enum AdapterEvent {
    Window { seq: u16, req: WindowReq },
    Ping { seq: u16, ping: Ping },
    Bye,
}

/// Drives one host connection through §4.3's state machine from the
/// adapter's point of view.
pub struct AdapterProtocol {
    transport: Box<dyn Transport>,
    recv_timeout: Duration,
}

impl AdapterProtocol {
    pub fn new(transport: Box<dyn Transport>, recv_timeout: Duration) -> Self {
        AdapterProtocol {
            transport,
            recv_timeout,
        }
    }

    /// Announce ourselves and the kernels we can load (§4.3.1).
    pub fn send_hello(
        &mut self,
        boot_id: u32,
        adapter_name: &str,
        max_window_samples: u32,
        max_channels: u32,
        spec_uris: Vec<String>,
    ) -> Result<(), CortexError> {
        let hello = Hello {
            boot_id,
            adapter_name: adapter_name.to_string(),
            abi_version: ABI_VERSION as u8,
            max_window_samples,
            max_channels,
            spec_uris,
        };
        send_frame(&mut *self.transport, FrameType::Hello, 0, hello.encode())
    }

    /// Await the host's `CONFIG`, returning it along with the `seq` the
    /// reply (`CONFIG_ACK` or `ERROR`) must echo.
    pub fn recv_config(&mut self) -> Result<(u16, Config), CortexError> {
        let frame = recv_frame(&mut *self.transport, self.recv_timeout)?;
        expect_frame(&frame, FrameType::Config, None)?;
        let config = Config::decode(&frame.payload)?;
        Ok((frame.seq, config))
    }

    pub fn send_config_ack(&mut self, seq: u16, ack: ConfigAck) -> Result<(), CortexError> {
        send_frame(&mut *self.transport, FrameType::ConfigAck, seq, ack.encode())
    }

    pub fn send_error(&mut self, seq: u16, kind: u8, message: impl Into<String>) -> Result<(), CortexError> {
        let err = ErrorMessage {
            kind,
            message: message.into(),
        };
        send_frame(&mut *self.transport, FrameType::Error, seq, err.encode())
    }

    /// Block for the next frame the host sends once the run is under way:
    /// a `WINDOW_REQ` to process, an interleaved `PING`, or `BYE`. The
    /// 5-second unconditional-exit timer of §4.3.4 is the caller's
    /// responsibility, driven off a `Timeout` error from this call.
    pub fn recv_next(&mut self) -> Result<AdapterEvent, CortexError> {
        let frame = recv_frame(&mut *self.transport, self.recv_timeout)?;
        match frame.frame_type {
            FrameType::WindowReq => {
                let req = WindowReq::decode(&frame.payload)?;
                Ok(AdapterEvent::Window { seq: frame.seq, req })
            }
            FrameType::Ping => {
                let ping = Ping::decode(&frame.payload)?;
                Ok(AdapterEvent::Ping { seq: frame.seq, ping })
            }
            FrameType::Bye => Ok(AdapterEvent::Bye),
            other => Err(CortexError::ProtocolViolation(format!(
                "unexpected frame type {other:?} after handshake"
            ))),
        }
    }

    pub fn send_result(&mut self, seq: u16, result: WindowResult) -> Result<(), CortexError> {
        send_frame(&mut *self.transport, FrameType::Result, seq, result.encode())
    }

    pub fn send_pong(&mut self, seq: u16, pong: Pong) -> Result<(), CortexError> {
        send_frame(&mut *self.transport, FrameType::Pong, seq, pong.encode())
    }

    pub fn close(&mut self) {
        self.transport.close();
    }
}
