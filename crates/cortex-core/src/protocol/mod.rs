//! Protocol state machine (§4.3): `HELLO → CONFIG → CONFIG_ACK → (window
//! loop | PING) → BYE`, multiplexed by frame type and matched by `seq`.

pub mod messages;

mod adapter;
mod host;

pub use adapter::{AdapterEvent, AdapterProtocol};
pub use host::{HandshakeAccepted, HostProtocol};

use std::time::Duration;

use crate::error::CortexError;
use crate::frame::{Frame, FrameType, HEADER_SIZE};
use crate::transport::Transport;

/// Encode `frame_type`/`seq`/`payload` and write it to `transport`.
pub(crate) fn send_frame<T: Transport + ?Sized>(
    transport: &mut T,
    frame_type: FrameType,
    seq: u16,
    payload: Vec<u8>,
) -> Result<(), CortexError> {
    let frame = Frame::new(frame_type, seq, payload);
    let encoded = frame.encode()?;
    transport.send(&encoded)?;
    Ok(())
}

/// Read one complete frame from `transport`: the fixed header first (to
/// learn `payload_len`), then the payload and trailing CRC.
pub(crate) fn recv_frame<T: Transport + ?Sized>(
    transport: &mut T,
    timeout: Duration,
) -> Result<Frame, CortexError> {
    let mut header = [0u8; HEADER_SIZE];
    transport.recv_exact(&mut header, timeout)?;
    let payload_len = Frame::peek_payload_len(&header)? as usize;

    let mut rest = vec![0u8; payload_len + 4]; // + trailing CRC
    transport.recv_exact(&mut rest, timeout)?;

    let mut full = Vec::with_capacity(HEADER_SIZE + rest.len());
    full.extend_from_slice(&header);
    full.extend_from_slice(&rest);

    Ok(Frame::decode(&full)?)
}

/// Verify a received frame is the expected type and, for sequenced
/// exchanges, carries the expected `seq` (§8.1 property 5).
pub(crate) fn expect_frame(
    frame: &Frame,
    expected_type: FrameType,
    expected_seq: Option<u16>,
) -> Result<(), CortexError> {
    if frame.frame_type != expected_type {
        return Err(CortexError::ProtocolViolation(format!(
            "expected {expected_type:?}, got {:?}",
            frame.frame_type
        )));
    }
    if let Some(seq) = expected_seq {
        if frame.seq != seq {
            return Err(CortexError::ProtocolViolation(format!(
                "seq mismatch: expected {seq}, got {}",
                frame.seq
            )));
        }
    }
    Ok(())
}
