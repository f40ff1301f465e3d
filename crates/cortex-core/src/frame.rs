//! Frame envelope: the common header/CRC wrapper every wire message rides
//! inside (§4.1, §6.1).

use crate::codec::{crc32, read_u16_le, read_u32_le, write_u16_le, write_u32_le};
use crate::error::FrameError;

/// `'CRTX'` magic, little-endian `u32`.
pub const MAGIC: u32 = 0x4352_5458;

/// Hard cap on `payload_len`.
pub const MAX_PAYLOAD_LEN: u32 = 16 * 1024 * 1024;

const HEADER_LEN: usize = 12; // magic(4) + type(1) + flags(1) + seq(2) + payload_len(4)
const CRC_LEN: usize = 4;

/// Fixed header size, exposed so the transport layer knows how many bytes
/// to read before it can call [`Frame::peek_payload_len`].
pub const HEADER_SIZE: usize = HEADER_LEN;

/// One frame type per §6.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    Hello = 0x01,
    Config = 0x02,
    ConfigAck = 0x03,
    WindowReq = 0x04,
    Result = 0x05,
    Ping = 0x06,
    Pong = 0x07,
    Bye = 0x08,
    Error = 0x7F,
}

impl FrameType {
    fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x01 => Some(Self::Hello),
            0x02 => Some(Self::Config),
            0x03 => Some(Self::ConfigAck),
            0x04 => Some(Self::WindowReq),
            0x05 => Some(Self::Result),
            0x06 => Some(Self::Ping),
            0x07 => Some(Self::Pong),
            0x08 => Some(Self::Bye),
            0x7F => Some(Self::Error),
            _ => None,
        }
    }
}

/// A decoded frame: header fields plus the owned payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: FrameType,
    pub seq: u16,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(frame_type: FrameType, seq: u16, payload: Vec<u8>) -> Self {
        Self {
            frame_type,
            seq,
            payload,
        }
    }

    /// Serialize to the wire format of §4.1, including the trailing CRC-32.
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        if self.payload.len() as u64 > MAX_PAYLOAD_LEN as u64 {
            return Err(FrameError::PayloadTooLarge);
        }
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len() + CRC_LEN);
        buf.resize(HEADER_LEN, 0);
        write_u32_le(&mut buf, 0, MAGIC);
        buf[4] = self.frame_type as u8;
        buf[5] = 0; // flags, reserved
        write_u16_le(&mut buf, 6, self.seq);
        write_u32_le(&mut buf, 8, self.payload.len() as u32);
        buf.extend_from_slice(&self.payload);

        let crc = crc32(&buf);
        let mut crc_bytes = [0u8; 4];
        write_u32_le(&mut crc_bytes, 0, crc);
        buf.extend_from_slice(&crc_bytes);
        Ok(buf)
    }

    /// Decode a complete, in-memory frame (header + payload + CRC already
    /// assembled by the transport layer). See [`crate::transport`] for how
    /// the header is peeked to learn `payload_len` before the rest is read.
    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        // `buf` is assumed to already hold exactly one frame: the transport
        // reads the header, learns `payload_len` from it via
        // `peek_payload_len`, then reads exactly that many more bytes plus
        // the trailing CRC before ever calling `decode`. So the CRC offset
        // is derived from `buf.len()` itself, never from the (possibly
        // corrupt) `payload_len` field — a single bit flipped anywhere in
        // the header, including `payload_len`, must still be caught by the
        // CRC rather than misread as a length mismatch.
        if buf.len() < HEADER_LEN + CRC_LEN {
            return Err(FrameError::TruncatedFrame);
        }
        let magic = read_u32_le(buf, 0);
        if magic != MAGIC {
            return Err(FrameError::InvalidMagic);
        }

        let crc_offset = buf.len() - CRC_LEN;
        let expected_crc = crc32(&buf[..crc_offset]);
        let actual_crc = read_u32_le(buf, crc_offset);
        if expected_crc != actual_crc {
            return Err(FrameError::CrcMismatch);
        }

        let payload_len = crc_offset - HEADER_LEN;
        if payload_len > MAX_PAYLOAD_LEN as usize {
            return Err(FrameError::PayloadTooLarge);
        }

        let frame_type = FrameType::from_u8(buf[4]).ok_or(FrameError::InvalidMagic)?;
        let seq = read_u16_le(buf, 6);
        let payload = buf[HEADER_LEN..crc_offset].to_vec();

        Ok(Frame {
            frame_type,
            seq,
            payload,
        })
    }

    /// Peek the `payload_len` field out of a header-sized prefix, letting the
    /// transport know how many more bytes to read before calling
    /// [`Frame::decode`] on the full buffer.
    pub fn peek_payload_len(header: &[u8; HEADER_LEN]) -> Result<u32, FrameError> {
        let magic = read_u32_le(header, 0);
        if magic != MAGIC {
            return Err(FrameError::InvalidMagic);
        }
        let payload_len = read_u32_le(header, 8);
        if payload_len > MAX_PAYLOAD_LEN {
            return Err(FrameError::PayloadTooLarge);
        }
        Ok(payload_len)
    }
}
