//! Calibration state envelope (§3.6): the little-endian blob produced by an
//! offline `calibrate` entry point and consumed by a future `init`.

use crate::codec::{read_u32_le, write_u32_le};
use crate::error::CortexError;
use crate::frame::MAGIC;

/// The only calibration-envelope version this crate writes or accepts.
pub const CALIBRATION_VERSION: u32 = 3;

/// Same constant as [`crate::abi::ABI_VERSION`]; the envelope carries its
/// own copy so a calibration blob can be validated before any kernel is
/// loaded.
pub const CALIBRATION_ABI: u32 = 3;

/// Maximum payload size: 256 MiB.
pub const MAX_PAYLOAD_SIZE: u32 = 256 * 1024 * 1024;

const HEADER_LEN: usize = 4 + 4 + 4 + 4; // magic, version, abi, payload_size

/// A parsed calibration envelope: `magic | version | abi | payload_size |
/// payload`.
#[derive(Debug, Clone)]
pub struct CalibrationState {
    pub payload: Vec<u8>,
}

impl CalibrationState {
    /// Wrap a freshly produced calibration payload (e.g. the bytes a
    /// kernel's `calibrate` wrote into its output buffer).
    pub fn new(payload: Vec<u8>) -> Result<Self, CortexError> {
        if payload.len() as u64 > MAX_PAYLOAD_SIZE as u64 {
            return Err(CortexError::ConfigInvalid(format!(
                "calibration payload {} bytes exceeds {} byte cap",
                payload.len(),
                MAX_PAYLOAD_SIZE
            )));
        }
        Ok(CalibrationState { payload })
    }

    /// Serialize to the wire envelope.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.extend_from_slice(&[0u8; HEADER_LEN]);
        write_u32_le(&mut buf, 0, MAGIC);
        write_u32_le(&mut buf, 4, CALIBRATION_VERSION);
        write_u32_le(&mut buf, 8, CALIBRATION_ABI);
        write_u32_le(&mut buf, 12, self.payload.len() as u32);
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Parse a calibration envelope previously produced by [`Self::encode`].
    pub fn decode(buf: &[u8]) -> Result<Self, CortexError> {
        if buf.len() < HEADER_LEN {
            return Err(CortexError::ConfigInvalid(
                "calibration envelope shorter than its header".into(),
            ));
        }
        let magic = read_u32_le(buf, 0);
        if magic != MAGIC {
            return Err(CortexError::ConfigInvalid(
                "calibration envelope has bad magic".into(),
            ));
        }
        let version = read_u32_le(buf, 4);
        if version != CALIBRATION_VERSION {
            return Err(CortexError::ConfigInvalid(format!(
                "calibration envelope version {version} unsupported"
            )));
        }
        let abi = read_u32_le(buf, 8);
        if abi != CALIBRATION_ABI {
            return Err(CortexError::ConfigInvalid(format!(
                "calibration envelope abi {abi} unsupported"
            )));
        }
        let payload_size = read_u32_le(buf, 12);
        if payload_size > MAX_PAYLOAD_SIZE {
            return Err(CortexError::ConfigInvalid(format!(
                "calibration payload_size {payload_size} exceeds {MAX_PAYLOAD_SIZE} byte cap"
            )));
        }
        let expected_len = HEADER_LEN + payload_size as usize;
        if buf.len() != expected_len {
            return Err(CortexError::ConfigInvalid(format!(
                "calibration envelope declares {payload_size} payload bytes but carries {}",
                buf.len() - HEADER_LEN
            )));
        }
        Ok(CalibrationState {
            payload: buf[HEADER_LEN..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_payload() {
        let state = CalibrationState::new(vec![1, 2, 3, 4, 5]).unwrap();
        let encoded = state.encode();
        let decoded = CalibrationState::decode(&encoded).unwrap();
        assert_eq!(decoded.payload, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn round_trips_an_empty_payload() {
        let state = CalibrationState::new(Vec::new()).unwrap();
        let decoded = CalibrationState::decode(&state.encode()).unwrap();
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn oversized_payload_is_rejected_at_construction() {
        let huge = vec![0u8; (MAX_PAYLOAD_SIZE as usize) + 1];
        assert!(CalibrationState::new(huge).is_err());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut encoded = CalibrationState::new(vec![9, 9]).unwrap().encode();
        encoded[0] ^= 0xFF;
        assert!(CalibrationState::decode(&encoded).is_err());
    }

    #[test]
    fn declared_length_mismatch_is_rejected() {
        let mut encoded = CalibrationState::new(vec![9, 9, 9]).unwrap().encode();
        encoded.pop();
        assert!(CalibrationState::decode(&encoded).is_err());
    }

    #[test]
    fn wrong_version_is_rejected() {
        let mut encoded = CalibrationState::new(vec![1]).unwrap().encode();
        write_u32_le(&mut encoded, 4, 99);
        assert!(CalibrationState::decode(&encoded).is_err());
    }
}
