//! Payload layouts for every frame type of §4.3/§6.1, independent of the
//! envelope in [`crate::frame`].

use crate::codec::{
    read_f32_le, read_fixed_str, read_u32_le, read_u64_le, write_fixed_str, write_u32_le,
    write_u64_le,
};
use crate::config::DType;
use crate::error::CortexError;

const NAME_FIELD_LEN: usize = 32;
/// Width of each URI field in `HELLO.spec_uris` (§4.3.1).
const HELLO_URI_FIELD_LEN: usize = 32;
/// Width of the requested-kernel URI field in `CONFIG` (§4.3.1), wider
/// than `HELLO`'s since it carries one fully-qualified spec URI rather
/// than an advertisement list.
const SPEC_URI_FIELD_LEN: usize = 64;

fn protocol_violation(what: &str) -> CortexError {
    CortexError::ProtocolViolation(format!("malformed {what} payload"))
}

/// `HELLO`: adapter → host, sent at the start of the handshake.
#[derive(Debug, Clone, PartialEq)]
pub struct Hello {
    pub boot_id: u32,
    pub adapter_name: String,
    pub abi_version: u8,
    pub max_window_samples: u32,
    pub max_channels: u32,
    pub spec_uris: Vec<String>,
}

impl Hello {
    pub fn encode(&self) -> Vec<u8> {
        let num_kernels = self.spec_uris.len() as u8;
        let mut buf = vec![0u8; 4 + NAME_FIELD_LEN + 1 + 1 + 2 + 4 + 4];
        write_u32_le(&mut buf, 0, self.boot_id);
        write_fixed_str(&mut buf[4..4 + NAME_FIELD_LEN], &self.adapter_name);
        buf[4 + NAME_FIELD_LEN] = self.abi_version;
        buf[4 + NAME_FIELD_LEN + 1] = num_kernels;
        // bytes [4+NAME_FIELD_LEN+2 .. +4) are reserved, left zeroed.
        write_u32_le(&mut buf, 4 + NAME_FIELD_LEN + 4, self.max_window_samples);
        write_u32_le(&mut buf, 4 + NAME_FIELD_LEN + 8, self.max_channels);
        for uri in &self.spec_uris {
            let mut field = vec![0u8; HELLO_URI_FIELD_LEN];
            write_fixed_str(&mut field, uri);
            buf.extend_from_slice(&field);
        }
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CortexError> {
        let header_len = 4 + NAME_FIELD_LEN + 1 + 1 + 2 + 4 + 4;
        if buf.len() < header_len {
            return Err(protocol_violation("HELLO"));
        }
        let boot_id = read_u32_le(buf, 0);
        let adapter_name = read_fixed_str(&buf[4..4 + NAME_FIELD_LEN]);
        let abi_version = buf[4 + NAME_FIELD_LEN];
        let num_kernels = buf[4 + NAME_FIELD_LEN + 1] as usize;
        let max_window_samples = read_u32_le(buf, 4 + NAME_FIELD_LEN + 4);
        let max_channels = read_u32_le(buf, 4 + NAME_FIELD_LEN + 8);

        let expected_len = header_len + num_kernels * HELLO_URI_FIELD_LEN;
        if buf.len() != expected_len {
            return Err(protocol_violation("HELLO"));
        }
        let mut spec_uris = Vec::with_capacity(num_kernels);
        for i in 0..num_kernels {
            let start = header_len + i * HELLO_URI_FIELD_LEN;
            spec_uris.push(read_fixed_str(&buf[start..start + HELLO_URI_FIELD_LEN]));
        }

        Ok(Hello {
            boot_id,
            adapter_name,
            abi_version,
            max_window_samples,
            max_channels,
            spec_uris,
        })
    }
}

/// `CONFIG`: host → adapter, the stream configuration plus any kernel
/// parameters and calibration state.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub spec_uri: String,
    pub sample_rate_hz: u32,
    pub window_samples: u32,
    pub hop_samples: u32,
    pub channels: u32,
    pub dtype: DType,
    pub plugin_params: Vec<u8>,
    pub calibration_state: Vec<u8>,
}

impl Config {
    pub fn encode(&self) -> Vec<u8> {
        let fixed_len = SPEC_URI_FIELD_LEN + 4 * 5 + 1 + 3 + 4 + 4;
        let mut buf = vec![0u8; fixed_len];
        write_fixed_str(&mut buf[..SPEC_URI_FIELD_LEN], &self.spec_uri);
        let mut off = SPEC_URI_FIELD_LEN;
        write_u32_le(&mut buf, off, self.sample_rate_hz);
        off += 4;
        write_u32_le(&mut buf, off, self.window_samples);
        off += 4;
        write_u32_le(&mut buf, off, self.hop_samples);
        off += 4;
        write_u32_le(&mut buf, off, self.channels);
        off += 4;
        buf[off] = self.dtype.to_wire() as u8;
        off += 1 + 3; // reserved
        write_u32_le(&mut buf, off, self.plugin_params.len() as u32);
        off += 4;
        buf.extend_from_slice(&self.plugin_params);
        write_u32_le(&mut buf, off, self.calibration_state.len() as u32);
        buf.extend_from_slice(&self.calibration_state);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CortexError> {
        let fixed_len = SPEC_URI_FIELD_LEN + 4 * 5 + 1 + 3 + 4 + 4;
        if buf.len() < fixed_len {
            return Err(protocol_violation("CONFIG"));
        }
        let spec_uri = read_fixed_str(&buf[..SPEC_URI_FIELD_LEN]);
        let mut off = SPEC_URI_FIELD_LEN;
        let sample_rate_hz = read_u32_le(buf, off);
        off += 4;
        let window_samples = read_u32_le(buf, off);
        off += 4;
        let hop_samples = read_u32_le(buf, off);
        off += 4;
        let channels = read_u32_le(buf, off);
        off += 4;
        let dtype = DType::from_wire(buf[off] as u32).ok_or_else(|| protocol_violation("CONFIG"))?;
        off += 1 + 3;
        let plugin_params_len = read_u32_le(buf, off) as usize;
        off += 4;
        if buf.len() < off + plugin_params_len + 4 {
            return Err(protocol_violation("CONFIG"));
        }
        let plugin_params = buf[off..off + plugin_params_len].to_vec();
        off += plugin_params_len;
        let calibration_state_len = read_u32_le(buf, off) as usize;
        off += 4;
        if buf.len() != off + calibration_state_len {
            return Err(protocol_violation("CONFIG"));
        }
        let calibration_state = buf[off..off + calibration_state_len].to_vec();

        Ok(Config {
            spec_uri,
            sample_rate_hz,
            window_samples,
            hop_samples,
            channels,
            dtype,
            plugin_params,
            calibration_state,
        })
    }
}

/// `CONFIG_ACK`: adapter → host, the kernel's response to `init`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfigAck {
    pub output_window_samples: u32,
    pub output_channels: u32,
    pub status: u8,
}

impl ConfigAck {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; 9];
        write_u32_le(&mut buf, 0, self.output_window_samples);
        write_u32_le(&mut buf, 4, self.output_channels);
        buf[8] = self.status;
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CortexError> {
        if buf.len() != 9 {
            return Err(protocol_violation("CONFIG_ACK"));
        }
        Ok(ConfigAck {
            output_window_samples: read_u32_le(buf, 0),
            output_channels: read_u32_le(buf, 4),
            status: buf[8],
        })
    }

    pub fn accepted(&self) -> bool {
        self.status == 0
    }
}

/// `WINDOW_REQ`: host → adapter. `seq` lives on the frame envelope, not
/// repeated here.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowReq {
    pub tin_ns: u64,
    pub input: Vec<f32>,
}

impl WindowReq {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; 8 + self.input.len() * 4];
        write_u64_le(&mut buf, 0, self.tin_ns);
        for (i, &sample) in self.input.iter().enumerate() {
            buf[8 + i * 4..8 + i * 4 + 4].copy_from_slice(&sample.to_le_bytes());
        }
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CortexError> {
        if buf.len() < 8 || (buf.len() - 8) % 4 != 0 {
            return Err(protocol_violation("WINDOW_REQ"));
        }
        let tin_ns = read_u64_le(buf, 0);
        let n = (buf.len() - 8) / 4;
        let input = (0..n).map(|i| read_f32_le(buf, 8 + i * 4)).collect();
        Ok(WindowReq { tin_ns, input })
    }
}

/// `RESULT`: adapter → host. `seq` lives on the frame envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowResult {
    pub tin_ns: u64,
    pub tstart_ns: u64,
    pub tend_ns: u64,
    pub tfirst_tx_ns: u64,
    pub tlast_tx_ns: u64,
    pub status: u8,
    pub output: Vec<f32>,
}

impl WindowResult {
    const HEADER_LEN: usize = 8 * 5 + 1 + 3;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::HEADER_LEN + self.output.len() * 4];
        write_u64_le(&mut buf, 0, self.tin_ns);
        write_u64_le(&mut buf, 8, self.tstart_ns);
        write_u64_le(&mut buf, 16, self.tend_ns);
        write_u64_le(&mut buf, 24, self.tfirst_tx_ns);
        write_u64_le(&mut buf, 32, self.tlast_tx_ns);
        buf[40] = self.status;
        // bytes [41..44) are reserved, left zeroed.
        for (i, &sample) in self.output.iter().enumerate() {
            let off = Self::HEADER_LEN + i * 4;
            buf[off..off + 4].copy_from_slice(&sample.to_le_bytes());
        }
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CortexError> {
        if buf.len() < Self::HEADER_LEN || (buf.len() - Self::HEADER_LEN) % 4 != 0 {
            return Err(protocol_violation("RESULT"));
        }
        let n = (buf.len() - Self::HEADER_LEN) / 4;
        let output = (0..n)
            .map(|i| read_f32_le(buf, Self::HEADER_LEN + i * 4))
            .collect();
        Ok(WindowResult {
            tin_ns: read_u64_le(buf, 0),
            tstart_ns: read_u64_le(buf, 8),
            tend_ns: read_u64_le(buf, 16),
            tfirst_tx_ns: read_u64_le(buf, 24),
            tlast_tx_ns: read_u64_le(buf, 32),
            status: buf[40],
            output,
        })
    }

    pub fn succeeded(&self) -> bool {
        self.status == 0
    }
}

/// `PING`: host → adapter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ping {
    pub host_tx_ns: u64,
}

impl Ping {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; 8];
        write_u64_le(&mut buf, 0, self.host_tx_ns);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CortexError> {
        if buf.len() != 8 {
            return Err(protocol_violation("PING"));
        }
        Ok(Ping {
            host_tx_ns: read_u64_le(buf, 0),
        })
    }
}

/// `PONG`: adapter → host, drift-tracking reply to [`Ping`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pong {
    pub host_tx_ns: u64,
    pub adapter_rx_ns: u64,
    pub adapter_tx_ns: u64,
    pub host_rx_ns: u64,
}

impl Pong {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; 32];
        write_u64_le(&mut buf, 0, self.host_tx_ns);
        write_u64_le(&mut buf, 8, self.adapter_rx_ns);
        write_u64_le(&mut buf, 16, self.adapter_tx_ns);
        write_u64_le(&mut buf, 24, self.host_rx_ns);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CortexError> {
        if buf.len() != 32 {
            return Err(protocol_violation("PONG"));
        }
        Ok(Pong {
            host_tx_ns: read_u64_le(buf, 0),
            adapter_rx_ns: read_u64_le(buf, 8),
            adapter_tx_ns: read_u64_le(buf, 16),
            host_rx_ns: read_u64_le(buf, 24),
        })
    }
}

/// `ERROR`: either direction, a terminal failure report.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMessage {
    pub kind: u8,
    pub message: String,
}

impl ErrorMessage {
    pub fn encode(&self) -> Vec<u8> {
        let message_bytes = self.message.as_bytes();
        let mut buf = vec![0u8; 1 + 3 + 4 + message_bytes.len()];
        buf[0] = self.kind;
        write_u32_le(&mut buf, 4, message_bytes.len() as u32);
        buf[8..].copy_from_slice(message_bytes);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CortexError> {
        if buf.len() < 8 {
            return Err(protocol_violation("ERROR"));
        }
        let kind = buf[0];
        let message_len = read_u32_le(buf, 4) as usize;
        if buf.len() != 8 + message_len {
            return Err(protocol_violation("ERROR"));
        }
        let message = String::from_utf8_lossy(&buf[8..]).into_owned();
        Ok(ErrorMessage { kind, message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_round_trips_with_multiple_kernels() {
        let hello = Hello {
            boot_id: 42,
            adapter_name: "demo-adapter".into(),
            abi_version: 3,
            max_window_samples: 4096,
            max_channels: 256,
            spec_uris: vec!["kernels/v1/notch_iir@f32".into(), "kernels/v1/passthrough@f32".into()],
        };
        let decoded = Hello::decode(&hello.encode()).unwrap();
        assert_eq!(decoded, hello);
    }

    #[test]
    fn hello_round_trips_with_no_kernels() {
        let hello = Hello {
            boot_id: 1,
            adapter_name: "".into(),
            abi_version: 3,
            max_window_samples: 0,
            max_channels: 0,
            spec_uris: vec![],
        };
        let decoded = Hello::decode(&hello.encode()).unwrap();
        assert_eq!(decoded, hello);
    }

    #[test]
    fn config_round_trips_with_params_and_calibration() {
        let config = Config {
            spec_uri: "kernels/v1/notch_iir@f32".into(),
            sample_rate_hz: 160,
            window_samples: 160,
            hop_samples: 80,
            channels: 64,
            dtype: DType::Float32,
            plugin_params: b"gain=2.5".to_vec(),
            calibration_state: vec![1, 2, 3, 4],
        };
        let decoded = Config::decode(&config.encode()).unwrap();
        assert_eq!(decoded, config);
    }

    #[test]
    fn config_ack_round_trips_and_reports_acceptance() {
        let ack = ConfigAck {
            output_window_samples: 160,
            output_channels: 64,
            status: 0,
        };
        assert!(ack.accepted());
        assert_eq!(ConfigAck::decode(&ack.encode()).unwrap(), ack);

        let rejected = ConfigAck {
            status: 1,
            ..ack
        };
        assert!(!rejected.accepted());
    }

    #[test]
    fn window_req_round_trips() {
        let req = WindowReq {
            tin_ns: 123_456,
            input: vec![1.0, -2.5, 3.25, 0.0],
        };
        assert_eq!(WindowReq::decode(&req.encode()).unwrap(), req);
    }

    #[test]
    fn window_result_round_trips_and_reports_success() {
        let result = WindowResult {
            tin_ns: 1,
            tstart_ns: 2,
            tend_ns: 3,
            tfirst_tx_ns: 4,
            tlast_tx_ns: 5,
            status: 0,
            output: vec![0.5, -0.5],
        };
        assert!(result.succeeded());
        assert_eq!(WindowResult::decode(&result.encode()).unwrap(), result);
    }

    #[test]
    fn ping_pong_round_trip() {
        let ping = Ping { host_tx_ns: 10 };
        assert_eq!(Ping::decode(&ping.encode()).unwrap(), ping);

        let pong = Pong {
            host_tx_ns: 10,
            adapter_rx_ns: 11,
            adapter_tx_ns: 12,
            host_rx_ns: 13,
        };
        assert_eq!(Pong::decode(&pong.encode()).unwrap(), pong);
    }

    #[test]
    fn error_message_round_trips() {
        let err = ErrorMessage {
            kind: 7,
            message: "crc mismatch".into(),
        };
        assert_eq!(ErrorMessage::decode(&err.encode()).unwrap(), err);
    }

    #[test]
    fn truncated_config_ack_is_rejected() {
        assert!(ConfigAck::decode(&[0u8; 3]).is_err());
    }
}
