//! Shared test-only identity adapter, run on its own thread and driven
//! purely through the protocol layer.
//!
//! Real kernels are shared objects loaded via `libloading`; there is no
//! toolchain available in this environment to produce one, so these
//! integration tests exercise the remote dispatch path (`KernelHandle::
//! Remote`) against an in-process stand-in that speaks the wire protocol
//! correctly and echoes its input as output. `kernel::tests` covers the
//! in-process ABI path directly against raw `extern "C"` functions.

use std::thread::JoinHandle;
use std::time::Duration;

use cortex_core::protocol::messages::{ConfigAck, Pong, WindowResult};
use cortex_core::protocol::{AdapterEvent, AdapterProtocol};
use cortex_core::transport::{monotonic_ns, Transport};

/// Runs the adapter side of the handshake/window loop, echoing every
/// window's input back as its output. Optionally sleeps once a specific
/// `WINDOW_REQ` seq is seen, to exercise deadline-miss accounting.
pub fn spawn_identity_adapter(
    transport: Box<dyn Transport>,
    sleep_at_seq: Option<(u16, Duration)>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut protocol = AdapterProtocol::new(transport, Duration::from_secs(5));
        protocol
            .send_hello(1, "test-identity-adapter", 65536, 1024, vec!["identity@f32".into()])
            .unwrap();

        let (seq, config) = protocol.recv_config().unwrap();
        protocol
            .send_config_ack(
                seq,
                ConfigAck {
                    output_window_samples: config.window_samples,
                    output_channels: config.channels,
                    status: 0,
                },
            )
            .unwrap();

        loop {
            match protocol.recv_next() {
                Ok(AdapterEvent::Window { seq, req }) => {
                    if let Some((at, dur)) = sleep_at_seq {
                        if seq == at {
                            std::thread::sleep(dur);
                        }
                    }
                    let tstart = monotonic_ns();
                    let output = req.input.clone();
                    let tend = monotonic_ns();
                    let result = WindowResult {
                        tin_ns: req.tin_ns,
                        tstart_ns: tstart,
                        tend_ns: tend,
                        tfirst_tx_ns: tstart,
                        tlast_tx_ns: tend,
                        status: 0,
                        output,
                    };
                    protocol.send_result(seq, result).unwrap();
                }
                Ok(AdapterEvent::Ping { seq, ping }) => {
                    protocol
                        .send_pong(
                            seq,
                            Pong {
                                host_tx_ns: ping.host_tx_ns,
                                adapter_rx_ns: 0,
                                adapter_tx_ns: 0,
                                host_rx_ns: 0,
                            },
                        )
                        .unwrap();
                }
                Ok(AdapterEvent::Bye) => break,
                Err(_) => break,
            }
        }
    })
}

/// A `Fs=160, W=160, H=80, C=64` stream config, the literal values used
/// throughout the end-to-end scenarios.
pub fn scenario_stream_config() -> cortex_core::StreamConfig {
    cortex_core::StreamConfig {
        sample_rate_hz: 160,
        window_length_samples: 160,
        hop_samples: 80,
        channels: 64,
        dtype: cortex_core::DType::Float32,
        warmup_seconds: 0,
        deadline_margin: Duration::from_millis(0),
    }
}

/// A ramp hop `x[n] = base + n` of `hop_elements` samples.
pub fn ramp_hop(base: u64, hop_elements: usize) -> Vec<f32> {
    (0..hop_elements).map(|n| (base as f32) + n as f32).collect()
}

/// Read an NDJSON telemetry file into parsed `serde_json::Value` lines.
pub fn read_telemetry_lines(path: &std::path::Path) -> Vec<serde_json::Value> {
    let contents = std::fs::read_to_string(path).unwrap();
    contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}
