//! Adapter entry point (§4.4/§4.7): the out-of-process kernel host. One
//! process serves exactly one connection for its whole lifetime and exits
//! after `BYE` or the connection drops.

use std::path::PathBuf;
use std::time::Duration;

use crate::abi::KernelConfig;
use crate::config::DType;
use crate::error::CortexError;
use crate::loader::{resolve_library_path, LoadedPlugin};
use crate::protocol::messages::{ConfigAck, Pong, WindowResult};
use crate::protocol::{AdapterEvent, AdapterProtocol};
use crate::transport::{monotonic_ns, Transport};

/// 5-second unconditional-exit timer of §4.3.4: if nothing arrives from the
/// host within this long, the adapter tears itself down rather than wait
/// forever for a harness that has gone away.
const IDLE_EXIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Kernels this adapter process is willing to load, advertised verbatim in
/// `HELLO`.
pub struct AdapterOptions {
    pub boot_id: u32,
    pub adapter_name: String,
    pub max_window_samples: u32,
    pub max_channels: u32,
    pub spec_uris: Vec<String>,
}

/// Run one adapter session to completion over `transport`: handshake, the
/// per-window loop, and teardown. Returns `Ok(())` on a clean `BYE` or
/// connection close; any other failure is returned so the caller can exit
/// non-zero.
pub fn run_adapter(transport: Box<dyn Transport>, options: AdapterOptions) -> Result<(), CortexError> {
    let mut protocol = AdapterProtocol::new(transport, IDLE_EXIT_TIMEOUT);

    protocol.send_hello(
        options.boot_id,
        &options.adapter_name,
        options.max_window_samples,
        options.max_channels,
        options.spec_uris,
    )?;

    let (config_seq, config) = match protocol.recv_config() {
        Ok(v) => v,
        Err(e) => {
            protocol.close();
            return Err(e);
        }
    };

    let plugin = match load_and_init(&config) {
        Ok(loaded) => loaded,
        Err(e) => {
            let _ = protocol.send_error(config_seq, 1, e.to_string());
            protocol.close();
            return Err(e);
        }
    };

    let ack = ConfigAck {
        output_window_samples: plugin.kernel.output_window_length_samples,
        output_channels: plugin.kernel.output_channels,
        status: 0,
    };
    protocol.send_config_ack(config_seq, ack)?;

    let result = run_window_loop(&mut protocol, &plugin);

    drop(plugin); // calls teardown exactly once, via LoadedKernel::drop
    protocol.close();
    result
}

struct InitializedKernel {
    kernel: crate::kernel::LoadedKernel,
}

fn load_and_init(config: &crate::protocol::messages::Config) -> Result<InitializedKernel, CortexError> {
    let path: PathBuf = resolve_library_path(&config.spec_uri)?;
    // SAFETY: `path` was resolved from a `CONFIG` frame the host sent after
    // its own validation against the kernels we advertised in `HELLO`.
    let plugin: LoadedPlugin = unsafe { LoadedPlugin::open(&path)? };

    let dtype = config.dtype.to_wire();
    let kernel_config = KernelConfig::new(
        config.sample_rate_hz,
        config.window_samples,
        config.hop_samples,
        config.channels,
        dtype,
        false,
    )
    .with_kernel_params(&config.plugin_params)
    .with_calibration_state(&config.calibration_state);

    let kernel = crate::kernel::LoadedKernel::init(plugin, &kernel_config)?;
    Ok(InitializedKernel { kernel })
}

fn run_window_loop(protocol: &mut AdapterProtocol, plugin: &InitializedKernel) -> Result<(), CortexError> {
    let out_elements =
        (plugin.kernel.output_window_length_samples as usize) * (plugin.kernel.output_channels as usize);

    loop {
        match protocol.recv_next()? {
            AdapterEvent::Window { seq, req } => {
                let tfirst_tx_ns = monotonic_ns();
                let tstart_ns = monotonic_ns();
                let mut output = vec![0.0f32; out_elements];
                plugin.kernel.process(&req.input, &mut output);
                let tend_ns = monotonic_ns();

                let result = WindowResult {
                    tin_ns: req.tin_ns,
                    tstart_ns,
                    tend_ns,
                    tfirst_tx_ns,
                    tlast_tx_ns: monotonic_ns(),
                    status: 0,
                    output,
                };
                protocol.send_result(seq, result)?;
            }
            AdapterEvent::Ping { seq, ping } => {
                let adapter_rx_ns = monotonic_ns();
                let pong = Pong {
                    host_tx_ns: ping.host_tx_ns,
                    adapter_rx_ns,
                    adapter_tx_ns: monotonic_ns(),
                    host_rx_ns: 0, // filled in by the host on receipt
                };
                protocol.send_pong(seq, pong)?;
            }
            AdapterEvent::Bye => return Ok(()),
        }
    }
}

/// Validate a dtype byte against this adapter's supported set before
/// attempting to load anything; kept separate from [`load_and_init`] so the
/// CLI can surface a clearer message for an unsupported dtype specifically.
pub fn supports_dtype(dtype: DType) -> bool {
    matches!(dtype, DType::Float32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_float32_is_currently_supported() {
        assert!(supports_dtype(DType::Float32));
        assert!(!supports_dtype(DType::Q15));
        assert!(!supports_dtype(DType::Q7));
    }
}
