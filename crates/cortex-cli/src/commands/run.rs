//! `cortex run`: build a [`StreamConfig`], select a dispatch mode, and drive
//! the pacer/scheduler pipeline to completion.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::Args;

use cortex_core::abi::KernelConfig;
use cortex_core::calibration::CalibrationState;
use cortex_core::config::DType;
use cortex_core::error::CortexError;
use cortex_core::kernel::{KernelHandle, LoadedKernel, ProtocolClient};
use cortex_core::loader::{resolve_library_path, LoadedPlugin};
use cortex_core::pacer::{Pacer, SampleFile};
use cortex_core::shutdown;
use cortex_core::telemetry::TelemetrySink;
use cortex_core::transport::{LocalTransport, TcpClientTransport, TcpServerTransport, Transport};
use cortex_core::{Scheduler, StreamConfig};

/// Time allowed for a handshake with a remote or spawned adapter before
/// giving up.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Args)]
pub struct RunArgs {
    /// Kernel spec URI, e.g. "kernels/v1/notch_iir@f32".
    #[arg(long)]
    spec_uri: String,

    /// Path to the raw `N x C` little-endian f32 sample file.
    #[arg(long)]
    sample_file: PathBuf,

    /// Nominal samples per second per channel.
    #[arg(long)]
    sample_rate_hz: u32,

    /// Samples per dispatched window.
    #[arg(long)]
    window_samples: u32,

    /// Samples between consecutive windows.
    #[arg(long)]
    hop_samples: u32,

    /// Independent channels per time index.
    #[arg(long)]
    channels: u32,

    /// Seconds during which windows are marked `warmup` but still run.
    #[arg(long, default_value_t = 0)]
    warmup_seconds: u32,

    /// Extra slack added to the nominal per-window deadline.
    #[arg(long, default_value_t = 0)]
    deadline_margin_ms: u64,

    /// Raw `key=value` kernel parameter string, e.g. "gain=2.5,notch_hz=60".
    #[arg(long, default_value = "")]
    kernel_params: String,

    /// Path to a previously produced calibration-state envelope.
    #[arg(long)]
    calibration_state: Option<PathBuf>,

    /// NDJSON telemetry output path.
    #[arg(long)]
    telemetry_output: PathBuf,

    /// Stop after this many hops instead of running until shutdown.
    #[arg(long)]
    max_hops: Option<u64>,

    /// Load the kernel's shared object directly, in-process.
    #[arg(long)]
    local: bool,

    /// Spawn this adapter binary and speak the protocol over a local socket
    /// pair.
    #[arg(long)]
    spawn_adapter: Option<PathBuf>,

    /// Connect to a running adapter at `host:port`.
    #[arg(long)]
    tcp_connect: Option<String>,

    /// Listen on `port` and wait for one adapter connection.
    #[arg(long)]
    tcp_listen: Option<u16>,
}

pub fn run(args: RunArgs) -> Result<(), CortexError> {
    let stream_config = StreamConfig {
        sample_rate_hz: args.sample_rate_hz,
        window_length_samples: args.window_samples,
        hop_samples: args.hop_samples,
        channels: args.channels,
        dtype: DType::Float32,
        warmup_seconds: args.warmup_seconds,
        deadline_margin: Duration::from_millis(args.deadline_margin_ms),
    };
    stream_config.validate()?;

    let shutdown = shutdown::install();
    let kernel_params_bytes = args.kernel_params.as_bytes().to_vec();
    let calibration_bytes = match &args.calibration_state {
        Some(path) => {
            let envelope = std::fs::read(path)?;
            CalibrationState::decode(&envelope)?.payload
        }
        None => Vec::new(),
    };

    let kernel_handle = build_kernel_handle(&args, &stream_config, &kernel_params_bytes, &calibration_bytes)?;

    let sink = TelemetrySink::create(&args.telemetry_output)?;
    let run_id = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let plugin_name = kernel_name(&args.spec_uri);

    let mut scheduler = Scheduler::new(stream_config, kernel_handle, sink, shutdown.clone(), run_id, plugin_name)?;

    let hop_elements = stream_config
        .hop_elements()
        .ok_or_else(|| CortexError::ConfigInvalid("H*C overflows usize".into()))?;
    let sample_file = SampleFile::open(&args.sample_file, hop_elements)?;
    let hop_period = Duration::from_secs_f64(args.hop_samples as f64 / args.sample_rate_hz as f64);
    let pacer = Pacer::new(sample_file, hop_elements, hop_period, shutdown);

    let mut dispatch_err = None;
    pacer.run(args.max_hops, |hop| {
        if dispatch_err.is_some() {
            return;
        }
        if let Err(e) = scheduler.on_hop(hop) {
            dispatch_err = Some(e);
        }
    });
    if let Some(e) = dispatch_err {
        return Err(e);
    }

    scheduler.flush()?;
    Ok(())
}

fn kernel_name(spec_uri: &str) -> String {
    let file_name = Path::new(spec_uri)
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or(spec_uri);
    file_name.to_string()
}

fn build_kernel_handle(
    args: &RunArgs,
    stream_config: &StreamConfig,
    kernel_params_bytes: &[u8],
    calibration_bytes: &[u8],
) -> Result<KernelHandle, CortexError> {
    if args.local {
        return build_local_kernel(args, stream_config, kernel_params_bytes, calibration_bytes);
    }

    let transport: Box<dyn Transport> = if let Some(adapter_binary) = &args.spawn_adapter {
        Box::new(LocalTransport::spawn(adapter_binary, &[])?)
    } else if let Some(addr) = &args.tcp_connect {
        let (host, port) = split_host_port(addr)?;
        Box::new(TcpClientTransport::connect(&host, port)?)
    } else if let Some(port) = args.tcp_listen {
        let server = TcpServerTransport::bind(port)?;
        Box::new(server.accept(HANDSHAKE_TIMEOUT)?)
    } else {
        return Err(CortexError::ConfigInvalid(
            "one of --local, --spawn-adapter, --tcp-connect, --tcp-listen is required".into(),
        ));
    };

    let client = ProtocolClient::new(
        transport,
        HANDSHAKE_TIMEOUT,
        stream_config,
        &args.spec_uri,
        kernel_params_bytes,
        calibration_bytes,
    )?;
    Ok(KernelHandle::Remote(client))
}

fn build_local_kernel(
    args: &RunArgs,
    stream_config: &StreamConfig,
    kernel_params_bytes: &[u8],
    calibration_bytes: &[u8],
) -> Result<KernelHandle, CortexError> {
    let path = resolve_library_path(&args.spec_uri)?;
    // SAFETY: the caller passed `--local` and is asserting this shared
    // object implements the Kernel ABI.
    let plugin = unsafe { LoadedPlugin::open(&path)? };
    let kernel_config = KernelConfig::new(
        stream_config.sample_rate_hz,
        stream_config.window_length_samples,
        stream_config.hop_samples,
        stream_config.channels,
        stream_config.dtype.to_wire(),
        false,
    )
    .with_kernel_params(kernel_params_bytes)
    .with_calibration_state(calibration_bytes);

    let kernel = LoadedKernel::init(plugin, &kernel_config)?;
    Ok(KernelHandle::InProcess(kernel))
}

fn split_host_port(addr: &str) -> Result<(String, u16), CortexError> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| CortexError::ConfigInvalid(format!("'{addr}' is not host:port")))?;
    let port: u16 = port
        .parse()
        .map_err(|_| CortexError::ConfigInvalid(format!("'{port}' is not a valid port")))?;
    Ok((host.to_string(), port))
}
