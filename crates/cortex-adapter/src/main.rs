//! `cortex-adapter` — out-of-process kernel host. Inherits a connected
//! socket pair on stdin/stdout when spawned by `cortex run --spawn-adapter`,
//! or dials/listens over TCP when given explicit flags.

use std::os::unix::net::UnixStream;
use std::os::unix::io::{FromRawFd, RawFd};
use std::time::Duration;

use clap::Parser;

use cortex_core::adapter::{run_adapter, AdapterOptions};
use cortex_core::transport::{LocalTransport, TcpClientTransport, TcpServerTransport, Transport};

/// Time to wait for an incoming TCP connection before giving up, in
/// `--tcp-listen` mode.
const ACCEPT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "cortex-adapter")]
#[command(about = "Out-of-process kernel host for the CORTEX device adapter protocol")]
struct Cli {
    /// Kernel spec URIs this adapter is willing to load, e.g.
    /// "kernels/v1/notch_iir@f32". May be repeated.
    #[arg(long = "kernel", required = true)]
    kernels: Vec<String>,

    /// Largest window size in samples this adapter will accept.
    #[arg(long, default_value_t = 16384)]
    max_window_samples: u32,

    /// Largest channel count this adapter will accept.
    #[arg(long, default_value_t = 1024)]
    max_channels: u32,

    /// Connect outbound to a waiting harness at `host:port` instead of
    /// inheriting stdio.
    #[arg(long)]
    tcp_connect: Option<String>,

    /// Listen on `port` and wait for one harness connection instead of
    /// inheriting stdio.
    #[arg(long)]
    tcp_listen: Option<u16>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let transport = match build_transport(&cli) {
        Ok(t) => t,
        Err(e) => {
            log::error!("failed to establish transport: {e}");
            std::process::exit(1);
        }
    };

    let options = AdapterOptions {
        boot_id: std::process::id(),
        adapter_name: "cortex-adapter".to_string(),
        max_window_samples: cli.max_window_samples,
        max_channels: cli.max_channels,
        spec_uris: cli.kernels,
    };

    if let Err(e) = run_adapter(transport, options) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn build_transport(cli: &Cli) -> Result<Box<dyn Transport>, cortex_core::CortexError> {
    if let Some(addr) = &cli.tcp_connect {
        let (host, port) = split_host_port(addr)?;
        return Ok(Box::new(TcpClientTransport::connect(&host, port)?));
    }
    if let Some(port) = cli.tcp_listen {
        let server = TcpServerTransport::bind(port)?;
        return Ok(Box::new(server.accept(ACCEPT_TIMEOUT)?));
    }

    // Default: the harness spawned us with one end of a `UnixStream::pair`
    // wired to our stdin/stdout (§4.2).
    let fd: RawFd = 0;
    // SAFETY: fd 0 was handed to us by `cortex run --spawn-adapter` as a
    // connected `UnixStream`; we own it for the lifetime of this process.
    let stream = unsafe { UnixStream::from_raw_fd(fd) };
    Ok(Box::new(LocalTransport::from_stream(stream)))
}

fn split_host_port(addr: &str) -> Result<(String, u16), cortex_core::CortexError> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| cortex_core::CortexError::ConfigInvalid(format!("'{addr}' is not host:port")))?;
    let port: u16 = port
        .parse()
        .map_err(|_| cortex_core::CortexError::ConfigInvalid(format!("'{port}' is not a valid port")))?;
    Ok((host.to_string(), port))
}
