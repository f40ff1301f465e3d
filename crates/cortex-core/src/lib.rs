//! Core library for the CORTEX benchmarking substrate: replay pacer,
//! windowing scheduler, device adapter wire protocol, and the in-process
//! kernel ABI.

pub mod abi;
pub mod adapter;
pub mod calibration;
pub mod codec;
pub mod config;
pub mod error;
pub mod frame;
pub mod kernel;
pub mod kernel_params;
pub mod loader;
pub mod pacer;
pub mod protocol;
pub mod ring;
pub mod scheduler;
pub mod shutdown;
pub mod system_info;
pub mod telemetry;
pub mod transport;

pub use config::{DType, StreamConfig};
pub use error::{CortexError, FrameError, TransportError};
pub use kernel::KernelHandle;
pub use scheduler::Scheduler;
