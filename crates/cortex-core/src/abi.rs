//! The in-process Kernel ABI (§3.5/§4.4): a fixed, C-layout contract shared
//! by kernels loaded locally and kernels hosted inside an adapter process.
//!
//! Every type in this module is `#[repr(C)]` and crosses an FFI boundary;
//! nothing here owns memory beyond the lifetime of a single call.

use std::os::raw::c_void;

/// The only ABI version this crate speaks. A kernel built against any other
/// value MUST be rejected at load time.
pub const ABI_VERSION: u32 = 3;

bitflags::bitflags! {
    /// Reserved capability bits a kernel can report from [`InitResult`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        /// This kernel will refuse to run without a non-empty
        /// `calibration_state` produced by a prior `calibrate` call.
        const REQUIRES_CALIBRATION = 0b0000_0001;
    }
}

/// Element type on the wire and in `Config`, matching [`crate::config::DType`]'s
/// wire encoding.
pub type WireDType = u32;

/// Fixed-offset config struct passed by pointer into `init` and `calibrate`.
///
/// Field order is part of the ABI; do not reorder.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct KernelConfig {
    pub abi_version: u32,
    pub struct_size: u32,
    pub sample_rate_hz: u32,
    pub window_length_samples: u32,
    pub hop_samples: u32,
    pub channels: u32,
    pub dtype: WireDType,
    pub allow_in_place: u32,
    pub kernel_params: *const u8,
    pub kernel_params_size: u32,
    pub calibration_state: *const u8,
    pub calibration_state_size: u32,
}

impl KernelConfig {
    /// Build a config with no `kernel_params`/`calibration_state` payload
    /// attached; callers append real pointers once the backing buffers are
    /// pinned for the call's duration.
    pub fn new(
        sample_rate_hz: u32,
        window_length_samples: u32,
        hop_samples: u32,
        channels: u32,
        dtype: WireDType,
        allow_in_place: bool,
    ) -> Self {
        KernelConfig {
            abi_version: ABI_VERSION,
            struct_size: std::mem::size_of::<KernelConfig>() as u32,
            sample_rate_hz,
            window_length_samples,
            hop_samples,
            channels,
            dtype,
            allow_in_place: allow_in_place as u32,
            kernel_params: std::ptr::null(),
            kernel_params_size: 0,
            calibration_state: std::ptr::null(),
            calibration_state_size: 0,
        }
    }

    /// Attach `kernel_params` bytes, valid only as long as `params` outlives
    /// every call made with the returned config.
    pub fn with_kernel_params(mut self, params: &[u8]) -> Self {
        self.kernel_params = params.as_ptr();
        self.kernel_params_size = params.len() as u32;
        self
    }

    /// Attach a `calibration_state` blob, valid only as long as `state`
    /// outlives every call made with the returned config.
    pub fn with_calibration_state(mut self, state: &[u8]) -> Self {
        self.calibration_state = state.as_ptr();
        self.calibration_state_size = state.len() as u32;
        self
    }
}

/// Opaque kernel-owned handle, uniquely owned by whichever caller invoked
/// `init`; passed by shared reference into `process`, consumed by
/// `teardown`.
pub type KernelHandle = *mut c_void;

/// Return value of `init`. A rejected config is signalled by a null
/// `handle` together with zeroed `output_window_length_samples` /
/// `output_channels`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct InitResult {
    pub handle: KernelHandle,
    pub output_window_length_samples: u32,
    pub output_channels: u32,
    pub capabilities: u32,
}

impl InitResult {
    /// The canonical "config rejected" return value.
    pub const REJECTED: InitResult = InitResult {
        handle: std::ptr::null_mut(),
        output_window_length_samples: 0,
        output_channels: 0,
        capabilities: 0,
    };

    /// `true` if `init` accepted the config (a non-null handle was
    /// returned).
    pub fn accepted(&self) -> bool {
        !self.handle.is_null()
    }
}

/// `init(config*) -> InitResult`.
pub type InitFn = unsafe extern "C" fn(config: *const KernelConfig) -> InitResult;

/// `process(handle, input, output)`. Hermetic: the kernel MUST NOT
/// allocate, perform I/O, or block on synchronization inside this call.
pub type ProcessFn =
    unsafe extern "C" fn(handle: KernelHandle, input: *const f32, output: *mut f32);

/// `teardown(handle)`, idempotent on a null handle.
pub type TeardownFn = unsafe extern "C" fn(handle: KernelHandle);

/// `calibrate(config*, labeled_windows*, n_windows, params*, out_state_buf,
/// out_state_cap) -> size_t`, optional. Returns the number of bytes written
/// to `out_state_buf`, or `0` if calibration could not produce a state.
pub type CalibrateFn = unsafe extern "C" fn(
    config: *const KernelConfig,
    labeled_windows: *const f32,
    n_windows: usize,
    params: *const u8,
    out_state_buf: *mut u8,
    out_state_cap: usize,
) -> usize;

/// Symbol names bound by [`crate::loader`], exactly as they must appear in
/// the shared object.
pub const SYMBOL_INIT: &[u8] = b"init";
pub const SYMBOL_PROCESS: &[u8] = b"process";
pub const SYMBOL_TEARDOWN: &[u8] = b"teardown";
pub const SYMBOL_CALIBRATE: &[u8] = b"calibrate";
