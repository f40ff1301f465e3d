//! Plugin loader (§4.8): resolves a spec URI to a shared object, binds the
//! four ABI symbols, and hands back an owning handle that unloads on drop.

use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};

use crate::abi::{
    CalibrateFn, InitFn, ProcessFn, TeardownFn, SYMBOL_CALIBRATE, SYMBOL_INIT, SYMBOL_PROCESS,
    SYMBOL_TEARDOWN,
};
use crate::error::CortexError;

/// Platform's shared-library suffix, chosen at compile time.
#[cfg(target_os = "macos")]
const LIB_SUFFIX: &str = "dylib";
#[cfg(target_os = "windows")]
const LIB_SUFFIX: &str = "dll";
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const LIB_SUFFIX: &str = "so";

/// Resolve a spec URI of the form `<base>/<name>@<dtype>` to the shared
/// object the loader should open, e.g. `…/kernels/v1/notch_iir@f32` becomes
/// `…/kernels/v1/libnotch_iir.so` on Linux.
pub fn resolve_library_path(spec_uri: &str) -> Result<PathBuf, CortexError> {
    let path = Path::new(spec_uri);
    let file_name = path.file_name().and_then(|f| f.to_str()).ok_or_else(|| {
        CortexError::ConfigInvalid(format!("spec uri '{spec_uri}' has no file component"))
    })?;
    let name = file_name.split('@').next().unwrap_or(file_name);
    if name.is_empty() {
        return Err(CortexError::ConfigInvalid(format!(
            "spec uri '{spec_uri}' has an empty kernel name"
        )));
    }
    let lib_name = format!("lib{name}.{LIB_SUFFIX}");
    Ok(match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(lib_name),
        _ => PathBuf::from(lib_name),
    })
}

/// An owned, loaded kernel plugin. The backing [`Library`] is dropped last,
/// after every bound symbol goes out of scope, so the shared object unloads
/// cleanly on drop.
pub struct LoadedPlugin {
    library: Library,
    init: InitFn,
    process: ProcessFn,
    teardown: TeardownFn,
    calibrate: Option<CalibrateFn>,
}

impl LoadedPlugin {
    /// Open `path` with default symbol visibility and bind `init`,
    /// `process`, `teardown` (required) plus `calibrate` (optional).
    ///
    /// # Safety
    /// The caller asserts `path` names a shared object that implements the
    /// Kernel ABI faithfully: the loader cannot verify calling convention or
    /// signature compatibility beyond symbol presence.
    pub unsafe fn open(path: &Path) -> Result<Self, CortexError> {
        let library = unsafe { Library::new(path) }.map_err(|e| {
            CortexError::ConfigInvalid(format!("failed to load kernel '{}': {e}", path.display()))
        })?;

        let init = *unsafe { bind::<InitFn>(&library, SYMBOL_INIT, path)? };
        let process = *unsafe { bind::<ProcessFn>(&library, SYMBOL_PROCESS, path)? };
        let teardown = *unsafe { bind::<TeardownFn>(&library, SYMBOL_TEARDOWN, path)? };
        let calibrate = unsafe { bind::<CalibrateFn>(&library, SYMBOL_CALIBRATE, path) }
            .ok()
            .map(|s| *s);

        Ok(LoadedPlugin {
            library,
            init,
            process,
            teardown,
            calibrate,
        })
    }

    pub fn init(&self) -> InitFn {
        self.init
    }

    pub fn process(&self) -> ProcessFn {
        self.process
    }

    pub fn teardown(&self) -> TeardownFn {
        self.teardown
    }

    pub fn calibrate(&self) -> Option<CalibrateFn> {
        self.calibrate
    }

    /// Whether this plugin exposes an optional `calibrate` entry point.
    pub fn supports_calibration(&self) -> bool {
        self.calibrate.is_some()
    }
}

// Keep `library` alive for as long as any bound symbol might be called
// through this handle; `libloading::Library`'s own `Drop` does the unload.
impl Drop for LoadedPlugin {
    fn drop(&mut self) {
        log::debug!("unloading kernel plugin");
        let _ = &self.library;
    }
}

unsafe fn bind<'lib, T>(
    library: &'lib Library,
    symbol: &[u8],
    path: &Path,
) -> Result<Symbol<'lib, T>, CortexError> {
    unsafe { library.get(symbol) }.map_err(|e| {
        CortexError::ConfigInvalid(format!(
            "kernel '{}' is missing required symbol '{}': {e}",
            path.display(),
            String::from_utf8_lossy(symbol)
        ))
    })
}
