//! Process-wide shutdown coordinator (§4.10): a single atomic flag set from
//! a `SIGINT`/`SIGTERM` handler, checked cooperatively by the pacer after
//! every chunk and the scheduler after every window.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared, cloneable handle to the process-wide shutdown flag.
#[derive(Clone)]
pub struct ShutdownFlag {
    flag: Arc<AtomicBool>,
}

impl ShutdownFlag {
    /// A freestanding flag with no signal handler attached. Useful for
    /// tests that want cooperative-cancellation semantics without
    /// installing a process-wide handler; production code should go
    /// through [`install`] instead.
    pub fn new() -> Self {
        ShutdownFlag {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// `true` once a shutdown signal has been observed.
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Set the flag directly, bypassing the signal handler. Used by tests
    /// exercising cooperative cancellation without sending a real signal.
    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

static FLAG: OnceLock<ShutdownFlag> = OnceLock::new();

/// Install the `SIGINT`/`SIGTERM` handler and return the flag it sets.
/// Idempotent: a second call returns the same flag without installing a
/// second handler.
pub fn install() -> ShutdownFlag {
    FLAG.get_or_init(|| {
        let flag = ShutdownFlag::new();
        let handler_flag = flag.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            handler_flag.request();
        }) {
            log::warn!("failed to install shutdown signal handler: {e}");
        }
        flag
    })
    .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_flag_starts_unset() {
        let flag = ShutdownFlag::new();
        assert!(!flag.is_set());
    }

    #[test]
    fn request_is_observed_through_clones() {
        let flag = ShutdownFlag::new();
        let cloned = flag.clone();
        cloned.request();
        assert!(flag.is_set());
    }
}
