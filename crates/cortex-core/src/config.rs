//! Stream configuration, immutable for the lifetime of a run.

use std::time::Duration;

use crate::error::CortexError;

/// Sample element type. Only [`DType::Float32`] is required by any current
/// kernel; the other two are reserved enumerants that carry their element
/// size for wire compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DType {
    Float32 = 0,
    Q15 = 1,
    Q7 = 2,
}

impl DType {
    /// Size in bytes of one element of this type.
    pub const fn size_bytes(self) -> usize {
        match self {
            DType::Float32 => 4,
            DType::Q15 => 2,
            DType::Q7 => 1,
        }
    }

    /// Decode the wire representation used in `CONFIG`/`KernelConfig`.
    pub fn from_wire(v: u32) -> Option<Self> {
        match v {
            0 => Some(DType::Float32),
            1 => Some(DType::Q15),
            2 => Some(DType::Q7),
            _ => None,
        }
    }

    /// Encode for the wire.
    pub const fn to_wire(self) -> u32 {
        self as u32
    }
}

/// Stream configuration, fixed for the lifetime of a run (§3.1).
#[derive(Debug, Clone, Copy)]
pub struct StreamConfig {
    /// Nominal samples per second per channel (`Fs`).
    pub sample_rate_hz: u32,
    /// Samples per dispatched window (`W`).
    pub window_length_samples: u32,
    /// Samples between consecutive windows (`H`).
    pub hop_samples: u32,
    /// Independent channels per time index (`C`).
    pub channels: u32,
    /// Sample element type.
    pub dtype: DType,
    /// Windows within the first `warmup_seconds * Fs / H` hops are marked
    /// `warmup = true` but not excluded.
    pub warmup_seconds: u32,
    /// Slack added to the nominal `H/Fs` per-window deadline.
    pub deadline_margin: Duration,
}

impl StreamConfig {
    /// Validate the invariants of §3.1. Rejects configs whose size products
    /// would overflow `usize`/`u64`.
    pub fn validate(&self) -> Result<(), CortexError> {
        if self.sample_rate_hz == 0 {
            return Err(CortexError::ConfigInvalid(
                "sample_rate_hz must be > 0".into(),
            ));
        }
        if self.window_length_samples == 0 {
            return Err(CortexError::ConfigInvalid(
                "window_length_samples must be > 0".into(),
            ));
        }
        if self.hop_samples == 0 {
            return Err(CortexError::ConfigInvalid("hop_samples must be > 0".into()));
        }
        if self.channels == 0 {
            return Err(CortexError::ConfigInvalid("channels must be > 0".into()));
        }
        if self.hop_samples > self.window_length_samples {
            return Err(CortexError::ConfigInvalid(format!(
                "hop_samples ({}) must be <= window_length_samples ({})",
                self.hop_samples, self.window_length_samples
            )));
        }

        self.window_elements()
            .ok_or_else(|| CortexError::ConfigInvalid("W*C overflows usize".into()))?;
        self.hop_elements()
            .ok_or_else(|| CortexError::ConfigInvalid("H*C overflows usize".into()))?;
        self.window_bytes()
            .ok_or_else(|| CortexError::ConfigInvalid("W*C*sizeof(dtype) overflows usize".into()))?;
        self.hop_bytes()
            .ok_or_else(|| CortexError::ConfigInvalid("H*C*sizeof(dtype) overflows usize".into()))?;

        // W * Fs * C must not overflow u64 when multiplied by a generous
        // number of expected run seconds; guard against pathological configs
        // rather than an exact runtime bound (the run length isn't known
        // yet).
        let product = (self.window_length_samples as u64)
            .checked_mul(self.sample_rate_hz as u64)
            .and_then(|v| v.checked_mul(self.channels as u64))
            .and_then(|v| v.checked_mul(86_400u64)); // one day of runtime headroom
        if product.is_none() {
            return Err(CortexError::ConfigInvalid(
                "W*Fs*C overflows u64 over a day of runtime".into(),
            ));
        }

        Ok(())
    }

    /// `W * C`, checked.
    pub fn window_elements(&self) -> Option<usize> {
        (self.window_length_samples as usize).checked_mul(self.channels as usize)
    }

    /// `H * C`, checked.
    pub fn hop_elements(&self) -> Option<usize> {
        (self.hop_samples as usize).checked_mul(self.channels as usize)
    }

    /// `W * C * sizeof(dtype)`, checked.
    pub fn window_bytes(&self) -> Option<usize> {
        self.window_elements()?.checked_mul(self.dtype.size_bytes())
    }

    /// `H * C * sizeof(dtype)`, checked.
    pub fn hop_bytes(&self) -> Option<usize> {
        self.hop_elements()?.checked_mul(self.dtype.size_bytes())
    }

    /// Nominal per-window deadline duration: `H/Fs + deadline_margin`.
    pub fn nominal_deadline(&self) -> Duration {
        let hop_duration =
            Duration::from_secs_f64(self.hop_samples as f64 / self.sample_rate_hz as f64);
        hop_duration + self.deadline_margin
    }

    /// Number of hops after which `warmup_seconds` has elapsed.
    pub fn warmup_hops(&self) -> u64 {
        let hops_per_second = self.sample_rate_hz as f64 / self.hop_samples as f64;
        (self.warmup_seconds as f64 * hops_per_second).ceil() as u64
    }
}
