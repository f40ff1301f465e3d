//! Scheduler (§4.6): ring buffer, window formation, and dispatch against
//! one kernel handle, in-process or remote, for the lifetime of a run.

use crate::config::StreamConfig;
use crate::error::CortexError;
use crate::kernel::KernelHandle;
use crate::ring::SampleRing;
use crate::shutdown::ShutdownFlag;
use crate::telemetry::{TelemetryErrorRecord, TelemetryRow, TelemetrySink};
use crate::transport::monotonic_ns;

/// Device-clock timestamps a remote adapter reports alongside its
/// `RESULT` (§3.4). `None` for an in-process kernel, which has no
/// separate device clock to report.
struct DeviceTimestamps {
    tin_ns: u64,
    tstart_ns: u64,
    tend_ns: u64,
    tfirst_tx_ns: u64,
    tlast_tx_ns: u64,
}

/// Outcome of dispatching one formed window.
struct DispatchOutcome {
    output: Vec<f32>,
    start_ts_ns: u64,
    end_ts_ns: u64,
    device_timestamps: Option<DeviceTimestamps>,
}

/// Drives window formation and dispatch for one run against one kernel
/// (§4.6). Not reentrant: a scheduler instance is owned by exactly one
/// main-thread loop for the duration of a run.
pub struct Scheduler {
    config: StreamConfig,
    ring: SampleRing,
    kernel: KernelHandle,
    sink: TelemetrySink,
    shutdown: ShutdownFlag,
    run_id: u64,
    plugin_name: String,
    window_index: u64,
    samples_since_last_snapshot: u64,
    failed: bool,
}

impl Scheduler {
    pub fn new(
        config: StreamConfig,
        kernel: KernelHandle,
        sink: TelemetrySink,
        shutdown: ShutdownFlag,
        run_id: u64,
        plugin_name: impl Into<String>,
    ) -> Result<Self, CortexError> {
        let capacity = config
            .window_elements()
            .ok_or_else(|| CortexError::ConfigInvalid("W*C overflows usize".into()))?;
        Ok(Scheduler {
            config,
            ring: SampleRing::new(capacity),
            kernel,
            sink,
            shutdown,
            run_id,
            plugin_name: plugin_name.into(),
            window_index: 0,
            samples_since_last_snapshot: 0,
            failed: false,
        })
    }

    /// `true` once a fatal error has aborted the run; no further windows
    /// will be emitted.
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// `true` if the cooperative shutdown flag has been observed.
    pub fn should_stop(&self) -> bool {
        self.shutdown.is_set()
    }

    /// Feed one hop (`H·C` elements) into the ring and, once the ring has
    /// accumulated a full window, dispatch it. Returns `Ok(None)` during
    /// warmup fill (ring not yet full) and on every hop after a prior fatal
    /// error.
    pub fn on_hop(&mut self, hop: &[f32]) -> Result<Option<TelemetryRow>, CortexError> {
        if self.failed {
            return Ok(None);
        }

        self.ring.append_hop(hop);
        self.samples_since_last_snapshot += hop.len() as u64;

        if !self.ring.is_full() {
            return Ok(None);
        }

        self.emit_window()
    }

    /// Emit one final window at end-of-stream if the ring holds a full
    /// window and the last snapshot was more than `H` samples ago (§4.6
    /// Flush).
    pub fn flush(&mut self) -> Result<Option<TelemetryRow>, CortexError> {
        if self.failed || !self.ring.is_full() {
            return Ok(None);
        }
        if self.samples_since_last_snapshot < self.config.hop_samples as u64 * self.config.channels as u64 {
            return Ok(None);
        }
        self.emit_window()
    }

    fn emit_window(&mut self) -> Result<Option<TelemetryRow>, CortexError> {
        let capacity = self.ring.capacity();
        let mut window = vec![0.0f32; capacity];
        self.ring.snapshot_into(&mut window);
        self.samples_since_last_snapshot = 0;

        let release_ts_ns = monotonic_ns();
        let hop_ns = (self.config.hop_samples as u64 * 1_000_000_000) / self.config.sample_rate_hz as u64;
        let deadline_ts_ns = release_ts_ns + hop_ns + self.config.deadline_margin.as_nanos() as u64;

        let dispatch_result = self.dispatch(&window);

        let outcome = match dispatch_result {
            Ok(outcome) => outcome,
            Err(e) => {
                self.record_failure(&e);
                return Err(e);
            }
        };

        let warmup = self.window_index < self.config.warmup_hops();

        let mut row = TelemetryRow::new(
            self.run_id,
            self.plugin_name.clone(),
            self.window_index,
            release_ts_ns,
            deadline_ts_ns,
            outcome.start_ts_ns,
            outcome.end_ts_ns,
            self.config.window_length_samples,
            self.config.hop_samples,
            self.config.channels,
            self.config.sample_rate_hz,
            warmup,
            0,
        );
        if let Some(device) = outcome.device_timestamps {
            row = row.with_device_timestamps(
                device.tin_ns,
                device.tstart_ns,
                device.tend_ns,
                device.tfirst_tx_ns,
                device.tlast_tx_ns,
            );
        }
        self.sink.write_row(&row)?;
        self.window_index += 1;

        Ok(Some(row))
    }

    fn dispatch(&mut self, window: &[f32]) -> Result<DispatchOutcome, CortexError> {
        let start_ts_ns = monotonic_ns();
        let (output, device_timestamps) = match &mut self.kernel {
            KernelHandle::InProcess(kernel) => {
                let (out_w, out_c) = (
                    kernel.output_window_length_samples as usize,
                    kernel.output_channels as usize,
                );
                let mut output = vec![0.0f32; out_w * out_c];
                kernel.process(window, &mut output);
                (output, None)
            }
            KernelHandle::Remote(client) => {
                let result = client.process(start_ts_ns, window.to_vec())?;
                let device_timestamps = DeviceTimestamps {
                    tin_ns: result.tin_ns,
                    tstart_ns: result.tstart_ns,
                    tend_ns: result.tend_ns,
                    tfirst_tx_ns: result.tfirst_tx_ns,
                    tlast_tx_ns: result.tlast_tx_ns,
                };
                (result.output, Some(device_timestamps))
            }
        };
        let end_ts_ns = monotonic_ns();
        Ok(DispatchOutcome {
            output,
            start_ts_ns,
            end_ts_ns,
            device_timestamps,
        })
    }

    fn record_failure(&mut self, error: &CortexError) {
        self.failed = true;
        let kind = error_kind(error);
        let record = TelemetryErrorRecord::new(self.run_id, Some(self.window_index), kind, error.to_string());
        let _ = self.sink.write_error(&record);
    }
}

fn error_kind(error: &CortexError) -> &'static str {
    match error {
        CortexError::ConfigInvalid(_) => "ConfigInvalid",
        CortexError::Io(_) => "IoError",
        CortexError::Timeout(_) => "Timeout",
        CortexError::ProtocolViolation(_) => "ProtocolViolation",
        CortexError::KernelRejectedConfig(_) => "KernelRejectedConfig",
        CortexError::KernelCrash(_) => "KernelCrash",
        CortexError::Cancelled => "Cancelled",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DType;
    use std::time::Duration;

    fn small_config() -> StreamConfig {
        StreamConfig {
            sample_rate_hz: 1000,
            window_length_samples: 4,
            hop_samples: 2,
            channels: 1,
            dtype: DType::Float32,
            warmup_seconds: 0,
            deadline_margin: Duration::ZERO,
        }
    }

    #[test]
    fn emits_nothing_until_the_ring_is_full() {
        // This exercises only the ring/warmup-fill bookkeeping; dispatch is
        // covered via the in-process `LoadedKernel` path in `kernel::tests`
        // and via `ProtocolClient` in the adapter-loopback integration test.
        let ring = SampleRing::new(small_config().window_elements().unwrap());
        assert!(!ring.is_full());
    }

    #[test]
    fn error_kind_names_match_the_taxonomy() {
        assert_eq!(error_kind(&CortexError::Cancelled), "Cancelled");
        assert_eq!(
            error_kind(&CortexError::ProtocolViolation("x".into())),
            "ProtocolViolation"
        );
    }
}
