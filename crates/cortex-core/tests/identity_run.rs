//! Scenario 1: an identity kernel run of 1000 windows end to end through
//! the scheduler, dispatched over the wire protocol to an in-process
//! stand-in adapter (see `common::spawn_identity_adapter`).

mod common;

use std::os::unix::net::UnixStream;
use std::time::Duration;

use cortex_core::kernel::{KernelHandle, ProtocolClient};
use cortex_core::shutdown::ShutdownFlag;
use cortex_core::telemetry::TelemetrySink;
use cortex_core::transport::LocalTransport;
use cortex_core::Scheduler;

const WINDOWS: u64 = 1000;

#[test]
fn identity_run_emits_one_thousand_windows() {
    let config = common::scenario_stream_config();
    let hop_elements = config.hop_elements().unwrap();

    let (host_end, adapter_end) = UnixStream::pair().unwrap();
    let host_transport = Box::new(LocalTransport::from_stream(host_end));
    let adapter_transport = Box::new(LocalTransport::from_stream(adapter_end));
    let adapter = common::spawn_identity_adapter(adapter_transport, None);

    let client = ProtocolClient::new(
        host_transport,
        Duration::from_secs(5),
        &config,
        "identity@f32",
        &[],
        &[],
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let telemetry_path = dir.path().join("run.ndjson");
    let sink = TelemetrySink::create(&telemetry_path).unwrap();

    let mut scheduler = Scheduler::new(
        config,
        KernelHandle::Remote(client),
        sink,
        ShutdownFlag::new(),
        1,
        "identity@f32",
    )
    .unwrap();

    // First full window forms after two hops (W=160, H=80); feed enough
    // hops for exactly `WINDOWS` dispatches.
    let mut rows = Vec::new();
    for hop_index in 0..WINDOWS + 1 {
        let hop = common::ramp_hop(hop_index * hop_elements as u64, hop_elements);
        if let Some(row) = scheduler.on_hop(&hop).unwrap() {
            rows.push(row);
        }
    }
    assert!(scheduler.flush().unwrap().is_none(), "ring was just drained, nothing left to flush");

    drop(scheduler);
    adapter.join().unwrap();

    assert_eq!(rows.len(), WINDOWS as usize);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row.window_index, i as u64);
        assert!(!row.deadline_missed, "window {i} unexpectedly missed its deadline");
    }
    for pair in rows.windows(2) {
        assert!(
            pair[1].release_ts_ns > pair[0].release_ts_ns,
            "release_ts_ns must strictly increase across windows"
        );
    }

    let telemetry = common::read_telemetry_lines(&telemetry_path);
    assert_eq!(telemetry.len(), WINDOWS as usize + 1, "system_info record plus one row per window");
    assert_eq!(telemetry[0]["_type"], "system_info");
}
