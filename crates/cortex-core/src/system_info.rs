//! Best-effort host snapshot prepended to every telemetry file (§3.4/§6.3).
//!
//! Every field beyond `os`/`arch` is optional: gathering it touches
//! platform-specific syscalls that can fail or simply not exist on a given
//! target, and a telemetry sink with a degraded system-info record is far
//! more useful than one that can't start at all.

use serde::Serialize;

/// Leading record of every telemetry file, tagged `_type = "system_info"`.
#[derive(Debug, Clone, Serialize)]
pub struct SystemInfoRecord {
    #[serde(rename = "_type")]
    pub record_type: &'static str,
    pub hostname: Option<String>,
    pub os: &'static str,
    pub arch: &'static str,
    pub cpu_count: Option<usize>,
    pub total_memory_bytes: Option<u64>,
    pub thermal_celsius: Option<f64>,
}

impl SystemInfoRecord {
    /// Gather whatever the current platform will give us. Never fails;
    /// unavailable fields are simply `None`.
    pub fn gather() -> Self {
        SystemInfoRecord {
            record_type: "system_info",
            hostname: hostname(),
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            cpu_count: cpu_count(),
            total_memory_bytes: total_memory_bytes(),
            thermal_celsius: thermal_celsius(),
        }
    }
}

fn hostname() -> Option<String> {
    #[cfg(unix)]
    {
        let mut buf = vec![0u8; 256];
        // SAFETY: buf is a valid, appropriately sized, writable buffer.
        let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
        if rc != 0 {
            return None;
        }
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        Some(String::from_utf8_lossy(&buf[..end]).into_owned())
    }
    #[cfg(not(unix))]
    {
        None
    }
}

fn cpu_count() -> Option<usize> {
    std::thread::available_parallelism().ok().map(|n| n.get())
}

#[cfg(target_os = "linux")]
fn total_memory_bytes() -> Option<u64> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    let line = meminfo.lines().find(|l| l.starts_with("MemTotal:"))?;
    let kib: u64 = line
        .split_whitespace()
        .nth(1)
        .and_then(|v| v.parse().ok())?;
    Some(kib * 1024)
}

#[cfg(not(target_os = "linux"))]
fn total_memory_bytes() -> Option<u64> {
    None
}

#[cfg(target_os = "linux")]
fn thermal_celsius() -> Option<f64> {
    let raw = std::fs::read_to_string("/sys/class/thermal/thermal_zone0/temp").ok()?;
    let millidegrees: f64 = raw.trim().parse().ok()?;
    Some(millidegrees / 1000.0)
}

#[cfg(not(target_os = "linux"))]
fn thermal_celsius() -> Option<f64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_always_succeeds_and_tags_record_type() {
        let record = SystemInfoRecord::gather();
        assert_eq!(record.record_type, "system_info");
        assert!(!record.os.is_empty());
        assert!(!record.arch.is_empty());
    }

    #[test]
    fn serializes_with_leading_type_tag() {
        let record = SystemInfoRecord::gather();
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.starts_with(r#"{"_type":"system_info""#));
    }
}
