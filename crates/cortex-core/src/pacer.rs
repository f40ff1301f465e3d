//! Replay pacer (§4.5): reads hop-sized chunks out of a memory-mapped
//! sample file on a fixed cadence, rewinding to the start on EOF, and
//! invokes a caller-supplied callback on its own thread.

use std::fs::File;
use std::path::Path;
use std::time::{Duration, Instant};

use memmap2::Mmap;

use crate::error::CortexError;
use crate::shutdown::ShutdownFlag;

/// A memory-mapped `N × C` sample file (§6.2): raw binary, row-major,
/// `f32` elements, no header or footer. Trailing partial rows are ignored.
pub struct SampleFile {
    mmap: Mmap,
    hop_elements: usize,
}

impl SampleFile {
    /// Open `path` and validate it holds at least one full hop.
    pub fn open(path: &Path, hop_elements: usize) -> Result<Self, CortexError> {
        let file = File::open(path)?;
        // SAFETY: the file is not expected to be concurrently truncated by
        // another process for the lifetime of this mapping; this matches
        // the read-only, single-writer-at-record-time usage of a sample
        // file in a benchmark run.
        let mmap = unsafe { Mmap::map(&file) }?;
        if hop_elements == 0 {
            return Err(CortexError::ConfigInvalid("hop_elements must be > 0".into()));
        }
        let hop_bytes = hop_elements * std::mem::size_of::<f32>();
        if mmap.len() < hop_bytes {
            return Err(CortexError::ConfigInvalid(format!(
                "sample file has {} bytes, smaller than one hop ({} bytes)",
                mmap.len(),
                hop_bytes
            )));
        }
        Ok(SampleFile { mmap, hop_elements })
    }

    /// Number of complete hops in the file; any trailing partial hop is
    /// discarded without emission.
    fn hop_count(&self) -> usize {
        let hop_bytes = self.hop_elements * std::mem::size_of::<f32>();
        self.mmap.len() / hop_bytes
    }

    /// Read hop `index` (0-based, wrapping is the caller's responsibility)
    /// into `out`, which MUST be exactly `hop_elements` long.
    fn read_hop(&self, index: usize, out: &mut [f32]) {
        let hop_bytes = self.hop_elements * std::mem::size_of::<f32>();
        let start = index * hop_bytes;
        let bytes = &self.mmap[start..start + hop_bytes];
        for (chunk, sample) in bytes.chunks_exact(4).zip(out.iter_mut()) {
            *sample = f32::from_le_bytes(chunk.try_into().unwrap());
        }
    }
}

/// Drives [`SampleFile`] on a fixed `H/Fs` cadence, invoking `on_chunk` once
/// per hop until either the file runs out (it rewinds and loops instead) or
/// the shutdown flag is observed.
pub struct Pacer {
    file: SampleFile,
    hop_elements: usize,
    hop_period: Duration,
    shutdown: ShutdownFlag,
}

impl Pacer {
    pub fn new(file: SampleFile, hop_elements: usize, hop_period: Duration, shutdown: ShutdownFlag) -> Self {
        Pacer {
            file,
            hop_elements,
            hop_period,
            shutdown,
        }
    }

    /// Run up to `max_hops` chunks (or forever if `None`), calling
    /// `on_chunk(data, n_samples)` once per hop on the calling thread.
    /// Returns the number of chunks actually emitted, which is less than
    /// `max_hops` only if the shutdown flag was observed first.
    pub fn run<F: FnMut(&[f32])>(&self, max_hops: Option<u64>, mut on_chunk: F) -> u64 {
        let hop_count = self.file.hop_count();
        let mut buf = vec![0.0f32; self.hop_elements];
        let t0 = Instant::now();
        let mut emitted: u64 = 0;

        loop {
            if let Some(max) = max_hops {
                if emitted >= max {
                    break;
                }
            }
            if self.shutdown.is_set() {
                break;
            }

            let file_index = (emitted as usize) % hop_count;
            self.file.read_hop(file_index, &mut buf);

            let target = t0 + self.hop_period * emitted as u32;
            sleep_until(target);

            on_chunk(&buf);
            emitted += 1;

            if self.shutdown.is_set() {
                break;
            }
        }

        emitted
    }
}

fn sleep_until(target: Instant) {
    let now = Instant::now();
    if target > now {
        std::thread::sleep(target - now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_ramp_file(path: &Path, n_elements: usize) {
        let mut file = File::create(path).unwrap();
        let bytes: Vec<u8> = (0..n_elements)
            .flat_map(|n| (n as f32).to_le_bytes())
            .collect();
        file.write_all(&bytes).unwrap();
    }

    #[test]
    fn rewinds_on_eof_and_repeats_byte_for_byte() {
        // Testable property 7 / scenario 5: M=5 hops of 1 element each, run
        // for K=13 hops; chunk M+1 equals chunk 1.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp.bin");
        write_ramp_file(&path, 5);

        let file = SampleFile::open(&path, 1).unwrap();
        let pacer = Pacer::new(file, 1, Duration::from_micros(1), ShutdownFlag::new());

        let mut chunks: Vec<f32> = Vec::new();
        pacer.run(Some(13), |data| chunks.push(data[0]));

        assert_eq!(chunks.len(), 13);
        assert_eq!(chunks[5], chunks[0]);
        assert_eq!(chunks[10], chunks[0]);
        assert_eq!(chunks[11], chunks[1]);
        assert_eq!(chunks[12], chunks[2]);
    }

    #[test]
    fn rejects_file_smaller_than_one_hop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.bin");
        write_ramp_file(&path, 1);
        assert!(SampleFile::open(&path, 4).is_err());
    }

    #[test]
    fn stops_cleanly_when_shutdown_is_requested() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp.bin");
        write_ramp_file(&path, 4);

        let file = SampleFile::open(&path, 1).unwrap();
        let shutdown = ShutdownFlag::new();
        let pacer = Pacer::new(file, 1, Duration::from_micros(1), shutdown.clone());

        let mut count = 0;
        pacer.run(None, |_| {
            count += 1;
            if count == 2 {
                shutdown.request();
            }
        });

        assert_eq!(count, 2);
    }
}
