//! Single-producer/single-consumer sample ring (§3.3/§9 Design Notes).
//!
//! Fixed capacity `W·C` elements, logically circular. The pacer thread is
//! the sole producer (one hop of `H·C` elements per call), the main thread
//! the sole consumer, linearizing the ring into a contiguous window buffer
//! on each hop. This is not a general-purpose queue: the only access
//! pattern is append-then-copy-contiguous.

/// Fixed-capacity circular buffer of `f32` samples.
pub struct SampleRing {
    buf: Vec<f32>,
    capacity: usize,
    write_pos: usize,
    filled: usize,
}

impl SampleRing {
    /// Allocate a ring holding exactly `capacity` elements (`W·C`).
    pub fn new(capacity: usize) -> Self {
        SampleRing {
            buf: vec![0.0; capacity],
            capacity,
            write_pos: 0,
            filled: 0,
        }
    }

    /// Total element capacity (`W·C`).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of valid elements currently held, capped at `capacity`.
    pub fn filled(&self) -> usize {
        self.filled
    }

    /// `true` once the ring has received at least `capacity` elements in
    /// total, i.e. the window buffer can be formed.
    pub fn is_full(&self) -> bool {
        self.filled >= self.capacity
    }

    /// Append one hop (`H·C` elements) into the ring, overwriting the
    /// oldest elements cyclically. `hop.len()` MUST be `<= capacity`.
    pub fn append_hop(&mut self, hop: &[f32]) {
        debug_assert!(
            hop.len() <= self.capacity,
            "hop of {} elements exceeds ring capacity {}",
            hop.len(),
            self.capacity
        );
        for &sample in hop {
            self.buf[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % self.capacity;
        }
        self.filled = (self.filled + hop.len()).min(self.capacity);
    }

    /// Linearize the ring's current contents into `out`, oldest element
    /// first. `out.len()` MUST equal `capacity`. Only meaningful once
    /// [`Self::is_full`] is `true`.
    pub fn snapshot_into(&self, out: &mut [f32]) {
        debug_assert_eq!(out.len(), self.capacity);
        let oldest = self.write_pos; // next write slot is also the oldest element once full
        let tail_len = self.capacity - oldest;
        out[..tail_len].copy_from_slice(&self.buf[oldest..]);
        out[tail_len..].copy_from_slice(&self.buf[..oldest]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_not_full_until_capacity_reached() {
        let mut ring = SampleRing::new(8);
        assert!(!ring.is_full());
        ring.append_hop(&[1.0, 2.0, 3.0, 4.0]);
        assert!(!ring.is_full());
        ring.append_hop(&[5.0, 6.0, 7.0, 8.0]);
        assert!(ring.is_full());
    }

    #[test]
    fn ramp_integrity_every_emitted_window_is_a_contiguous_subsequence() {
        // Testable property 9: feed a ramp x[n] = n; after the k-th hop the
        // ring contains the most recent W values of x, and every emitted
        // window is a contiguous subsequence of x.
        let capacity = 6; // W*C, using C=1 for this unit test
        let hop = 2; // H
        let mut ring = SampleRing::new(capacity);
        let ramp: Vec<f32> = (0..20).map(|n| n as f32).collect();

        let mut out = vec![0.0; capacity];
        for (k, chunk) in ramp.chunks(hop).enumerate() {
            ring.append_hop(chunk);
            if !ring.is_full() {
                continue;
            }
            ring.snapshot_into(&mut out);
            let end = (k + 1) * hop;
            let start = end - capacity;
            let expected: Vec<f32> = ramp[start..end].iter().copied().collect();
            assert_eq!(out, expected, "window after hop {k} is not a contiguous run of the ramp");
        }
    }

    #[test]
    fn consecutive_windows_overlap_by_w_minus_h() {
        // Testable property 2: samples [H..W) of window k equal samples
        // [0..W-H) of window k+1.
        let capacity = 6; // W
        let hop = 2; // H
        let mut ring = SampleRing::new(capacity);
        let ramp: Vec<f32> = (0..30).map(|n| n as f32).collect();

        let mut windows = Vec::new();
        for chunk in ramp.chunks(hop) {
            ring.append_hop(chunk);
            if ring.is_full() {
                let mut out = vec![0.0; capacity];
                ring.snapshot_into(&mut out);
                windows.push(out);
            }
        }

        for pair in windows.windows(2) {
            let (w_k, w_k1) = (&pair[0], &pair[1]);
            assert_eq!(&w_k[hop..], &w_k1[..capacity - hop]);
        }
    }
}
