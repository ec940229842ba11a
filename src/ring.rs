//! Power-of-two sample ring buffer (spec §4.2).
//!
//! Holds raw mono samples long enough for the largest Goertzel window to
//! read a contiguous tail without the Goertzel bank ever needing to know
//! about wraparound.

use crate::error::CoreError;

/// Fixed-capacity ring of `f32` samples. Capacity must be a power of two so
/// index wrap is a mask instead of a modulo.
pub struct SampleRing {
    buf: Vec<f32>,
    mask: usize,
    write_pos: usize,
    len_written: u64,
}

impl SampleRing {
    /// `capacity` must be a power of two and at least as large as the
    /// largest Goertzel window (spec §4.2 invariant). Returns
    /// `CoreError::Invariant` and clamps up to the next power of two if not.
    pub fn new(capacity: usize) -> Result<Self, CoreError> {
        let effective = if capacity.is_power_of_two() && capacity > 0 {
            capacity
        } else {
            let clamped = capacity.max(1).next_power_of_two();
            let err = CoreError::Invariant {
                description: format!(
                    "ring capacity {capacity} is not a power of two, clamped to {clamped}"
                ),
            };
            crate::error::log_core_error(&err, "ring::new");
            clamped
        };
        Ok(Self {
            buf: vec![0.0; effective],
            mask: effective - 1,
            write_pos: 0,
            len_written: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Total samples ever written, monotonically increasing.
    pub fn total_written(&self) -> u64 {
        self.len_written
    }

    /// Push one hop's worth of samples.
    pub fn push_hop(&mut self, samples: &[f32]) {
        for &s in samples {
            self.buf[self.write_pos] = s;
            self.write_pos = (self.write_pos + 1) & self.mask;
        }
        self.len_written += samples.len() as u64;
    }

    /// Copy out the most recent `n` samples, oldest first. `n` must be
    /// `<= capacity`; panics otherwise since it's a construction-time
    /// invariant, never a runtime condition.
    pub fn copy_last(&self, n: usize, out: &mut [f32]) {
        assert!(n <= self.buf.len(), "window larger than ring capacity");
        assert!(out.len() >= n);
        let start = (self.write_pos + self.buf.len() - n) & self.mask;
        for i in 0..n {
            out[i] = self.buf[(start + i) & self.mask];
        }
    }
}
