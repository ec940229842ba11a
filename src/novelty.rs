//! Spectral flux / novelty over rhythm bins (spec §4.6).

use crate::noise_floor::NoiseFloor;

pub struct NoveltyTracker {
    prev_mag: Vec<f32>,
    seeded: bool,
}

impl NoveltyTracker {
    pub fn new(bin_count: usize) -> Self {
        Self {
            prev_mag: vec![0.0; bin_count],
            seeded: false,
        }
    }

    /// Combined novelty for this hop. First call returns 0 and seeds
    /// `prev_mag` rather than comparing against zero.
    pub fn update(&mut self, mags: &[f32], noise_floor: &NoiseFloor) -> f32 {
        debug_assert_eq!(mags.len(), self.prev_mag.len());
        if !self.seeded {
            self.prev_mag.copy_from_slice(mags);
            self.seeded = true;
            return 0.0;
        }
        let mut sum = 0.0f32;
        let mut gated = 0usize;
        for (k, &m) in mags.iter().enumerate() {
            if noise_floor.is_above_floor(k, m) {
                let delta = (m - self.prev_mag[k]).max(0.0);
                sum += delta;
                gated += 1;
            }
        }
        self.prev_mag.copy_from_slice(mags);
        sum / gated.max(1) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_returns_zero_and_seeds() {
        let mut nov = NoveltyTracker::new(2);
        let nf = NoiseFloor::new(2, 1.0, 62.5, 1e-6);
        assert_eq!(nov.update(&[0.5, 0.5], &nf), 0.0);
    }

    #[test]
    fn rising_magnitude_above_floor_produces_positive_flux() {
        let mut nov = NoveltyTracker::new(1);
        let mut nf = NoiseFloor::new(1, 1.0, 62.5, 1e-6);
        for _ in 0..200 {
            nf.update(&[0.01]);
        }
        nov.update(&[0.01], &nf);
        let flux = nov.update(&[0.9], &nf);
        assert!(flux > 0.0);
    }

    #[test]
    fn falling_magnitude_is_half_wave_rectified_to_zero() {
        let mut nov = NoveltyTracker::new(1);
        let mut nf = NoiseFloor::new(1, 1.0, 62.5, 1e-6);
        for _ in 0..200 {
            nf.update(&[0.01]);
        }
        nov.update(&[0.9], &nf);
        let flux = nov.update(&[0.1], &nf);
        assert_eq!(flux, 0.0);
    }

    #[test]
    fn bins_below_floor_are_excluded_from_average() {
        let mut nov = NoveltyTracker::new(2);
        let mut nf = NoiseFloor::new(2, 1.0, 62.5, 1e-6);
        for _ in 0..200 {
            nf.update(&[0.01, 0.01]);
        }
        nov.update(&[0.01, 0.01], &nf);
        // bin 0 stays quiet (never exceeds floor), bin 1 spikes.
        let flux = nov.update(&[0.01, 0.9], &nf);
        assert!(flux > 0.0);
    }
}
