//! Per-bin adaptive noise floor (spec §4.4).

/// Tracks an EMA floor per bin. `floor[k] >= epsilon` always (spec P4).
pub struct NoiseFloor {
    floor: Vec<f32>,
    alpha: f32,
    epsilon: f32,
    above_floor_multiplier: f32,
}

impl NoiseFloor {
    /// `alpha` derived from a time constant `tau_s` at the given hop rate:
    /// alpha = 1 - exp(-hop_period / tau), which for tau=1s, 62.5 Hz gives
    /// alpha ~= 0.0157, matching the spec's "~0.016".
    pub fn new(bin_count: usize, tau_s: f32, hop_rate_hz: f32, epsilon: f32) -> Self {
        let alpha = 1.0 - (-1.0 / (tau_s * hop_rate_hz)).exp();
        Self {
            floor: vec![epsilon; bin_count],
            alpha,
            epsilon,
            above_floor_multiplier: 2.0,
        }
    }

    pub fn set_above_floor_multiplier(&mut self, m: f32) {
        self.above_floor_multiplier = m;
    }

    /// Update all bins from a fresh magnitude vector.
    pub fn update(&mut self, mags: &[f32]) {
        debug_assert_eq!(mags.len(), self.floor.len());
        for (f, &m) in self.floor.iter_mut().zip(mags) {
            *f = ((1.0 - self.alpha) * *f + self.alpha * m).max(self.epsilon);
        }
    }

    pub fn floor(&self, k: usize) -> f32 {
        self.floor[k]
    }

    pub fn floors(&self) -> &[f32] {
        &self.floor
    }

    /// True iff `mag > m * floor[k]`, default m = 2.0 (~6 dB).
    pub fn is_above_floor(&self, k: usize, mag: f32) -> bool {
        mag > self.above_floor_multiplier * self.floor[k]
    }

    /// Reset every bin to epsilon.
    pub fn reset(&mut self) {
        self.floor.fill(self.epsilon);
    }

    /// Held-at-floor magnitude per spec §4.3 "tie-break": values below
    /// `1 x floor[k]` read as the floor itself instead of zero.
    pub fn held_at_floor(&self, k: usize, mag: f32) -> f32 {
        if mag < self.floor[k] {
            self.floor[k]
        } else {
            mag
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_never_drops_below_epsilon() {
        let mut nf = NoiseFloor::new(4, 1.0, 62.5, 1e-6);
        nf.update(&[0.0; 4]);
        for k in 0..4 {
            assert!(nf.floor(k) >= 1e-6);
        }
    }

    #[test]
    fn reset_restores_epsilon() {
        let mut nf = NoiseFloor::new(2, 1.0, 62.5, 1e-6);
        nf.update(&[1.0, 1.0]);
        nf.reset();
        assert_eq!(nf.floor(0), 1e-6);
        assert_eq!(nf.floor(1), 1e-6);
    }

    #[test]
    fn is_above_floor_uses_default_multiplier() {
        let mut nf = NoiseFloor::new(1, 1.0, 62.5, 1e-6);
        for _ in 0..200 {
            nf.update(&[0.1]);
        }
        assert!(!nf.is_above_floor(0, 0.15));
        assert!(nf.is_above_floor(0, 0.5));
    }

    #[test]
    fn held_at_floor_clamps_quiet_bins() {
        let mut nf = NoiseFloor::new(1, 1.0, 62.5, 1e-6);
        for _ in 0..200 {
            nf.update(&[0.1]);
        }
        let held = nf.held_at_floor(0, 0.01);
        assert!((held - nf.floor(0)).abs() < 1e-9);
    }

    #[test]
    fn alpha_roughly_matches_spec_value() {
        let nf = NoiseFloor::new(1, 1.0, 62.5, 1e-6);
        assert!((nf.alpha - 0.016).abs() < 0.005);
    }
}
