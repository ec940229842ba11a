//! Fast-attack / slow-release broadband AGC (spec §4.5).
//!
//! Operates on rhythm magnitudes only, never on raw capture samples (that
//! would corrupt the capture stage's DC-removal behaviour).

pub struct Agc {
    gain: f32,
    attack_alpha: f32,
    release_alpha: f32,
    target_rms: f32,
}

impl Agc {
    pub fn new(attack_s: f32, release_s: f32, target_rms: f32, hop_rate_hz: f32) -> Self {
        Self {
            gain: 1.0,
            attack_alpha: 1.0 - (-1.0 / (attack_s * hop_rate_hz)).exp(),
            release_alpha: 1.0 - (-1.0 / (release_s * hop_rate_hz)).exp(),
            target_rms,
        }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Updates the broadband gain from the current-hop RMS and applies it
    /// in place to `mags`.
    pub fn process(&mut self, rms: f32, mags: &mut [f32]) {
        let desired = if rms > 1e-6 {
            (self.target_rms / rms).clamp(0.1, 10.0)
        } else {
            self.gain
        };
        let alpha = if desired > self.gain {
            self.attack_alpha
        } else {
            self.release_alpha
        };
        self.gain += alpha * (desired - self.gain);
        for m in mags.iter_mut() {
            *m *= self.gain;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_starts_at_unity() {
        let agc = Agc::new(0.010, 0.5, 0.7, 62.5);
        assert_eq!(agc.gain(), 1.0);
    }

    #[test]
    fn quiet_signal_increases_gain_over_time() {
        let mut agc = Agc::new(0.010, 0.5, 0.7, 62.5);
        let mut mags = vec![0.1; 4];
        for _ in 0..50 {
            agc.process(0.1, &mut mags.clone());
        }
        assert!(agc.gain() > 1.0);
    }

    #[test]
    fn loud_signal_decreases_gain_over_time() {
        let mut agc = Agc::new(0.010, 0.5, 0.7, 62.5);
        let mut mags = vec![1.0; 4];
        for _ in 0..50 {
            agc.process(2.0, &mut mags.clone());
        }
        assert!(agc.gain() < 1.0);
    }

    #[test]
    fn process_scales_magnitudes_by_current_gain() {
        let mut agc = Agc::new(0.010, 0.5, 0.7, 62.5);
        let mut mags = vec![1.0, 2.0];
        agc.process(0.7, &mut mags);
        let g = agc.gain();
        assert!((mags[0] - g).abs() < 1e-5);
        assert!((mags[1] - 2.0 * g).abs() < 1e-5);
    }

    #[test]
    fn attack_is_faster_than_release() {
        let attack = Agc::new(0.010, 0.5, 0.7, 62.5).attack_alpha;
        let release = Agc::new(0.010, 0.5, 0.7, 62.5).release_alpha;
        assert!(attack > release);
    }
}
