//! Precomputed Hann windows, keyed by sample count (spec §4.3: each
//! Goertzel bin has its own window length, so the bank shares a cache
//! instead of recomputing per bin per hop).

use std::collections::HashMap;

/// Cache of Hann window coefficient tables, one per distinct window length
/// requested so far.
#[derive(Default)]
pub struct WindowBank {
    tables: HashMap<usize, Vec<f32>>,
}

impl WindowBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the Hann window of length `n`, computing and caching it on
    /// first use.
    pub fn get(&mut self, n: usize) -> &[f32] {
        self.tables.entry(n).or_insert_with(|| hann(n))
    }
}

fn hann(n: usize) -> Vec<f32> {
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![1.0];
    }
    let denom = (n - 1) as f32;
    (0..n)
        .map(|i| {
            let phase = std::f32::consts::PI * 2.0 * i as f32 / denom;
            0.5 * (1.0 - phase.cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_taper_to_zero() {
        let mut bank = WindowBank::new();
        let w = bank.get(64);
        assert!(w[0].abs() < 1e-6);
        assert!(w[w.len() - 1].abs() < 1e-6);
    }

    #[test]
    fn midpoint_is_near_unity() {
        let mut bank = WindowBank::new();
        let w = bank.get(65);
        let mid = w[32];
        assert!((mid - 1.0).abs() < 1e-3);
    }

    #[test]
    fn caches_by_length() {
        let mut bank = WindowBank::new();
        let _ = bank.get(128);
        assert_eq!(bank.tables.len(), 1);
        let _ = bank.get(128);
        assert_eq!(bank.tables.len(), 1);
        let _ = bank.get(256);
        assert_eq!(bank.tables.len(), 2);
    }

    #[test]
    fn single_sample_window_is_unity() {
        let mut bank = WindowBank::new();
        assert_eq!(bank.get(1), &[1.0]);
    }
}
