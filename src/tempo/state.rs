//! Five-state tempo lock machine (spec §4.9.5).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TempoTrackerState {
    Initializing,
    Searching,
    Locking,
    Locked,
    Unlocking,
}

impl TempoTrackerState {
    /// Onset threshold multiplier for this state (higher = less sensitive).
    pub fn onset_threshold_multiplier(self) -> f32 {
        match self {
            TempoTrackerState::Initializing => 1.0,
            TempoTrackerState::Searching => 0.8,
            TempoTrackerState::Locking => 1.0,
            TempoTrackerState::Locked => 1.2,
            TempoTrackerState::Unlocking => 1.1,
        }
    }

    /// Whether BPM smoothing should use the attack or release coefficient
    /// while in this state.
    pub fn uses_attack_alpha(self) -> bool {
        matches!(
            self,
            TempoTrackerState::Initializing | TempoTrackerState::Searching | TempoTrackerState::Locking
        )
    }

    /// Advances the state machine given current confidence and hop count
    /// since the tracker started. `was_locked` carries whether the
    /// previous state was `Locked`, needed to distinguish `Unlocking`'s
    /// entry condition from `Locking`'s.
    pub fn next(self, confidence: f32, hops_since_start: u64, _was_locked: bool) -> TempoTrackerState {
        use TempoTrackerState::*;
        match self {
            Initializing => {
                if hops_since_start > 50 {
                    if confidence > 0.3 {
                        Locking
                    } else {
                        Searching
                    }
                } else {
                    Initializing
                }
            }
            Searching => {
                if confidence > 0.3 {
                    Locking
                } else {
                    Searching
                }
            }
            Locking => {
                if confidence > 0.5 {
                    Locked
                } else if confidence < 0.2 {
                    Searching
                } else {
                    Locking
                }
            }
            Locked => {
                if confidence < 0.4 {
                    Unlocking
                } else {
                    Locked
                }
            }
            Unlocking => {
                if confidence >= 0.5 {
                    Locked
                } else if confidence < 0.2 {
                    Searching
                } else {
                    Unlocking
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TempoTrackerState::*;

    #[test]
    fn stays_initializing_until_fifty_hops() {
        assert_eq!(Initializing.next(0.9, 10, false), Initializing);
    }

    #[test]
    fn initializing_transitions_to_locking_on_high_confidence() {
        assert_eq!(Initializing.next(0.4, 51, false), Locking);
    }

    #[test]
    fn initializing_transitions_to_searching_on_low_confidence() {
        assert_eq!(Initializing.next(0.1, 51, false), Searching);
    }

    #[test]
    fn searching_to_locking_above_threshold() {
        assert_eq!(Searching.next(0.31, 1000, false), Locking);
    }

    #[test]
    fn locking_to_locked_above_half() {
        assert_eq!(Locking.next(0.51, 1000, false), Locked);
    }

    #[test]
    fn locking_back_to_searching_below_point_two() {
        assert_eq!(Locking.next(0.1, 1000, false), Searching);
    }

    #[test]
    fn locked_drops_to_unlocking_below_point_four() {
        assert_eq!(Locked.next(0.35, 1000, true), Unlocking);
    }

    #[test]
    fn locked_onset_multiplier_is_least_sensitive() {
        assert!(Locked.onset_threshold_multiplier() > Searching.onset_threshold_multiplier());
    }

    #[test]
    fn unlocking_recovers_to_locked_or_falls_to_searching() {
        assert_eq!(Unlocking.next(0.6, 1000, true), Locked);
        assert_eq!(Unlocking.next(0.1, 1000, true), Searching);
        assert_eq!(Unlocking.next(0.3, 1000, true), Unlocking);
    }
}
