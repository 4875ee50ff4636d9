use std::collections::HashMap;

use crate::priority::{LEAST_URGENT, MOST_URGENT};

/// Point-in-time copy of a user's adjustments, keyed by normalized class.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreferenceSnapshot {
    adjustments: HashMap<String, f64>,
    suppress_below: f64,
}

impl PreferenceSnapshot {
    pub fn new(adjustments: HashMap<String, f64>, suppress_below: f64) -> Self {
        Self {
            adjustments,
            suppress_below,
        }
    }

    pub fn adjustment(&self, class: &str) -> f64 {
        self.adjustments.get(class).copied().unwrap_or(0.0)
    }

    /// `base - 2 * adjustment`, rounded away from the base and kept in 1..=5.
    ///
    /// Any learned dismissal moves a class at least one level down and any
    /// learned interest at least one level up.
    pub fn adjusted_priority(&self, class: &str, base_priority: u8) -> u8 {
        let adjustment = self.adjustment(class);
        let raw = f64::from(base_priority) - adjustment * 2.0;
        let rounded = if adjustment > 0.0 {
            (raw + 1e-9).floor()
        } else if adjustment < 0.0 {
            (raw - 1e-9).ceil()
        } else {
            raw
        };
        rounded.clamp(f64::from(MOST_URGENT), f64::from(LEAST_URGENT)) as u8
    }

    /// Persistently dismissed and not independently urgent.
    pub fn should_suppress(&self, class: &str, base_priority: u8) -> bool {
        self.adjustment(class) < self.suppress_below
            && self.adjusted_priority(class, base_priority) > 3
    }
}
