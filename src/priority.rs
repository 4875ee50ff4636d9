use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;

use crate::taxonomy::{ClassTier, Taxonomy};
use crate::trend::Trend;
use crate::zones::Zone;

pub const MOST_URGENT: u8 = 1;
pub const LEAST_URGENT: u8 = 5;

/// Numeric urgency plus the context used to rank equal priorities.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct PriorityAssessment {
    pub priority: u8,
    pub zone: Zone,
    pub trend: Trend,
}

/// Turns class, distance and motion into an urgency between 1 and 5.
#[derive(Clone)]
pub struct PriorityCalculator {
    taxonomy: Arc<Taxonomy>,
}

impl PriorityCalculator {
    pub fn new(taxonomy: Arc<Taxonomy>) -> Self {
        Self { taxonomy }
    }

    /// `class` must be normalized. The zone rides along for ranking only.
    pub fn priority(
        &self,
        class: &str,
        distance: f64,
        trend: Trend,
        zone: Zone,
    ) -> PriorityAssessment {
        let base = self.base_priority(class, distance);
        let priority = if trend == Trend::Approaching {
            base.saturating_sub(1).max(MOST_URGENT)
        } else {
            base
        };

        PriorityAssessment {
            priority,
            zone,
            trend,
        }
    }

    pub fn base_priority(&self, class: &str, distance: f64) -> u8 {
        match self.taxonomy.tier(class) {
            ClassTier::AlwaysAlert => {
                if distance < 1.0 {
                    1
                } else if distance < 2.0 {
                    2
                } else {
                    3
                }
            }
            ClassTier::CloseOnly => {
                if distance < 0.5 {
                    2
                } else if distance < 1.5 {
                    3
                } else {
                    4
                }
            }
            ClassTier::Generic => LEAST_URGENT,
        }
    }
}

/// Ranking order for surfaced alerts: priority, then zone, then distance,
/// then the more confident detection first.
pub fn rank_order(
    a: (u8, Zone, f64, f64),
    b: (u8, Zone, f64, f64),
) -> Ordering {
    a.0.cmp(&b.0)
        .then(a.1.cmp(&b.1))
        .then(a.2.total_cmp(&b.2))
        .then(b.3.total_cmp(&a.3))
}
