//! Per-class distance history and motion trend.
//!
//! Each class keeps the samples seen within a short horizon. A least-squares
//! slope of distance over elapsed seconds classifies the motion. Any
//! meaningfully negative slope counts as approaching, so a closing object is
//! never reported as stable or receding.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{seconds_between, Clock};
use crate::settings::TrendSettings;

/// Samples needed before a reading is reported with full confidence.
const CONFIDENT_SAMPLES: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Approaching,
    #[default]
    Stable,
    MovingAway,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Approaching => "approaching",
            Trend::Stable => "stable",
            Trend::MovingAway => "moving_away",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct TrendReading {
    pub trend: Trend,
    /// Metres per second; negative is closing in. Zero when too few samples.
    pub slope: f64,
    pub samples: usize,
    pub confidence: f64,
}

impl TrendReading {
    fn insufficient(samples: usize) -> Self {
        Self {
            trend: Trend::Stable,
            slope: 0.0,
            samples,
            confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct TrendSample {
    distance: f64,
    at: DateTime<Utc>,
}

pub struct TrendTracker {
    settings: TrendSettings,
    clock: Arc<dyn Clock>,
    history: HashMap<String, VecDeque<TrendSample>>,
}

impl TrendTracker {
    pub fn new(settings: TrendSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            clock,
            history: HashMap::new(),
        }
    }

    /// Record `distance` for `class` and classify its recent motion.
    pub fn track(&mut self, class: &str, distance: f64) -> TrendReading {
        let now = self.clock.now();
        let horizon = self.horizon();

        let samples = self.history.entry(class.to_string()).or_default();
        samples.push_back(TrendSample { distance, at: now });
        while let Some(oldest) = samples.front() {
            if oldest.at <= now - horizon {
                samples.pop_front();
            } else {
                break;
            }
        }

        let count = samples.len();
        if count < 2 {
            return TrendReading::insufficient(count);
        }

        let slope = least_squares_slope(samples);
        TrendReading {
            trend: self.classify_slope(slope),
            slope,
            samples: count,
            confidence: (count as f64 / CONFIDENT_SAMPLES as f64).min(1.0),
        }
    }

    pub fn classify_slope(&self, slope: f64) -> Trend {
        if slope <= self.settings.approaching_slope {
            Trend::Approaching
        } else if slope >= self.settings.receding_slope {
            Trend::MovingAway
        } else if slope > self.settings.stable_slope {
            Trend::Stable
        } else {
            // Marginal closing speed still counts as approaching.
            Trend::Approaching
        }
    }

    /// Drop classes whose samples have all aged out.
    pub fn prune(&mut self) {
        let cutoff = self.clock.now() - self.horizon();
        self.history.retain(|_, samples| {
            samples.retain(|sample| sample.at > cutoff);
            !samples.is_empty()
        });
    }

    pub fn tracked_classes(&self) -> usize {
        self.history.len()
    }

    fn horizon(&self) -> Duration {
        Duration::milliseconds((self.settings.horizon_secs * 1000.0).round() as i64)
    }
}

/// Slope of distance against elapsed seconds. When every sample shares one
/// timestamp the sample index stands in for time.
fn least_squares_slope(samples: &VecDeque<TrendSample>) -> f64 {
    let Some(first) = samples.front() else {
        return 0.0;
    };
    let elapsed: Vec<f64> = samples
        .iter()
        .map(|sample| seconds_between(first.at, sample.at))
        .collect();

    let spread = elapsed.iter().cloned().fold(0.0_f64, f64::max);
    let xs: Vec<f64> = if spread > f64::EPSILON {
        elapsed
    } else {
        (0..samples.len()).map(|index| index as f64).collect()
    };

    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = samples.iter().map(|sample| sample.distance).sum::<f64>() / n;

    let (covariance, variance) = xs.iter().zip(samples.iter()).fold(
        (0.0, 0.0),
        |(covariance, variance), (x, sample)| {
            let dx = x - mean_x;
            (
                covariance + dx * (sample.distance - mean_y),
                variance + dx * dx,
            )
        },
    );

    if variance <= f64::EPSILON {
        0.0
    } else {
        covariance / variance
    }
}
