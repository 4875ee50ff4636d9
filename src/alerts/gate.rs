//! Cooldown and flood control.
//!
//! The gate is an ordered rule table. Each rule pairs a predicate with the
//! reason reported when it matches; the first match suppresses the alert and
//! an alert that clears every rule is approved and recorded.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::clock::{seconds_between, Clock};
use crate::models::{AlertDecision, AlertMode, AlertReason, Direction};
use crate::settings::{FloodSettings, GateSettings};
use crate::taxonomy::Taxonomy;
use crate::trend::Trend;

use super::messages;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// One candidate alert, already prioritised.
#[derive(Debug, Clone, PartialEq)]
pub struct GateRequest<'a> {
    /// Normalized class key.
    pub class: &'a str,
    /// Spoken label.
    pub label: &'a str,
    pub direction: Direction,
    pub priority: u8,
    pub distance: f64,
    pub trend: Trend,
    /// Awareness is expanded, so distant objects are wanted.
    pub expanded: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CooldownRecord {
    pub object_class: String,
    pub last_alert_time: DateTime<Utc>,
    pub alert_count: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CooldownStatus {
    pub object_class: String,
    pub alert_count: u32,
    pub last_alert_time: DateTime<Utc>,
    pub remaining_secs: f64,
}

struct RuleContext<'a> {
    request: &'a GateRequest<'a>,
    settings: &'a GateSettings,
    mode: AlertMode,
    is_stationary: bool,
    always_alert: bool,
    usually_ignored: bool,
    flood_full: bool,
    cooldown_remaining: Option<f64>,
}

struct Rule {
    reason: AlertReason,
    applies: fn(&RuleContext<'_>) -> bool,
}

static RULES: [Rule; 7] = [
    Rule {
        reason: AlertReason::TooManyAlerts,
        applies: flood_cap,
    },
    Rule {
        reason: AlertReason::QuietMode,
        applies: quiet_mode,
    },
    Rule {
        reason: AlertReason::StationaryIgnore,
        applies: stationary_ignore,
    },
    Rule {
        reason: AlertReason::StationaryFar,
        applies: stationary_far,
    },
    Rule {
        reason: AlertReason::Cooldown,
        applies: cooling_down,
    },
    Rule {
        reason: AlertReason::TooFar,
        applies: too_far,
    },
    Rule {
        reason: AlertReason::UsuallyIgnored,
        applies: usually_ignored,
    },
];

fn flood_cap(ctx: &RuleContext<'_>) -> bool {
    ctx.flood_full && !ctx.always_alert
}

fn quiet_mode(ctx: &RuleContext<'_>) -> bool {
    ctx.mode == AlertMode::Quiet && !ctx.always_alert
}

fn stationary_normal(ctx: &RuleContext<'_>) -> bool {
    ctx.is_stationary && ctx.mode == AlertMode::Normal
}

fn stationary_ignore(ctx: &RuleContext<'_>) -> bool {
    stationary_normal(ctx) && ctx.usually_ignored
}

fn stationary_far(ctx: &RuleContext<'_>) -> bool {
    stationary_normal(ctx)
        && !ctx.always_alert
        && ctx.request.distance > ctx.settings.stationary_far_m
}

fn cooling_down(ctx: &RuleContext<'_>) -> bool {
    ctx.cooldown_remaining.is_some()
}

fn too_far(ctx: &RuleContext<'_>) -> bool {
    !ctx.request.expanded
        && !ctx.always_alert
        && ctx.request.distance > ctx.settings.max_alert_distance_m
}

fn usually_ignored(ctx: &RuleContext<'_>) -> bool {
    ctx.usually_ignored && ctx.mode != AlertMode::Scanning
}

/// Suppression reasons in the order they are checked.
pub fn rule_order() -> Vec<AlertReason> {
    RULES.iter().map(|rule| rule.reason).collect()
}

/// Per-session alert gate: per-class cooldowns plus a global flood window.
pub struct CooldownFloodController {
    taxonomy: Arc<Taxonomy>,
    settings: GateSettings,
    flood: FloodSettings,
    clock: Arc<dyn Clock>,
    cooldowns: HashMap<String, CooldownRecord>,
    recent_alerts: VecDeque<DateTime<Utc>>,
}

impl CooldownFloodController {
    pub fn new(
        taxonomy: Arc<Taxonomy>,
        settings: GateSettings,
        flood: FloodSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            taxonomy,
            settings,
            flood,
            clock,
            cooldowns: HashMap::new(),
            recent_alerts: VecDeque::new(),
        }
    }

    pub fn gate(
        &mut self,
        request: &GateRequest<'_>,
        mode: AlertMode,
        is_stationary: bool,
    ) -> AlertDecision {
        let now = self.clock.now();
        self.prune_window(now);

        let always_alert = self.taxonomy.is_always_alert(request.class);
        let ctx = RuleContext {
            request,
            settings: &self.settings,
            mode,
            is_stationary,
            always_alert,
            usually_ignored: self.taxonomy.is_usually_ignored(request.class),
            flood_full: self.recent_alerts.len() >= self.flood.max_alerts_per_window,
            cooldown_remaining: self.cooldown_remaining(request, always_alert, now),
        };

        if let Some(rule) = RULES.iter().find(|rule| (rule.applies)(&ctx)) {
            let remaining = if rule.reason == AlertReason::Cooldown {
                ctx.cooldown_remaining.unwrap_or(0.0)
            } else {
                0.0
            };
            log_debug!(
                "suppressed {} at {:.2}m: {}",
                request.class,
                request.distance,
                rule.reason
            );
            return AlertDecision::suppressed(rule.reason, request.priority, remaining);
        }

        self.record(request.class, now);
        let message = messages::render(
            request.label,
            request.direction,
            request.priority,
            request.distance,
            request.trend,
        );
        log_info!(
            "alert approved for {} (priority {}, {:.2}m)",
            request.class,
            request.priority,
            request.distance
        );
        AlertDecision::approved(request.priority, message)
    }

    /// Forget every cooldown and empty the flood window.
    pub fn reset(&mut self) {
        self.cooldowns.clear();
        self.recent_alerts.clear();
    }

    /// Approved alerts inside the trailing flood window.
    pub fn alerts_in_window(&mut self) -> usize {
        self.prune_window(self.clock.now());
        self.recent_alerts.len()
    }

    pub fn max_alerts_per_window(&self) -> usize {
        self.flood.max_alerts_per_window
    }

    pub fn record_for(&self, class: &str) -> Option<&CooldownRecord> {
        self.cooldowns.get(class)
    }

    /// Every class alerted this session, ordered by class.
    pub fn cooldown_status(&self) -> Vec<CooldownStatus> {
        let now = self.clock.now();
        let mut status: Vec<CooldownStatus> = self
            .cooldowns
            .values()
            .map(|record| {
                let elapsed = seconds_between(record.last_alert_time, now);
                CooldownStatus {
                    object_class: record.object_class.clone(),
                    alert_count: record.alert_count,
                    last_alert_time: record.last_alert_time,
                    remaining_secs: (self.taxonomy.cooldown_secs(&record.object_class)
                        - elapsed)
                        .max(0.0),
                }
            })
            .collect();
        status.sort_by(|a, b| a.object_class.cmp(&b.object_class));
        status
    }

    fn cooldown_remaining(
        &self,
        request: &GateRequest<'_>,
        always_alert: bool,
        now: DateTime<Utc>,
    ) -> Option<f64> {
        let record = self.cooldowns.get(request.class)?;
        if always_alert && request.distance <= self.settings.close_call_m {
            return None;
        }

        let cooldown = self.taxonomy.cooldown_secs(request.class);
        let elapsed = seconds_between(record.last_alert_time, now);
        (elapsed < cooldown).then(|| cooldown - elapsed)
    }

    fn record(&mut self, class: &str, now: DateTime<Utc>) {
        self.cooldowns
            .entry(class.to_string())
            .and_modify(|record| {
                record.last_alert_time = now;
                record.alert_count += 1;
            })
            .or_insert_with(|| CooldownRecord {
                object_class: class.to_string(),
                last_alert_time: now,
                alert_count: 1,
            });
        self.recent_alerts.push_back(now);
    }

    fn prune_window(&mut self, now: DateTime<Utc>) {
        let window = Duration::milliseconds((self.flood.window_secs * 1000.0).round() as i64);
        let cutoff = now - window;
        while let Some(oldest) = self.recent_alerts.front() {
            if *oldest <= cutoff {
                self.recent_alerts.pop_front();
            } else {
                break;
            }
        }
    }
}
