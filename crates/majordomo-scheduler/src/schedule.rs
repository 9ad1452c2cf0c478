use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};

use majordomo_core::config::{parse_interval, ScheduledTaskConfig};

use crate::error::{Result, SchedulerError};

/// A task's scheduling mode, parsed from config.
#[derive(Debug, Clone)]
pub enum Slot {
    /// Recurring fixed interval.
    Interval(Duration),
    /// Five-field cron expression (normalized to the six-field form the
    /// cron crate expects).
    Cron(cron::Schedule),
}

impl Slot {
    pub fn describe(&self) -> String {
        match self {
            Slot::Interval(d) => format!("every {}s", d.as_secs()),
            Slot::Cron(s) => format!("cron {s}"),
        }
    }
}

/// Parse one scheduler config entry into a [`Slot`].
///
/// Exactly one of `interval`/`cron` must be set.
pub fn parse_slot(cfg: &ScheduledTaskConfig) -> Result<Slot> {
    match (&cfg.interval, &cfg.cron) {
        (Some(interval), None) => {
            let d = parse_interval(interval).map_err(|e| SchedulerError::InvalidSchedule {
                name: cfg.name.clone(),
                reason: e.to_string(),
            })?;
            Ok(Slot::Interval(d))
        }
        (None, Some(expr)) => {
            let schedule = cron::Schedule::from_str(&normalize_cron(expr)).map_err(|e| {
                SchedulerError::InvalidSchedule {
                    name: cfg.name.clone(),
                    reason: e.to_string(),
                }
            })?;
            Ok(Slot::Cron(schedule))
        }
        _ => Err(SchedulerError::InvalidSchedule {
            name: cfg.name.clone(),
            reason: "exactly one of interval/cron must be set".to_string(),
        }),
    }
}

/// The config surface uses standard five-field cron; the cron crate wants a
/// seconds field, so prepend one.
fn normalize_cron(expr: &str) -> String {
    if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    }
}

/// Next cron fire strictly after `after`.
pub fn next_cron_after(
    schedule: &cron::Schedule,
    after: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    schedule.after(&after).next()
}
