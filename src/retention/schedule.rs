//! Cron-style sweep schedules evaluated in an IANA timezone.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// Errors raised while parsing a schedule.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid cron expression '{expression}': {reason}")]
    Expression { expression: String, reason: String },

    #[error("unknown timezone '{0}'")]
    Timezone(String),
}

/// A six-field cron expression ("seconds minutes hours day month weekday")
/// bound to a timezone.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: cron::Schedule,
    timezone: Tz,
}

impl CronSchedule {
    pub fn parse(expression: &str, timezone: &str) -> Result<Self, ScheduleError> {
        let schedule = cron::Schedule::from_str(expression.trim()).map_err(|e| {
            ScheduleError::Expression {
                expression: expression.to_string(),
                reason: e.to_string(),
            }
        })?;
        let timezone: Tz = timezone
            .trim()
            .parse()
            .map_err(|_| ScheduleError::Timezone(timezone.to_string()))?;

        Ok(Self {
            expression: expression.trim().to_string(),
            schedule,
            timezone,
        })
    }

    /// First fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&self.timezone);
        self.schedule
            .after(&local)
            .next()
            .map(|at| at.with_timezone(&Utc))
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }
}
