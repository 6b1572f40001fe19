//! Active-day and time-of-day gating for scheduled runs

use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Longest permitted interval between scheduled runs (one day)
pub const MAX_INTERVAL_MINUTES: u64 = 24 * 60;

/// Schedule as written in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub active: bool,
    /// English weekday names, e.g. "monday" or "Mon"
    pub days: Vec<String>,
    /// Window start, `HH:MM` local time
    pub start_time: String,
    /// Window end, `HH:MM` local time; earlier than start spans midnight
    pub end_time: String,
    pub interval_minutes: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            active: true,
            days: [
                "monday",
                "tuesday",
                "wednesday",
                "thursday",
                "friday",
                "saturday",
                "sunday",
            ]
            .iter()
            .map(|d| d.to_string())
            .collect(),
            start_time: "00:00".to_string(),
            end_time: "23:59".to_string(),
            interval_minutes: 60,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("unknown weekday {0:?}")]
    UnknownDay(String),
    #[error("invalid time {0:?}, expected HH:MM")]
    InvalidTime(String),
    #[error("interval must be between 1 and {MAX_INTERVAL_MINUTES} minutes, got {0}")]
    InvalidInterval(u64),
}

impl ScheduleConfig {
    /// Validate and convert into a `ScheduleWindow`
    pub fn window(&self) -> Result<ScheduleWindow, ScheduleError> {
        let mut days = Vec::with_capacity(self.days.len());
        for raw in &self.days {
            let day: Weekday = raw
                .trim()
                .parse()
                .map_err(|_| ScheduleError::UnknownDay(raw.clone()))?;
            if !days.contains(&day) {
                days.push(day);
            }
        }

        if !(1..=MAX_INTERVAL_MINUTES).contains(&self.interval_minutes) {
            return Err(ScheduleError::InvalidInterval(self.interval_minutes));
        }

        Ok(ScheduleWindow {
            active: self.active,
            days,
            start: parse_time(&self.start_time)?,
            end: parse_time(&self.end_time)?,
            interval: Duration::from_secs(self.interval_minutes * 60),
        })
    }
}

fn parse_time(raw: &str) -> Result<NaiveTime, ScheduleError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| ScheduleError::InvalidTime(raw.to_string()))
}

/// Validated schedule
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleWindow {
    active: bool,
    days: Vec<Weekday>,
    start: NaiveTime,
    end: NaiveTime,
    interval: Duration,
}

impl ScheduleWindow {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn days(&self) -> &[Weekday] {
        &self.days
    }

    /// Whether a run may start at local time `now`
    ///
    /// Both bounds are inclusive at minute resolution. For a window that
    /// spans midnight the weekday of the start side is the one checked, so a
    /// Friday 22:00-02:00 window still fires at 01:00 on Saturday.
    pub fn is_open_at(&self, now: NaiveDateTime) -> bool {
        if !self.active {
            return false;
        }

        let time = now.time();
        let minute = NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time);
        let day = now.weekday();

        if self.start <= self.end {
            self.days.contains(&day) && minute >= self.start && minute <= self.end
        } else if minute >= self.start {
            self.days.contains(&day)
        } else if minute <= self.end {
            self.days.contains(&day.pred())
        } else {
            false
        }
    }
}
