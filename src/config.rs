use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono::{NaiveDateTime, Weekday};
use tracing::warn;

use crate::engine::EngineError;
use crate::model::{WorkingHoursPolicy, parse_timestamp};

#[derive(Debug, Clone)]
pub struct Config {
    pub policy: WorkingHoursPolicy,
    /// Used for stored appointments that carry no duration of their own.
    pub default_appointment_minutes: u32,
    pub query_timeout: Duration,
    pub metrics_port: Option<u16>,
    /// Pinned reference time for queries; the local clock when unset.
    pub now: Option<NaiveDateTime>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            policy: WorkingHoursPolicy::default(),
            default_appointment_minutes: 60,
            query_timeout: Duration::from_millis(5000),
            metrics_port: None,
            now: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Unparsable values fall back to the default
    /// with a warning; a policy that parses but is inconsistent is an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, EngineError> {
        let open_hour = parsed(&lookup, "SLOTGRID_OPEN_HOUR", 8u32);
        let close_hour = parsed(&lookup, "SLOTGRID_CLOSE_HOUR", 20u32);
        let granularity = parsed(&lookup, "SLOTGRID_GRANULARITY_MINUTES", 30u32);
        let closed = match lookup("SLOTGRID_CLOSED_WEEKDAYS") {
            Some(raw) => parse_weekdays(&raw),
            None => vec![Weekday::Sun],
        };
        let policy = WorkingHoursPolicy::new(open_hour, close_hour, granularity, &closed)?;

        let mut default_appointment_minutes = parsed(&lookup, "SLOTGRID_DEFAULT_APPOINTMENT_MINUTES", 60u32);
        if default_appointment_minutes == 0 {
            warn!("SLOTGRID_DEFAULT_APPOINTMENT_MINUTES must be positive, using 60");
            default_appointment_minutes = 60;
        }

        let timeout_ms = parsed(&lookup, "SLOTGRID_QUERY_TIMEOUT_MS", 5000u64);
        let metrics_port = optional(&lookup, "SLOTGRID_METRICS_PORT", |raw| raw.parse().ok());
        let now = optional(&lookup, "SLOTGRID_NOW", parse_timestamp);

        Ok(Self {
            policy,
            default_appointment_minutes,
            query_timeout: Duration::from_millis(timeout_ms),
            metrics_port,
            now,
        })
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{key}={raw:?} is not valid, using default {default}");
            default
        }),
    }
}

/// A setting that is off unless present. Garbage turns it off with a warning.
fn optional<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let raw = lookup(key)?;
    let value = parse(raw.trim());
    if value.is_none() {
        warn!("{key}={raw:?} is not valid, leaving it unset");
    }
    value
}

/// Comma-separated weekday names (`sun`, `Saturday`, ...). Unknown names are
/// dropped with a warning.
fn parse_weekdays(raw: &str) -> Vec<Weekday> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match Weekday::from_str(s) {
            Ok(day) => Some(day),
            Err(_) => {
                warn!("ignoring unknown weekday {s:?} in SLOTGRID_CLOSED_WEEKDAYS");
                None
            }
        })
        .collect()
}
