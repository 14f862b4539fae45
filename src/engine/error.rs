use chrono::{NaiveDate, NaiveDateTime};
use ulid::Ulid;

use crate::store::StoreError;

use super::feasibility::Infeasible;

#[derive(Debug)]
pub enum EngineError {
    InvalidRange {
        start: NaiveDate,
        end: NaiveDate,
    },
    InvalidDuration(i64),
    InvalidPolicy(&'static str),
    LimitExceeded(&'static str),
    Upstream(StoreError),
    Cancelled,
    TimedOut,
    NotFeasible {
        start: NaiveDateTime,
        reason: Infeasible,
    },
    NotFound(Ulid),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidRange { start, end } => {
                write!(f, "invalid range: end date {end} is before start date {start}")
            }
            EngineError::InvalidDuration(minutes) => {
                write!(f, "invalid duration: {minutes} minutes")
            }
            EngineError::InvalidPolicy(msg) => write!(f, "invalid working hours policy: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Upstream(e) => write!(f, "booking store error: {e}"),
            EngineError::Cancelled => write!(f, "query cancelled"),
            EngineError::TimedOut => write!(f, "query timed out"),
            EngineError::NotFeasible { start, reason } => {
                write!(f, "slot at {start} is not feasible: {reason}")
            }
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Upstream(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Upstream(e)
    }
}
