mod availability;
mod blocks;
mod error;
mod feasibility;
mod mutations;
mod occupancy;
mod queries;
mod slots;

pub use availability::{day_availability, range_availability};
pub use blocks::{Selection, block_starts, day_blocks, is_block_boundary, range_blocks, revalidate, select};
pub use error::EngineError;
pub use feasibility::{Infeasible, check_feasible, is_feasible};
pub use mutations::NewAppointment;
pub use occupancy::{MalformedRecord, OccupancyMap, validate_record};
pub use slots::{day_slots, slots_needed};

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::model::*;
use crate::store::BookingStore;

/// One availability question: which doctor, which dates, as of when.
/// `now` defaults to the local wall clock when left unset.
#[derive(Debug, Clone, Copy)]
pub struct RangeQuery {
    pub doctor_id: DoctorId,
    pub range: DateRange,
    pub now: Option<NaiveDateTime>,
}

impl RangeQuery {
    pub fn new(doctor_id: DoctorId, range: DateRange) -> Self {
        Self {
            doctor_id,
            range,
            now: None,
        }
    }

    pub fn at(mut self, now: NaiveDateTime) -> Self {
        self.now = Some(now);
        self
    }

    pub(super) fn reference_time(&self) -> NaiveDateTime {
        self.now.unwrap_or_else(feasibility::now_local)
    }
}

/// Availability engine over a Booking Store.
///
/// Reads are stateless: every query takes its own snapshot and derives
/// everything from it. The only shared state is the per-doctor commit lock
/// that serializes re-check-then-insert on the write path.
pub struct Engine {
    pub(super) store: Arc<dyn BookingStore>,
    pub(super) policy: WorkingHoursPolicy,
    pub(super) default_duration_minutes: u32,
    pub(super) query_timeout: Duration,
    commit_locks: DashMap<DoctorId, Arc<Mutex<()>>>,
}

impl Engine {
    pub fn new(store: Arc<dyn BookingStore>, policy: WorkingHoursPolicy) -> Self {
        let defaults = Config::default();
        Self {
            store,
            policy,
            default_duration_minutes: defaults.default_appointment_minutes,
            query_timeout: defaults.query_timeout,
            commit_locks: DashMap::new(),
        }
    }

    pub fn from_config(store: Arc<dyn BookingStore>, config: &Config) -> Self {
        Self {
            store,
            policy: config.policy.clone(),
            default_duration_minutes: config.default_appointment_minutes,
            query_timeout: config.query_timeout,
            commit_locks: DashMap::new(),
        }
    }

    pub fn with_default_duration(mut self, minutes: u32) -> Self {
        self.default_duration_minutes = minutes;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn policy(&self) -> &WorkingHoursPolicy {
        &self.policy
    }

    /// Lock guarding commits for one doctor. Created on first use.
    pub(super) fn commit_lock(&self, doctor_id: DoctorId) -> Arc<Mutex<()>> {
        self.commit_locks.entry(doctor_id).or_default().clone()
    }
}
