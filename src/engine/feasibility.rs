use chrono::{Datelike, NaiveDateTime, TimeDelta, Weekday};

use crate::model::*;

use super::occupancy::OccupancyMap;
use super::slots::slots_needed;

/// Why a candidate start cannot host a booking. Reported for the first
/// sub-slot that fails, checked in the order listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Infeasible {
    Closed(Weekday),
    Past,
    BeforeOpen,
    PastClosing,
    Occupied(AppointmentId),
}

impl std::fmt::Display for Infeasible {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Infeasible::Closed(day) => write!(f, "clinic closed on {day}"),
            Infeasible::Past => write!(f, "starts in the past"),
            Infeasible::BeforeOpen => write!(f, "starts before opening"),
            Infeasible::PastClosing => write!(f, "runs past closing"),
            Infeasible::Occupied(id) => write!(f, "occupied by appointment {id}"),
        }
    }
}

pub(crate) fn now_local() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Walk the `ceil(required / granularity)` sub-slots starting at `start` and
/// fail on the first one that is closed, past, outside hours or taken.
///
/// Pure: no shared state, so evaluation order and repetition don't matter.
pub fn check_feasible(
    start: NaiveDateTime,
    required_minutes: u32,
    occupancy: &OccupancyMap,
    policy: &WorkingHoursPolicy,
    now: NaiveDateTime,
) -> Result<(), Infeasible> {
    let step = policy.granularity();
    let end = start + TimeDelta::minutes(i64::from(required_minutes));
    let needed = slots_needed(required_minutes, policy.granularity_minutes());

    let mut candidate = start;
    for _ in 0..needed {
        let date = candidate.date();
        if policy.is_closed_on(date) {
            return Err(Infeasible::Closed(date.weekday()));
        }
        if candidate < now {
            return Err(Infeasible::Past);
        }
        if candidate.time() < policy.open_time() {
            return Err(Infeasible::BeforeOpen);
        }
        if candidate.time() >= policy.close_time() {
            return Err(Infeasible::PastClosing);
        }
        // The last sub-slot is clipped to the booking's own end.
        let window = Span::new(candidate, (candidate + step).min(end));
        if let Some(occupant) = occupancy.occupant_within(&window) {
            return Err(Infeasible::Occupied(occupant.appointment_id));
        }
        candidate += step;
    }

    // Off-grid starts can fit every sub-slot yet still end after closing.
    if end > policy.closes_at(start.date()) {
        return Err(Infeasible::PastClosing);
    }
    Ok(())
}

pub fn is_feasible(
    start: NaiveDateTime,
    required_minutes: u32,
    occupancy: &OccupancyMap,
    policy: &WorkingHoursPolicy,
    now: NaiveDateTime,
) -> bool {
    check_feasible(start, required_minutes, occupancy, policy, now).is_ok()
}
