use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::model::*;

use super::feasibility::is_feasible;
use super::occupancy::OccupancyMap;
use super::slots::day_slots;

// ── Per-slot rendering view ───────────────────────────────────────

/// One day of the calendar grid, every slot marked free or not.
///
/// Two "past" rules apply and both are kept:
/// - past day: any date before `now`'s date is unavailable in full;
/// - past slot: on `now`'s date, a slot is unavailable if it starts before `now`.
pub fn day_availability(
    date: NaiveDate,
    policy: &WorkingHoursPolicy,
    occupancy: &OccupancyMap,
    now: NaiveDateTime,
) -> DayAvailability {
    let closed = policy.is_closed_on(date);
    let today = now.date();
    let past_day = date < today;
    let granularity = policy.granularity_minutes();

    let mut slots = day_slots(date, policy);
    for slot in &mut slots {
        slot.occupant = occupancy.occupant_within(&slot.span()).cloned();
        let past_slot = date == today && slot.start < now;
        slot.available = !closed
            && !past_day
            && !past_slot
            && slot.occupant.is_none()
            && is_feasible(slot.start, granularity, occupancy, policy, now);
    }

    DayAvailability {
        date,
        weekday: date.weekday(),
        closed,
        slots,
    }
}

/// `day_availability` for every date in the inclusive range, in order.
pub fn range_availability(
    range: &DateRange,
    policy: &WorkingHoursPolicy,
    occupancy: &OccupancyMap,
    now: NaiveDateTime,
) -> Vec<DayAvailability> {
    range
        .days()
        .map(|date| day_availability(date, policy, occupancy, now))
        .collect()
}
