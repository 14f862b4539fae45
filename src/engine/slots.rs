use chrono::NaiveDate;

use crate::model::*;

/// The day's rendering grid: `granularity`-wide slots from opening to
/// closing. Every slot starts out free; the aggregator fills in the rest.
///
/// Closing is on the hour and granularity divides 60, so the last slot
/// always ends exactly at closing.
pub fn day_slots(date: NaiveDate, policy: &WorkingHoursPolicy) -> Vec<TimeSlot> {
    let step = policy.granularity();
    let close = policy.closes_at(date);
    let capacity = (policy.day_capacity_minutes() / policy.granularity_minutes()) as usize;

    let mut slots = Vec::with_capacity(capacity);
    let mut start = policy.opens_at(date);
    while start + step <= close {
        slots.push(TimeSlot {
            start,
            end: start + step,
            available: true,
            occupant: None,
        });
        start += step;
    }
    slots
}

/// Number of grid slots a duration occupies, rounding any remainder up.
pub fn slots_needed(duration_minutes: u32, granularity_minutes: u32) -> u32 {
    duration_minutes.div_ceil(granularity_minutes)
}
