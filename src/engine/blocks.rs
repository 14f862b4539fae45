use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::model::*;

use super::feasibility::is_feasible;
use super::occupancy::OccupancyMap;
use super::slots::slots_needed;

// ── One-click booking view ───────────────────────────────────────

/// Time-of-day starts of the fixed block grid: back to back from opening,
/// each exactly `required_minutes` long. A trailing remainder shorter than
/// one block is dropped.
pub fn block_starts(policy: &WorkingHoursPolicy, required_minutes: u32) -> Vec<NaiveTime> {
    if required_minutes == 0 {
        return Vec::new();
    }
    let capacity = policy.day_capacity_minutes();
    let step = TimeDelta::minutes(i64::from(required_minutes));

    let mut starts = Vec::with_capacity((capacity / required_minutes) as usize);
    let mut offset = 0;
    let mut t = policy.open_time();
    while offset + required_minutes <= capacity {
        starts.push(t);
        t += step;
        offset += required_minutes;
    }
    starts
}

/// Whether `start` sits on the block grid for `required_minutes` on its day.
pub fn is_block_boundary(start: NaiveDateTime, policy: &WorkingHoursPolicy, required_minutes: u32) -> bool {
    block_starts(policy, required_minutes).contains(&start.time())
}

/// Block grid for one day. A block is available exactly when the
/// feasibility check passes for its start; blocks never slide around a
/// conflict.
pub fn day_blocks(
    date: NaiveDate,
    policy: &WorkingHoursPolicy,
    required_minutes: u32,
    occupancy: &OccupancyMap,
    now: NaiveDateTime,
) -> DayBlocks {
    let step = TimeDelta::minutes(i64::from(required_minutes));
    let blocks = block_starts(policy, required_minutes)
        .into_iter()
        .map(|t| {
            let start = date.and_time(t);
            Block {
                start,
                end: start + step,
                available: is_feasible(start, required_minutes, occupancy, policy, now),
                occupant: block_occupant(start, required_minutes, occupancy, policy),
            }
        })
        .collect();

    DayBlocks {
        date,
        weekday: date.weekday(),
        closed: policy.is_closed_on(date),
        blocks,
    }
}

pub fn range_blocks(
    range: &DateRange,
    policy: &WorkingHoursPolicy,
    required_minutes: u32,
    occupancy: &OccupancyMap,
    now: NaiveDateTime,
) -> Vec<DayBlocks> {
    range
        .days()
        .map(|date| day_blocks(date, policy, required_minutes, occupancy, now))
        .collect()
}

/// Occupant of the first taken sub-slot inside the block, if any.
fn block_occupant(
    start: NaiveDateTime,
    required_minutes: u32,
    occupancy: &OccupancyMap,
    policy: &WorkingHoursPolicy,
) -> Option<Occupant> {
    let step = policy.granularity();
    let end = start + TimeDelta::minutes(i64::from(required_minutes));
    let mut candidate = start;
    for _ in 0..slots_needed(required_minutes, policy.granularity_minutes()) {
        let window = Span::new(candidate, (candidate + step).min(end));
        if let Some(o) = occupancy.occupant_within(&window) {
            return Some(o.clone());
        }
        candidate += step;
    }
    None
}

// ── Selection ────────────────────────────────────────────────────

/// The caller's picked block. Owned by the caller and passed back in
/// whenever the duration, the window or the snapshot changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Selection {
    #[default]
    None,
    Selected(NaiveDateTime),
}

impl Selection {
    pub fn start(&self) -> Option<NaiveDateTime> {
        match self {
            Selection::None => None,
            Selection::Selected(t) => Some(*t),
        }
    }
}

/// Pick a block. Only an available block can become the selection.
pub fn select(block: &Block) -> Selection {
    if block.available {
        Selection::Selected(block.start)
    } else {
        Selection::None
    }
}

/// Keep the selection only if it still starts on a block boundary of the
/// current grid, falls in `range`, and is still feasible.
pub fn revalidate(
    selection: Selection,
    range: &DateRange,
    policy: &WorkingHoursPolicy,
    required_minutes: u32,
    occupancy: &OccupancyMap,
    now: NaiveDateTime,
) -> Selection {
    let Some(start) = selection.start() else {
        return Selection::None;
    };
    if !range.contains(start.date()) {
        return Selection::None;
    }
    if !is_block_boundary(start, policy, required_minutes) {
        return Selection::None;
    }
    if !is_feasible(start, required_minutes, occupancy, policy, now) {
        return Selection::None;
    }
    selection
}
