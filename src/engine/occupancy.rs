use std::collections::BTreeMap;
use std::ops::Bound;

use chrono::{NaiveDateTime, TimeDelta};
use tracing::warn;

use crate::limits::MAX_OCCUPANCY_MINUTES;
use crate::model::*;

use super::slots::slots_needed;

/// A store record the engine could not use. Skipped, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRecord {
    pub id: AppointmentId,
    pub reason: &'static str,
}

/// Slot-start → occupant lookup for one doctor snapshot.
///
/// An appointment marks `ceil(duration / granularity)` consecutive slot keys
/// beginning at its own start time. Keys are kept ordered so a lookup can ask
/// for any marked slot overlapping an arbitrary span.
#[derive(Debug, Clone)]
pub struct OccupancyMap {
    granularity: TimeDelta,
    slots: BTreeMap<NaiveDateTime, Occupant>,
}

impl OccupancyMap {
    pub fn empty(policy: &WorkingHoursPolicy) -> Self {
        Self {
            granularity: policy.granularity(),
            slots: BTreeMap::new(),
        }
    }

    /// Validate and map a raw snapshot. Bad records are logged, counted and
    /// returned alongside the map instead of failing the whole snapshot.
    pub fn build(
        records: &[AppointmentRecord],
        policy: &WorkingHoursPolicy,
        default_duration_minutes: u32,
    ) -> (Self, Vec<MalformedRecord>) {
        let mut map = Self::empty(policy);
        let mut skipped = Vec::new();

        for record in records {
            if !record.status.is_active() {
                continue;
            }
            match validate_record(record, default_duration_minutes) {
                Ok(appointment) => map.mark(&appointment, policy),
                Err(bad) => {
                    warn!("skipping malformed appointment {}: {}", bad.id, bad.reason);
                    metrics::counter!(crate::observability::MALFORMED_RECORDS_TOTAL).increment(1);
                    skipped.push(bad);
                }
            }
        }

        (map, skipped)
    }

    pub fn from_appointments(appointments: &[ActiveAppointment], policy: &WorkingHoursPolicy) -> Self {
        let mut map = Self::empty(policy);
        for a in appointments {
            map.mark(a, policy);
        }
        map
    }

    /// First writer wins on a shared key, so a snapshot in store order maps
    /// the same way every time.
    fn mark(&mut self, appointment: &ActiveAppointment, policy: &WorkingHoursPolicy) {
        let count = slots_needed(appointment.duration_minutes, policy.granularity_minutes());
        let occupant = appointment.occupant();
        let mut key = appointment.start_time;
        for _ in 0..count {
            self.slots.entry(key).or_insert_with(|| occupant.clone());
            key += self.granularity;
        }
    }

    /// Occupant of the slot keyed exactly at `slot_start`.
    pub fn occupant_at(&self, slot_start: NaiveDateTime) -> Option<&Occupant> {
        self.slots.get(&slot_start)
    }

    /// Earliest marked slot `[k, k + granularity)` that overlaps `span`.
    /// On the aligned grid this is the same as an exact key lookup.
    pub fn occupant_within(&self, span: &Span) -> Option<&Occupant> {
        let lower = Bound::Excluded(span.start - self.granularity);
        let upper = Bound::Excluded(span.end);
        self.slots.range((lower, upper)).next().map(|(_, o)| o)
    }

    pub fn is_occupied(&self, span: &Span) -> bool {
        self.occupant_within(span).is_some()
    }

    /// Number of marked slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Turn a raw record into an appointment, or say why it can't be one.
/// A missing duration falls back to `default_duration_minutes`; a very long
/// one is kept but clipped to `MAX_OCCUPANCY_MINUTES`.
pub fn validate_record(
    record: &AppointmentRecord,
    default_duration_minutes: u32,
) -> Result<ActiveAppointment, MalformedRecord> {
    let bad = |reason| MalformedRecord { id: record.id, reason };

    let start_time = record.parsed_start().ok_or_else(|| bad("unparsable start time"))?;
    let duration = match record.duration_minutes {
        None => default_duration_minutes,
        Some(d) if d <= 0 => return Err(bad("non-positive duration")),
        Some(d) => d.min(MAX_OCCUPANCY_MINUTES) as u32,
    };

    Ok(ActiveAppointment {
        id: record.id,
        doctor_id: record.doctor_id,
        start_time,
        duration_minutes: duration,
        patient_display_name: record.patient_display_name.clone(),
        reason_text: record.reason_text.clone(),
    })
}
