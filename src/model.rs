use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Weekday};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::engine::EngineError;
use crate::limits::*;

pub type DoctorId = Ulid;
pub type AppointmentId = Ulid;

/// Half-open interval `[start, end)` in clinic wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Span {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn from_minutes(start: NaiveDateTime, minutes: u32) -> Self {
        Self::new(start, start + TimeDelta::minutes(i64::from(minutes)))
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t < self.end
    }
}

// ── Working hours ────────────────────────────────────────────────

/// Daily open/close window, grid width and weekly closures.
///
/// Constructed through [`WorkingHoursPolicy::new`], which rejects a window
/// that is empty or a granularity that does not tile an hour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkingHoursPolicy {
    open_hour: u32,
    close_hour: u32,
    granularity_minutes: u32,
    closed_weekdays: Vec<Weekday>,
    #[serde(skip)]
    open_time: NaiveTime,
    #[serde(skip)]
    close_time: NaiveTime,
}

impl WorkingHoursPolicy {
    pub fn new(
        open_hour: u32,
        close_hour: u32,
        granularity_minutes: u32,
        closed_weekdays: &[Weekday],
    ) -> Result<Self, EngineError> {
        if close_hour > 23 {
            return Err(EngineError::InvalidPolicy("close hour must be within 0..=23"));
        }
        if open_hour >= close_hour {
            return Err(EngineError::InvalidPolicy("open hour must be before close hour"));
        }
        if granularity_minutes == 0 || 60 % granularity_minutes != 0 {
            return Err(EngineError::InvalidPolicy("granularity must be a positive divisor of 60"));
        }
        let open_time = NaiveTime::from_hms_opt(open_hour, 0, 0)
            .ok_or(EngineError::InvalidPolicy("open hour out of range"))?;
        let close_time = NaiveTime::from_hms_opt(close_hour, 0, 0)
            .ok_or(EngineError::InvalidPolicy("close hour out of range"))?;

        let mut closed = Vec::with_capacity(closed_weekdays.len());
        for &day in closed_weekdays {
            if !closed.contains(&day) {
                closed.push(day);
            }
        }
        closed.sort_by_key(|d| d.num_days_from_sunday());

        Ok(Self {
            open_hour,
            close_hour,
            granularity_minutes,
            closed_weekdays: closed,
            open_time,
            close_time,
        })
    }

    pub fn open_hour(&self) -> u32 {
        self.open_hour
    }

    pub fn close_hour(&self) -> u32 {
        self.close_hour
    }

    pub fn granularity_minutes(&self) -> u32 {
        self.granularity_minutes
    }

    pub fn granularity(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.granularity_minutes))
    }

    pub fn closed_weekdays(&self) -> &[Weekday] {
        &self.closed_weekdays
    }

    pub fn open_time(&self) -> NaiveTime {
        self.open_time
    }

    pub fn close_time(&self) -> NaiveTime {
        self.close_time
    }

    pub fn opens_at(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.open_time)
    }

    pub fn closes_at(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.close_time)
    }

    /// Minutes between opening and closing on a business day.
    pub fn day_capacity_minutes(&self) -> u32 {
        (self.close_hour - self.open_hour) * 60
    }

    pub fn is_closed_on(&self, date: NaiveDate) -> bool {
        self.closed_weekdays.contains(&date.weekday())
    }
}

impl Default for WorkingHoursPolicy {
    /// 08:00-20:00 in 30-minute slots, closed on Sunday.
    fn default() -> Self {
        Self {
            open_hour: 8,
            close_hour: 20,
            granularity_minutes: 30,
            closed_weekdays: vec![Weekday::Sun],
            open_time: NaiveTime::MIN + TimeDelta::hours(8),
            close_time: NaiveTime::MIN + TimeDelta::hours(20),
        }
    }
}

// ── Date ranges ──────────────────────────────────────────────────

/// Inclusive calendar range `[start, end]`. Not validated on construction;
/// the engine rejects `end < start` before touching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn single(date: NaiveDate) -> Self {
        Self { start: date, end: date }
    }

    /// The Monday..Sunday week containing `date`.
    pub fn week_of(date: NaiveDate) -> Self {
        let monday = date - TimeDelta::days(i64::from(date.weekday().num_days_from_monday()));
        Self {
            start: monday,
            end: monday + TimeDelta::days(6),
        }
    }

    pub fn shift_weeks(&self, weeks: i64) -> Self {
        let delta = TimeDelta::weeks(weeks);
        Self {
            start: self.start + delta,
            end: self.end + delta,
        }
    }

    /// Number of days in the range, 0 when inverted.
    pub fn len_days(&self) -> i64 {
        ((self.end - self.start).num_days() + 1).max(0)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

// ── Appointments ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Scheduled,
    Cancelled,
}

impl AppointmentStatus {
    pub fn is_active(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }
}

/// An appointment as the booking store hands it over. Fields are unvalidated:
/// the start time may not parse and the duration may be missing or non-positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentRecord {
    pub id: AppointmentId,
    pub doctor_id: DoctorId,
    pub start_time: String,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub patient_display_name: String,
    #[serde(default)]
    pub reason_text: String,
}

impl AppointmentRecord {
    pub fn parsed_start(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.start_time)
    }
}

/// A validated, non-cancelled appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveAppointment {
    pub id: AppointmentId,
    pub doctor_id: DoctorId,
    pub start_time: NaiveDateTime,
    pub duration_minutes: u32,
    pub patient_display_name: String,
    pub reason_text: String,
}

impl ActiveAppointment {
    pub fn span(&self) -> Span {
        Span::from_minutes(self.start_time, self.duration_minutes)
    }

    pub fn occupant(&self) -> Occupant {
        Occupant {
            appointment_id: self.id,
            patient_name: self.patient_display_name.clone(),
            reason: self.reason_text.clone(),
        }
    }
}

/// Accepts RFC 3339 (the wall-clock part at the given offset is kept) or a
/// bare local `YYYY-MM-DDTHH:MM[:SS]`.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

// ── Services ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: Ulid,
    pub name: String,
    pub duration_minutes: u32,
}

/// Total chair time for a set of selected services.
pub fn required_duration_for(services: &[Service]) -> Result<u32, EngineError> {
    if services.is_empty() {
        return Err(EngineError::InvalidDuration(0));
    }
    if services.len() > MAX_SERVICES_PER_BOOKING {
        return Err(EngineError::LimitExceeded("too many services in one booking"));
    }
    let mut total: u32 = 0;
    for s in services {
        if !(MIN_SERVICE_MINUTES..=MAX_SERVICE_MINUTES).contains(&s.duration_minutes) {
            return Err(EngineError::InvalidDuration(i64::from(s.duration_minutes)));
        }
        total += s.duration_minutes;
    }
    Ok(total)
}

// ── Query result types ───────────────────────────────────────────

/// Who holds a slot, as shown on the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occupant {
    pub appointment_id: AppointmentId,
    pub patient_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeSlot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub available: bool,
    pub occupant: Option<Occupant>,
}

impl TimeSlot {
    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub weekday: Weekday,
    pub closed: bool,
    pub slots: Vec<TimeSlot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub available: bool,
    pub occupant: Option<Occupant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayBlocks {
    pub date: NaiveDate,
    pub weekday: Weekday,
    pub closed: bool,
    pub blocks: Vec<Block>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn at(date: NaiveDate, h: u32, min: u32) -> NaiveDateTime {
        date.and_hms_opt(h, min, 0).unwrap()
    }

    #[test]
    fn span_basics() {
        let day = d(2024, 6, 10);
        let s = Span::new(at(day, 10, 0), at(day, 11, 0));
        assert_eq!(s.duration_minutes(), 60);
        assert!(s.contains_instant(at(day, 10, 0)));
        assert!(s.contains_instant(at(day, 10, 59)));
        assert!(!s.contains_instant(at(day, 11, 0))); // half-open
    }

    #[test]
    fn span_overlap() {
        let day = d(2024, 6, 10);
        let a = Span::from_minutes(at(day, 10, 0), 60);
        let b = Span::from_minutes(at(day, 10, 30), 60);
        let c = Span::from_minutes(at(day, 11, 0), 30);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c)); // adjacent, not overlapping
    }

    #[test]
    fn policy_default_matches_clinic_hours() {
        let p = WorkingHoursPolicy::default();
        assert_eq!(p, WorkingHoursPolicy::new(8, 20, 30, &[Weekday::Sun]).unwrap());
        assert_eq!(p.day_capacity_minutes(), 720);
        assert_eq!(p.open_time(), NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(p.close_time(), NaiveTime::from_hms_opt(20, 0, 0).unwrap());
    }

    #[test]
    fn policy_rejects_bad_window() {
        assert!(matches!(
            WorkingHoursPolicy::new(20, 8, 30, &[]),
            Err(EngineError::InvalidPolicy(_))
        ));
        assert!(matches!(
            WorkingHoursPolicy::new(8, 8, 30, &[]),
            Err(EngineError::InvalidPolicy(_))
        ));
        assert!(matches!(
            WorkingHoursPolicy::new(8, 24, 30, &[]),
            Err(EngineError::InvalidPolicy(_))
        ));
    }

    #[test]
    fn policy_rejects_granularity_not_dividing_hour() {
        assert!(WorkingHoursPolicy::new(8, 20, 0, &[]).is_err());
        assert!(WorkingHoursPolicy::new(8, 20, 45, &[]).is_err());
        assert!(WorkingHoursPolicy::new(8, 20, 90, &[]).is_err());
        assert!(WorkingHoursPolicy::new(8, 20, 15, &[]).is_ok());
    }

    #[test]
    fn policy_dedups_closed_weekdays() {
        let p = WorkingHoursPolicy::new(8, 20, 30, &[Weekday::Sat, Weekday::Sun, Weekday::Sat]).unwrap();
        assert_eq!(p.closed_weekdays(), &[Weekday::Sun, Weekday::Sat]);
        assert!(p.is_closed_on(d(2024, 6, 9))); // Sunday
        assert!(p.is_closed_on(d(2024, 6, 15))); // Saturday
        assert!(!p.is_closed_on(d(2024, 6, 10)));
    }

    #[test]
    fn week_of_starts_on_monday() {
        // 2024-06-12 is a Wednesday
        let w = DateRange::week_of(d(2024, 6, 12));
        assert_eq!(w.start, d(2024, 6, 10));
        assert_eq!(w.end, d(2024, 6, 16));
        // Sunday belongs to the week that started six days earlier
        let w = DateRange::week_of(d(2024, 6, 16));
        assert_eq!(w.start, d(2024, 6, 10));
        assert_eq!(w.len_days(), 7);
    }

    #[test]
    fn shift_weeks_moves_both_ends() {
        let w = DateRange::week_of(d(2024, 6, 12)).shift_weeks(-1);
        assert_eq!(w, DateRange::new(d(2024, 6, 3), d(2024, 6, 9)));
    }

    #[test]
    fn date_range_days_inclusive() {
        let r = DateRange::new(d(2024, 2, 28), d(2024, 3, 1));
        let days: Vec<_> = r.days().collect();
        assert_eq!(days, vec![d(2024, 2, 28), d(2024, 2, 29), d(2024, 3, 1)]);
        let inverted = DateRange::new(d(2024, 3, 1), d(2024, 2, 28));
        assert_eq!(inverted.days().count(), 0);
        assert_eq!(inverted.len_days(), 0);
    }

    #[test]
    fn parse_timestamp_formats() {
        let expected = at(d(2024, 6, 10), 10, 0);
        assert_eq!(parse_timestamp("2024-06-10T10:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-06-10T10:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-06-10 10:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-06-10T10:00:00+03:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-06-10T10:00:00.000Z"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn status_activity() {
        assert!(AppointmentStatus::Pending.is_active());
        assert!(AppointmentStatus::Scheduled.is_active());
        assert!(!AppointmentStatus::Cancelled.is_active());
    }

    #[test]
    fn record_deserializes_without_duration() {
        let json = r#"{
            "id": "01HZX3K5Q0N9J7Y8C6V4B2A1M0",
            "doctor_id": "01HZX3K5Q0N9J7Y8C6V4B2A1M1",
            "start_time": "2024-06-10T10:00:00",
            "status": "scheduled"
        }"#;
        let rec: AppointmentRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.duration_minutes, None);
        assert_eq!(rec.status, AppointmentStatus::Scheduled);
        assert_eq!(rec.parsed_start(), Some(at(d(2024, 6, 10), 10, 0)));
    }

    fn service(minutes: u32) -> Service {
        Service {
            id: Ulid::new(),
            name: "Consultation".into(),
            duration_minutes: minutes,
        }
    }

    #[test]
    fn services_sum_their_durations() {
        let total = required_duration_for(&[service(30), service(45), service(60)]).unwrap();
        assert_eq!(total, 135);
    }

    #[test]
    fn services_empty_or_out_of_bounds_rejected() {
        assert!(matches!(required_duration_for(&[]), Err(EngineError::InvalidDuration(0))));
        assert!(matches!(
            required_duration_for(&[service(4)]),
            Err(EngineError::InvalidDuration(4))
        ));
        assert!(matches!(
            required_duration_for(&[service(481)]),
            Err(EngineError::InvalidDuration(481))
        ));
    }
}
