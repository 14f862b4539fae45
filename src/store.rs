use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing service could not be reached.
    Unavailable(String),
    /// The backing service answered with an error.
    Backend(String),
    DuplicateId(AppointmentId),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
            StoreError::Backend(msg) => write!(f, "store backend error: {msg}"),
            StoreError::DuplicateId(id) => write!(f, "appointment already exists: {id}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Source of truth for appointments. The engine only ever reads a snapshot
/// through `active_appointments` and writes through `insert`/`cancel`;
/// retries, if any, are the store's business.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Non-cancelled appointments for `doctor_id` starting on a date in
    /// `[start, end]`, ordered by start time. Records whose start time cannot
    /// be parsed are passed through untouched. The engine widens `start` by
    /// `OCCUPANCY_LOOKBACK_DAYS` itself to catch overnight appointments.
    async fn active_appointments(
        &self,
        doctor_id: DoctorId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AppointmentRecord>, StoreError>;

    async fn insert(&self, record: AppointmentRecord) -> Result<(), StoreError>;

    /// Mark an appointment cancelled. Returns false if the id is unknown.
    async fn cancel(&self, id: AppointmentId) -> Result<bool, StoreError>;
}

/// Process-local store, used by the CLI, the bench and the tests.
pub struct InMemoryBookingStore {
    appointments: DashMap<AppointmentId, AppointmentRecord>,
    /// Doctor → appointment ids, for range scans without a full sweep.
    by_doctor: DashMap<DoctorId, Vec<AppointmentId>>,
}

impl Default for InMemoryBookingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self {
            appointments: DashMap::new(),
            by_doctor: DashMap::new(),
        }
    }

    pub fn from_records(records: impl IntoIterator<Item = AppointmentRecord>) -> Result<Self, StoreError> {
        let store = Self::new();
        for record in records {
            store.put(record)?;
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.appointments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.appointments.is_empty()
    }

    pub fn get(&self, id: &AppointmentId) -> Option<AppointmentRecord> {
        self.appointments.get(id).map(|e| e.value().clone())
    }

    fn put(&self, record: AppointmentRecord) -> Result<(), StoreError> {
        match self.appointments.entry(record.id) {
            Entry::Occupied(_) => Err(StoreError::DuplicateId(record.id)),
            Entry::Vacant(slot) => {
                self.by_doctor.entry(record.doctor_id).or_default().push(record.id);
                slot.insert(record);
                Ok(())
            }
        }
    }

    fn snapshot(&self, doctor_id: DoctorId, start: NaiveDate, end: NaiveDate) -> Vec<AppointmentRecord> {
        let ids = self
            .by_doctor
            .get(&doctor_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();

        let mut out: Vec<AppointmentRecord> = ids
            .iter()
            .filter_map(|id| self.appointments.get(id).map(|e| e.value().clone()))
            .filter(|r| r.status.is_active())
            .filter(|r| match r.parsed_start() {
                Some(t) => start <= t.date() && t.date() <= end,
                None => true,
            })
            .collect();

        // Unparsable starts sort last; the mapper drops them anyway.
        out.sort_by(|a, b| {
            let ka = (a.parsed_start().is_none(), a.parsed_start(), a.id);
            let kb = (b.parsed_start().is_none(), b.parsed_start(), b.id);
            ka.cmp(&kb)
        });
        out
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn active_appointments(
        &self,
        doctor_id: DoctorId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AppointmentRecord>, StoreError> {
        Ok(self.snapshot(doctor_id, start, end))
    }

    async fn insert(&self, record: AppointmentRecord) -> Result<(), StoreError> {
        self.put(record)
    }

    async fn cancel(&self, id: AppointmentId) -> Result<bool, StoreError> {
        match self.appointments.get_mut(&id) {
            Some(mut entry) => {
                entry.status = AppointmentStatus::Cancelled;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
