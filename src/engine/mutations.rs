use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::{info, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability::COMMITS_TOTAL;

use super::feasibility::{check_feasible, now_local};
use super::{Engine, EngineError};

/// A booking request as it reaches the write path.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewAppointment {
    pub doctor_id: DoctorId,
    pub start_time: NaiveDateTime,
    pub duration_minutes: i64,
    pub patient_display_name: String,
    #[serde(default)]
    pub reason_text: String,
}

impl NewAppointment {
    /// Request sized to the total duration of the selected services.
    pub fn for_services(
        doctor_id: DoctorId,
        start_time: NaiveDateTime,
        services: &[Service],
        patient_display_name: impl Into<String>,
        reason_text: impl Into<String>,
    ) -> Result<Self, EngineError> {
        let duration = required_duration_for(services)?;
        Ok(Self {
            doctor_id,
            start_time,
            duration_minutes: i64::from(duration),
            patient_display_name: patient_display_name.into(),
            reason_text: reason_text.into(),
        })
    }
}

impl Engine {
    /// Book `request` if its slot is still free.
    ///
    /// The feasibility check runs again on a freshly fetched snapshot while
    /// holding the doctor's commit lock, and the insert happens under the same
    /// lock. Two callers racing for the same slot get one success and one
    /// `NotFeasible`.
    pub async fn commit_appointment(
        &self,
        request: NewAppointment,
        now: Option<NaiveDateTime>,
    ) -> Result<AppointmentId, EngineError> {
        let required = self.validate_duration(request.duration_minutes)?;
        if request.patient_display_name.len() > MAX_PATIENT_NAME_LEN {
            return Err(EngineError::LimitExceeded("patient name too long"));
        }
        if request.reason_text.len() > MAX_REASON_LEN {
            return Err(EngineError::LimitExceeded("reason too long"));
        }
        let now = now.unwrap_or_else(now_local);
        let start = request.start_time;

        let lock = self.commit_lock(request.doctor_id);
        let _guard = lock.lock().await;

        let date = start.date();
        let occupancy = self.snapshot(request.doctor_id, date, date).await?;
        if let Err(reason) = check_feasible(start, required, &occupancy, &self.policy, now) {
            warn!("rejected booking for doctor {} at {start}: {reason}", request.doctor_id);
            metrics::counter!(COMMITS_TOTAL, "status" => "rejected").increment(1);
            return Err(EngineError::NotFeasible { start, reason });
        }

        let id = Ulid::new();
        let record = AppointmentRecord {
            id,
            doctor_id: request.doctor_id,
            start_time: start.format("%Y-%m-%dT%H:%M:%S").to_string(),
            duration_minutes: Some(i64::from(required)),
            status: AppointmentStatus::Scheduled,
            patient_display_name: request.patient_display_name,
            reason_text: request.reason_text,
        };
        self.store.insert(record).await?;

        metrics::counter!(COMMITS_TOTAL, "status" => "committed").increment(1);
        info!("booked {id} for doctor {} at {start} ({required} min)", request.doctor_id);
        Ok(id)
    }

    /// Cancel a booking, releasing its slots for later queries.
    pub async fn cancel_appointment(&self, id: AppointmentId) -> Result<(), EngineError> {
        if !self.store.cancel(id).await? {
            return Err(EngineError::NotFound(id));
        }
        info!("cancelled {id}");
        Ok(())
    }
}
