use std::future::Future;
use std::time::Instant;

use chrono::{Days, NaiveDate, NaiveDateTime};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::limits::*;
use crate::model::*;
use crate::observability::{QUERIES_TOTAL, QUERY_DURATION_SECONDS};

use super::availability::day_availability;
use super::blocks::{Selection, day_blocks, revalidate};
use super::feasibility::is_feasible;
use super::occupancy::OccupancyMap;
use super::{Engine, EngineError, RangeQuery};

impl Engine {
    /// Per-slot rendering view for every day of the query range.
    pub async fn slot_availability(
        &self,
        query: &RangeQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<DayAvailability>, EngineError> {
        self.guarded("slots", cancel, async {
            self.validate_range(&query.range)?;
            let now = query.reference_time();
            let occupancy = self.snapshot(query.doctor_id, query.range.start, query.range.end).await?;

            let mut days = Vec::with_capacity(query.range.len_days() as usize);
            for date in query.range.days() {
                if cancel.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }
                days.push(day_availability(date, &self.policy, &occupancy, now));
            }
            Ok(days)
        })
        .await
    }

    /// One-click booking view: the fixed block grid for `required_minutes`
    /// on every day of the query range.
    pub async fn booking_blocks(
        &self,
        query: &RangeQuery,
        required_minutes: i64,
        cancel: &CancellationToken,
    ) -> Result<Vec<DayBlocks>, EngineError> {
        self.guarded("blocks", cancel, async {
            self.validate_range(&query.range)?;
            let required = self.validate_duration(required_minutes)?;
            let now = query.reference_time();
            let occupancy = self.snapshot(query.doctor_id, query.range.start, query.range.end).await?;

            let mut days = Vec::with_capacity(query.range.len_days() as usize);
            for date in query.range.days() {
                if cancel.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }
                days.push(day_blocks(date, &self.policy, required, &occupancy, now));
            }
            Ok(days)
        })
        .await
    }

    /// Re-check a caller-held selection after the duration, the window or
    /// the store contents changed.
    pub async fn revalidate_selection(
        &self,
        query: &RangeQuery,
        required_minutes: i64,
        selection: Selection,
    ) -> Result<Selection, EngineError> {
        self.guarded("revalidate", &CancellationToken::new(), async {
            self.validate_range(&query.range)?;
            let required = self.validate_duration(required_minutes)?;
            if selection == Selection::None {
                return Ok(Selection::None);
            }
            let now = query.reference_time();
            let occupancy = self.snapshot(query.doctor_id, query.range.start, query.range.end).await?;
            let kept = revalidate(selection, &query.range, &self.policy, required, &occupancy, now);
            if kept == Selection::None {
                debug!("selection {selection:?} cleared for doctor {}", query.doctor_id);
            }
            Ok(kept)
        })
        .await
    }

    /// Point check for a single candidate start against a fresh snapshot.
    pub async fn is_slot_free(
        &self,
        doctor_id: DoctorId,
        start: NaiveDateTime,
        required_minutes: i64,
        now: Option<NaiveDateTime>,
    ) -> Result<bool, EngineError> {
        self.guarded("point", &CancellationToken::new(), async {
            let required = self.validate_duration(required_minutes)?;
            let now = now.unwrap_or_else(super::feasibility::now_local);
            let date = start.date();
            let occupancy = self.snapshot(doctor_id, date, date).await?;
            Ok(is_feasible(start, required, &occupancy, &self.policy, now))
        })
        .await
    }

    // ── Shared plumbing ──────────────────────────────────────────

    pub(super) fn validate_range(&self, range: &DateRange) -> Result<(), EngineError> {
        if range.end < range.start {
            return Err(EngineError::InvalidRange {
                start: range.start,
                end: range.end,
            });
        }
        if range.len_days() > MAX_QUERY_WINDOW_DAYS {
            return Err(EngineError::LimitExceeded("query window too wide"));
        }
        Ok(())
    }

    /// A duration must be positive and fit in one day's opening hours.
    pub(super) fn validate_duration(&self, minutes: i64) -> Result<u32, EngineError> {
        if minutes <= 0 || minutes > i64::from(self.policy.day_capacity_minutes()) {
            return Err(EngineError::InvalidDuration(minutes));
        }
        Ok(minutes as u32)
    }

    /// Fetch one doctor's active appointments and map them onto the grid.
    /// The fetch reaches `OCCUPANCY_LOOKBACK_DAYS` before `start` so every
    /// path sees appointments running over midnight into its first day.
    /// Store errors pass through untouched; malformed records are dropped.
    pub(super) async fn snapshot(
        &self,
        doctor_id: DoctorId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<OccupancyMap, EngineError> {
        let fetch_from = start
            .checked_sub_days(Days::new(OCCUPANCY_LOOKBACK_DAYS))
            .unwrap_or(start);
        let records = self.store.active_appointments(doctor_id, fetch_from, end).await?;
        let (occupancy, skipped) = OccupancyMap::build(&records, &self.policy, self.default_duration_minutes);
        debug!(
            "snapshot for doctor {doctor_id} {fetch_from}..={end}: {} records, {} skipped, {} slots marked",
            records.len(),
            skipped.len(),
            occupancy.len()
        );
        Ok(occupancy)
    }

    /// Run `work` under the caller's cancellation token and the configured
    /// timeout. Either one firing drops the work without a partial result.
    async fn guarded<T, F>(&self, view: &'static str, cancel: &CancellationToken, work: F) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, EngineError>>,
    {
        let started = Instant::now();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(EngineError::Cancelled),
            r = tokio::time::timeout(self.query_timeout, work) => r.unwrap_or(Err(EngineError::TimedOut)),
        };

        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(QUERIES_TOTAL, "view" => view, "status" => status).increment(1);
        metrics::histogram!(QUERY_DURATION_SECONDS, "view" => view).record(started.elapsed().as_secs_f64());
        result
    }
}
