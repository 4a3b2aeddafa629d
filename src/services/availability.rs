use crate::{
    db::DbPool,
    entities::{
        appointment, job_order,
        user::{self, UserRole},
    },
    errors::ServiceError,
    scheduling::{
        candidate_starts, end_time_with_break, walk_in_slots, ClockTime, DaySchedule, TimeRange,
        WalkInSlots, WorkingWindow,
    },
};
use chrono::NaiveDate;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Dates on schedule queries are `YYYY-MM-DD`.
pub fn parse_schedule_date(raw: &str) -> Result<NaiveDate, ServiceError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ServiceError::InvalidScheduleQuery(format!("unparsable date '{}'", raw)))
}

/// A caller-supplied break override; both ends or neither.
pub fn break_override(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<Option<TimeRange>, ServiceError> {
    match (start, end) {
        (Some(s), Some(e)) => TimeRange::parse(s, e).map(Some),
        (None, None) => Ok(None),
        _ => Err(ServiceError::InvalidScheduleQuery(
            "break_start and break_end must be given together".into(),
        )),
    }
}

/// Workshop-wide scheduling parameters.
#[derive(Debug, Clone)]
pub struct SchedulingSettings {
    pub window: WorkingWindow,
    pub default_break: Option<TimeRange>,
    pub walk_in_minutes: u32,
    pub technician_daily_minutes: u32,
}

impl Default for SchedulingSettings {
    fn default() -> Self {
        Self {
            window: WorkingWindow::default(),
            default_break: TimeRange::new(ClockTime::hm(12, 0), ClockTime::hm(13, 0)).ok(),
            walk_in_minutes: 60,
            technician_daily_minutes: 8 * 60,
        }
    }
}

impl SchedulingSettings {
    pub fn from_config(cfg: &crate::config::AppConfig) -> Result<Self, ServiceError> {
        Ok(Self {
            window: cfg.working_window()?,
            default_break: Some(cfg.default_break()?),
            walk_in_minutes: cfg.walk_in_duration_minutes,
            technician_daily_minutes: cfg.technician_daily_minutes,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TechnicianSummary {
    pub id: Uuid,
    pub name: String,
    pub level: Option<crate::entities::TechnicianLevel>,
}

impl From<&user::Model> for TechnicianSummary {
    fn from(u: &user::Model) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            level: u.level,
        }
    }
}

/// An existing booking to leave out when checking for clashes, usually the
/// one being moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Booking {
    Job(Uuid),
    Appointment(Uuid),
}

#[derive(Debug, Clone, Serialize)]
pub struct TechnicianWalkIns {
    pub technician: TechnicianSummary,
    #[serde(flatten)]
    pub availability: WalkInSlots,
}

/// The technician-facing side of scheduling: who is busy when, and where a
/// job of a given length still fits. Advisory only; it reserves nothing.
#[derive(Clone)]
pub struct AvailabilityService {
    db_pool: Arc<DbPool>,
    settings: SchedulingSettings,
}

impl AvailabilityService {
    pub fn new(db_pool: Arc<DbPool>, settings: SchedulingSettings) -> Self {
        Self { db_pool, settings }
    }

    pub fn settings(&self) -> &SchedulingSettings {
        &self.settings
    }

    async fn technician(&self, technician_id: Uuid) -> Result<user::Model, ServiceError> {
        user::Entity::find_by_id(technician_id)
            .one(&*self.db_pool)
            .await?
            .filter(|u| u.role == UserRole::Technician)
            .ok_or_else(|| {
                ServiceError::InvalidScheduleQuery(format!("unknown technician {}", technician_id))
            })
    }

    async fn active_technicians(&self) -> Result<Vec<user::Model>, ServiceError> {
        Ok(user::Entity::find()
            .filter(user::Column::Role.eq(UserRole::Technician))
            .filter(user::Column::IsActive.eq(true))
            .order_by_asc(user::Column::Name)
            .all(&*self.db_pool)
            .await?)
    }

    /// Jobs and live appointments holding the technician on `date`.
    async fn busy_intervals(
        &self,
        technician_id: Uuid,
        date: NaiveDate,
        exclude: Option<Booking>,
    ) -> Result<Vec<TimeRange>, ServiceError> {
        let db = &*self.db_pool;

        let mut jobs = job_order::Entity::find()
            .filter(job_order::Column::AssignedTechnician.eq(technician_id))
            .filter(job_order::Column::Date.eq(date));
        if let Some(Booking::Job(id)) = exclude {
            jobs = jobs.filter(job_order::Column::Id.ne(id));
        }

        let mut busy = Vec::new();
        for job in jobs.all(db).await? {
            if let Some(range) = job.occupied_range()? {
                busy.push(range);
            }
        }

        let mut appointments = appointment::Entity::find()
            .filter(appointment::Column::AssignedTechnician.eq(technician_id))
            .filter(appointment::Column::Date.eq(date))
            .filter(appointment::Column::NoShow.eq(false));
        if let Some(Booking::Appointment(id)) = exclude {
            appointments = appointments.filter(appointment::Column::Id.ne(id));
        }
        for appt in appointments.all(db).await? {
            busy.push(appt.time_range()?);
        }

        busy.sort_by_key(|r| r.start);
        Ok(busy)
    }

    fn break_for(
        &self,
        technician: &user::Model,
        override_break: Option<TimeRange>,
    ) -> Result<Option<TimeRange>, ServiceError> {
        if override_break.is_some() {
            return Ok(override_break);
        }
        Ok(technician.break_window()?.or(self.settings.default_break))
    }

    async fn day_schedule(
        &self,
        technician: &user::Model,
        date: NaiveDate,
        override_break: Option<TimeRange>,
    ) -> Result<DaySchedule, ServiceError> {
        Ok(DaySchedule {
            busy: self.busy_intervals(technician.id, date, None).await?,
            break_window: self.break_for(technician, override_break)?,
        })
    }

    /// Free start times for `duration` minutes of work.
    #[instrument(skip(self))]
    pub async fn technician_slots(
        &self,
        technician_id: Uuid,
        date: NaiveDate,
        duration: u32,
        override_break: Option<TimeRange>,
    ) -> Result<Vec<ClockTime>, ServiceError> {
        let technician = self.technician(technician_id).await?;
        let day = self.day_schedule(&technician, date, override_break).await?;
        let slots = candidate_starts(&self.settings.window, &day, duration)?;
        debug!(count = slots.len(), "computed technician slots");
        Ok(slots)
    }

    /// Technicians with nothing booked across `range` on `date`.
    #[instrument(skip(self))]
    pub async fn available_technicians(
        &self,
        date: NaiveDate,
        range: TimeRange,
    ) -> Result<Vec<TechnicianSummary>, ServiceError> {
        let mut free = Vec::new();
        for technician in self.active_technicians().await? {
            let day = self.day_schedule(&technician, date, None).await?;
            if day.is_free(&range) {
                free.push(TechnicianSummary::from(&technician));
            }
        }
        Ok(free)
    }

    /// Fixed-length walk-in openings per technician, capped by what is left of
    /// each technician's daily hours.
    #[instrument(skip(self))]
    pub async fn walk_in_slots(&self, date: NaiveDate) -> Result<Vec<TechnicianWalkIns>, ServiceError> {
        let mut out = Vec::new();
        for technician in self.active_technicians().await? {
            let day = self.day_schedule(&technician, date, None).await?;
            let availability = walk_in_slots(
                &self.settings.window,
                &day,
                self.settings.walk_in_minutes,
                self.settings.technician_daily_minutes,
            )?;
            out.push(TechnicianWalkIns {
                technician: TechnicianSummary::from(&technician),
                availability,
            });
        }
        Ok(out)
    }

    /// The first booked interval that `range` would collide with, ignoring
    /// breaks since work may be planned across them.
    pub async fn find_conflict(
        &self,
        technician_id: Uuid,
        date: NaiveDate,
        range: &TimeRange,
        exclude: Option<Booking>,
    ) -> Result<Option<TimeRange>, ServiceError> {
        Ok(self
            .busy_intervals(technician_id, date, exclude)
            .await?
            .into_iter()
            .find(|busy| busy.overlaps(range)))
    }

    /// Rejects bookings that would double-book the technician.
    pub async fn ensure_bookable(
        &self,
        technician_id: Uuid,
        date: NaiveDate,
        range: &TimeRange,
        exclude: Option<Booking>,
    ) -> Result<(), ServiceError> {
        self.technician(technician_id).await?;
        if let Some(clash) = self
            .find_conflict(technician_id, date, range, exclude)
            .await?
        {
            return Err(ServiceError::Conflict(format!(
                "technician is already booked {} on {}",
                clash, date
            )));
        }
        Ok(())
    }

    /// Break-aware end time; falls back to the workshop default break.
    pub fn end_time(
        &self,
        start: ClockTime,
        duration: u32,
        override_break: Option<TimeRange>,
    ) -> Result<ClockTime, ServiceError> {
        if duration == 0 {
            return Err(ServiceError::ValidationError(
                "duration must be positive".into(),
            ));
        }
        let brk = override_break.or(self.settings.default_break);
        end_time_with_break(start, duration, brk.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_dates_must_be_iso() {
        assert_eq!(
            parse_schedule_date("2024-05-02").unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 2).unwrap()
        );
        assert!(matches!(
            parse_schedule_date("02/05/2024"),
            Err(ServiceError::InvalidScheduleQuery(_))
        ));
    }

    #[test]
    fn break_override_needs_both_ends() {
        assert!(break_override(None, None).unwrap().is_none());
        assert_eq!(
            break_override(Some("12:30"), Some("13:00"))
                .unwrap()
                .unwrap()
                .duration(),
            30
        );
        assert!(break_override(Some("12:30"), None).is_err());
    }

    #[test]
    fn default_settings_match_a_standard_workshop_day() {
        let settings = SchedulingSettings::default();
        assert_eq!(settings.walk_in_minutes, 60);
        assert_eq!(settings.default_break.unwrap().to_string(), "12:00-13:00");
    }
}
