use crate::{
    auth::ActorContext,
    db::DbPool,
    entities::job_order::{
        self, encode_json, JobOrderStatus, JobPart, JobTask, QiStatus, SourceType,
    },
    errors::ServiceError,
    scheduling::{ClockTime, TimeRange},
    services::{
        audit::{snapshot, AuditAction, AuditEntity, AuditLogService, AuditRecord},
        availability::{AvailabilityService, Booking},
        job_status::{
            check_reassignable, check_transition, qi_readiness, status_after_parts_change,
        },
    },
};
use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct JobOrderFilter {
    pub date: Option<NaiveDate>,
    pub status: Option<JobOrderStatus>,
    pub technician: Option<Uuid>,
    pub carried_over: Option<bool>,
    /// Matches job or plate number.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateJobOrderInput {
    #[validate(length(min = 1, max = 50))]
    pub job_number: String,
    #[validate(length(min = 1, max = 20))]
    pub plate_number: String,
    #[validate(length(max = 17))]
    pub vin: Option<String>,
    pub assigned_technician: Option<Uuid>,
    pub service_advisor: Option<Uuid>,
    #[schema(example = "08:00")]
    pub time_start: String,
    #[schema(example = "10:00")]
    pub time_end: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub job_list: Vec<JobTask>,
    #[serde(default)]
    pub parts: Vec<JobPart>,
    pub source_type: Option<SourceType>,
    pub original_job_id: Option<Uuid>,
    #[serde(default)]
    pub is_important: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateJobOrderInput {
    #[validate(length(min = 1, max = 20))]
    pub plate_number: Option<String>,
    #[validate(length(max = 17))]
    pub vin: Option<String>,
    pub assigned_technician: Option<Uuid>,
    pub service_advisor: Option<Uuid>,
    pub time_start: Option<String>,
    pub time_end: Option<String>,
    pub date: Option<NaiveDate>,
    pub is_important: Option<bool>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReplotInput {
    pub technician_id: Uuid,
    #[schema(example = "13:00")]
    pub time_start: String,
    #[schema(example = "15:00")]
    pub time_end: String,
    /// Defaults to the job's current date.
    pub date: Option<NaiveDate>,
}

/// Schedule time handed back when a job is pulled off the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FreedSlot {
    pub technician_id: Uuid,
    pub date: NaiveDate,
    #[schema(value_type = String, example = "10:30")]
    pub from: ClockTime,
    #[schema(value_type = String, example = "12:00")]
    pub to: ClockTime,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PartsUpdateOutcome {
    pub job: job_order::Model,
    pub freed_slot: Option<FreedSlot>,
}

/// Trims and uppercases a job number; numbers are unique case-insensitively.
pub fn normalize_job_number(raw: &str) -> Result<String, ServiceError> {
    let normalized = raw.trim().to_uppercase();
    if normalized.is_empty() {
        return Err(ServiceError::ValidationError(
            "job_number must not be blank".into(),
        ));
    }
    Ok(normalized)
}

fn clock_of(now: NaiveDateTime) -> ClockTime {
    ClockTime::hm(now.hour(), now.minute())
}

/// Where an interrupted job stops on the board and what it gives back.
///
/// Jobs dated in the future release their whole slot; jobs from earlier days
/// release nothing.
pub fn interruption(
    job_date: NaiveDate,
    planned: TimeRange,
    now: NaiveDateTime,
) -> (ClockTime, Option<TimeRange>) {
    let stop = if job_date > now.date() {
        planned.start
    } else if job_date < now.date() {
        planned.end
    } else {
        clock_of(now).clamp(planned.start, planned.end)
    };
    (stop, TimeRange::new(stop, planned.end).ok())
}

#[derive(Clone)]
pub struct JobOrderService {
    db_pool: Arc<DbPool>,
    availability: Arc<AvailabilityService>,
    audit: Arc<AuditLogService>,
}

impl JobOrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        availability: Arc<AvailabilityService>,
        audit: Arc<AuditLogService>,
    ) -> Self {
        Self {
            db_pool,
            availability,
            audit,
        }
    }

    async fn audit(
        &self,
        actor: &ActorContext,
        action: AuditAction,
        before: Option<&job_order::Model>,
        after: Option<&job_order::Model>,
    ) {
        let Some(id) = after.or(before).map(|m| m.id) else {
            return;
        };
        self.audit
            .record(
                actor,
                AuditRecord::new(
                    action,
                    AuditEntity::JobOrder,
                    id,
                    before.and_then(snapshot),
                    after.and_then(snapshot),
                ),
            )
            .await;
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<job_order::Model, ServiceError> {
        job_order::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Job order {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: JobOrderFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<job_order::Model>, u64), ServiceError> {
        let db = &*self.db_pool;
        let mut query = job_order::Entity::find();

        if let Some(date) = filter.date {
            query = query.filter(job_order::Column::Date.eq(date));
        }
        if let Some(status) = filter.status {
            query = query.filter(job_order::Column::Status.eq(status));
        }
        if let Some(technician) = filter.technician {
            query = query.filter(job_order::Column::AssignedTechnician.eq(technician));
        }
        if let Some(carried_over) = filter.carried_over {
            query = query.filter(job_order::Column::CarriedOver.eq(carried_over));
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_uppercase();
            query = query.filter(
                Condition::any()
                    .add(job_order::Column::JobNumber.contains(&needle))
                    .add(job_order::Column::PlateNumber.contains(&needle)),
            );
        }

        let total = query.clone().count(db).await?;
        let items = query
            .order_by_desc(job_order::Column::Date)
            .order_by_asc(job_order::Column::TimeStart)
            .offset((page.max(1) - 1).saturating_mul(limit))
            .limit(limit)
            .all(db)
            .await?;

        Ok((items, total))
    }

    #[instrument(skip(self, input, actor), fields(job_number = %input.job_number))]
    pub async fn create(
        &self,
        input: CreateJobOrderInput,
        actor: &ActorContext,
    ) -> Result<job_order::Model, ServiceError> {
        let job = self.prepare(input, actor, None).await?;
        let job = self.insert_prepared(job, &*self.db_pool).await?;
        self.record_created(actor, &job).await;
        Ok(job)
    }

    /// Validates a new job and checks the technician's day, ignoring
    /// `exclude` (the booking the job is replacing, if any).
    pub(crate) async fn prepare(
        &self,
        input: CreateJobOrderInput,
        actor: &ActorContext,
        exclude: Option<Booking>,
    ) -> Result<job_order::ActiveModel, ServiceError> {
        input.validate()?;
        let created_by = actor
            .user_id
            .ok_or_else(|| ServiceError::Unauthorized("an authenticated user is required".into()))?;
        let job_number = normalize_job_number(&input.job_number)?;
        let range = TimeRange::parse(&input.time_start, &input.time_end)?;

        if let Some(technician) = input.assigned_technician {
            self.availability
                .ensure_bookable(technician, input.date, &range, exclude)
                .await?;
        }

        let initial = if input.assigned_technician.is_some() {
            JobOrderStatus::OnGoing
        } else {
            JobOrderStatus::ForPlotting
        };
        let status = status_after_parts_change(initial, &input.parts).unwrap_or(initial);

        Ok(job_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            job_number: Set(job_number),
            plate_number: Set(input.plate_number.trim().to_uppercase()),
            vin: Set(input.vin),
            assigned_technician: Set(input.assigned_technician),
            service_advisor: Set(input.service_advisor),
            created_by: Set(created_by),
            time_start: Set(range.start.to_string()),
            time_end: Set(range.end.to_string()),
            actual_end_time: Set(None),
            date: Set(input.date),
            original_created_date: Set(input.date),
            job_list: Set(encode_json(&input.job_list)?),
            parts: Set(encode_json(&input.parts)?),
            status: Set(status),
            source_type: Set(input.source_type.unwrap_or(SourceType::Direct)),
            carried_over: Set(false),
            carry_over_chain: Set(encode_json::<job_order::CarryOverEntry>(&[])?),
            original_job_id: Set(input.original_job_id),
            is_important: Set(input.is_important),
            qi_status: Set(None),
            notes: Set(input.notes),
            ..Default::default()
        })
    }

    /// Inserts a prepared job on `conn`, which may be an open transaction.
    pub(crate) async fn insert_prepared<C: ConnectionTrait>(
        &self,
        job: job_order::ActiveModel,
        conn: &C,
    ) -> Result<job_order::Model, ServiceError> {
        let job_number = job.job_number.clone().take().unwrap_or_default();
        job.insert(conn).await.map_err(|e| {
            ServiceError::from_db(e, format!("job number {} already exists", job_number))
        })
    }

    pub(crate) async fn record_created(&self, actor: &ActorContext, job: &job_order::Model) {
        counter!("workshop_job_orders.created", 1);
        info!(job_id = %job.id, status = %job.status, "job order created");
        self.audit(actor, AuditAction::Create, None, Some(job)).await;
    }

    /// Partial update. Changing technician, time or date of an open job is a
    /// reassignment and puts it back on the board as OG.
    #[instrument(skip(self, input, actor))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateJobOrderInput,
        actor: &ActorContext,
    ) -> Result<job_order::Model, ServiceError> {
        input.validate()?;
        let existing = self.get(id).await?;

        let range = TimeRange::parse(
            input.time_start.as_deref().unwrap_or(&existing.time_start),
            input.time_end.as_deref().unwrap_or(&existing.time_end),
        )?;
        let technician = input.assigned_technician.or(existing.assigned_technician);
        let date = input.date.unwrap_or(existing.date);

        let reassigned = technician != existing.assigned_technician
            || range != existing.time_range()?
            || date != existing.date;

        if reassigned {
            if let Some(technician) = technician {
                self.availability
                    .ensure_bookable(technician, date, &range, Some(Booking::Job(id)))
                    .await?;
            }
        }

        let mut active: job_order::ActiveModel = existing.clone().into();
        if let Some(plate) = input.plate_number {
            active.plate_number = Set(plate.trim().to_uppercase());
        }
        if input.vin.is_some() {
            active.vin = Set(input.vin);
        }
        if input.service_advisor.is_some() {
            active.service_advisor = Set(input.service_advisor);
        }
        if let Some(important) = input.is_important {
            active.is_important = Set(important);
        }
        if input.notes.is_some() {
            active.notes = Set(input.notes);
        }
        active.assigned_technician = Set(technician);
        active.time_start = Set(range.start.to_string());
        active.time_end = Set(range.end.to_string());
        active.date = Set(date);

        // Closed jobs keep their status; the audit trail flags such edits.
        if reassigned && !existing.status.is_terminal() {
            active.carried_over = Set(false);
            active.actual_end_time = Set(None);
            if technician.is_some() {
                active.status = Set(JobOrderStatus::OnGoing);
            }
        }

        let updated = active.update(&*self.db_pool).await?;
        self.audit(actor, AuditAction::Update, Some(&existing), Some(&updated))
            .await;
        Ok(updated)
    }

    /// Deletes the job. Jobs pointing at it through `original_job_id` are left alone.
    #[instrument(skip(self, actor))]
    pub async fn delete(&self, id: Uuid, actor: &ActorContext) -> Result<(), ServiceError> {
        let existing = self.get(id).await?;
        existing.clone().delete(&*self.db_pool).await?;
        counter!("workshop_job_orders.deleted", 1);
        self.audit(actor, AuditAction::Delete, Some(&existing), None)
            .await;
        Ok(())
    }

    async fn save_status(
        &self,
        existing: job_order::Model,
        target: JobOrderStatus,
        qi_status: Option<Option<QiStatus>>,
        actor: &ActorContext,
    ) -> Result<job_order::Model, ServiceError> {
        let from = existing.status;
        let mut active: job_order::ActiveModel = existing.clone().into();
        active.status = Set(target);
        if target.is_terminal() {
            active.carried_over = Set(false);
        }
        if let Some(qi) = qi_status {
            active.qi_status = Set(qi);
        }

        let updated = active.update(&*self.db_pool).await?;
        counter!("workshop_job_orders.status_changes", 1);
        info!(job_id = %updated.id, %from, to = %target, "job order status changed");
        self.audit(actor, AuditAction::StatusChange, Some(&existing), Some(&updated))
            .await;
        Ok(updated)
    }

    /// Explicit status write. Administrators may `force` past the transition
    /// table, but never past the QI entry guard.
    #[instrument(skip(self, actor))]
    pub async fn change_status(
        &self,
        id: Uuid,
        target: JobOrderStatus,
        force: bool,
        actor: &ActorContext,
    ) -> Result<job_order::Model, ServiceError> {
        if force && !actor.is_admin() {
            return Err(ServiceError::Forbidden(
                "only administrators can force a status change".into(),
            ));
        }
        let existing = self.get(id).await?;
        if !force {
            check_transition(existing.status, target)?;
        }

        let qi_status = if target == JobOrderStatus::QualityInspection
            && existing.status != target
        {
            qi_readiness(&existing.tasks()?, &existing.part_list()?)?;
            Some(Some(QiStatus::Pending))
        } else {
            None
        };
        self.save_status(existing, target, qi_status, actor).await
    }

    #[instrument(skip(self, actor))]
    pub async fn submit_qi(
        &self,
        id: Uuid,
        actor: &ActorContext,
    ) -> Result<job_order::Model, ServiceError> {
        let existing = self.get(id).await?;
        if existing.status == JobOrderStatus::QualityInspection {
            return Err(ServiceError::InvalidTransition(
                "job is already in quality inspection".into(),
            ));
        }
        check_transition(existing.status, JobOrderStatus::QualityInspection)?;
        qi_readiness(&existing.tasks()?, &existing.part_list()?)?;
        self.save_status(
            existing,
            JobOrderStatus::QualityInspection,
            Some(Some(QiStatus::Pending)),
            actor,
        )
        .await
    }

    async fn get_in_qi(&self, id: Uuid) -> Result<job_order::Model, ServiceError> {
        let existing = self.get(id).await?;
        if existing.status != JobOrderStatus::QualityInspection {
            return Err(ServiceError::InvalidTransition(format!(
                "job is {}, not in quality inspection",
                existing.status
            )));
        }
        Ok(existing)
    }

    #[instrument(skip(self, actor))]
    pub async fn approve_qi(
        &self,
        id: Uuid,
        actor: &ActorContext,
    ) -> Result<job_order::Model, ServiceError> {
        let existing = self.get_in_qi(id).await?;
        self.save_status(
            existing,
            JobOrderStatus::ForRelease,
            Some(Some(QiStatus::Approved)),
            actor,
        )
        .await
    }

    /// Sends the job back to rework.
    #[instrument(skip(self, actor))]
    pub async fn reject_qi(
        &self,
        id: Uuid,
        actor: &ActorContext,
    ) -> Result<job_order::Model, ServiceError> {
        let existing = self.get_in_qi(id).await?;
        self.save_status(
            existing,
            JobOrderStatus::OnGoing,
            Some(Some(QiStatus::Rejected)),
            actor,
        )
        .await
    }

    #[instrument(skip(self, actor))]
    pub async fn complete(
        &self,
        id: Uuid,
        actor: &ActorContext,
    ) -> Result<job_order::Model, ServiceError> {
        let existing = self.get(id).await?;
        if !matches!(
            existing.status,
            JobOrderStatus::ForRelease | JobOrderStatus::FinishedUnclaimed
        ) {
            return Err(ServiceError::InvalidTransition(format!(
                "{} job cannot be completed; it must be released first",
                existing.status
            )));
        }
        self.save_status(existing, JobOrderStatus::Complete, None, actor)
            .await
    }

    /// Reopens a closed job for more work.
    #[instrument(skip(self, actor))]
    pub async fn redo(
        &self,
        id: Uuid,
        actor: &ActorContext,
    ) -> Result<job_order::Model, ServiceError> {
        let existing = self.get(id).await?;
        if !existing.status.is_terminal() {
            return Err(ServiceError::InvalidTransition(format!(
                "{} job is still open; only released or completed jobs can be redone",
                existing.status
            )));
        }
        self.save_status(existing, JobOrderStatus::OnGoing, Some(None), actor)
            .await
    }

    #[instrument(skip(self, actor))]
    pub async fn toggle_important(
        &self,
        id: Uuid,
        actor: &ActorContext,
    ) -> Result<job_order::Model, ServiceError> {
        let existing = self.get(id).await?;
        let mut active: job_order::ActiveModel = existing.clone().into();
        active.is_important = Set(!existing.is_important);
        let updated = active.update(&*self.db_pool).await?;
        self.audit(actor, AuditAction::Update, Some(&existing), Some(&updated))
            .await;
        Ok(updated)
    }

    pub async fn update_tasks(
        &self,
        id: Uuid,
        tasks: Vec<JobTask>,
        actor: &ActorContext,
    ) -> Result<job_order::Model, ServiceError> {
        let existing = self.get(id).await?;
        let mut active: job_order::ActiveModel = existing.clone().into();
        active.job_list = Set(encode_json(&tasks)?);
        let updated = active.update(&*self.db_pool).await?;
        self.audit(actor, AuditAction::TasksUpdate, Some(&existing), Some(&updated))
            .await;
        Ok(updated)
    }

    pub async fn update_parts(
        &self,
        id: Uuid,
        parts: Vec<JobPart>,
        actor: &ActorContext,
    ) -> Result<PartsUpdateOutcome, ServiceError> {
        self.update_parts_at(id, parts, Local::now().naive_local(), actor)
            .await
    }

    /// Replaces the parts list and applies the WP/FP moves it implies. An OG
    /// job that loses a part is stopped at `now` and taken off its
    /// technician's board.
    #[instrument(skip(self, parts, actor))]
    pub async fn update_parts_at(
        &self,
        id: Uuid,
        parts: Vec<JobPart>,
        now: NaiveDateTime,
        actor: &ActorContext,
    ) -> Result<PartsUpdateOutcome, ServiceError> {
        let existing = self.get(id).await?;
        let next_status = status_after_parts_change(existing.status, &parts);

        let mut active: job_order::ActiveModel = existing.clone().into();
        active.parts = Set(encode_json(&parts)?);

        let mut freed_slot = None;
        if let Some(status) = next_status {
            active.status = Set(status);

            if existing.status == JobOrderStatus::OnGoing && status == JobOrderStatus::WaitingParts
            {
                let (stop, released) = interruption(existing.date, existing.time_range()?, now);
                active.actual_end_time = Set(Some(stop.to_string()));
                active.assigned_technician = Set(None);

                if let (Some(technician_id), Some(released)) =
                    (existing.assigned_technician, released)
                {
                    freed_slot = Some(FreedSlot {
                        technician_id,
                        date: existing.date,
                        from: released.start,
                        to: released.end,
                    });
                }
            }
        }

        let job = active.update(&*self.db_pool).await?;
        if let Some(status) = next_status {
            info!(job_id = %job.id, from = %existing.status, to = %status, "parts changed job status");
        }
        self.audit(actor, AuditAction::PartsUpdate, Some(&existing), Some(&job))
            .await;
        Ok(PartsUpdateOutcome { job, freed_slot })
    }

    /// Gives a job a technician and time slot, typically after parts arrived.
    #[instrument(skip(self, input, actor))]
    pub async fn replot(
        &self,
        id: Uuid,
        input: ReplotInput,
        actor: &ActorContext,
    ) -> Result<job_order::Model, ServiceError> {
        let existing = self.get(id).await?;
        check_reassignable(existing.status)?;

        let range = TimeRange::parse(&input.time_start, &input.time_end)?;
        let date = input.date.unwrap_or(existing.date);
        self.availability
            .ensure_bookable(input.technician_id, date, &range, Some(Booking::Job(id)))
            .await?;

        let mut active: job_order::ActiveModel = existing.clone().into();
        active.assigned_technician = Set(Some(input.technician_id));
        active.time_start = Set(range.start.to_string());
        active.time_end = Set(range.end.to_string());
        active.date = Set(date);
        active.status = Set(JobOrderStatus::OnGoing);
        active.carried_over = Set(false);
        active.actual_end_time = Set(None);

        let updated = active.update(&*self.db_pool).await?;
        counter!("workshop_job_orders.replotted", 1);
        self.audit(actor, AuditAction::Replot, Some(&existing), Some(&updated))
            .await;
        Ok(updated)
    }
}
