use crate::{
    auth::ActorContext,
    db::DbPool,
    entities::{appointment, job_order},
    errors::ServiceError,
    scheduling::TimeRange,
    services::{
        audit::{snapshot, AuditAction, AuditEntity, AuditLogService, AuditRecord},
        availability::{AvailabilityService, Booking},
        job_orders::{CreateJobOrderInput, JobOrderService},
    },
};
use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AppointmentFilter {
    pub date: Option<NaiveDate>,
    pub technician: Option<Uuid>,
    pub no_show: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateAppointmentInput {
    #[validate(length(min = 1, max = 20))]
    pub plate_number: String,
    #[schema(example = "09:00")]
    pub time_start: String,
    #[schema(example = "10:00")]
    pub time_end: String,
    pub date: NaiveDate,
    pub assigned_technician: Uuid,
    pub service_advisor: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateAppointmentInput {
    #[validate(length(min = 1, max = 20))]
    pub plate_number: Option<String>,
    pub time_start: Option<String>,
    pub time_end: Option<String>,
    pub date: Option<NaiveDate>,
    pub assigned_technician: Option<Uuid>,
    pub service_advisor: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ConvertAppointmentInput {
    #[validate(length(min = 1, max = 50))]
    pub job_number: String,
    #[serde(default)]
    pub job_list: Vec<job_order::JobTask>,
    #[serde(default)]
    pub parts: Vec<job_order::JobPart>,
}

#[derive(Clone)]
pub struct AppointmentService {
    db_pool: Arc<DbPool>,
    availability: Arc<AvailabilityService>,
    job_orders: Arc<JobOrderService>,
    audit: Arc<AuditLogService>,
}

impl AppointmentService {
    pub fn new(
        db_pool: Arc<DbPool>,
        availability: Arc<AvailabilityService>,
        job_orders: Arc<JobOrderService>,
        audit: Arc<AuditLogService>,
    ) -> Self {
        Self {
            db_pool,
            availability,
            job_orders,
            audit,
        }
    }

    async fn audit(
        &self,
        actor: &ActorContext,
        action: AuditAction,
        id: Uuid,
        before: Option<&appointment::Model>,
        after: Option<&appointment::Model>,
    ) {
        self.audit
            .record(
                actor,
                AuditRecord::new(
                    action,
                    AuditEntity::Appointment,
                    id,
                    before.and_then(snapshot),
                    after.and_then(snapshot),
                ),
            )
            .await;
    }

    pub async fn get(&self, id: Uuid) -> Result<appointment::Model, ServiceError> {
        appointment::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Appointment {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: AppointmentFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<appointment::Model>, u64), ServiceError> {
        let db = &*self.db_pool;
        let mut query = appointment::Entity::find();
        if let Some(date) = filter.date {
            query = query.filter(appointment::Column::Date.eq(date));
        }
        if let Some(technician) = filter.technician {
            query = query.filter(appointment::Column::AssignedTechnician.eq(technician));
        }
        if let Some(no_show) = filter.no_show {
            query = query.filter(appointment::Column::NoShow.eq(no_show));
        }

        let total = query.clone().count(db).await?;
        let items = query
            .order_by_asc(appointment::Column::Date)
            .order_by_asc(appointment::Column::TimeStart)
            .offset((page.max(1) - 1).saturating_mul(limit))
            .limit(limit)
            .all(db)
            .await?;
        Ok((items, total))
    }

    #[instrument(skip(self, input, actor))]
    pub async fn create(
        &self,
        input: CreateAppointmentInput,
        actor: &ActorContext,
    ) -> Result<appointment::Model, ServiceError> {
        input.validate()?;
        let created_by = actor
            .user_id
            .ok_or_else(|| ServiceError::Unauthorized("an authenticated user is required".into()))?;
        let range = TimeRange::parse(&input.time_start, &input.time_end)?;
        self.availability
            .ensure_bookable(input.assigned_technician, input.date, &range, None)
            .await?;

        let created = appointment::ActiveModel {
            id: Set(Uuid::new_v4()),
            plate_number: Set(input.plate_number.trim().to_uppercase()),
            time_start: Set(range.start.to_string()),
            time_end: Set(range.end.to_string()),
            date: Set(input.date),
            assigned_technician: Set(input.assigned_technician),
            service_advisor: Set(input.service_advisor),
            created_by: Set(created_by),
            no_show: Set(false),
            notes: Set(input.notes),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?;

        self.audit(actor, AuditAction::Create, created.id, None, Some(&created))
            .await;
        Ok(created)
    }

    #[instrument(skip(self, input, actor))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateAppointmentInput,
        actor: &ActorContext,
    ) -> Result<appointment::Model, ServiceError> {
        input.validate()?;
        let existing = self.get(id).await?;
        let range = TimeRange::parse(
            input.time_start.as_deref().unwrap_or(&existing.time_start),
            input.time_end.as_deref().unwrap_or(&existing.time_end),
        )?;
        let technician = input
            .assigned_technician
            .unwrap_or(existing.assigned_technician);
        let date = input.date.unwrap_or(existing.date);

        if technician != existing.assigned_technician
            || date != existing.date
            || range != existing.time_range()?
        {
            self.availability
                .ensure_bookable(technician, date, &range, Some(Booking::Appointment(id)))
                .await?;
        }

        let mut active: appointment::ActiveModel = existing.clone().into();
        if let Some(plate) = input.plate_number {
            active.plate_number = Set(plate.trim().to_uppercase());
        }
        if input.service_advisor.is_some() {
            active.service_advisor = Set(input.service_advisor);
        }
        if input.notes.is_some() {
            active.notes = Set(input.notes);
        }
        active.time_start = Set(range.start.to_string());
        active.time_end = Set(range.end.to_string());
        active.date = Set(date);
        active.assigned_technician = Set(technician);

        let updated = active.update(&*self.db_pool).await?;
        self.audit(actor, AuditAction::Update, id, Some(&existing), Some(&updated))
            .await;
        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid, actor: &ActorContext) -> Result<(), ServiceError> {
        let existing = self.get(id).await?;
        existing.clone().delete(&*self.db_pool).await?;
        self.audit(actor, AuditAction::Delete, id, Some(&existing), None)
            .await;
        Ok(())
    }

    /// Flags the customer as not having turned up; the slot frees immediately.
    pub async fn mark_no_show(
        &self,
        id: Uuid,
        actor: &ActorContext,
    ) -> Result<appointment::Model, ServiceError> {
        let existing = self.get(id).await?;
        let mut active: appointment::ActiveModel = existing.clone().into();
        active.no_show = Set(true);
        let updated = active.update(&*self.db_pool).await?;
        self.audit(actor, AuditAction::Update, id, Some(&existing), Some(&updated))
            .await;
        Ok(updated)
    }

    /// Turns the appointment into a job on the same slot and removes it.
    #[instrument(skip(self, input, actor))]
    pub async fn convert_to_job_order(
        &self,
        id: Uuid,
        input: ConvertAppointmentInput,
        actor: &ActorContext,
    ) -> Result<job_order::Model, ServiceError> {
        input.validate()?;
        let appt = self.get(id).await?;
        if appt.no_show {
            return Err(ServiceError::PreconditionNotMet(
                "a no-show appointment cannot become a job order".into(),
            ));
        }

        // The appointment's own slot must not count as a clash with the job.
        let prepared = self
            .job_orders
            .prepare(
                CreateJobOrderInput {
                    job_number: input.job_number,
                    plate_number: appt.plate_number.clone(),
                    vin: None,
                    assigned_technician: Some(appt.assigned_technician),
                    service_advisor: appt.service_advisor,
                    time_start: appt.time_start.clone(),
                    time_end: appt.time_end.clone(),
                    date: appt.date,
                    job_list: input.job_list,
                    parts: input.parts,
                    source_type: Some(job_order::SourceType::Appointment),
                    original_job_id: None,
                    is_important: false,
                    notes: appt.notes.clone(),
                },
                actor,
                Some(Booking::Appointment(id)),
            )
            .await?;

        let txn = self.db_pool.begin().await.map_err(|e| {
            error!(error = %e, appointment_id = %id, "could not start conversion transaction");
            ServiceError::DatabaseError(e)
        })?;
        let job = self.job_orders.insert_prepared(prepared, &txn).await?;
        let removed = appointment::Entity::delete_by_id(id).exec(&txn).await?;
        if removed.rows_affected == 0 {
            // converted or deleted concurrently; dropping txn rolls the job back
            return Err(ServiceError::NotFound(format!("Appointment {} not found", id)));
        }
        txn.commit().await.map_err(|e| {
            error!(error = %e, appointment_id = %id, "could not commit conversion");
            ServiceError::DatabaseError(e)
        })?;

        self.job_orders.record_created(actor, &job).await;
        info!(appointment_id = %id, job_id = %job.id, "appointment converted");
        self.audit(actor, AuditAction::ConvertAppointment, id, Some(&appt), None)
            .await;
        Ok(job)
    }

    /// Deletes no-show appointments dated before `before`.
    #[instrument(skip(self, actor))]
    pub async fn purge_no_shows(
        &self,
        before: NaiveDate,
        actor: &ActorContext,
    ) -> Result<u64, ServiceError> {
        let result = appointment::Entity::delete_many()
            .filter(appointment::Column::NoShow.eq(true))
            .filter(appointment::Column::Date.lt(before))
            .exec(&*self.db_pool)
            .await?;
        info!(
            removed = result.rows_affected,
            actor = actor.email.as_deref().unwrap_or("system"),
            "purged no-show appointments"
        );
        Ok(result.rows_affected)
    }
}
