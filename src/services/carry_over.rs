//! End-of-day processing.
//!
//! Unfinished jobs on the closing day roll to the next day in place: the row
//! keeps its id and `original_created_date`, gets a new `date`, and appends
//! where it came from to `carry_over_chain`. Jobs are processed one by one and
//! a failure on one job does not undo the others; re-running the same day is
//! safe because already-rolled jobs are recognised and skipped.

use crate::{
    auth::ActorContext,
    db::DbPool,
    entities::{
        job_order::{self, encode_json, CarryOverEntry, JobOrderStatus},
        system_log::LogLevel,
    },
    errors::ServiceError,
    services::{
        audit::{snapshot, AuditAction, AuditEntity, AuditLogService, AuditRecord},
        system_logs::{SystemLogService, CATEGORY_CARRY_OVER},
    },
};
use chrono::{NaiveDate, Utc};
use metrics::counter;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

const TERMINAL: [JobOrderStatus; 3] = [
    JobOrderStatus::ForRelease,
    JobOrderStatus::FinishedUnclaimed,
    JobOrderStatus::Complete,
];

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CarriedJob {
    pub job_id: Uuid,
    pub job_number: String,
    pub status: JobOrderStatus,
    /// The job lost its technician and needs replotting.
    pub technician_released: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SkippedJob {
    pub job_id: Uuid,
    pub job_number: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FailedJob {
    pub job_id: Uuid,
    pub job_number: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CarryOverReport {
    pub closing_date: NaiveDate,
    pub next_date: NaiveDate,
    pub dry_run: bool,
    pub carried: Vec<CarriedJob>,
    pub skipped: Vec<SkippedJob>,
    pub failed: Vec<FailedJob>,
}

impl CarryOverReport {
    fn new(closing_date: NaiveDate, dry_run: bool) -> Result<Self, ServiceError> {
        let next_date = closing_date.succ_opt().ok_or_else(|| {
            ServiceError::ValidationError(format!("{} has no following day", closing_date))
        })?;
        Ok(Self {
            closing_date,
            next_date,
            dry_run,
            carried: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        })
    }
}

/// Statuses whose jobs go back into the replotting queue overnight.
pub fn releases_technician(status: JobOrderStatus) -> bool {
    matches!(
        status,
        JobOrderStatus::OnGoing
            | JobOrderStatus::WaitingParts
            | JobOrderStatus::HoldCustomer
            | JobOrderStatus::HoldWarranty
            | JobOrderStatus::HoldInsurance
    )
}

/// Why `job` should not roll over from `closing`, if it shouldn't.
pub fn skip_reason(
    job: &job_order::Model,
    closing: NaiveDate,
) -> Result<Option<String>, ServiceError> {
    if job.status.is_terminal() {
        return Ok(Some(format!("status {} is closed", job.status)));
    }
    if job.chain()?.last().map(|e| e.date) == Some(closing) {
        return Ok(Some(format!("already carried over from {}", closing)));
    }
    Ok(None)
}

#[derive(Clone)]
pub struct CarryOverService {
    db_pool: Arc<DbPool>,
    audit: Arc<AuditLogService>,
    system_logs: Arc<SystemLogService>,
}

impl CarryOverService {
    pub fn new(
        db_pool: Arc<DbPool>,
        audit: Arc<AuditLogService>,
        system_logs: Arc<SystemLogService>,
    ) -> Self {
        Self {
            db_pool,
            audit,
            system_logs,
        }
    }

    async fn open_jobs(&self, closing: NaiveDate) -> Result<Vec<job_order::Model>, ServiceError> {
        Ok(job_order::Entity::find()
            .filter(job_order::Column::Date.eq(closing))
            .filter(job_order::Column::Status.is_not_in(TERMINAL))
            .order_by_asc(job_order::Column::TimeStart)
            .all(&*self.db_pool)
            .await?)
    }

    /// What an end-of-day run would do, without writing anything.
    #[instrument(skip(self))]
    pub async fn preview(&self, closing: NaiveDate) -> Result<CarryOverReport, ServiceError> {
        let mut report = CarryOverReport::new(closing, true)?;
        for job in self.open_jobs(closing).await? {
            match skip_reason(&job, closing) {
                Ok(Some(reason)) => report.skipped.push(SkippedJob {
                    job_id: job.id,
                    job_number: job.job_number,
                    reason,
                }),
                Ok(None) => report.carried.push(CarriedJob {
                    job_id: job.id,
                    job_number: job.job_number,
                    status: job.status,
                    technician_released: releases_technician(job.status),
                }),
                Err(e) => report.failed.push(FailedJob {
                    job_id: job.id,
                    job_number: job.job_number,
                    error: e.to_string(),
                }),
            }
        }
        Ok(report)
    }

    #[instrument(skip(self, actor))]
    pub async fn run(
        &self,
        closing: NaiveDate,
        actor: &ActorContext,
    ) -> Result<CarryOverReport, ServiceError> {
        let mut report = CarryOverReport::new(closing, false)?;
        counter!("workshop_carry_over.runs", 1);

        for job in self.open_jobs(closing).await? {
            let job_id = job.id;
            let job_number = job.job_number.clone();

            match self.carry(job, closing, report.next_date, actor).await {
                Ok(Ok(carried)) => report.carried.push(carried),
                Ok(Err(reason)) => report.skipped.push(SkippedJob {
                    job_id,
                    job_number,
                    reason,
                }),
                Err(e) => {
                    warn!(%job_id, error = %e, "carry-over failed for job");
                    counter!("workshop_carry_over.failed", 1);
                    report.failed.push(FailedJob {
                        job_id,
                        job_number,
                        error: e.to_string(),
                    });
                }
            }
        }

        counter!("workshop_carry_over.carried", report.carried.len() as u64);
        info!(
            %closing,
            carried = report.carried.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "end of day processed"
        );

        let level = if report.failed.is_empty() {
            LogLevel::Info
        } else {
            LogLevel::Warn
        };
        self.system_logs
            .record_best_effort(
                level,
                CATEGORY_CARRY_OVER,
                format!(
                    "End of day {}: {} carried, {} skipped, {} failed",
                    closing,
                    report.carried.len(),
                    report.skipped.len(),
                    report.failed.len()
                ),
                Some(json!({
                    "closing_date": closing,
                    "next_date": report.next_date,
                    "actor": actor.email.as_deref().or(actor.name.as_deref()),
                    "failed": report.failed.iter().map(|f| &f.job_id).collect::<Vec<_>>(),
                })),
            )
            .await;

        Ok(report)
    }

    /// Rolls one job. The inner `Err` carries a skip reason.
    async fn carry(
        &self,
        job: job_order::Model,
        closing: NaiveDate,
        next: NaiveDate,
        actor: &ActorContext,
    ) -> Result<Result<CarriedJob, String>, ServiceError> {
        if let Some(reason) = skip_reason(&job, closing)? {
            return Ok(Err(reason));
        }

        let mut chain = job.chain()?;
        chain.push(CarryOverEntry {
            job_id: job.id,
            date: closing,
            status: job.status,
            carried_at: Utc::now(),
        });

        let release = releases_technician(job.status);
        let mut active: job_order::ActiveModel = job.clone().into();
        active.carry_over_chain = Set(encode_json(&chain)?);
        active.carried_over = Set(true);
        active.date = Set(next);
        active.actual_end_time = Set(None);
        if release {
            active.assigned_technician = Set(None);
        }

        let updated = active.update(&*self.db_pool).await?;
        self.audit
            .record(
                actor,
                AuditRecord::new(
                    AuditAction::CarryOver,
                    AuditEntity::JobOrder,
                    updated.id,
                    snapshot(&job),
                    snapshot(&updated),
                ),
            )
            .await;

        Ok(Ok(CarriedJob {
            job_id: updated.id,
            job_number: updated.job_number,
            status: updated.status,
            technician_released: release,
        }))
    }
}
