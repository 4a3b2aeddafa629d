//! Change tracking for workshop records.
//!
//! Every mutating operation hands the logger a before/after snapshot. The
//! logger diffs the top-level fields, classifies them, applies the suspicion
//! heuristics and writes one append-only `audit_logs` row. Writing is
//! best-effort: a failure is logged and swallowed so the business operation
//! that triggered it still succeeds.

use crate::{
    auth::ActorContext,
    db::DbPool,
    entities::{
        audit_log::{self, Severity, IMMUTABLE_MESSAGE},
        system_log::LogLevel,
        JobOrderStatus,
    },
    errors::ServiceError,
    scheduling::duration_minutes,
    services::system_logs::{SystemLogService, CATEGORY_SECURITY},
};
use chrono::{NaiveDate, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use strum::Display;
use tracing::{error, instrument, warn};
use utoipa::IntoParams;
use uuid::Uuid;

/// Jobs dated further back than this are considered closed books.
const STALE_JOB_DAYS: i64 = 30;
/// Largest duration edit that goes unremarked.
const MAX_DURATION_DELTA_MINUTES: i32 = 120;

const VOLATILE_FIELDS: &[&str] = &[
    "id",
    "_id",
    "__v",
    "created_at",
    "updated_at",
    "createdAt",
    "updatedAt",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChangeKind {
    Financial,
    Assignment,
    Status,
    Metadata,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    StatusChange,
    PartsUpdate,
    TasksUpdate,
    Replot,
    CarryOver,
    ConvertAppointment,
    SettingsUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AuditEntity {
    JobOrder,
    Appointment,
    User,
    BugReport,
    MaintenanceSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old: Value,
    pub new: Value,
    pub kind: ChangeKind,
}

/// One thing that happened, as handed to the logger.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub action: AuditAction,
    pub entity: AuditEntity,
    pub entity_id: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

impl AuditRecord {
    pub fn new(
        action: AuditAction,
        entity: AuditEntity,
        entity_id: impl ToString,
        before: Option<Value>,
        after: Option<Value>,
    ) -> Self {
        Self {
            action,
            entity,
            entity_id: entity_id.to_string(),
            before,
            after,
        }
    }
}

/// Serializes a model for the before/after columns.
pub fn snapshot<T: Serialize>(model: &T) -> Option<Value> {
    serde_json::to_value(model).ok()
}

pub fn classify_field(field: &str) -> ChangeKind {
    match field {
        "time_start" | "time_end" | "actual_end_time" | "parts" | "job_list" => {
            ChangeKind::Financial
        }
        "assigned_technician" | "service_advisor" | "date" => ChangeKind::Assignment,
        "status" | "qi_status" | "carried_over" => ChangeKind::Status,
        "is_important" | "plate_number" | "vin" | "job_number" | "source_type"
        | "carry_over_chain" | "original_job_id" | "notes" => ChangeKind::Metadata,
        _ => ChangeKind::Other,
    }
}

/// Top-level field diff. Arrays and objects compare as whole values, so a
/// single task flipping to Finished reports the entire `job_list`.
pub fn diff_states(before: Option<&Value>, after: Option<&Value>) -> Vec<FieldChange> {
    let empty = Map::new();
    let old = before.and_then(Value::as_object).unwrap_or(&empty);
    let new = after.and_then(Value::as_object).unwrap_or(&empty);

    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    keys.into_iter()
        .filter(|k| !VOLATILE_FIELDS.contains(&k.as_str()))
        .filter_map(|field| {
            let old_value = old.get(field).cloned().unwrap_or(Value::Null);
            let new_value = new.get(field).cloned().unwrap_or(Value::Null);
            (old_value != new_value).then(|| FieldChange {
                kind: classify_field(field),
                field: field.clone(),
                old: old_value,
                new: new_value,
            })
        })
        .collect()
}

fn status_of(state: Option<&Value>) -> Option<JobOrderStatus> {
    state?.get("status")?.as_str()?.parse().ok()
}

fn planned_minutes(state: &Value) -> Option<i32> {
    let start = state.get("time_start")?.as_str()?;
    let end = state.get("time_end")?.as_str()?;
    duration_minutes(start, end).ok()
}

/// Reasons an update to a job order deserves a second look. Empty means clean.
pub fn detect_suspicion(
    entity: AuditEntity,
    before: Option<&Value>,
    after: Option<&Value>,
    changes: &[FieldChange],
    today: NaiveDate,
) -> Vec<String> {
    let mut reasons = Vec::new();
    let (Some(before), Some(after)) = (before, after) else {
        return reasons;
    };
    if entity != AuditEntity::JobOrder {
        return reasons;
    }

    let financial = changes.iter().any(|c| c.kind == ChangeKind::Financial);
    let prior = status_of(Some(before));
    let next = status_of(Some(after));

    if financial {
        if let Some(status @ (JobOrderStatus::Complete | JobOrderStatus::ForRelease)) = prior {
            reasons.push(format!(
                "financial field changed on a job already in {}",
                status
            ));
        }

        let job_date = before
            .get("date")
            .and_then(Value::as_str)
            .and_then(|d| d.parse::<NaiveDate>().ok());
        if let Some(date) = job_date {
            if (today - date).num_days() > STALE_JOB_DAYS {
                reasons.push(format!(
                    "financial field changed on a job dated {} (over {} days old)",
                    date, STALE_JOB_DAYS
                ));
            }
        }
    }

    if prior == Some(JobOrderStatus::OnGoing) && next == Some(JobOrderStatus::Complete) {
        reasons.push("status moved from OG straight to CP, skipping quality inspection".into());
    }

    if let (Some(old), Some(new)) = (planned_minutes(before), planned_minutes(after)) {
        let delta = (new - old).abs();
        if delta > MAX_DURATION_DELTA_MINUTES {
            reasons.push(format!("time range duration changed by {} minutes", delta));
        }
    }

    reasons
}

pub fn derive_severity(
    entity: AuditEntity,
    action: AuditAction,
    changes: &[FieldChange],
    suspicious: bool,
) -> Severity {
    if suspicious {
        return Severity::Critical;
    }
    if entity == AuditEntity::JobOrder && action == AuditAction::Delete {
        return Severity::High;
    }
    // a create has nothing to diff against, so its fields are not edits
    if action == AuditAction::Create {
        return Severity::Low;
    }
    if changes.iter().any(|c| c.kind == ChangeKind::Financial) {
        return Severity::High;
    }
    if changes
        .iter()
        .any(|c| matches!(c.kind, ChangeKind::Status | ChangeKind::Assignment))
    {
        return Severity::Medium;
    }
    Severity::Low
}

/// Diff, heuristics and severity for one record.
#[derive(Debug, Clone)]
pub struct Assessment {
    pub changes: Vec<FieldChange>,
    pub reasons: Vec<String>,
    pub severity: Severity,
}

impl Assessment {
    pub fn of(record: &AuditRecord, today: NaiveDate) -> Self {
        let changes = diff_states(record.before.as_ref(), record.after.as_ref());
        let reasons = detect_suspicion(
            record.entity,
            record.before.as_ref(),
            record.after.as_ref(),
            &changes,
            today,
        );
        let severity = derive_severity(record.entity, record.action, &changes, !reasons.is_empty());
        Self {
            changes,
            reasons,
            severity,
        }
    }

    pub fn is_suspicious(&self) -> bool {
        !self.reasons.is_empty()
    }
}

/// True when the database refused a write because audit rows are append-only.
pub fn is_immutability_error(err: &DbErr) -> bool {
    err.to_string().contains(IMMUTABLE_MESSAGE)
}

fn immutability_or_db(err: DbErr) -> ServiceError {
    if is_immutability_error(&err) {
        ServiceError::ImmutabilityViolation(IMMUTABLE_MESSAGE.to_string())
    } else {
        ServiceError::DatabaseError(err)
    }
}

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditLogFilter {
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub suspicious: Option<bool>,
}

#[derive(Clone)]
pub struct AuditLogService {
    db_pool: Arc<DbPool>,
    system_logs: Arc<SystemLogService>,
}

impl AuditLogService {
    pub fn new(db_pool: Arc<DbPool>, system_logs: Arc<SystemLogService>) -> Self {
        Self {
            db_pool,
            system_logs,
        }
    }

    /// Records an event without ever failing the caller.
    pub async fn record(
        &self,
        actor: &ActorContext,
        record: AuditRecord,
    ) -> Option<audit_log::Model> {
        match self.try_record(actor, record).await {
            Ok(entry) => Some(entry),
            Err(e) => {
                counter!("workshop_audit.write_failures", 1);
                error!(error = %e, "audit write failed; continuing without it");
                None
            }
        }
    }

    #[instrument(skip(self, actor, record), fields(entity = %record.entity, action = %record.action))]
    pub async fn try_record(
        &self,
        actor: &ActorContext,
        record: AuditRecord,
    ) -> Result<audit_log::Model, ServiceError> {
        let db = &*self.db_pool;
        let assessment = Assessment::of(&record, Utc::now().date_naive());
        let suspicious_reason = assessment
            .is_suspicious()
            .then(|| assessment.reasons.join("; "));

        let changes = serde_json::to_value(&assessment.changes)
            .map_err(|e| ServiceError::AuditWriteFailure(e.to_string()))?;

        let entry = audit_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            action: Set(record.action.to_string()),
            entity_type: Set(record.entity.to_string()),
            entity_id: Set(record.entity_id.clone()),
            actor_id: Set(actor.user_id),
            actor_email: Set(actor.email.clone()),
            actor_name: Set(actor.name.clone()),
            actor_role: Set(actor.role.map(|r| r.to_string())),
            changes: Set(changes),
            before_state: Set(record.before),
            after_state: Set(record.after),
            request_id: Set(actor.request_id.clone()),
            ip_address: Set(actor.ip_address.clone()),
            user_agent: Set(actor.user_agent.clone()),
            is_suspicious: Set(assessment.is_suspicious()),
            suspicious_reason: Set(suspicious_reason.clone()),
            severity: Set(assessment.severity),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await
        .map_err(|e| ServiceError::AuditWriteFailure(e.to_string()))?;

        counter!("workshop_audit.records", 1);

        if entry.is_suspicious || entry.severity >= Severity::High {
            self.mirror_to_system_log(&entry).await;
        }

        Ok(entry)
    }

    async fn mirror_to_system_log(&self, entry: &audit_log::Model) {
        if entry.is_suspicious {
            counter!("workshop_audit.suspicious", 1);
        }
        warn!(
            audit_id = %entry.id,
            entity_type = %entry.entity_type,
            entity_id = %entry.entity_id,
            severity = %entry.severity,
            reason = entry.suspicious_reason.as_deref().unwrap_or(""),
            "high-severity audit event"
        );

        let level = if entry.severity == Severity::Critical {
            LogLevel::Error
        } else {
            LogLevel::Warn
        };
        let message = match &entry.suspicious_reason {
            Some(reason) => format!(
                "Suspicious {} on {} {}: {}",
                entry.action, entry.entity_type, entry.entity_id, reason
            ),
            None => format!(
                "{} severity {} on {} {}",
                entry.severity, entry.action, entry.entity_type, entry.entity_id
            ),
        };
        self.system_logs
            .record_best_effort(
                level,
                CATEGORY_SECURITY,
                message,
                Some(json!({
                    "audit_id": entry.id,
                    "severity": entry.severity,
                    "actor_id": entry.actor_id,
                    "actor_email": entry.actor_email,
                })),
            )
            .await;
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: AuditLogFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<audit_log::Model>, u64), ServiceError> {
        let db = &*self.db_pool;
        let mut query = audit_log::Entity::find();
        if let Some(entity_type) = filter.entity_type {
            query = query.filter(audit_log::Column::EntityType.eq(entity_type));
        }
        if let Some(entity_id) = filter.entity_id {
            query = query.filter(audit_log::Column::EntityId.eq(entity_id));
        }
        if let Some(suspicious) = filter.suspicious {
            query = query.filter(audit_log::Column::IsSuspicious.eq(suspicious));
        }

        let total = query.clone().count(db).await?;
        let items = query
            .order_by_desc(audit_log::Column::CreatedAt)
            .offset((page.max(1) - 1).saturating_mul(limit))
            .limit(limit)
            .all(db)
            .await?;
        Ok((items, total))
    }

    pub async fn get(&self, id: Uuid) -> Result<audit_log::Model, ServiceError> {
        audit_log::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Audit log {} not found", id)))
    }

    /// Audit rows are write-once; the model hook refuses the write.
    pub async fn update(&self, id: Uuid) -> Result<audit_log::Model, ServiceError> {
        let existing = self.get(id).await?;
        audit_log::ActiveModel::from(existing)
            .reset_all()
            .update(&*self.db_pool)
            .await
            .map_err(immutability_or_db)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.get(id).await?;
        existing
            .delete(&*self.db_pool)
            .await
            .map_err(immutability_or_db)?;
        Ok(())
    }
}
