use crate::{
    auth::ActorContext,
    db::DbPool,
    entities::bug_report::{self, BugReportStatus},
    errors::ServiceError,
    services::audit::{snapshot, AuditAction, AuditEntity, AuditLogService, AuditRecord},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBugReportInput {
    #[validate(length(min = 3, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 5000))]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateBugReportInput {
    #[schema(value_type = String, example = "in-progress")]
    pub status: BugReportStatus,
}

#[derive(Clone)]
pub struct BugReportService {
    db_pool: Arc<DbPool>,
    audit: Arc<AuditLogService>,
}

impl BugReportService {
    pub fn new(db_pool: Arc<DbPool>, audit: Arc<AuditLogService>) -> Self {
        Self { db_pool, audit }
    }

    pub async fn get(&self, id: Uuid) -> Result<bug_report::Model, ServiceError> {
        bug_report::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Bug report {} not found", id)))
    }

    pub async fn list(
        &self,
        status: Option<BugReportStatus>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<bug_report::Model>, u64), ServiceError> {
        let db = &*self.db_pool;
        let mut query = bug_report::Entity::find();
        if let Some(status) = status {
            query = query.filter(bug_report::Column::Status.eq(status));
        }
        let total = query.clone().count(db).await?;
        let items = query
            .order_by_desc(bug_report::Column::CreatedAt)
            .offset((page.max(1) - 1).saturating_mul(limit))
            .limit(limit)
            .all(db)
            .await?;
        Ok((items, total))
    }

    #[instrument(skip(self, input, actor))]
    pub async fn create(
        &self,
        input: CreateBugReportInput,
        actor: &ActorContext,
    ) -> Result<bug_report::Model, ServiceError> {
        input.validate()?;
        let reported_by = actor
            .user_id
            .ok_or_else(|| ServiceError::Unauthorized("an authenticated user is required".into()))?;

        Ok(bug_report::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(input.title.trim().to_string()),
            description: Set(input.description),
            status: Set(BugReportStatus::Open),
            reported_by: Set(reported_by),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?)
    }

    pub async fn update_status(
        &self,
        id: Uuid,
        status: BugReportStatus,
        actor: &ActorContext,
    ) -> Result<bug_report::Model, ServiceError> {
        let existing = self.get(id).await?;
        let mut active: bug_report::ActiveModel = existing.clone().into();
        active.status = Set(status);
        let updated = active.update(&*self.db_pool).await?;
        self.audit
            .record(
                actor,
                AuditRecord::new(
                    AuditAction::Update,
                    AuditEntity::BugReport,
                    id,
                    snapshot(&existing),
                    snapshot(&updated),
                ),
            )
            .await;
        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid, actor: &ActorContext) -> Result<(), ServiceError> {
        let existing = self.get(id).await?;
        existing.clone().delete(&*self.db_pool).await?;
        self.audit
            .record(
                actor,
                AuditRecord::new(
                    AuditAction::Delete,
                    AuditEntity::BugReport,
                    id,
                    snapshot(&existing),
                    None,
                ),
            )
            .await;
        Ok(())
    }
}
