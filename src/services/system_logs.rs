use crate::{
    db::DbPool,
    entities::system_log::{self, LogLevel},
    errors::ServiceError,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, instrument};
use utoipa::IntoParams;
use uuid::Uuid;

pub const CATEGORY_SECURITY: &str = "security";
pub const CATEGORY_CARRY_OVER: &str = "carry-over";
pub const CATEGORY_MAINTENANCE: &str = "maintenance";

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SystemLogFilter {
    #[param(value_type = Option<String>, example = "error")]
    pub level: Option<LogLevel>,
    pub category: Option<String>,
}

/// Operational log persisted for the admin console.
#[derive(Clone)]
pub struct SystemLogService {
    db_pool: Arc<DbPool>,
}

impl SystemLogService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    pub async fn record(
        &self,
        level: LogLevel,
        category: &str,
        message: impl Into<String>,
        metadata: Option<Value>,
    ) -> Result<system_log::Model, ServiceError> {
        let db = &*self.db_pool;
        let entry = system_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            level: Set(level),
            category: Set(category.to_string()),
            message: Set(message.into()),
            metadata: Set(metadata),
            created_at: Set(chrono::Utc::now()),
        };
        Ok(entry.insert(db).await?)
    }

    /// Same as [`record`](Self::record) but never fails the caller.
    pub async fn record_best_effort(
        &self,
        level: LogLevel,
        category: &str,
        message: impl Into<String>,
        metadata: Option<Value>,
    ) {
        if let Err(e) = self.record(level, category, message, metadata).await {
            error!(category, error = %e, "failed to write system log");
        }
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: SystemLogFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<system_log::Model>, u64), ServiceError> {
        let db = &*self.db_pool;
        let mut query = system_log::Entity::find();
        if let Some(level) = filter.level {
            query = query.filter(system_log::Column::Level.eq(level));
        }
        if let Some(category) = filter.category {
            query = query.filter(system_log::Column::Category.eq(category));
        }

        let total = query.clone().count(db).await?;
        let items = query
            .order_by_desc(system_log::Column::CreatedAt)
            .offset((page.max(1) - 1).saturating_mul(limit))
            .limit(limit)
            .all(db)
            .await?;

        Ok((items, total))
    }
}
