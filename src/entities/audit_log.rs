//! Append-only audit trail.
//!
//! Rows are written once. Updates and deletes are refused here in the model
//! hooks and again by database triggers created in the migration, so raw
//! statements that bypass the hooks fail too.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{entity::prelude::*, ActiveValue::Set};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

pub const IMMUTABLE_MESSAGE: &str = "audit_logs rows are immutable";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    #[sea_orm(string_value = "low")]
    Low,
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "high")]
    High,
    #[sea_orm(string_value = "critical")]
    Critical,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audit_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub actor_id: Option<Uuid>,
    pub actor_email: Option<String>,
    pub actor_name: Option<String>,
    pub actor_role: Option<String>,
    /// `[{field, old, new, kind}]`
    #[sea_orm(column_type = "Json")]
    pub changes: Json,
    #[sea_orm(column_type = "Json", nullable)]
    pub before_state: Option<Json>,
    #[sea_orm(column_type = "Json", nullable)]
    pub after_state: Option<Json>,
    pub request_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub is_suspicious: bool,
    pub suspicious_reason: Option<String>,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if !insert {
            return Err(DbErr::Custom(IMMUTABLE_MESSAGE.to_string()));
        }
        let mut active_model = self;
        active_model.created_at = Set(Utc::now());
        Ok(active_model)
    }

    async fn before_delete<C>(self, _db: &C) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        Err(DbErr::Custom(IMMUTABLE_MESSAGE.to_string()))
    }
}
