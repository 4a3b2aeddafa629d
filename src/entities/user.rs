use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{entity::prelude::*, ActiveValue::Set};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::scheduling::TimeRange;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum UserRole {
    #[sea_orm(string_value = "administrator")]
    Administrator,
    #[sea_orm(string_value = "job-controller")]
    JobController,
    #[sea_orm(string_value = "technician")]
    Technician,
    #[sea_orm(string_value = "service-advisor")]
    ServiceAdvisor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum TechnicianLevel {
    #[sea_orm(string_value = "untrained")]
    Untrained,
    #[sea_orm(string_value = "level-0")]
    #[serde(rename = "level-0")]
    Level0,
    #[sea_orm(string_value = "level-1")]
    #[serde(rename = "level-1")]
    Level1,
    #[sea_orm(string_value = "level-2")]
    #[serde(rename = "level-2")]
    Level2,
    #[sea_orm(string_value = "level-3")]
    #[serde(rename = "level-3")]
    Level3,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(unique)]
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub level: Option<TechnicianLevel>,
    pub break_start: Option<String>,
    pub break_end: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl Model {
    /// The technician's own break window, if both ends are recorded.
    pub fn break_window(&self) -> Result<Option<TimeRange>, ServiceError> {
        match (&self.break_start, &self.break_end) {
            (Some(start), Some(end)) => TimeRange::parse(start, end).map(Some),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();
        if insert {
            active_model.created_at = Set(now);
        }
        active_model.updated_at = Set(now);
        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_use_kebab_case_on_the_wire() {
        assert_eq!(UserRole::JobController.to_string(), "job-controller");
        assert_eq!(
            "service-advisor".parse::<UserRole>().unwrap(),
            UserRole::ServiceAdvisor
        );
        assert_eq!(
            serde_json::to_value(TechnicianLevel::Level2).unwrap(),
            serde_json::json!("level-2")
        );
    }
}
