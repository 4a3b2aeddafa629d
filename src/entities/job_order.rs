use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{entity::prelude::*, ActiveValue::Set};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::scheduling::{ClockTime, TimeRange};

/// Workshop lifecycle codes as shown on the job board.
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
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(2))")]
pub enum JobOrderStatus {
    /// On-going
    #[sea_orm(string_value = "OG")]
    #[serde(rename = "OG")]
    #[strum(serialize = "OG")]
    OnGoing,
    /// Waiting for parts
    #[sea_orm(string_value = "WP")]
    #[serde(rename = "WP")]
    #[strum(serialize = "WP")]
    WaitingParts,
    /// For plotting (needs technician + time)
    #[sea_orm(string_value = "FP")]
    #[serde(rename = "FP")]
    #[strum(serialize = "FP")]
    ForPlotting,
    /// Quality inspection
    #[sea_orm(string_value = "QI")]
    #[serde(rename = "QI")]
    #[strum(serialize = "QI")]
    QualityInspection,
    #[sea_orm(string_value = "HC")]
    #[serde(rename = "HC")]
    #[strum(serialize = "HC")]
    HoldCustomer,
    #[sea_orm(string_value = "HW")]
    #[serde(rename = "HW")]
    #[strum(serialize = "HW")]
    HoldWarranty,
    #[sea_orm(string_value = "HI")]
    #[serde(rename = "HI")]
    #[strum(serialize = "HI")]
    HoldInsurance,
    #[sea_orm(string_value = "HF")]
    #[serde(rename = "HF")]
    #[strum(serialize = "HF")]
    HoldFord,
    /// Sublet to an outside shop
    #[sea_orm(string_value = "SU")]
    #[serde(rename = "SU")]
    #[strum(serialize = "SU")]
    Sublet,
    #[sea_orm(string_value = "FR")]
    #[serde(rename = "FR")]
    #[strum(serialize = "FR")]
    ForRelease,
    /// Finished but not yet claimed by the customer
    #[sea_orm(string_value = "FU")]
    #[serde(rename = "FU")]
    #[strum(serialize = "FU")]
    FinishedUnclaimed,
    #[sea_orm(string_value = "CP")]
    #[serde(rename = "CP")]
    #[strum(serialize = "CP")]
    Complete,
    /// Legacy "unassigned"
    #[sea_orm(string_value = "UA")]
    #[serde(rename = "UA")]
    #[strum(serialize = "UA")]
    Unassigned,
}

impl JobOrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::ForRelease | Self::FinishedUnclaimed | Self::Complete
        )
    }

    pub fn is_hold(self) -> bool {
        matches!(
            self,
            Self::HoldCustomer | Self::HoldWarranty | Self::HoldInsurance | Self::HoldFord
        )
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    #[sea_orm(string_value = "direct")]
    Direct,
    #[sea_orm(string_value = "appointment")]
    Appointment,
    #[sea_orm(string_value = "carry-over")]
    CarryOver,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum QiStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum TaskStatus {
    Finished,
    Unfinished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum PartAvailability {
    Available,
    Unavailable,
}

/// One line of labour on the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct JobTask {
    pub description: String,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct JobPart {
    pub name: String,
    pub availability: PartAvailability,
}

/// A prior incarnation of the job before it rolled to another day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CarryOverEntry {
    pub job_id: Uuid,
    pub date: NaiveDate,
    pub status: JobOrderStatus,
    pub carried_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "job_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub job_number: String,
    pub plate_number: String,
    pub vin: Option<String>,
    pub assigned_technician: Option<Uuid>,
    pub service_advisor: Option<Uuid>,
    pub created_by: Uuid,
    /// "HH:MM"
    pub time_start: String,
    /// "HH:MM"
    pub time_end: String,
    pub actual_end_time: Option<String>,
    pub date: NaiveDate,
    pub original_created_date: NaiveDate,
    #[sea_orm(column_type = "Json")]
    #[schema(value_type = Vec<JobTask>)]
    pub job_list: Json,
    #[sea_orm(column_type = "Json")]
    #[schema(value_type = Vec<JobPart>)]
    pub parts: Json,
    pub status: JobOrderStatus,
    pub source_type: SourceType,
    pub carried_over: bool,
    #[sea_orm(column_type = "Json")]
    #[schema(value_type = Vec<CarryOverEntry>)]
    pub carry_over_chain: Json,
    /// Lookup-only back reference; never cascades.
    pub original_job_id: Option<Uuid>,
    pub is_important: bool,
    pub qi_status: Option<QiStatus>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl Model {
    pub fn tasks(&self) -> Result<Vec<JobTask>, ServiceError> {
        decode_json(&self.job_list, "job_list")
    }

    pub fn part_list(&self) -> Result<Vec<JobPart>, ServiceError> {
        decode_json(&self.parts, "parts")
    }

    pub fn chain(&self) -> Result<Vec<CarryOverEntry>, ServiceError> {
        decode_json(&self.carry_over_chain, "carry_over_chain")
    }

    pub fn time_range(&self) -> Result<TimeRange, ServiceError> {
        TimeRange::parse(&self.time_start, &self.time_end)
    }

    /// The slice of the day this job actually holds on the technician's board.
    /// Interrupted jobs release everything after `actual_end_time`.
    pub fn occupied_range(&self) -> Result<Option<TimeRange>, ServiceError> {
        let planned = self.time_range()?;
        match &self.actual_end_time {
            Some(actual) => {
                let actual: ClockTime = actual.parse()?;
                if actual <= planned.start {
                    Ok(None)
                } else {
                    Ok(Some(TimeRange::new(planned.start, actual.min(planned.end))?))
                }
            }
            None => Ok(Some(planned)),
        }
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(
    value: &Json,
    field: &str,
) -> Result<Vec<T>, ServiceError> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(value.clone())
        .map_err(|e| ServiceError::InternalError(format!("corrupt {} column: {}", field, e)))
}

pub fn encode_json<T: Serialize>(items: &[T]) -> Result<Json, ServiceError> {
    serde_json::to_value(items)
        .map_err(|e| ServiceError::InternalError(format!("failed to encode column: {}", e)))
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
