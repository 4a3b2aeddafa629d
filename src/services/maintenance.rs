use crate::{
    auth::ActorContext,
    db::DbPool,
    entities::{
        maintenance_settings::{self, SINGLETON_ID},
        system_log::LogLevel,
    },
    errors::ServiceError,
    services::{
        api_key_validator::{fingerprint, ApiKeyValidator, ValidationCache},
        audit::{snapshot, AuditAction, AuditEntity, AuditLogService, AuditRecord},
        system_logs::{SystemLogService, CATEGORY_MAINTENANCE, CATEGORY_SECURITY},
    },
};
use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub const DEFAULT_MAINTENANCE_MESSAGE: &str =
    "The system is under maintenance. Please try again later.";

/// What blocked requests are told when the key, not the admin, is the reason.
pub const UNAVAILABLE_MESSAGE: &str =
    "Service temporarily unavailable. Please contact your administrator.";

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MaintenanceStatus {
    pub is_under_maintenance: bool,
    pub message: String,
}

/// Settings as shown to administrators; the key itself never leaves the server.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MaintenanceSettingsView {
    pub is_under_maintenance: bool,
    pub maintenance_message: String,
    pub api_key_configured: bool,
    #[schema(example = "****3f9a")]
    pub api_key_masked: Option<String>,
    pub api_key_last_validated_at: Option<DateTime<Utc>>,
    pub api_key_last_validation_result: Option<bool>,
    pub updated_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

pub fn mask_key(key: &str) -> String {
    let tail: String = key
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if key.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("****{}", tail)
    }
}

impl From<&maintenance_settings::Model> for MaintenanceSettingsView {
    fn from(m: &maintenance_settings::Model) -> Self {
        let key = m.configured_key();
        Self {
            is_under_maintenance: m.is_under_maintenance,
            maintenance_message: m.maintenance_message.clone(),
            api_key_configured: key.is_some(),
            api_key_masked: key.map(mask_key),
            api_key_last_validated_at: m.api_key_last_validated_at,
            api_key_last_validation_result: m.api_key_last_validation_result,
            updated_by: m.updated_by,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateMaintenanceSettingsInput {
    pub is_under_maintenance: Option<bool>,
    #[validate(length(min = 1, max = 500))]
    pub maintenance_message: Option<String>,
    /// An empty string removes the key.
    pub api_key: Option<String>,
}

/// Owns the settings row and the admission decision built on it.
pub struct MaintenanceService {
    db_pool: Arc<DbPool>,
    validator: Arc<dyn ApiKeyValidator>,
    cache: Arc<ValidationCache>,
    system_logs: Arc<SystemLogService>,
    audit: Arc<AuditLogService>,
}

impl MaintenanceService {
    pub fn new(
        db_pool: Arc<DbPool>,
        validator: Arc<dyn ApiKeyValidator>,
        cache: Arc<ValidationCache>,
        system_logs: Arc<SystemLogService>,
        audit: Arc<AuditLogService>,
    ) -> Self {
        Self {
            db_pool,
            validator,
            cache,
            system_logs,
            audit,
        }
    }

    /// The settings row, created with defaults on first use.
    pub async fn settings(&self) -> Result<maintenance_settings::Model, ServiceError> {
        let db = &*self.db_pool;
        if let Some(existing) = maintenance_settings::Entity::find_by_id(SINGLETON_ID)
            .one(db)
            .await?
        {
            return Ok(existing);
        }

        let inserted = maintenance_settings::ActiveModel {
            id: Set(SINGLETON_ID),
            is_under_maintenance: Set(false),
            maintenance_message: Set(DEFAULT_MAINTENANCE_MESSAGE.to_string()),
            api_key: Set(None),
            api_key_last_validated_at: Set(None),
            api_key_last_validation_result: Set(None),
            updated_by: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await;

        match inserted {
            Ok(model) => Ok(model),
            // Another request created it first.
            Err(_) => maintenance_settings::Entity::find_by_id(SINGLETON_ID)
                .one(db)
                .await?
                .ok_or_else(|| {
                    ServiceError::InternalError("maintenance settings row missing".into())
                }),
        }
    }

    pub async fn public_status(&self) -> Result<MaintenanceStatus, ServiceError> {
        let settings = self.settings().await?;
        Ok(MaintenanceStatus {
            is_under_maintenance: settings.is_under_maintenance,
            message: settings.maintenance_message,
        })
    }

    #[instrument(skip(self, input, actor))]
    pub async fn update_settings(
        &self,
        input: UpdateMaintenanceSettingsInput,
        actor: &ActorContext,
    ) -> Result<MaintenanceSettingsView, ServiceError> {
        input.validate()?;
        let existing = self.settings().await?;
        let mut active: maintenance_settings::ActiveModel = existing.clone().into();

        if let Some(on) = input.is_under_maintenance {
            active.is_under_maintenance = Set(on);
        }
        if let Some(message) = input.maintenance_message {
            active.maintenance_message = Set(message);
        }
        let key_changed = match input.api_key {
            Some(key) => {
                let key = key.trim().to_string();
                let key = (!key.is_empty()).then_some(key);
                let changed = key.as_deref() != existing.configured_key();
                active.api_key = Set(key);
                if changed {
                    active.api_key_last_validated_at = Set(None);
                    active.api_key_last_validation_result = Set(None);
                }
                changed
            }
            None => false,
        };
        active.updated_by = Set(actor.user_id);

        let updated = active.update(&*self.db_pool).await?;
        if key_changed {
            self.cache.clear();
        }

        if existing.is_under_maintenance != updated.is_under_maintenance {
            let state = if updated.is_under_maintenance {
                "enabled"
            } else {
                "disabled"
            };
            info!(state, "maintenance mode changed");
            self.system_logs
                .record_best_effort(
                    LogLevel::Warn,
                    CATEGORY_MAINTENANCE,
                    format!("Maintenance mode {}", state),
                    None,
                )
                .await;
        }
        if key_changed {
            self.system_logs
                .record_best_effort(
                    LogLevel::Info,
                    CATEGORY_MAINTENANCE,
                    "API key updated",
                    None,
                )
                .await;
        }

        self.audit
            .record(
                actor,
                AuditRecord::new(
                    AuditAction::SettingsUpdate,
                    AuditEntity::MaintenanceSettings,
                    SINGLETON_ID,
                    snapshot(&existing),
                    snapshot(&updated),
                ),
            )
            .await;

        Ok(MaintenanceSettingsView::from(&updated))
    }

    async fn persist_verdict(&self, valid: bool) {
        let result = async {
            let existing = self.settings().await?;
            let mut active: maintenance_settings::ActiveModel = existing.into();
            active.api_key_last_validated_at = Set(Some(Utc::now()));
            active.api_key_last_validation_result = Set(Some(valid));
            active.update(&*self.db_pool).await?;
            Ok::<_, ServiceError>(())
        }
        .await;
        if let Err(e) = result {
            error!(error = %e, "failed to persist API key verdict");
        }
    }

    fn persisted_grace(&self, settings: &maintenance_settings::Model) -> bool {
        let grace = match chrono::Duration::from_std(self.cache.grace()) {
            Ok(grace) => grace,
            Err(_) => return false,
        };
        matches!(
            (
                settings.api_key_last_validation_result,
                settings.api_key_last_validated_at
            ),
            (Some(true), Some(at)) if Utc::now() - at < grace
        )
    }

    fn reject(reason: &'static str, message: String) -> ServiceError {
        counter!("workshop_gate.rejected", 1, "reason" => reason);
        ServiceError::ServiceUnavailable(message)
    }

    /// Whether ordinary traffic may proceed right now. Any path that cannot
    /// produce a positive answer denies.
    pub async fn admit(&self) -> Result<(), ServiceError> {
        let settings = match self.settings().await {
            Ok(settings) => settings,
            Err(e) => {
                error!(error = %e, "maintenance settings unavailable");
                return Err(Self::reject("settings", UNAVAILABLE_MESSAGE.to_string()));
            }
        };

        if settings.is_under_maintenance {
            return Err(Self::reject(
                "maintenance",
                settings.maintenance_message.clone(),
            ));
        }

        let Some(key) = settings.configured_key() else {
            return Err(Self::reject("no_key", UNAVAILABLE_MESSAGE.to_string()));
        };
        let print = fingerprint(key);

        if let Some(valid) = self.cache.fresh(&print) {
            return if valid {
                Ok(())
            } else {
                Err(Self::reject("invalid_key", UNAVAILABLE_MESSAGE.to_string()))
            };
        }

        match self.validator.validate(key).await {
            Ok(valid) => {
                self.cache.record(&print, valid);
                self.persist_verdict(valid).await;
                if valid {
                    counter!("workshop_gate.validated", 1);
                    Ok(())
                } else {
                    warn!("API key rejected by validator");
                    self.system_logs
                        .record_best_effort(
                            LogLevel::Error,
                            CATEGORY_SECURITY,
                            "API key rejected by validator; requests are being blocked",
                            None,
                        )
                        .await;
                    Err(Self::reject("invalid_key", UNAVAILABLE_MESSAGE.to_string()))
                }
            }
            Err(e) => {
                warn!(error = %e, "API key validation unavailable");
                if self.cache.within_grace(&print) || self.persisted_grace(&settings) {
                    counter!("workshop_gate.grace_admits", 1);
                    Ok(())
                } else {
                    Err(Self::reject("validator_down", UNAVAILABLE_MESSAGE.to_string()))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_masked_to_their_last_four_characters() {
        assert_eq!(mask_key("sk-live-123456"), "****3456");
        assert_eq!(mask_key("abc"), "****");
    }
}
