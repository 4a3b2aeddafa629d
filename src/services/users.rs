use crate::{
    auth::ActorContext,
    db::DbPool,
    entities::user::{self, TechnicianLevel, UserRole},
    errors::ServiceError,
    scheduling::TimeRange,
    services::audit::{snapshot, AuditAction, AuditEntity, AuditLogService, AuditRecord},
};
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserFilter {
    #[param(value_type = Option<String>, example = "technician")]
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateUserInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[schema(value_type = String, example = "technician")]
    pub role: UserRole,
    #[schema(value_type = Option<String>, example = "level-1")]
    pub level: Option<TechnicianLevel>,
    pub break_start: Option<String>,
    pub break_end: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateUserInput {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 8, max = 128))]
    pub password: Option<String>,
    #[schema(value_type = Option<String>)]
    pub role: Option<UserRole>,
    #[schema(value_type = Option<String>)]
    pub level: Option<TechnicianLevel>,
    pub break_start: Option<String>,
    pub break_end: Option<String>,
    pub is_active: Option<bool>,
}

pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| ServiceError::HashError(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::HashError(e.to_string()))
}

/// Both ends or neither; a half-specified break is a mistake.
fn parse_break(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<Option<TimeRange>, ServiceError> {
    match (start, end) {
        (Some(s), Some(e)) => TimeRange::parse(s, e).map(Some),
        (None, None) => Ok(None),
        _ => Err(ServiceError::ValidationError(
            "break_start and break_end must be given together".into(),
        )),
    }
}

#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
    audit: Arc<AuditLogService>,
}

impl UserService {
    pub fn new(db_pool: Arc<DbPool>, audit: Arc<AuditLogService>) -> Self {
        Self { db_pool, audit }
    }

    async fn audit(
        &self,
        actor: &ActorContext,
        action: AuditAction,
        id: Uuid,
        before: Option<&user::Model>,
        after: Option<&user::Model>,
    ) {
        self.audit
            .record(
                actor,
                AuditRecord::new(
                    action,
                    AuditEntity::User,
                    id,
                    before.and_then(snapshot),
                    after.and_then(snapshot),
                ),
            )
            .await;
    }

    pub async fn get(&self, id: Uuid) -> Result<user::Model, ServiceError> {
        user::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: UserFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<user::Model>, u64), ServiceError> {
        let db = &*self.db_pool;
        let mut query = user::Entity::find();
        if let Some(role) = filter.role {
            query = query.filter(user::Column::Role.eq(role));
        }
        if let Some(active) = filter.is_active {
            query = query.filter(user::Column::IsActive.eq(active));
        }

        let total = query.clone().count(db).await?;
        let items = query
            .order_by_asc(user::Column::Name)
            .offset((page.max(1) - 1).saturating_mul(limit))
            .limit(limit)
            .all(db)
            .await?;
        Ok((items, total))
    }

    pub async fn technicians(&self) -> Result<Vec<user::Model>, ServiceError> {
        Ok(user::Entity::find()
            .filter(user::Column::Role.eq(UserRole::Technician))
            .filter(user::Column::IsActive.eq(true))
            .order_by_asc(user::Column::Name)
            .all(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self, input, actor), fields(email = %input.email, role = %input.role))]
    pub async fn create(
        &self,
        input: CreateUserInput,
        actor: &ActorContext,
    ) -> Result<user::Model, ServiceError> {
        input.validate()?;
        let brk = parse_break(input.break_start.as_deref(), input.break_end.as_deref())?;
        let email = input.email.trim().to_lowercase();
        let level = match input.role {
            UserRole::Technician => input.level.or(Some(TechnicianLevel::Untrained)),
            _ => None,
        };

        let created = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            email: Set(email.clone()),
            password_hash: Set(hash_password(&input.password)?),
            role: Set(input.role),
            level: Set(level),
            break_start: Set(brk.map(|b| b.start.to_string())),
            break_end: Set(brk.map(|b| b.end.to_string())),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| ServiceError::from_db(e, format!("email {} is already registered", email)))?;

        info!(user_id = %created.id, "user created");
        self.audit(actor, AuditAction::Create, created.id, None, Some(&created))
            .await;
        Ok(created)
    }

    #[instrument(skip(self, input, actor))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateUserInput,
        actor: &ActorContext,
    ) -> Result<user::Model, ServiceError> {
        input.validate()?;
        let existing = self.get(id).await?;

        let mut active: user::ActiveModel = existing.clone().into();
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(email) = &input.email {
            active.email = Set(email.trim().to_lowercase());
        }
        if let Some(password) = &input.password {
            active.password_hash = Set(hash_password(password)?);
        }
        let role = input.role.unwrap_or(existing.role);
        active.role = Set(role);
        active.level = Set(match role {
            UserRole::Technician => input.level.or(existing.level),
            _ => None,
        });
        if input.break_start.is_some() || input.break_end.is_some() {
            let brk = parse_break(input.break_start.as_deref(), input.break_end.as_deref())?;
            active.break_start = Set(brk.map(|b| b.start.to_string()));
            active.break_end = Set(brk.map(|b| b.end.to_string()));
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }

        let updated = active.update(&*self.db_pool).await.map_err(|e| {
            ServiceError::from_db(e, "email is already registered to another user")
        })?;
        self.audit(actor, AuditAction::Update, id, Some(&existing), Some(&updated))
            .await;
        Ok(updated)
    }

    /// Removes the account. Jobs keep the technician id they were assigned.
    pub async fn delete(&self, id: Uuid, actor: &ActorContext) -> Result<(), ServiceError> {
        if actor.user_id == Some(id) {
            return Err(ServiceError::PreconditionNotMet(
                "administrators cannot delete their own account".into(),
            ));
        }
        let existing = self.get(id).await?;
        existing.clone().delete(&*self.db_pool).await?;
        self.audit(actor, AuditAction::Delete, id, Some(&existing), None)
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::{PasswordHash, PasswordVerifier};

    #[test]
    fn hashed_password_verifies_and_is_salted() {
        let first = hash_password("workshop-pass").unwrap();
        let second = hash_password("workshop-pass").unwrap();
        assert_ne!(first, second);

        let parsed = PasswordHash::new(&first).unwrap();
        assert!(Argon2::default()
            .verify_password(b"workshop-pass", &parsed)
            .is_ok());
        assert!(Argon2::default().verify_password(b"wrong", &parsed).is_err());
    }

    #[test]
    fn break_needs_both_ends() {
        assert!(parse_break(None, None).unwrap().is_none());
        assert_eq!(
            parse_break(Some("12:00"), Some("12:45")).unwrap().unwrap().duration(),
            45
        );
        assert!(matches!(
            parse_break(Some("12:00"), None),
            Err(ServiceError::ValidationError(_))
        ));
    }
}
