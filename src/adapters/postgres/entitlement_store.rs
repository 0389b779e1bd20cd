//! PostgreSQL implementation of EntitlementStore.
//!
//! Entitlement rows are keyed by user_id. Unlock rows carry a
//! flattened key (kind plus the key columns) guarded by partial
//! unique indexes, so duplicate grants collapse at the database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entitlement::{Entitlement, PlusStatus, Unlock, UnlockKey};
use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::{EntitlementStore, SaveResult};

pub struct PostgresEntitlementStore {
    pool: PgPool,
}

impl PostgresEntitlementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EntitlementRow {
    id: Uuid,
    user_id: String,
    provider_customer_id: Option<String>,
    provider_subscription_id: Option<String>,
    plus_status: String,
    has_plus: bool,
    current_period_end: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EntitlementRow> for Entitlement {
    type Error = DomainError;

    fn try_from(row: EntitlementRow) -> Result<Self, Self::Error> {
        let plus_status = PlusStatus::parse(&row.plus_status).map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid plus_status value: {}", e),
            )
        })?;
        let user_id = UserId::new(row.user_id).map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid user_id: {}", e))
        })?;

        Ok(Entitlement {
            id: row.id,
            user_id,
            provider_customer_id: row.provider_customer_id,
            provider_subscription_id: row.provider_subscription_id,
            plus_status,
            has_plus: row.has_plus,
            current_period_end: row.current_period_end,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UnlockRow {
    id: Uuid,
    user_id: String,
    kind: String,
    character_id: String,
    situation_id: Option<String>,
    moment_level: Option<String>,
    media_id: Option<String>,
    checkout_session_id: String,
    granted_at: DateTime<Utc>,
}

impl TryFrom<UnlockRow> for Unlock {
    type Error = DomainError;

    fn try_from(row: UnlockRow) -> Result<Self, Self::Error> {
        let key = row_key(&row)?;
        let user_id = UserId::new(row.user_id).map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid user_id: {}", e))
        })?;

        Ok(Unlock {
            id: row.id,
            user_id,
            key,
            checkout_session_id: row.checkout_session_id,
            granted_at: row.granted_at,
        })
    }
}

fn row_key(row: &UnlockRow) -> Result<UnlockKey, DomainError> {
    let invalid = |msg: String| DomainError::new(ErrorCode::DatabaseError, msg);

    match row.kind.as_str() {
        "moment" => {
            let situation_id = row
                .situation_id
                .clone()
                .ok_or_else(|| invalid("moment unlock missing situation_id".to_string()))?;
            let level_str = row
                .moment_level
                .as_deref()
                .ok_or_else(|| invalid("moment unlock missing moment_level".to_string()))?;
            let level = crate::domain::entitlement::MomentLevel::parse(level_str)
                .map_err(|e| invalid(format!("Invalid moment_level value: {}", e)))?;
            UnlockKey::moment(row.character_id.clone(), situation_id, level)
                .map_err(|e| invalid(format!("Invalid unlock key: {}", e)))
        }
        "media" => {
            let media_id = row
                .media_id
                .clone()
                .ok_or_else(|| invalid("media unlock missing media_id".to_string()))?;
            UnlockKey::media(row.character_id.clone(), media_id)
                .map_err(|e| invalid(format!("Invalid unlock key: {}", e)))
        }
        other => Err(invalid(format!("Invalid unlock kind: {}", other))),
    }
}

/// Flattened column values for an unlock key.
fn key_columns(key: &UnlockKey) -> (&'static str, &str, Option<&str>, Option<&str>, Option<&str>) {
    match key {
        UnlockKey::Moment {
            character_id,
            situation_id,
            level,
        } => (
            "moment",
            character_id,
            Some(situation_id.as_str()),
            Some(level.as_str()),
            None,
        ),
        UnlockKey::Media {
            character_id,
            media_id,
        } => ("media", character_id, None, None, Some(media_id.as_str())),
    }
}

fn db_error(context: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, e))
}

const ENTITLEMENT_COLUMNS: &str = "id, user_id, provider_customer_id, provider_subscription_id, \
     plus_status, has_plus, current_period_end, created_at, updated_at";

const UNLOCK_COLUMNS: &str = "id, user_id, kind, character_id, situation_id, moment_level, \
     media_id, checkout_session_id, granted_at";

#[async_trait]
impl EntitlementStore for PostgresEntitlementStore {
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<Entitlement>, DomainError> {
        let row: Option<EntitlementRow> = sqlx::query_as(&format!(
            "SELECT {} FROM entitlements WHERE user_id = $1",
            ENTITLEMENT_COLUMNS
        ))
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find entitlement", e))?;

        row.map(Entitlement::try_from).transpose()
    }

    async fn find_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<Entitlement>, DomainError> {
        let row: Option<EntitlementRow> = sqlx::query_as(&format!(
            "SELECT {} FROM entitlements WHERE provider_customer_id = $1",
            ENTITLEMENT_COLUMNS
        ))
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find entitlement", e))?;

        row.map(Entitlement::try_from).transpose()
    }

    async fn upsert(&self, entitlement: &Entitlement) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO entitlements (
                id, user_id, provider_customer_id, provider_subscription_id,
                plus_status, has_plus, current_period_end, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (user_id) DO UPDATE SET
                provider_customer_id = EXCLUDED.provider_customer_id,
                provider_subscription_id = EXCLUDED.provider_subscription_id,
                plus_status = EXCLUDED.plus_status,
                has_plus = EXCLUDED.has_plus,
                current_period_end = EXCLUDED.current_period_end,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(entitlement.id)
        .bind(entitlement.user_id.as_str())
        .bind(&entitlement.provider_customer_id)
        .bind(&entitlement.provider_subscription_id)
        .bind(entitlement.plus_status.as_str())
        .bind(entitlement.has_plus)
        .bind(entitlement.current_period_end)
        .bind(entitlement.created_at)
        .bind(entitlement.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to upsert entitlement", e))?;

        Ok(())
    }

    async fn ensure_customer(
        &self,
        user_id: &UserId,
        customer_id: &str,
    ) -> Result<Entitlement, DomainError> {
        // COALESCE keeps an already-claimed customer id, so the first
        // writer wins and later proposals are discarded.
        let fresh = Entitlement::new(user_id.clone());

        let row: EntitlementRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO entitlements (
                id, user_id, provider_customer_id, provider_subscription_id,
                plus_status, has_plus, current_period_end, created_at, updated_at
            ) VALUES ($1, $2, $3, NULL, $4, FALSE, NULL, $5, $5)
            ON CONFLICT (user_id) DO UPDATE SET
                provider_customer_id = COALESCE(
                    entitlements.provider_customer_id,
                    EXCLUDED.provider_customer_id
                ),
                updated_at = EXCLUDED.updated_at
            RETURNING {}
            "#,
            ENTITLEMENT_COLUMNS
        ))
        .bind(fresh.id)
        .bind(user_id.as_str())
        .bind(customer_id)
        .bind(PlusStatus::None.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to claim customer id", e))?;

        Entitlement::try_from(row)
    }

    async fn insert_unlock(&self, unlock: &Unlock) -> Result<SaveResult, DomainError> {
        let (kind, character_id, situation_id, moment_level, media_id) = key_columns(&unlock.key);

        let result = sqlx::query(
            r#"
            INSERT INTO unlocks (
                id, user_id, kind, character_id, situation_id, moment_level,
                media_id, checkout_session_id, granted_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(unlock.id)
        .bind(unlock.user_id.as_str())
        .bind(kind)
        .bind(character_id)
        .bind(situation_id)
        .bind(moment_level)
        .bind(media_id)
        .bind(&unlock.checkout_session_id)
        .bind(unlock.granted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to insert unlock", e))?;

        if result.rows_affected() == 0 {
            Ok(SaveResult::AlreadyExists)
        } else {
            Ok(SaveResult::Inserted)
        }
    }

    async fn find_unlock(
        &self,
        user_id: &UserId,
        key: &UnlockKey,
    ) -> Result<Option<Unlock>, DomainError> {
        let (kind, character_id, situation_id, moment_level, media_id) = key_columns(key);

        let row: Option<UnlockRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM unlocks
            WHERE user_id = $1
              AND kind = $2
              AND character_id = $3
              AND situation_id IS NOT DISTINCT FROM $4
              AND moment_level IS NOT DISTINCT FROM $5
              AND media_id IS NOT DISTINCT FROM $6
            "#,
            UNLOCK_COLUMNS
        ))
        .bind(user_id.as_str())
        .bind(kind)
        .bind(character_id)
        .bind(situation_id)
        .bind(moment_level)
        .bind(media_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find unlock", e))?;

        row.map(Unlock::try_from).transpose()
    }

    async fn list_unlocks(&self, user_id: &UserId) -> Result<Vec<Unlock>, DomainError> {
        let rows: Vec<UnlockRow> = sqlx::query_as(&format!(
            "SELECT {} FROM unlocks WHERE user_id = $1 ORDER BY granted_at ASC",
            UNLOCK_COLUMNS
        ))
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list unlocks", e))?;

        rows.into_iter().map(Unlock::try_from).collect()
    }
}
