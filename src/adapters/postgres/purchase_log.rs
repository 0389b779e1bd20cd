//! PostgreSQL implementation of PurchaseLog.
//!
//! Append-only audit trail of completed one-time purchases, keyed by
//! checkout session id so duplicate webhook deliveries collapse.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::{PurchaseLog, PurchaseRecord};

pub struct PostgresPurchaseLog {
    pool: PgPool,
}

impl PostgresPurchaseLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PurchaseRecordRow {
    id: Uuid,
    user_id: String,
    checkout_session_id: String,
    purchase_type: String,
    provider_event_id: String,
    payment_intent_id: Option<String>,
    subscription_id: Option<String>,
    amount: Option<i64>,
    currency: Option<String>,
    status: String,
    metadata: Json<HashMap<String, String>>,
    completed_at: DateTime<Utc>,
}

impl TryFrom<PurchaseRecordRow> for PurchaseRecord {
    type Error = DomainError;

    fn try_from(row: PurchaseRecordRow) -> Result<Self, Self::Error> {
        let user_id = UserId::new(row.user_id).map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid user_id: {}", e))
        })?;

        Ok(PurchaseRecord {
            id: row.id,
            user_id,
            checkout_session_id: row.checkout_session_id,
            purchase_type: row.purchase_type,
            provider_event_id: row.provider_event_id,
            payment_intent_id: row.payment_intent_id,
            subscription_id: row.subscription_id,
            amount: row.amount,
            currency: row.currency,
            status: row.status,
            metadata: row.metadata.0,
            completed_at: row.completed_at,
        })
    }
}

fn db_error(context: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, e))
}

#[async_trait]
impl PurchaseLog for PostgresPurchaseLog {
    async fn append(&self, record: PurchaseRecord) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO purchase_records (
                id, user_id, checkout_session_id, purchase_type,
                provider_event_id, payment_intent_id, subscription_id,
                amount, currency, status, metadata, completed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (checkout_session_id) DO NOTHING
            "#,
        )
        .bind(record.id)
        .bind(record.user_id.as_str())
        .bind(&record.checkout_session_id)
        .bind(&record.purchase_type)
        .bind(&record.provider_event_id)
        .bind(&record.payment_intent_id)
        .bind(&record.subscription_id)
        .bind(record.amount)
        .bind(&record.currency)
        .bind(&record.status)
        .bind(Json(&record.metadata))
        .bind(record.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to append purchase record", e))?;

        Ok(())
    }

    async fn find_by_session(
        &self,
        checkout_session_id: &str,
    ) -> Result<Option<PurchaseRecord>, DomainError> {
        let row: Option<PurchaseRecordRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, checkout_session_id, purchase_type,
                   provider_event_id, payment_intent_id, subscription_id,
                   amount, currency, status, metadata, completed_at
            FROM purchase_records
            WHERE checkout_session_id = $1
            "#,
        )
        .bind(checkout_session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find purchase record", e))?;

        row.map(PurchaseRecord::try_from).transpose()
    }
}
