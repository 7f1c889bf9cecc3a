use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

/// Per-user key-value flags, mostly "has this one-time prompt been shown".
/// Kept in the database rather than process memory so tests (and deploys)
/// start from a known state.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Preference {
    pub user_id: String,
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

impl Preference {
    pub async fn get(
        pool: &PgPool,
        user_id: &str,
        key: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT value FROM preferences WHERE user_id = $1 AND key = $2",
        )
        .bind(user_id)
        .bind(key)
        .fetch_optional(pool)
        .await
    }

    pub async fn set(
        pool: &PgPool,
        user_id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO preferences (user_id, key, value)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, key) DO UPDATE SET value = $3, updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;
        Ok(())
    }
}
