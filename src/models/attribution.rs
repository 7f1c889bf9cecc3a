use anyhow::Result;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

/// Where a signup came from, recorded by the marketing site before the
/// account exists. The signup webhook consumes it to tag the user, and
/// checkout reads the promo code for the Etsy cohort.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Attribution {
    pub id: Uuid,
    pub email: String,
    pub source: String,
    pub code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Attribution {
    pub async fn record(
        pool: &PgPool,
        cache: &Cache<String, Attribution>,
        email: &str,
        source: &str,
        code: Option<&str>,
    ) -> Result<Self> {
        let attribution = sqlx::query_as::<_, Attribution>(
            r#"
            INSERT INTO attributions (id, email, source, code)
            VALUES ($1, LOWER($2), $3, $4)
            ON CONFLICT (email) DO UPDATE SET source = $3, code = COALESCE($4, attributions.code)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(source)
        .bind(code)
        .fetch_one(pool)
        .await?;

        cache
            .insert(attribution.email.clone(), attribution.clone())
            .await;
        debug!(email = %attribution.email, source = %attribution.source, "Attribution recorded");
        Ok(attribution)
    }

    pub async fn lookup(
        pool: &PgPool,
        cache: &Cache<String, Attribution>,
        email: &str,
    ) -> Result<Option<Self>> {
        let key = email.to_lowercase();
        if let Some(cached) = cache.get(&key).await {
            return Ok(Some(cached));
        }

        let attribution =
            sqlx::query_as::<_, Attribution>("SELECT * FROM attributions WHERE email = $1")
                .bind(&key)
                .fetch_optional(pool)
                .await?;

        if let Some(attribution) = &attribution {
            cache.insert(key, attribution.clone()).await;
        }
        Ok(attribution)
    }
}
