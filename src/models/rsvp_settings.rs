use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use utoipa::ToSchema;
use uuid::Uuid;

/// Per-wedding toggles for which optional fields the public RSVP form shows.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct RsvpSettings {
    pub wedding_id: Uuid,
    pub collect_email: bool,
    pub collect_phone: bool,
    pub collect_meal: bool,
    pub collect_dietary: bool,
    pub allow_plus_one: bool,
    pub custom_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateRsvpSettings {
    pub collect_email: Option<bool>,
    pub collect_phone: Option<bool>,
    pub collect_meal: Option<bool>,
    pub collect_dietary: Option<bool>,
    pub allow_plus_one: Option<bool>,
    pub custom_message: Option<String>,
}

impl RsvpSettings {
    /// The toggles a brand-new wedding starts with, without touching the
    /// database. Mirrors the column defaults in the schema.
    pub fn defaults(wedding_id: Uuid) -> Self {
        RsvpSettings {
            wedding_id,
            collect_email: true,
            collect_phone: false,
            collect_meal: true,
            collect_dietary: true,
            allow_plus_one: true,
            custom_message: None,
            updated_at: Utc::now(),
        }
    }

    pub async fn create_defaults(pool: &PgPool, wedding_id: Uuid) -> Result<Self, sqlx::Error> {
        sqlx::query(
            "INSERT INTO rsvp_settings (wedding_id) VALUES ($1) ON CONFLICT (wedding_id) DO NOTHING",
        )
        .bind(wedding_id)
        .execute(pool)
        .await?;

        sqlx::query_as::<_, RsvpSettings>("SELECT * FROM rsvp_settings WHERE wedding_id = $1")
            .bind(wedding_id)
            .fetch_one(pool)
            .await
    }

    pub async fn get(pool: &PgPool, wedding_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, RsvpSettings>("SELECT * FROM rsvp_settings WHERE wedding_id = $1")
            .bind(wedding_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn update(
        pool: &PgPool,
        wedding_id: Uuid,
        update: UpdateRsvpSettings,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, RsvpSettings>(
            r#"
            UPDATE rsvp_settings
            SET collect_email = COALESCE($2, collect_email),
                collect_phone = COALESCE($3, collect_phone),
                collect_meal = COALESCE($4, collect_meal),
                collect_dietary = COALESCE($5, collect_dietary),
                allow_plus_one = COALESCE($6, allow_plus_one),
                custom_message = COALESCE($7, custom_message),
                updated_at = NOW()
            WHERE wedding_id = $1
            RETURNING *
            "#,
        )
        .bind(wedding_id)
        .bind(update.collect_email)
        .bind(update.collect_phone)
        .bind(update.collect_meal)
        .bind(update.collect_dietary)
        .bind(update.allow_plus_one)
        .bind(&update.custom_message)
        .fetch_optional(pool)
        .await
    }
}
