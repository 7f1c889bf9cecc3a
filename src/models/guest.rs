use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

/// Which side of the aisle a guest belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "guest_side", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bride,
    Groom,
    Both,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "rsvp_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RsvpStatus {
    Pending,
    Yes,
    No,
}

/// Provenance of a guest record: entered by the couple, or self-submitted
/// through the public RSVP form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "guest_source", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GuestSource {
    Manual,
    Rsvp,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Guest {
    pub id: Uuid,
    pub wedding_id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub side: Side,
    pub household_id: Option<String>,
    pub plus_one: bool,
    pub plus_one_name: Option<String>,
    pub invite_sent: bool,
    pub rsvp_status: RsvpStatus,
    pub meal_choice: Option<String>,
    pub dietary_notes: Option<String>,
    pub notes: Option<String>,
    pub source: GuestSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewGuest {
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default = "default_side")]
    pub side: Side,
    pub household_id: Option<String>,
    #[serde(default)]
    pub plus_one: bool,
    pub plus_one_name: Option<String>,
    pub meal_choice: Option<String>,
    pub dietary_notes: Option<String>,
    pub notes: Option<String>,
}

fn default_side() -> Side {
    Side::Unknown
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateGuest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub side: Option<Side>,
    pub household_id: Option<String>,
    pub plus_one: Option<bool>,
    pub plus_one_name: Option<String>,
    pub invite_sent: Option<bool>,
    pub rsvp_status: Option<RsvpStatus>,
    pub meal_choice: Option<String>,
    pub dietary_notes: Option<String>,
    pub notes: Option<String>,
}

impl Guest {
    pub async fn list_for_wedding(
        pool: &PgPool,
        wedding_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Guest>(
            "SELECT * FROM guests WHERE wedding_id = $1 ORDER BY full_name",
        )
        .bind(wedding_id)
        .fetch_all(pool)
        .await
    }

    pub async fn household(
        pool: &PgPool,
        wedding_id: Uuid,
        household_id: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Guest>(
            "SELECT * FROM guests WHERE wedding_id = $1 AND household_id = $2 ORDER BY full_name",
        )
        .bind(wedding_id)
        .bind(household_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_name(
        pool: &PgPool,
        wedding_id: Uuid,
        full_name: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Guest>(
            "SELECT * FROM guests WHERE wedding_id = $1 AND LOWER(full_name) = LOWER($2)",
        )
        .bind(wedding_id)
        .bind(full_name)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &PgPool,
        wedding_id: Uuid,
        new_guest: NewGuest,
        source: GuestSource,
    ) -> Result<Self, sqlx::Error> {
        let guest = sqlx::query_as::<_, Guest>(
            r#"
            INSERT INTO guests (id, wedding_id, full_name, email, phone, side, household_id,
                                plus_one, plus_one_name, rsvp_status, meal_choice,
                                dietary_notes, notes, source)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(wedding_id)
        .bind(new_guest.full_name.trim())
        .bind(&new_guest.email)
        .bind(&new_guest.phone)
        .bind(new_guest.side)
        .bind(&new_guest.household_id)
        .bind(new_guest.plus_one)
        .bind(&new_guest.plus_one_name)
        .bind(RsvpStatus::Pending)
        .bind(&new_guest.meal_choice)
        .bind(&new_guest.dietary_notes)
        .bind(&new_guest.notes)
        .bind(source)
        .fetch_one(pool)
        .await?;

        debug!(guest_id = %guest.id, wedding_id = %wedding_id, "Guest created");
        Ok(guest)
    }

    pub async fn update(
        pool: &PgPool,
        wedding_id: Uuid,
        guest_id: Uuid,
        update: UpdateGuest,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Guest>(
            r#"
            UPDATE guests
            SET full_name = COALESCE($3, full_name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                side = COALESCE($6, side),
                household_id = COALESCE($7, household_id),
                plus_one = COALESCE($8, plus_one),
                plus_one_name = COALESCE($9, plus_one_name),
                invite_sent = COALESCE($10, invite_sent),
                rsvp_status = COALESCE($11, rsvp_status),
                meal_choice = COALESCE($12, meal_choice),
                dietary_notes = COALESCE($13, dietary_notes),
                notes = COALESCE($14, notes),
                updated_at = NOW()
            WHERE id = $1 AND wedding_id = $2
            RETURNING *
            "#,
        )
        .bind(guest_id)
        .bind(wedding_id)
        .bind(&update.full_name)
        .bind(&update.email)
        .bind(&update.phone)
        .bind(update.side)
        .bind(&update.household_id)
        .bind(update.plus_one)
        .bind(&update.plus_one_name)
        .bind(update.invite_sent)
        .bind(update.rsvp_status)
        .bind(&update.meal_choice)
        .bind(&update.dietary_notes)
        .bind(&update.notes)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(
        pool: &PgPool,
        wedding_id: Uuid,
        guest_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM guests WHERE id = $1 AND wedding_id = $2")
            .bind(guest_id)
            .bind(wedding_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Applies one public RSVP entry: an existing guest matched by name is
    /// updated in place, anyone else becomes a new record with Rsvp
    /// provenance.
    pub async fn apply_rsvp(
        pool: &PgPool,
        wedding_id: Uuid,
        entry: RsvpEntry,
    ) -> Result<Self, sqlx::Error> {
        if let Some(existing) = Self::find_by_name(pool, wedding_id, entry.name.trim()).await? {
            return sqlx::query_as::<_, Guest>(
                r#"
                UPDATE guests
                SET email = COALESCE($3, email),
                    phone = COALESCE($4, phone),
                    rsvp_status = $5,
                    meal_choice = COALESCE($6, meal_choice),
                    dietary_notes = COALESCE($7, dietary_notes),
                    plus_one = COALESCE($8, plus_one),
                    plus_one_name = COALESCE($9, plus_one_name),
                    household_id = COALESCE($10, household_id),
                    updated_at = NOW()
                WHERE id = $1 AND wedding_id = $2
                RETURNING *
                "#,
            )
            .bind(existing.id)
            .bind(wedding_id)
            .bind(&entry.email)
            .bind(&entry.phone)
            .bind(entry.rsvp_status)
            .bind(&entry.meal_choice)
            .bind(&entry.dietary_notes)
            .bind(entry.plus_one)
            .bind(&entry.plus_one_name)
            .bind(&entry.household_id)
            .fetch_one(pool)
            .await;
        }

        let guest = sqlx::query_as::<_, Guest>(
            r#"
            INSERT INTO guests (id, wedding_id, full_name, email, phone, household_id,
                                plus_one, plus_one_name, rsvp_status, meal_choice,
                                dietary_notes, source)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(wedding_id)
        .bind(entry.name.trim())
        .bind(&entry.email)
        .bind(&entry.phone)
        .bind(&entry.household_id)
        .bind(entry.plus_one.unwrap_or(false))
        .bind(&entry.plus_one_name)
        .bind(entry.rsvp_status)
        .bind(&entry.meal_choice)
        .bind(&entry.dietary_notes)
        .bind(GuestSource::Rsvp)
        .fetch_one(pool)
        .await?;

        debug!(guest_id = %guest.id, "Guest self-registered through RSVP form");
        Ok(guest)
    }
}

/// One person's answer on the public RSVP form.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RsvpEntry {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub rsvp_status: RsvpStatus,
    pub meal_choice: Option<String>,
    pub dietary_notes: Option<String>,
    pub plus_one: Option<bool>,
    pub plus_one_name: Option<String>,
    pub household_id: Option<String>,
}
