use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Vendor {
    pub id: Uuid,
    pub wedding_id: Uuid,
    pub name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewVendor {
    pub name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateVendor {
    pub name: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
}

impl Vendor {
    pub async fn list_for_wedding(
        pool: &PgPool,
        wedding_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Vendor>(
            "SELECT * FROM vendors WHERE wedding_id = $1 ORDER BY name",
        )
        .bind(wedding_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create(
        pool: &PgPool,
        wedding_id: Uuid,
        new_vendor: NewVendor,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Vendor>(
            r#"
            INSERT INTO vendors (id, wedding_id, name, contact_name, email, phone, website, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(wedding_id)
        .bind(new_vendor.name.trim())
        .bind(&new_vendor.contact_name)
        .bind(&new_vendor.email)
        .bind(&new_vendor.phone)
        .bind(&new_vendor.website)
        .bind(&new_vendor.notes)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        wedding_id: Uuid,
        vendor_id: Uuid,
        update: UpdateVendor,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Vendor>(
            r#"
            UPDATE vendors
            SET name = COALESCE($3, name),
                contact_name = COALESCE($4, contact_name),
                email = COALESCE($5, email),
                phone = COALESCE($6, phone),
                website = COALESCE($7, website),
                notes = COALESCE($8, notes),
                updated_at = NOW()
            WHERE id = $1 AND wedding_id = $2
            RETURNING *
            "#,
        )
        .bind(vendor_id)
        .bind(wedding_id)
        .bind(&update.name)
        .bind(&update.contact_name)
        .bind(&update.email)
        .bind(&update.phone)
        .bind(&update.website)
        .bind(&update.notes)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(
        pool: &PgPool,
        wedding_id: Uuid,
        vendor_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM vendors WHERE id = $1 AND wedding_id = $2")
            .bind(vendor_id)
            .bind(wedding_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
