use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

/// Categories seeded into every new wedding's budget. Users can deactivate
/// them or add their own (custom = true).
pub const PRESET_CATEGORIES: [&str; 10] = [
    "Venue",
    "Catering",
    "Photography",
    "Flowers",
    "Music",
    "Attire",
    "Rings",
    "Invitations",
    "Transportation",
    "Decor",
];

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct BudgetItem {
    pub id: Uuid,
    pub wedding_id: Uuid,
    pub category: String,
    pub estimated_cents: i64,
    pub actual_cents: i64,
    pub paid: bool,
    pub active: bool,
    pub custom: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewBudgetItem {
    pub category: String,
    #[serde(default)]
    pub estimated_cents: i64,
    #[serde(default)]
    pub actual_cents: i64,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateBudgetItem {
    pub category: Option<String>,
    pub estimated_cents: Option<i64>,
    pub actual_cents: Option<i64>,
    pub paid: Option<bool>,
    pub active: Option<bool>,
    pub sort_order: Option<i32>,
}

/// Totals over the wedding's active items only.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct BudgetSummary {
    pub estimated_cents: i64,
    pub actual_cents: i64,
    pub paid_cents: i64,
}

impl BudgetItem {
    pub async fn seed_presets(pool: &PgPool, wedding_id: Uuid) -> Result<(), sqlx::Error> {
        for (index, category) in PRESET_CATEGORIES.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO budget_items (id, wedding_id, category, custom, sort_order)
                VALUES ($1, $2, $3, FALSE, $4)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(wedding_id)
            .bind(category)
            .bind(index as i32)
            .execute(pool)
            .await?;
        }
        debug!(wedding_id = %wedding_id, "Seeded preset budget categories");
        Ok(())
    }

    pub async fn list_for_wedding(
        pool: &PgPool,
        wedding_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, BudgetItem>(
            "SELECT * FROM budget_items WHERE wedding_id = $1 ORDER BY sort_order, created_at",
        )
        .bind(wedding_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create(
        pool: &PgPool,
        wedding_id: Uuid,
        new_item: NewBudgetItem,
    ) -> Result<Self, sqlx::Error> {
        let next_order = sqlx::query_scalar::<_, Option<i32>>(
            "SELECT MAX(sort_order) FROM budget_items WHERE wedding_id = $1",
        )
        .bind(wedding_id)
        .fetch_one(pool)
        .await?
        .unwrap_or(-1)
            + 1;

        sqlx::query_as::<_, BudgetItem>(
            r#"
            INSERT INTO budget_items (id, wedding_id, category, estimated_cents, actual_cents,
                                      custom, sort_order)
            VALUES ($1, $2, $3, $4, $5, TRUE, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(wedding_id)
        .bind(new_item.category.trim())
        .bind(new_item.estimated_cents)
        .bind(new_item.actual_cents)
        .bind(next_order)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        wedding_id: Uuid,
        item_id: Uuid,
        update: UpdateBudgetItem,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, BudgetItem>(
            r#"
            UPDATE budget_items
            SET category = COALESCE($3, category),
                estimated_cents = COALESCE($4, estimated_cents),
                actual_cents = COALESCE($5, actual_cents),
                paid = COALESCE($6, paid),
                active = COALESCE($7, active),
                sort_order = COALESCE($8, sort_order),
                updated_at = NOW()
            WHERE id = $1 AND wedding_id = $2
            RETURNING *
            "#,
        )
        .bind(item_id)
        .bind(wedding_id)
        .bind(&update.category)
        .bind(update.estimated_cents)
        .bind(update.actual_cents)
        .bind(update.paid)
        .bind(update.active)
        .bind(update.sort_order)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(
        pool: &PgPool,
        wedding_id: Uuid,
        item_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM budget_items WHERE id = $1 AND wedding_id = $2")
            .bind(item_id)
            .bind(wedding_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn summary(pool: &PgPool, wedding_id: Uuid) -> Result<BudgetSummary, sqlx::Error> {
        sqlx::query_as::<_, BudgetSummary>(
            r#"
            SELECT COALESCE(SUM(estimated_cents), 0)::BIGINT AS estimated_cents,
                   COALESCE(SUM(actual_cents), 0)::BIGINT AS actual_cents,
                   COALESCE(SUM(actual_cents) FILTER (WHERE paid), 0)::BIGINT AS paid_cents
            FROM budget_items
            WHERE wedding_id = $1 AND active
            "#,
        )
        .bind(wedding_id)
        .fetch_one(pool)
        .await
    }
}
