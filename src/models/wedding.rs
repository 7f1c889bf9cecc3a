use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Wedding {
    pub id: Uuid,
    pub user_id: String,
    pub partner_one: String,
    pub partner_two: String,
    pub wedding_date: Option<NaiveDate>,
    pub slug: String,
    pub total_budget_cents: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewWedding {
    pub partner_one: String,
    pub partner_two: String,
    pub wedding_date: Option<NaiveDate>,
    pub slug: String,
    pub total_budget_cents: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateWedding {
    pub partner_one: Option<String>,
    pub partner_two: Option<String>,
    pub wedding_date: Option<NaiveDate>,
    pub slug: Option<String>,
    pub total_budget_cents: Option<i64>,
}

impl Wedding {
    /// Looks the wedding up and checks ownership in one shot; routes treat a
    /// miss as 404 without distinguishing "not yours".
    pub async fn get_owned(
        pool: &PgPool,
        id: Uuid,
        user_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Wedding>("SELECT * FROM weddings WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn get_by_user(pool: &PgPool, user_id: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Wedding>(
            "SELECT * FROM weddings WHERE user_id = $1 ORDER BY created_at LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn get_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Wedding>("SELECT * FROM weddings WHERE slug = $1")
            .bind(slug)
            .fetch_optional(pool)
            .await
    }

    pub async fn slug_taken(pool: &PgPool, slug: &str) -> Result<bool, sqlx::Error> {
        let existing = sqlx::query_scalar::<_, Uuid>("SELECT id FROM weddings WHERE slug = $1")
            .bind(slug)
            .fetch_optional(pool)
            .await?;
        Ok(existing.is_some())
    }

    pub async fn create(pool: &PgPool, user_id: &str, new_wedding: NewWedding) -> Result<Self> {
        let slug = normalize_slug(&new_wedding.slug);
        if slug.is_empty() {
            bail!("Slug cannot be empty");
        }
        if Self::slug_taken(pool, &slug).await? {
            bail!("That wedding URL is already taken");
        }

        let wedding = sqlx::query_as::<_, Wedding>(
            r#"
            INSERT INTO weddings (id, user_id, partner_one, partner_two, wedding_date, slug,
                                  total_budget_cents)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(new_wedding.partner_one.trim())
        .bind(new_wedding.partner_two.trim())
        .bind(new_wedding.wedding_date)
        .bind(&slug)
        .bind(new_wedding.total_budget_cents)
        .fetch_one(pool)
        .await?;

        info!(wedding_id = %wedding.id, slug = %wedding.slug, "Wedding created");
        Ok(wedding)
    }

    /// Date changes must point at today or later; the stored date itself is
    /// informational and may drift into the past untouched.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        user_id: &str,
        update: UpdateWedding,
        today: NaiveDate,
    ) -> Result<Option<Self>> {
        if let Some(date) = update.wedding_date {
            if date < today {
                bail!("Wedding date must be in the future");
            }
        }

        let slug = match &update.slug {
            Some(slug) => {
                let slug = normalize_slug(slug);
                if slug.is_empty() {
                    bail!("Slug cannot be empty");
                }
                let current = Self::get_owned(pool, id, user_id).await?;
                if current.as_ref().map(|w| w.slug.as_str()) != Some(slug.as_str())
                    && Self::slug_taken(pool, &slug).await?
                {
                    bail!("That wedding URL is already taken");
                }
                Some(slug)
            }
            None => None,
        };

        let wedding = sqlx::query_as::<_, Wedding>(
            r#"
            UPDATE weddings
            SET partner_one = COALESCE($3, partner_one),
                partner_two = COALESCE($4, partner_two),
                wedding_date = COALESCE($5, wedding_date),
                slug = COALESCE($6, slug),
                total_budget_cents = COALESCE($7, total_budget_cents)
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&update.partner_one)
        .bind(&update.partner_two)
        .bind(update.wedding_date)
        .bind(&slug)
        .bind(update.total_budget_cents)
        .fetch_optional(pool)
        .await?;

        Ok(wedding)
    }
}

/// Lowercases and strips a requested slug down to url-safe characters.
pub fn normalize_slug(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    for c in raw.trim().to_lowercase().chars() {
        match c {
            'a'..='z' | '0'..='9' | '-' => slug.push(c),
            ' ' | '_' => slug.push('-'),
            _ => {}
        }
    }
    slug.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_lowercased_and_hyphenated() {
        assert_eq!(normalize_slug("Amy and Sam"), "amy-and-sam");
        assert_eq!(normalize_slug("  amy_sam_2026  "), "amy-sam-2026");
        assert_eq!(normalize_slug("amy&sam!"), "amysam");
        assert_eq!(normalize_slug("---"), "");
    }
}
