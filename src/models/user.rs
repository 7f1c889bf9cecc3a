use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::info;

use crate::billing::{BillingStatus, SubscriptionPlan};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: String, // user_01E4ZCR3C56J083X43JQXF3JK5
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub acquisition_source: Option<String>,
    pub billing_status: BillingStatus,
    pub trial_started_at: Option<DateTime<Utc>>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub subscription_plan: Option<SubscriptionPlan>,
    pub subscription_started_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub trial_reminder_email_sent: bool,
    pub trial_expired_email_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for User {
    fn default() -> Self {
        User {
            id: String::new(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            acquisition_source: None,
            billing_status: BillingStatus::Trial,
            trial_started_at: None,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            subscription_plan: None,
            subscription_started_at: None,
            canceled_at: None,
            trial_reminder_email_sent: false,
            trial_expired_email_sent: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

impl User {
    pub async fn get(pool: &PgPool, id: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds the user or creates them with a freshly started trial. The trial
    /// start is stamped exactly once here and never touched again.
    pub async fn get_or_create(
        pool: &PgPool,
        id: &str,
        email: &str,
        first_name: &str,
        last_name: &str,
        acquisition_source: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        if let Some(existing_user) = Self::get(pool, id).await? {
            return Ok(existing_user);
        }

        let now = Utc::now();
        let new_user = User {
            id: id.to_string(),
            email: email.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            acquisition_source: acquisition_source.map(str::to_string),
            trial_started_at: Some(now),
            created_at: now,
            updated_at: now,
            ..Default::default()
        };

        sqlx::query(
            r#"
            INSERT INTO users (id, email, first_name, last_name, acquisition_source,
                               billing_status, trial_started_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&new_user.id)
        .bind(&new_user.email)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&new_user.acquisition_source)
        .bind(new_user.billing_status)
        .bind(new_user.trial_started_at)
        .bind(new_user.created_at)
        .bind(new_user.updated_at)
        .execute(pool)
        .await?;

        info!(user_id = %new_user.id, "Created user with fresh trial");
        Ok(new_user)
    }

    pub async fn in_trial(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE billing_status = $1")
            .bind(BillingStatus::Trial)
            .fetch_all(pool)
            .await
    }

    pub async fn set_billing_status(
        pool: &PgPool,
        id: &str,
        status: BillingStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET billing_status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn mark_trial_reminder_sent(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET trial_reminder_email_sent = TRUE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn mark_trial_expired_email_sent(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET trial_expired_email_sent = TRUE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
