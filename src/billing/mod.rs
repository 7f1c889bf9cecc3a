pub mod reconciler;
pub mod trial;

use actix_web::error::{ErrorForbidden, ErrorInternalServerError, ErrorPaymentRequired};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::warn;
use utoipa::ToSchema;

use crate::models::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "billing_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BillingStatus {
    Trial,
    Active,
    Expired,
    Canceled,
}

impl BillingStatus {
    /// The only legal status transitions. Self-transitions are allowed so
    /// at-least-once webhook redelivery lands as a no-op.
    pub fn transition_allowed(self, next: BillingStatus) -> bool {
        use BillingStatus::*;
        self == next
            || matches!(
                (self, next),
                (Trial, Active)
                    | (Trial, Expired)
                    | (Active, Canceled)
                    | (Active, Expired)
                    | (Expired, Active)
                    | (Canceled, Active)
            )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "subscription_plan", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionPlan {
    Monthly,
    Yearly,
}

/// Loads the caller's user record and rejects the request with 402 when the
/// account may not mutate data (trial elapsed without an active subscription).
pub async fn ensure_can_write(pool: &PgPool, user_id: &str) -> Result<User, actix_web::Error> {
    let user = User::get(pool, user_id)
        .await
        .map_err(|e| ErrorInternalServerError(e.to_string()))?
        .ok_or_else(|| ErrorForbidden("Unknown user"))?;

    if !trial::can_write(&user, Utc::now()) {
        warn!(user_id = %user.id, status = ?user.billing_status, "Write blocked, account is read-only");
        return Err(ErrorPaymentRequired(
            "Your free trial has ended. Upgrade to keep editing your wedding.",
        ));
    }

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table_matches_lifecycle() {
        use BillingStatus::*;

        assert!(Trial.transition_allowed(Active));
        assert!(Trial.transition_allowed(Expired));
        assert!(Active.transition_allowed(Canceled));
        assert!(Active.transition_allowed(Expired));
        assert!(Expired.transition_allowed(Active));
        assert!(Canceled.transition_allowed(Active));

        assert!(!Active.transition_allowed(Trial));
        assert!(!Expired.transition_allowed(Trial));
        assert!(!Canceled.transition_allowed(Trial));
        assert!(!Expired.transition_allowed(Canceled));
        assert!(!Canceled.transition_allowed(Expired));
    }

    #[test]
    fn redelivery_is_a_self_transition() {
        for status in [
            BillingStatus::Trial,
            BillingStatus::Active,
            BillingStatus::Expired,
            BillingStatus::Canceled,
        ] {
            assert!(status.transition_allowed(status));
        }
    }
}
