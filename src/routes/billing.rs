use std::sync::Arc;

use actix_web::{get, web, Responder};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::billing::trial::{self, TrialStatus};
use crate::billing::{BillingStatus, SubscriptionPlan};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::User;
use crate::AppState;

/// Everything the app shell needs to render billing state: banner, read-only
/// lock, upgrade modal variant, and the settings page plan line.
#[derive(Serialize, ToSchema)]
pub struct BillingStatusResponse {
    pub billing_status: BillingStatus,
    pub plan: Option<SubscriptionPlan>,
    pub plan_description: String,
    pub trial: TrialStatus,
    pub trial_day: i64,
    pub show_trial_warning: bool,
    pub promo_cohort: bool,
    pub read_only: bool,
    pub can_write: bool,
}

#[get("/status")]
pub async fn status(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
) -> Result<impl Responder, actix_web::Error> {
    let user = User::get(&app_state.pool, &authenticated_user.user_id)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?
        .ok_or_else(|| actix_web::error::ErrorForbidden("Unknown user"))?;

    // The clock enters here and nowhere deeper.
    let now = Utc::now();

    Ok(web::Json(BillingStatusResponse {
        billing_status: user.billing_status,
        plan: user.subscription_plan,
        plan_description: trial::plan_description(&user, now),
        trial: trial::trial_status(&user, now),
        trial_day: trial::trial_day_number(&user, now),
        show_trial_warning: trial::should_warn(&user, now),
        promo_cohort: trial::is_promo_cohort(&user),
        read_only: trial::should_show_read_only(&user, now),
        can_write: trial::can_write(&user, now),
    }))
}
