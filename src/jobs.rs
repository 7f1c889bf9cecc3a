use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgPool;
use tracing::{error, info, warn};

use crate::billing::trial::{self, TrialAction};
use crate::billing::BillingStatus;
use crate::config::AppConfig;
use crate::email::LoopsClient;
use crate::models::User;

/// Daily pass over trial accounts: send the day-5 reminder once, send the
/// expiry email once, and realize the trial→expired transition when the
/// seven days have run out. The sent-flags on the user row keep redeliveries
/// and reruns idempotent.
pub async fn run_trial_lifecycle(
    pool: &PgPool,
    email: &LoopsClient,
    config: &AppConfig,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let users = User::in_trial(pool).await?;
    info!(count = users.len(), "Trial lifecycle sweep starting");

    for user in users {
        for action in trial::trial_actions(&user, now) {
            match action {
                TrialAction::SendReminder { promo } => {
                    let status = trial::trial_status(&user, now);
                    let result = email
                        .send_transactional(
                            &config.loops_trial_reminder_id,
                            &user.email,
                            json!({
                                "firstName": user.first_name,
                                "daysLeft": status.days_remaining,
                                "promo": promo,
                            }),
                        )
                        .await;

                    if result.success {
                        User::mark_trial_reminder_sent(pool, &user.id).await?;
                        info!(user_id = %user.id, promo, "Trial reminder sent");
                    } else {
                        warn!(user_id = %user.id, "Trial reminder send failed, will retry tomorrow");
                    }
                }

                TrialAction::MarkExpired { send_email } => {
                    if send_email {
                        let result = email
                            .send_transactional(
                                &config.loops_trial_expired_id,
                                &user.email,
                                json!({ "firstName": user.first_name }),
                            )
                            .await;

                        if result.success {
                            User::mark_trial_expired_email_sent(pool, &user.id).await?;
                        } else {
                            warn!(user_id = %user.id, "Trial expired email send failed");
                        }
                    }

                    if user
                        .billing_status
                        .transition_allowed(BillingStatus::Expired)
                    {
                        User::set_billing_status(pool, &user.id, BillingStatus::Expired).await?;
                        info!(user_id = %user.id, "Trial expired, account now read-only");
                    } else {
                        error!(
                            user_id = %user.id,
                            status = ?user.billing_status,
                            "Refusing illegal transition to expired"
                        );
                    }
                }
            }
        }
    }

    Ok(())
}
