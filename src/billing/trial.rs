use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::{BillingStatus, SubscriptionPlan};
use crate::models::User;

pub const TRIAL_LENGTH_DAYS: i64 = 7;

/// Day-of-trial at which reminder banners and the upgrade modal kick in.
pub const WARN_FROM_DAY: i64 = 5;

/// Acquisition source tag marking the promotional (Etsy code) cohort.
pub const PROMO_SOURCE: &str = "etsy";

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TrialStatus {
    pub is_active: bool,
    pub is_expired: bool,
    pub days_remaining: i64,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl TrialStatus {
    fn never_started() -> Self {
        TrialStatus {
            is_active: false,
            is_expired: false,
            days_remaining: 0,
            start_date: None,
            end_date: None,
        }
    }
}

fn ceil_div(a: i64, b: i64) -> i64 {
    a.div_euclid(b) + if a.rem_euclid(b) != 0 { 1 } else { 0 }
}

/// Computes the trial window from the user record and an injected clock.
/// A missing `trial_started_at` means "no trial ever started", not "expired".
pub fn trial_status(user: &User, now: DateTime<Utc>) -> TrialStatus {
    let Some(start) = user.trial_started_at else {
        return TrialStatus::never_started();
    };

    let end = start + Duration::days(TRIAL_LENGTH_DAYS);
    // Ceiling of the remaining milliseconds in days: 6d23h left still counts
    // as 7 days on the banner.
    let raw_days = ceil_div((end - now).num_milliseconds(), MILLIS_PER_DAY);

    TrialStatus {
        is_active: user.billing_status == BillingStatus::Trial && raw_days > 0,
        is_expired: user.billing_status == BillingStatus::Trial && raw_days <= 0,
        days_remaining: raw_days.max(0),
        start_date: Some(start),
        end_date: Some(end),
    }
}

pub fn is_promo_cohort(user: &User) -> bool {
    user.acquisition_source.as_deref() == Some(PROMO_SOURCE)
}

/// Whether the full trial window has passed, regardless of billing status.
fn trial_time_elapsed(user: &User, now: DateTime<Utc>) -> bool {
    match user.trial_started_at {
        Some(start) => now >= start + Duration::days(TRIAL_LENGTH_DAYS),
        None => false,
    }
}

/// Mutations are allowed for paying accounts and for unexpired trials.
/// An Active status always wins over trial timing, so a delayed checkout
/// webhook can only err on the side of read-only.
pub fn can_write(user: &User, now: DateTime<Utc>) -> bool {
    match user.billing_status {
        BillingStatus::Active => true,
        BillingStatus::Trial => !trial_status(user, now).is_expired,
        BillingStatus::Expired | BillingStatus::Canceled => false,
    }
}

pub fn should_show_read_only(user: &User, now: DateTime<Utc>) -> bool {
    trial_time_elapsed(user, now) && user.billing_status != BillingStatus::Active
}

/// 1..=7 while the trial is active, 0 otherwise.
pub fn trial_day_number(user: &User, now: DateTime<Utc>) -> i64 {
    let status = trial_status(user, now);
    if !status.is_active {
        return 0;
    }
    let start = match user.trial_started_at {
        Some(start) => start,
        None => return 0,
    };
    ((now - start).num_days() + 1).clamp(1, TRIAL_LENGTH_DAYS)
}

/// True during the final stretch of an active trial (days 5 through 7),
/// when the banner and the one-time upgrade prompt are shown. Promo-cohort
/// users get the code-activation variant, everyone else the checkout one.
pub fn should_warn(user: &User, now: DateTime<Utc>) -> bool {
    let day = trial_day_number(user, now);
    (WARN_FROM_DAY..=TRIAL_LENGTH_DAYS).contains(&day)
}

pub fn plan_description(user: &User, now: DateTime<Utc>) -> String {
    match user.billing_status {
        BillingStatus::Active => match user.subscription_plan {
            Some(SubscriptionPlan::Monthly) => "Monthly plan".to_string(),
            Some(SubscriptionPlan::Yearly) => "Yearly plan".to_string(),
            None => "Active subscription".to_string(),
        },
        BillingStatus::Trial => {
            let status = trial_status(user, now);
            if status.is_active {
                format!(
                    "Free trial — {} day{} left",
                    status.days_remaining,
                    if status.days_remaining == 1 { "" } else { "s" }
                )
            } else {
                "Trial expired".to_string()
            }
        }
        BillingStatus::Expired => "Subscription expired".to_string(),
        BillingStatus::Canceled => "Subscription canceled".to_string(),
    }
}

/// What the daily lifecycle job should do for one trial user. Decisions are
/// pure so the cron wiring stays trivial; the email-sent flags on the user
/// record are the idempotency guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialAction {
    SendReminder { promo: bool },
    MarkExpired { send_email: bool },
}

pub fn trial_actions(user: &User, now: DateTime<Utc>) -> Vec<TrialAction> {
    if user.billing_status != BillingStatus::Trial {
        return Vec::new();
    }

    let status = trial_status(user, now);
    let mut actions = Vec::new();

    if status.is_active && should_warn(user, now) && !user.trial_reminder_email_sent {
        actions.push(TrialAction::SendReminder {
            promo: is_promo_cohort(user),
        });
    }

    if status.is_expired {
        actions.push(TrialAction::MarkExpired {
            send_email: !user.trial_expired_email_sent,
        });
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial_user(started_days_ago: Option<i64>, now: DateTime<Utc>) -> User {
        User {
            billing_status: BillingStatus::Trial,
            trial_started_at: started_days_ago.map(|d| now - Duration::days(d)),
            ..Default::default()
        }
    }

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn no_trial_start_means_never_started() {
        let now = at("2025-03-10T12:00:00Z");
        let user = trial_user(None, now);
        let status = trial_status(&user, now);

        assert!(!status.is_active);
        assert!(!status.is_expired);
        assert_eq!(status.days_remaining, 0);
        assert_eq!(status.start_date, None);
    }

    #[test]
    fn exactly_seven_days_elapsed_is_expired() {
        let now = at("2025-03-10T12:00:00Z");
        let user = trial_user(Some(7), now);
        let status = trial_status(&user, now);

        assert!(!status.is_active);
        assert!(status.is_expired);
        assert_eq!(status.days_remaining, 0);
    }

    #[test]
    fn one_minute_in_still_shows_seven_days() {
        let now = at("2025-03-10T12:00:00Z");
        let user = User {
            billing_status: BillingStatus::Trial,
            trial_started_at: Some(now - Duration::minutes(1)),
            ..Default::default()
        };
        let status = trial_status(&user, now);

        assert!(status.is_active);
        assert!(!status.is_expired);
        assert_eq!(status.days_remaining, 7);
    }

    #[test]
    fn partial_days_round_up() {
        let now = at("2025-03-10T12:00:00Z");
        let user = User {
            billing_status: BillingStatus::Trial,
            trial_started_at: Some(now - Duration::days(6) - Duration::hours(12)),
            ..Default::default()
        };

        assert_eq!(trial_status(&user, now).days_remaining, 1);
    }

    #[test]
    fn non_trial_statuses_never_report_trial_state() {
        let now = at("2025-03-10T12:00:00Z");
        for status in [
            BillingStatus::Active,
            BillingStatus::Expired,
            BillingStatus::Canceled,
        ] {
            let user = User {
                billing_status: status,
                trial_started_at: Some(now - Duration::days(3)),
                ..Default::default()
            };
            let trial = trial_status(&user, now);
            assert!(!trial.is_active);
            assert!(!trial.is_expired);
        }
    }

    #[test]
    fn can_write_truth_table() {
        let now = at("2025-03-10T12:00:00Z");

        let active = User {
            billing_status: BillingStatus::Active,
            ..Default::default()
        };
        assert!(can_write(&active, now));

        let fresh_trial = trial_user(Some(2), now);
        assert!(can_write(&fresh_trial, now));

        let expired_trial = trial_user(Some(8), now);
        assert!(!can_write(&expired_trial, now));

        for status in [BillingStatus::Expired, BillingStatus::Canceled] {
            let user = User {
                billing_status: status,
                ..Default::default()
            };
            assert!(!can_write(&user, now));
        }
    }

    #[test]
    fn active_status_overrides_elapsed_trial() {
        let now = at("2025-03-10T12:00:00Z");
        let user = User {
            billing_status: BillingStatus::Active,
            trial_started_at: Some(now - Duration::days(30)),
            ..Default::default()
        };

        assert!(can_write(&user, now));
        assert!(!should_show_read_only(&user, now));
    }

    #[test]
    fn read_only_after_trial_elapses_without_payment() {
        let now = at("2025-03-10T12:00:00Z");

        let expired_trial = trial_user(Some(9), now);
        assert!(should_show_read_only(&expired_trial, now));

        let canceled = User {
            billing_status: BillingStatus::Canceled,
            trial_started_at: Some(now - Duration::days(40)),
            ..Default::default()
        };
        assert!(should_show_read_only(&canceled, now));

        let mid_trial = trial_user(Some(3), now);
        assert!(!should_show_read_only(&mid_trial, now));
    }

    #[test]
    fn day_numbers_and_warn_window() {
        let now = at("2025-03-10T12:00:00Z");

        // Day 1 starts the moment the trial does.
        let day1 = User {
            billing_status: BillingStatus::Trial,
            trial_started_at: Some(now - Duration::hours(2)),
            ..Default::default()
        };
        assert_eq!(trial_day_number(&day1, now), 1);
        assert!(!should_warn(&day1, now));

        let day5 = trial_user(Some(4), now);
        assert_eq!(trial_day_number(&day5, now), 5);
        assert!(should_warn(&day5, now));

        let day7 = User {
            billing_status: BillingStatus::Trial,
            trial_started_at: Some(now - Duration::days(6) - Duration::hours(1)),
            ..Default::default()
        };
        assert_eq!(trial_day_number(&day7, now), 7);
        assert!(should_warn(&day7, now));

        let done = trial_user(Some(8), now);
        assert_eq!(trial_day_number(&done, now), 0);
        assert!(!should_warn(&done, now));
    }

    #[test]
    fn promo_cohort_is_an_exact_source_match() {
        let mut user = User::default();
        assert!(!is_promo_cohort(&user));

        user.acquisition_source = Some("etsy".to_string());
        assert!(is_promo_cohort(&user));

        user.acquisition_source = Some("instagram".to_string());
        assert!(!is_promo_cohort(&user));
    }

    #[test]
    fn lifecycle_actions_respect_email_flags() {
        let now = at("2025-03-10T12:00:00Z");

        let mut warned = trial_user(Some(5), now);
        assert_eq!(
            trial_actions(&warned, now),
            vec![TrialAction::SendReminder { promo: false }]
        );

        warned.trial_reminder_email_sent = true;
        assert!(trial_actions(&warned, now).is_empty());

        warned.acquisition_source = Some(PROMO_SOURCE.to_string());
        warned.trial_reminder_email_sent = false;
        assert_eq!(
            trial_actions(&warned, now),
            vec![TrialAction::SendReminder { promo: true }]
        );

        let mut lapsed = trial_user(Some(10), now);
        assert_eq!(
            trial_actions(&lapsed, now),
            vec![TrialAction::MarkExpired { send_email: true }]
        );

        lapsed.trial_expired_email_sent = true;
        assert_eq!(
            trial_actions(&lapsed, now),
            vec![TrialAction::MarkExpired { send_email: false }]
        );

        let paying = User {
            billing_status: BillingStatus::Active,
            ..Default::default()
        };
        assert!(trial_actions(&paying, now).is_empty());
    }

    #[test]
    fn plan_descriptions() {
        let now = at("2025-03-10T12:00:00Z");

        let monthly = User {
            billing_status: BillingStatus::Active,
            subscription_plan: Some(SubscriptionPlan::Monthly),
            ..Default::default()
        };
        assert_eq!(plan_description(&monthly, now), "Monthly plan");

        let trial = trial_user(Some(6), now);
        assert_eq!(plan_description(&trial, now), "Free trial — 1 day left");

        let lapsed = trial_user(Some(9), now);
        assert_eq!(plan_description(&lapsed, now), "Trial expired");
    }
}
