use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{info, warn};

use super::{BillingStatus, SubscriptionPlan};

/// A payment-provider lifecycle event reduced to what the billing records
/// care about. Extraction from the raw Stripe payload (and any follow-up
/// Stripe reads) happens in the webhook route; everything below is pure
/// bookkeeping over the store.
#[derive(Debug, Clone)]
pub enum BillingEvent {
    CheckoutCompleted {
        user_ref: Option<String>,
        email: Option<String>,
        customer_id: Option<String>,
        subscription_id: Option<String>,
        plan: Option<SubscriptionPlan>,
    },
    SubscriptionUpdated {
        user_ref: Option<String>,
        status: BillingStatus,
        plan: Option<SubscriptionPlan>,
    },
    SubscriptionDeleted {
        user_ref: Option<String>,
    },
    PaymentFailed {
        user_ref: Option<String>,
    },
    Ignored {
        kind: String,
    },
}

/// Storage seam for billing mutations. Webhook delivery is at-least-once,
/// so every write is an absolute "set field to value".
#[async_trait]
pub trait BillingStore: Send + Sync {
    async fn user_id_by_ref(&self, user_ref: &str) -> anyhow::Result<Option<String>>;
    async fn user_id_by_email(&self, email: &str) -> anyhow::Result<Option<String>>;
    async fn billing_status(&self, user_id: &str) -> anyhow::Result<Option<BillingStatus>>;
    async fn activate(
        &self,
        user_id: &str,
        customer_id: Option<&str>,
        subscription_id: Option<&str>,
        plan: SubscriptionPlan,
    ) -> anyhow::Result<()>;
    async fn set_status(&self, user_id: &str, status: BillingStatus) -> anyhow::Result<()>;
    async fn set_plan(&self, user_id: &str, plan: SubscriptionPlan) -> anyhow::Result<()>;
}

pub struct Reconciler;

impl Reconciler {
    pub async fn apply<S: BillingStore + ?Sized>(
        store: &S,
        event: BillingEvent,
    ) -> anyhow::Result<()> {
        match event {
            BillingEvent::CheckoutCompleted {
                user_ref,
                email,
                customer_id,
                subscription_id,
                plan,
            } => {
                let user_id =
                    match Self::resolve_checkout_user(store, user_ref.as_deref(), email.as_deref())
                        .await?
                    {
                        Some(user_id) => user_id,
                        None => {
                            // Permanently unresolvable; Stripe's retries would
                            // only replay the same lookup.
                            warn!(
                                ?user_ref,
                                ?email,
                                "Checkout completed for unknown user, dropping event"
                            );
                            return Ok(());
                        }
                    };

                let plan = match plan {
                    Some(plan) => plan,
                    None => {
                        warn!(user_id = %user_id, "Checkout subscription has unrecognized price, defaulting to monthly");
                        SubscriptionPlan::Monthly
                    }
                };

                if Self::transition(store, &user_id, BillingStatus::Active).await? {
                    store
                        .activate(
                            &user_id,
                            customer_id.as_deref(),
                            subscription_id.as_deref(),
                            plan,
                        )
                        .await?;
                    info!(user_id = %user_id, ?plan, "Subscription activated from checkout");
                }
            }

            BillingEvent::SubscriptionUpdated {
                user_ref,
                status,
                plan,
            } => {
                let Some(user_id) = Self::resolve_metadata_user(store, user_ref.as_deref()).await?
                else {
                    warn!("Subscription update without a resolvable user, dropping event");
                    return Ok(());
                };

                if Self::transition(store, &user_id, status).await? {
                    info!(user_id = %user_id, ?status, "Subscription status updated");
                }
                if let Some(plan) = plan {
                    store.set_plan(&user_id, plan).await?;
                }
            }

            BillingEvent::SubscriptionDeleted { user_ref } => {
                let Some(user_id) = Self::resolve_metadata_user(store, user_ref.as_deref()).await?
                else {
                    warn!("Subscription deletion without a resolvable user, dropping event");
                    return Ok(());
                };

                // Stored customer/subscription ids stay put for portal access
                // and history.
                if Self::transition(store, &user_id, BillingStatus::Canceled).await? {
                    info!(user_id = %user_id, "Subscription canceled");
                }
            }

            BillingEvent::PaymentFailed { user_ref } => {
                let Some(user_id) = Self::resolve_metadata_user(store, user_ref.as_deref()).await?
                else {
                    warn!("Payment failure without a resolvable user, dropping event");
                    return Ok(());
                };

                if Self::transition(store, &user_id, BillingStatus::Expired).await? {
                    info!(user_id = %user_id, "Subscription expired after failed payment");
                }
            }

            BillingEvent::Ignored { kind } => {
                info!(kind = %kind, "Ignoring unhandled webhook event");
            }
        }

        Ok(())
    }

    /// Checkout carries the user id through `client_reference_id`; older
    /// marketing-page checkouts only carry the email used at payment.
    async fn resolve_checkout_user<S: BillingStore + ?Sized>(
        store: &S,
        user_ref: Option<&str>,
        email: Option<&str>,
    ) -> anyhow::Result<Option<String>> {
        if let Some(user_ref) = user_ref {
            if let Some(user_id) = store.user_id_by_ref(user_ref).await? {
                return Ok(Some(user_id));
            }
        }
        if let Some(email) = email {
            if let Some(user_id) = store.user_id_by_email(email).await? {
                return Ok(Some(user_id));
            }
        }
        Ok(None)
    }

    async fn resolve_metadata_user<S: BillingStore + ?Sized>(
        store: &S,
        user_ref: Option<&str>,
    ) -> anyhow::Result<Option<String>> {
        match user_ref {
            Some(user_ref) => store.user_id_by_ref(user_ref).await,
            None => Ok(None),
        }
    }

    /// Applies a status change through the legal-transition table. Returns
    /// whether the write happened; an illegal transition is logged and
    /// skipped rather than surfaced, so the provider does not retry it.
    async fn transition<S: BillingStore + ?Sized>(
        store: &S,
        user_id: &str,
        next: BillingStatus,
    ) -> anyhow::Result<bool> {
        let Some(current) = store.billing_status(user_id).await? else {
            warn!(user_id = %user_id, "Billing transition for missing user");
            return Ok(false);
        };

        if !current.transition_allowed(next) {
            warn!(
                user_id = %user_id,
                ?current,
                ?next,
                "Skipping billing transition not in the legal table"
            );
            return Ok(false);
        }

        store.set_status(user_id, next).await?;
        Ok(true)
    }
}

/// Maps the provider's subscription status onto the local billing states.
pub fn map_subscription_status(status: stripe::SubscriptionStatus) -> BillingStatus {
    use stripe::SubscriptionStatus::*;
    match status {
        Canceled | IncompleteExpired => BillingStatus::Canceled,
        PastDue | Unpaid => BillingStatus::Expired,
        _ => BillingStatus::Active,
    }
}

/// Determines the plan from a price: configured price ids first, then the
/// price's recurring interval as a fallback for grandfathered prices.
pub fn plan_from_price(
    price_id: &str,
    interval: Option<&str>,
    monthly_price_id: &str,
    yearly_price_id: &str,
) -> Option<SubscriptionPlan> {
    if price_id == monthly_price_id {
        return Some(SubscriptionPlan::Monthly);
    }
    if price_id == yearly_price_id {
        return Some(SubscriptionPlan::Yearly);
    }
    match interval {
        Some("month") => Some(SubscriptionPlan::Monthly),
        Some("year") => Some(SubscriptionPlan::Yearly),
        _ => None,
    }
}

pub struct PgBillingStore {
    pool: PgPool,
}

impl PgBillingStore {
    pub fn new(pool: PgPool) -> Self {
        PgBillingStore { pool }
    }
}

#[async_trait]
impl BillingStore for PgBillingStore {
    async fn user_id_by_ref(&self, user_ref: &str) -> anyhow::Result<Option<String>> {
        let id = sqlx::query_scalar::<_, String>("SELECT id FROM users WHERE id = $1")
            .bind(user_ref)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    async fn user_id_by_email(&self, email: &str) -> anyhow::Result<Option<String>> {
        let id =
            sqlx::query_scalar::<_, String>("SELECT id FROM users WHERE LOWER(email) = LOWER($1)")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(id)
    }

    async fn billing_status(&self, user_id: &str) -> anyhow::Result<Option<BillingStatus>> {
        let status = sqlx::query_scalar::<_, BillingStatus>(
            "SELECT billing_status FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(status)
    }

    async fn activate(
        &self,
        user_id: &str,
        customer_id: Option<&str>,
        subscription_id: Option<&str>,
        plan: SubscriptionPlan,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET billing_status = $2,
                stripe_customer_id = COALESCE($3, stripe_customer_id),
                stripe_subscription_id = COALESCE($4, stripe_subscription_id),
                subscription_plan = $5,
                subscription_started_at = NOW(),
                canceled_at = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(BillingStatus::Active)
        .bind(customer_id)
        .bind(subscription_id)
        .bind(plan)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_status(&self, user_id: &str, status: BillingStatus) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET billing_status = $2,
                canceled_at = CASE WHEN $2 = 'canceled'::billing_status THEN NOW() ELSE canceled_at END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_plan(&self, user_id: &str, plan: SubscriptionPlan) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET subscription_plan = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(plan)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct StoredUser {
        email: String,
        status: BillingStatus,
        plan: Option<SubscriptionPlan>,
        customer_id: Option<String>,
        subscription_id: Option<String>,
    }

    struct MemoryStore {
        users: Mutex<HashMap<String, StoredUser>>,
    }

    impl MemoryStore {
        fn with_user(id: &str, email: &str, status: BillingStatus) -> Self {
            let mut users = HashMap::new();
            users.insert(
                id.to_string(),
                StoredUser {
                    email: email.to_string(),
                    status,
                    plan: None,
                    customer_id: None,
                    subscription_id: None,
                },
            );
            MemoryStore {
                users: Mutex::new(users),
            }
        }

        fn user(&self, id: &str) -> StoredUser {
            self.users.lock().unwrap().get(id).unwrap().clone()
        }
    }

    #[async_trait]
    impl BillingStore for MemoryStore {
        async fn user_id_by_ref(&self, user_ref: &str) -> anyhow::Result<Option<String>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .contains_key(user_ref)
                .then(|| user_ref.to_string()))
        }

        async fn user_id_by_email(&self, email: &str) -> anyhow::Result<Option<String>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|(_, u)| u.email.eq_ignore_ascii_case(email))
                .map(|(id, _)| id.clone()))
        }

        async fn billing_status(&self, user_id: &str) -> anyhow::Result<Option<BillingStatus>> {
            Ok(self.users.lock().unwrap().get(user_id).map(|u| u.status))
        }

        async fn activate(
            &self,
            user_id: &str,
            customer_id: Option<&str>,
            subscription_id: Option<&str>,
            plan: SubscriptionPlan,
        ) -> anyhow::Result<()> {
            let mut users = self.users.lock().unwrap();
            let user = users.get_mut(user_id).unwrap();
            user.status = BillingStatus::Active;
            if let Some(customer_id) = customer_id {
                user.customer_id = Some(customer_id.to_string());
            }
            if let Some(subscription_id) = subscription_id {
                user.subscription_id = Some(subscription_id.to_string());
            }
            user.plan = Some(plan);
            Ok(())
        }

        async fn set_status(&self, user_id: &str, status: BillingStatus) -> anyhow::Result<()> {
            self.users.lock().unwrap().get_mut(user_id).unwrap().status = status;
            Ok(())
        }

        async fn set_plan(&self, user_id: &str, plan: SubscriptionPlan) -> anyhow::Result<()> {
            self.users.lock().unwrap().get_mut(user_id).unwrap().plan = Some(plan);
            Ok(())
        }
    }

    fn checkout_event(user_ref: Option<&str>, email: Option<&str>) -> BillingEvent {
        BillingEvent::CheckoutCompleted {
            user_ref: user_ref.map(String::from),
            email: email.map(String::from),
            customer_id: Some("cus_123".to_string()),
            subscription_id: Some("sub_123".to_string()),
            plan: Some(SubscriptionPlan::Yearly),
        }
    }

    #[tokio::test]
    async fn checkout_activates_and_stores_identifiers() {
        let store = MemoryStore::with_user("user_1", "amy@example.com", BillingStatus::Trial);

        Reconciler::apply(&store, checkout_event(Some("user_1"), None))
            .await
            .unwrap();

        let user = store.user("user_1");
        assert_eq!(user.status, BillingStatus::Active);
        assert_eq!(user.plan, Some(SubscriptionPlan::Yearly));
        assert_eq!(user.customer_id.as_deref(), Some("cus_123"));
        assert_eq!(user.subscription_id.as_deref(), Some("sub_123"));
    }

    #[tokio::test]
    async fn checkout_delivered_twice_is_idempotent() {
        let store = MemoryStore::with_user("user_1", "amy@example.com", BillingStatus::Trial);

        Reconciler::apply(&store, checkout_event(Some("user_1"), None))
            .await
            .unwrap();
        let after_first = store.user("user_1");

        Reconciler::apply(&store, checkout_event(Some("user_1"), None))
            .await
            .unwrap();
        assert_eq!(store.user("user_1"), after_first);
    }

    #[tokio::test]
    async fn checkout_falls_back_to_email_lookup() {
        let store = MemoryStore::with_user("user_1", "amy@example.com", BillingStatus::Trial);

        Reconciler::apply(&store, checkout_event(None, Some("Amy@Example.com")))
            .await
            .unwrap();

        assert_eq!(store.user("user_1").status, BillingStatus::Active);
    }

    #[tokio::test]
    async fn unresolvable_checkout_is_a_noop() {
        let store = MemoryStore::with_user("user_1", "amy@example.com", BillingStatus::Trial);

        Reconciler::apply(&store, checkout_event(Some("user_999"), Some("nobody@example.com")))
            .await
            .unwrap();

        assert_eq!(store.user("user_1").status, BillingStatus::Trial);
    }

    #[tokio::test]
    async fn resubscribe_after_expiry() {
        let store = MemoryStore::with_user("user_1", "amy@example.com", BillingStatus::Expired);

        Reconciler::apply(&store, checkout_event(Some("user_1"), None))
            .await
            .unwrap();

        assert_eq!(store.user("user_1").status, BillingStatus::Active);
    }

    #[tokio::test]
    async fn payment_failure_without_metadata_is_a_noop() {
        let store = MemoryStore::with_user("user_1", "amy@example.com", BillingStatus::Active);

        Reconciler::apply(&store, BillingEvent::PaymentFailed { user_ref: None })
            .await
            .unwrap();

        assert_eq!(store.user("user_1").status, BillingStatus::Active);
    }

    #[tokio::test]
    async fn payment_failure_expires_the_subscription() {
        let store = MemoryStore::with_user("user_1", "amy@example.com", BillingStatus::Active);

        Reconciler::apply(
            &store,
            BillingEvent::PaymentFailed {
                user_ref: Some("user_1".to_string()),
            },
        )
        .await
        .unwrap();

        assert_eq!(store.user("user_1").status, BillingStatus::Expired);
    }

    #[tokio::test]
    async fn deletion_cancels_but_keeps_identifiers() {
        let store = MemoryStore::with_user("user_1", "amy@example.com", BillingStatus::Trial);
        Reconciler::apply(&store, checkout_event(Some("user_1"), None))
            .await
            .unwrap();

        Reconciler::apply(
            &store,
            BillingEvent::SubscriptionDeleted {
                user_ref: Some("user_1".to_string()),
            },
        )
        .await
        .unwrap();

        let user = store.user("user_1");
        assert_eq!(user.status, BillingStatus::Canceled);
        assert_eq!(user.customer_id.as_deref(), Some("cus_123"));
        assert_eq!(user.subscription_id.as_deref(), Some("sub_123"));
    }

    #[tokio::test]
    async fn update_maps_status_and_refreshes_plan() {
        let store = MemoryStore::with_user("user_1", "amy@example.com", BillingStatus::Active);

        Reconciler::apply(
            &store,
            BillingEvent::SubscriptionUpdated {
                user_ref: Some("user_1".to_string()),
                status: BillingStatus::Expired,
                plan: Some(SubscriptionPlan::Monthly),
            },
        )
        .await
        .unwrap();

        let user = store.user("user_1");
        assert_eq!(user.status, BillingStatus::Expired);
        assert_eq!(user.plan, Some(SubscriptionPlan::Monthly));
    }

    #[test]
    fn provider_status_mapping() {
        use stripe::SubscriptionStatus::*;

        assert_eq!(map_subscription_status(Canceled), BillingStatus::Canceled);
        assert_eq!(
            map_subscription_status(IncompleteExpired),
            BillingStatus::Canceled
        );
        assert_eq!(map_subscription_status(PastDue), BillingStatus::Expired);
        assert_eq!(map_subscription_status(Unpaid), BillingStatus::Expired);
        assert_eq!(map_subscription_status(Active), BillingStatus::Active);
        assert_eq!(map_subscription_status(Trialing), BillingStatus::Active);
    }

    #[test]
    fn plan_detection_prefers_configured_prices() {
        assert_eq!(
            plan_from_price("price_m", None, "price_m", "price_y"),
            Some(SubscriptionPlan::Monthly)
        );
        assert_eq!(
            plan_from_price("price_y", Some("month"), "price_m", "price_y"),
            Some(SubscriptionPlan::Yearly)
        );
        assert_eq!(
            plan_from_price("price_old", Some("year"), "price_m", "price_y"),
            Some(SubscriptionPlan::Yearly)
        );
        assert_eq!(plan_from_price("price_old", None, "price_m", "price_y"), None);
    }
}
