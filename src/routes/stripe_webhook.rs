use std::sync::Arc;

use actix_web::{post, web, HttpRequest, HttpResponse};
use anyhow::{anyhow, Context};
use stripe::{Event, EventObject, EventType, Subscription, Webhook};
use tracing::{error, warn};

use crate::billing::reconciler::{
    map_subscription_status, plan_from_price, BillingEvent, PgBillingStore, Reconciler,
};
use crate::billing::SubscriptionPlan;
use crate::{AppConfig, AppState};

/// Stripe calls back here for every billing lifecycle event. Signature
/// failures are rejected before any processing; extraction or store errors
/// come back as 500 so Stripe redelivers, which is safe because every
/// reconciler write is an absolute set.
#[post("/webhook")]
pub async fn stripe_webhook(
    app_state: web::Data<Arc<AppState>>,
    app_config: web::Data<Arc<AppConfig>>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, actix_web::Error> {
    let signature = req
        .headers()
        .get("Stripe-Signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| actix_web::error::ErrorBadRequest("Missing Stripe-Signature header"))?;

    let payload = std::str::from_utf8(&body)
        .map_err(|_| actix_web::error::ErrorBadRequest("Invalid body format"))?;

    let event = Webhook::construct_event(payload, signature, &app_config.stripe_webhook_secret)
        .map_err(|e| {
            warn!("Stripe webhook signature verification failed: {:?}", e);
            actix_web::error::ErrorBadRequest("Invalid signature")
        })?;

    let event_type = event.type_.clone();
    let billing_event = extract_billing_event(event, &app_state.stripe_client, &app_config)
        .await
        .map_err(|e| {
            error!(event_type = %event_type, "Failed to extract webhook event: {:?}", e);
            actix_web::error::ErrorInternalServerError("Webhook processing failed")
        })?;

    let store = PgBillingStore::new(app_state.pool.clone());
    Reconciler::apply(&store, billing_event).await.map_err(|e| {
        error!(event_type = %event_type, "Failed to apply billing event: {:?}", e);
        actix_web::error::ErrorInternalServerError("Webhook processing failed")
    })?;

    Ok(HttpResponse::Ok().finish())
}

/// Reduces a raw Stripe event to the billing facts the reconciler needs,
/// performing the follow-up Stripe reads (checkout → subscription, invoice →
/// subscription) that the payloads only reference by id.
async fn extract_billing_event(
    event: Event,
    stripe_client: &stripe::Client,
    config: &AppConfig,
) -> anyhow::Result<BillingEvent> {
    match event.type_ {
        EventType::CheckoutSessionCompleted => {
            let session = match event.data.object {
                EventObject::CheckoutSession(session) => session,
                other => return Err(anyhow!("Expected checkout session, got {:?}", other)),
            };

            let user_ref = session.client_reference_id.clone();
            let email = session
                .customer_details
                .as_ref()
                .and_then(|details| details.email.clone());
            let customer_id = session.customer.as_ref().map(|customer| match customer {
                stripe::Expandable::Id(id) => id.to_string(),
                stripe::Expandable::Object(customer) => customer.id.to_string(),
            });

            let (subscription_id, plan) = match &session.subscription {
                Some(subscription_ref) => {
                    let subscription_id = match subscription_ref {
                        stripe::Expandable::Id(id) => id.clone(),
                        stripe::Expandable::Object(subscription) => subscription.id.clone(),
                    };
                    let subscription =
                        Subscription::retrieve(stripe_client, &subscription_id, &[])
                            .await
                            .context("Failed to retrieve checkout subscription")?;
                    (
                        Some(subscription_id.to_string()),
                        plan_from_subscription(&subscription, config),
                    )
                }
                None => (None, None),
            };

            Ok(BillingEvent::CheckoutCompleted {
                user_ref,
                email,
                customer_id,
                subscription_id,
                plan,
            })
        }

        EventType::CustomerSubscriptionUpdated => {
            let subscription = extract_subscription(event)?;
            Ok(BillingEvent::SubscriptionUpdated {
                user_ref: subscription.metadata.get("user_id").cloned(),
                status: map_subscription_status(subscription.status),
                plan: plan_from_subscription(&subscription, config),
            })
        }

        EventType::CustomerSubscriptionDeleted => {
            let subscription = extract_subscription(event)?;
            Ok(BillingEvent::SubscriptionDeleted {
                user_ref: subscription.metadata.get("user_id").cloned(),
            })
        }

        EventType::InvoicePaymentFailed => {
            let invoice = match event.data.object {
                EventObject::Invoice(invoice) => invoice,
                other => return Err(anyhow!("Expected invoice, got {:?}", other)),
            };

            let user_ref = match &invoice.subscription {
                Some(stripe::Expandable::Object(subscription)) => {
                    subscription.metadata.get("user_id").cloned()
                }
                Some(stripe::Expandable::Id(subscription_id)) => {
                    let subscription = Subscription::retrieve(stripe_client, subscription_id, &[])
                        .await
                        .context("Failed to retrieve invoice subscription")?;
                    subscription.metadata.get("user_id").cloned()
                }
                None => None,
            };

            Ok(BillingEvent::PaymentFailed { user_ref })
        }

        other => Ok(BillingEvent::Ignored {
            kind: other.to_string(),
        }),
    }
}

fn extract_subscription(event: Event) -> anyhow::Result<Subscription> {
    match event.data.object {
        EventObject::Subscription(subscription) => Ok(subscription),
        other => Err(anyhow!("Expected subscription, got {:?}", other)),
    }
}

fn plan_from_subscription(
    subscription: &Subscription,
    config: &AppConfig,
) -> Option<SubscriptionPlan> {
    let price = subscription
        .items
        .data
        .first()
        .and_then(|item| item.price.as_ref())?;

    let interval = price.recurring.as_ref().map(|r| match r.interval {
        stripe::RecurringInterval::Month => "month",
        stripe::RecurringInterval::Year => "year",
        stripe::RecurringInterval::Week => "week",
        stripe::RecurringInterval::Day => "day",
    });

    plan_from_price(
        price.id.as_str(),
        interval,
        &config.stripe_price_monthly,
        &config.stripe_price_yearly,
    )
}
