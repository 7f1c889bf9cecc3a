use actix_web::{get, post, web, Responder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stripe::generated::checkout::checkout_session;
use stripe::{
    CheckoutSessionMode, CreateBillingPortalSession, CreateCheckoutSession,
    CreateCheckoutSessionDiscounts, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionSubscriptionData, ListPromotionCodes,
};
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::billing::{trial, SubscriptionPlan};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{Attribution, User};
use crate::{AppConfig, AppState};

#[derive(Deserialize)]
struct AttributionQuery {
    email: String,
    source: String,
    code: Option<String>,
}

/// Hit by the marketing site before signup so the eventual account carries
/// its acquisition source (and, for the Etsy cohort, the promo code printed
/// on the insert card).
#[get("/invite")]
pub async fn invite(
    app_state: web::Data<Arc<AppState>>,
    app_config: web::Data<Arc<AppConfig>>,
    query: web::Query<AttributionQuery>,
) -> Result<impl Responder, actix_web::Error> {
    let query = query.into_inner();

    let result = Attribution::record(
        &app_state.pool,
        &app_state.attribution_cache,
        &query.email,
        &query.source,
        query.code.as_deref(),
    )
    .await;

    match result {
        Ok(attribution) => {
            info!(email = %attribution.email, source = %attribution.source, "Stored signup attribution");
            Ok(web::Redirect::to(format!("{}/signup", app_config.app_url)))
        }
        Err(e) => {
            error!("Failed to store attribution: {:?}", e);
            Err(actix_web::error::ErrorInternalServerError(e.to_string()))
        }
    }
}

#[get("/payment_success")]
pub async fn payment_success(
    app_config: web::Data<Arc<AppConfig>>,
) -> Result<impl Responder, actix_web::Error> {
    Ok(web::Redirect::to(format!(
        "{}/dashboard?upgraded=1",
        app_config.app_url
    )))
}

#[derive(Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub plan: SubscriptionPlan,
}

#[derive(Serialize, Deserialize, Clone, ToSchema)]
pub struct ManageResponse {
    pub url: String,
}

#[post("/checkout")]
pub async fn checkout(
    app_state: web::Data<Arc<AppState>>,
    app_config: web::Data<Arc<AppConfig>>,
    authenticated_user: AuthenticatedUser,
    body: web::Json<CheckoutRequest>,
) -> Result<impl Responder, actix_web::Error> {
    let user = User::get(&app_state.pool, &authenticated_user.user_id)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?
        .ok_or_else(|| actix_web::error::ErrorForbidden("Unknown user"))?;

    info!(user_id = %user.id, plan = ?body.plan, "Checkout request");

    let price = match body.plan {
        SubscriptionPlan::Monthly => app_config.stripe_price_monthly.clone(),
        SubscriptionPlan::Yearly => app_config.stripe_price_yearly.clone(),
    };

    let line_item = CreateCheckoutSessionLineItems {
        price: Some(price),
        quantity: Some(1),
        ..Default::default()
    };

    // Etsy-cohort buyers redeem the code recorded with their attribution; it
    // is applied for them rather than typed into the checkout page.
    let discounts: Option<Vec<CreateCheckoutSessionDiscounts>> = if trial::is_promo_cohort(&user) {
        lookup_promo_discount(&app_state, &user.email).await
    } else {
        None
    };

    let success_url = format!("{}/pay/payment_success", app_config.app_url);
    let cancel_url = format!("{}/upgrade", app_config.app_url);
    let metadata = std::collections::HashMap::from([("user_id".to_string(), user.id.clone())]);

    let subscription_data = CreateCheckoutSessionSubscriptionData {
        metadata: Some(metadata),
        ..Default::default()
    };

    let create_checkout_session: CreateCheckoutSession = match discounts {
        Some(discounts) => {
            info!(user_id = %user.id, "Applying promo discount at checkout");
            CreateCheckoutSession {
                client_reference_id: Some(user.id.as_str()),
                customer_email: Some(user.email.as_str()),
                discounts: discounts.into(),
                line_items: vec![line_item].into(),
                mode: CheckoutSessionMode::Subscription.into(),
                subscription_data: Some(subscription_data),
                success_url: Some(success_url.as_str()),
                cancel_url: Some(cancel_url.as_str()),
                ..Default::default()
            }
        }
        None => CreateCheckoutSession {
            allow_promotion_codes: Some(true),
            client_reference_id: Some(user.id.as_str()),
            customer_email: Some(user.email.as_str()),
            line_items: vec![line_item].into(),
            mode: CheckoutSessionMode::Subscription.into(),
            subscription_data: Some(subscription_data),
            success_url: Some(success_url.as_str()),
            cancel_url: Some(cancel_url.as_str()),
            ..Default::default()
        },
    };

    let session = checkout_session::CheckoutSession::create(
        &app_state.stripe_client,
        create_checkout_session,
    )
    .await
    .map_err(|e| {
        error!("Failed to create checkout session: {:?}", e);
        actix_web::error::ErrorInternalServerError(e.to_string())
    })?;

    let url = session
        .url
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("Checkout session has no URL"))?;

    info!(user_id = %user.id, "Created checkout session");
    Ok(web::Json(ManageResponse { url }))
}

async fn lookup_promo_discount(
    app_state: &AppState,
    email: &str,
) -> Option<Vec<CreateCheckoutSessionDiscounts>> {
    let attribution =
        match Attribution::lookup(&app_state.pool, &app_state.attribution_cache, email).await {
            Ok(Some(attribution)) => attribution,
            Ok(None) => {
                warn!(email, "Promo cohort user has no attribution record");
                return None;
            }
            Err(e) => {
                error!("Attribution lookup failed: {:?}", e);
                return None;
            }
        };

    let code = attribution.code?;

    let promotion_codes = stripe::PromotionCode::list(
        &app_state.stripe_client,
        &ListPromotionCodes {
            code: Some(code.as_str()),
            active: Some(true),
            ..Default::default()
        },
    )
    .await;

    match promotion_codes {
        Ok(promotion_codes) => {
            if let Some(promotion_code) = promotion_codes.data.first() {
                info!(code = %code, "Promotion code found");
                Some(vec![CreateCheckoutSessionDiscounts {
                    promotion_code: Some(promotion_code.id.as_str().into()),
                    ..Default::default()
                }])
            } else {
                warn!(code = %code, "Promotion code not active in Stripe");
                None
            }
        }
        Err(e) => {
            error!("Failed to list promotion codes: {:?}", e);
            None
        }
    }
}

#[post("/portal")]
pub async fn portal(
    app_state: web::Data<Arc<AppState>>,
    app_config: web::Data<Arc<AppConfig>>,
    authenticated_user: AuthenticatedUser,
) -> Result<impl Responder, actix_web::Error> {
    let user = User::get(&app_state.pool, &authenticated_user.user_id)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?
        .ok_or_else(|| actix_web::error::ErrorForbidden("Unknown user"))?;

    let customer_id = user
        .stripe_customer_id
        .as_deref()
        .ok_or_else(|| actix_web::error::ErrorBadRequest("No billing profile yet"))?
        .parse::<stripe::CustomerId>()
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    let return_url = format!("{}/settings", app_config.app_url);
    let mut params = CreateBillingPortalSession::new(customer_id);
    params.return_url = Some(return_url.as_str());

    let session = stripe::BillingPortalSession::create(&app_state.stripe_client, params)
        .await
        .map_err(|e| {
            error!("Failed to create billing portal session: {:?}", e);
            actix_web::error::ErrorInternalServerError(e.to_string())
        })?;

    info!(user_id = %user.id, "Created billing portal session");
    Ok(web::Json(ManageResponse { url: session.url }))
}
