use std::sync::Arc;

use actix_web::{get, post, put, web, HttpResponse, Responder};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::billing::ensure_can_write;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::wedding::{NewWedding, UpdateWedding};
use crate::models::{BudgetItem, RsvpSettings, Wedding};
use crate::AppState;

#[derive(Deserialize, ToSchema)]
pub struct SlugQuery {
    pub slug: String,
}

#[derive(Serialize, ToSchema)]
pub struct SlugCheckResponse {
    pub slug: String,
    pub available: bool,
}

/// Slug availability probe used live while the couple types their URL.
/// Taken slugs are cached; available ones are re-checked every time so a
/// just-claimed slug can't be double-booked through a stale cache.
#[utoipa::path(
    get,
    path = "/check-slug",
    params(("slug" = String, Query, description = "Candidate wedding URL slug")),
    responses((status = 200, body = SlugCheckResponse))
)]
#[get("/check-slug")]
pub async fn check_slug(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<SlugQuery>,
) -> Result<impl Responder, actix_web::Error> {
    let slug = crate::models::wedding::normalize_slug(&query.slug);
    if slug.is_empty() {
        return Ok(web::Json(SlugCheckResponse {
            slug,
            available: false,
        }));
    }

    if app_state.slug_cache.get(&slug).await == Some(true) {
        return Ok(web::Json(SlugCheckResponse {
            slug,
            available: false,
        }));
    }

    let taken = Wedding::slug_taken(&app_state.pool, &slug)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    if taken {
        app_state.slug_cache.insert(slug.clone(), true).await;
    }

    Ok(web::Json(SlugCheckResponse {
        slug,
        available: !taken,
    }))
}

#[post("")]
pub async fn create_wedding(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    body: web::Json<NewWedding>,
) -> Result<impl Responder, actix_web::Error> {
    ensure_can_write(&app_state.pool, &authenticated_user.user_id).await?;

    let wedding = Wedding::create(&app_state.pool, &authenticated_user.user_id, body.into_inner())
        .await
        .map_err(|e| actix_web::error::ErrorBadRequest(e.to_string()))?;

    // Onboarding seeds the standard budget and a default RSVP form.
    if let Err(e) = BudgetItem::seed_presets(&app_state.pool, wedding.id).await {
        error!(wedding_id = %wedding.id, "Failed to seed budget presets: {:?}", e);
    }
    if let Err(e) = RsvpSettings::create_defaults(&app_state.pool, wedding.id).await {
        error!(wedding_id = %wedding.id, "Failed to create RSVP settings: {:?}", e);
    }

    info!(wedding_id = %wedding.id, user_id = %authenticated_user.user_id, "Onboarding complete");
    Ok(web::Json(wedding))
}

#[get("/mine")]
pub async fn my_wedding(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
) -> Result<impl Responder, actix_web::Error> {
    let wedding = Wedding::get_by_user(&app_state.pool, &authenticated_user.user_id)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?
        .ok_or_else(|| actix_web::error::ErrorNotFound("No wedding yet"))?;

    Ok(web::Json(wedding))
}

#[put("/{wedding_id}")]
pub async fn update_wedding(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<UpdateWedding>,
) -> Result<HttpResponse, actix_web::Error> {
    ensure_can_write(&app_state.pool, &authenticated_user.user_id).await?;

    let wedding_id = path.into_inner();
    let today = Utc::now().date_naive();

    let updated = Wedding::update(
        &app_state.pool,
        wedding_id,
        &authenticated_user.user_id,
        body.into_inner(),
        today,
    )
    .await
    .map_err(|e| actix_web::error::ErrorBadRequest(e.to_string()))?;

    match updated {
        Some(wedding) => Ok(HttpResponse::Ok().json(wedding)),
        None => Ok(HttpResponse::NotFound().finish()),
    }
}
