use std::sync::Arc;

use actix_web::{get, post, put, web, HttpRequest, HttpResponse, Responder};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::billing::ensure_can_write;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::guest::{Guest, RsvpEntry, RsvpStatus};
use crate::models::rsvp_settings::UpdateRsvpSettings;
use crate::models::{RsvpSettings, Wedding};
use crate::AppState;

/// What the public RSVP page renders: names, date, and which optional
/// fields the couple turned on.
#[derive(Serialize, ToSchema)]
pub struct PublicWeddingResponse {
    pub partner_one: String,
    pub partner_two: String,
    pub wedding_date: Option<NaiveDate>,
    pub slug: String,
    pub custom_message: Option<String>,
    pub collect_email: bool,
    pub collect_phone: bool,
    pub collect_meal: bool,
    pub collect_dietary: bool,
    pub allow_plus_one: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct RsvpSubmission {
    pub entries: Vec<RsvpEntry>,
}

#[derive(Serialize, ToSchema)]
pub struct RsvpSubmissionResponse {
    pub saved: usize,
}

#[derive(Serialize, ToSchema)]
pub struct HouseholdGuest {
    pub name: String,
    pub rsvp_status: RsvpStatus,
    pub plus_one: bool,
}

async fn wedding_by_slug(
    app_state: &AppState,
    slug: &str,
) -> Result<Wedding, actix_web::Error> {
    Wedding::get_by_slug(&app_state.pool, slug)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?
        .ok_or_else(|| actix_web::error::ErrorNotFound("Wedding not found"))
}

#[utoipa::path(
    get,
    path = "/rsvp/{slug}",
    params(("slug" = String, Path, description = "Wedding URL slug")),
    responses(
        (status = 200, body = PublicWeddingResponse),
        (status = 404, description = "No wedding at this address")
    )
)]
#[get("/{slug}")]
pub async fn public_wedding(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> Result<impl Responder, actix_web::Error> {
    let wedding = wedding_by_slug(&app_state, &path.into_inner()).await?;

    let settings = RsvpSettings::get(&app_state.pool, wedding.id)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?
        .unwrap_or_else(|| RsvpSettings::defaults(wedding.id));

    Ok(web::Json(PublicWeddingResponse {
        partner_one: wedding.partner_one,
        partner_two: wedding.partner_two,
        wedding_date: wedding.wedding_date,
        slug: wedding.slug,
        custom_message: settings.custom_message,
        collect_email: settings.collect_email,
        collect_phone: settings.collect_phone,
        collect_meal: settings.collect_meal,
        collect_dietary: settings.collect_dietary,
        allow_plus_one: settings.allow_plus_one,
    }))
}

/// Everyone sharing a household id RSVPs as one unit; the form loads the
/// whole party so one person can answer for all of them.
#[get("/{slug}/household/{household_id}")]
pub async fn household(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<(String, String)>,
) -> Result<impl Responder, actix_web::Error> {
    let (slug, household_id) = path.into_inner();
    let wedding = wedding_by_slug(&app_state, &slug).await?;

    let guests = Guest::household(&app_state.pool, wedding.id, &household_id)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    let party: Vec<HouseholdGuest> = guests
        .into_iter()
        .map(|g| HouseholdGuest {
            name: g.full_name,
            rsvp_status: g.rsvp_status,
            plus_one: g.plus_one,
        })
        .collect();

    Ok(web::Json(party))
}

/// Anonymous RSVP submission from the public form. Rate-limited per client
/// address; guests are matched by name or created with Rsvp provenance.
#[utoipa::path(
    post,
    path = "/rsvp/{slug}",
    params(("slug" = String, Path, description = "Wedding URL slug")),
    request_body = RsvpSubmission,
    responses(
        (status = 200, body = RsvpSubmissionResponse),
        (status = 429, description = "Too many submissions from this address")
    )
)]
#[post("/{slug}")]
pub async fn submit_rsvp(
    app_state: web::Data<Arc<AppState>>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<RsvpSubmission>,
) -> Result<impl Responder, actix_web::Error> {
    let client_ip = req
        .connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string();

    if !app_state.rsvp_limiter.try_acquire(&client_ip).await {
        warn!(client_ip = %client_ip, "RSVP submission rate limited");
        return Err(actix_web::error::ErrorTooManyRequests(
            "Too many submissions, please try again in a minute",
        ));
    }

    let wedding = wedding_by_slug(&app_state, &path.into_inner()).await?;

    let submission = body.into_inner();
    if submission.entries.is_empty() {
        return Err(actix_web::error::ErrorBadRequest("Nothing to save"));
    }

    let mut saved = 0;
    for entry in submission.entries {
        if entry.name.trim().is_empty() {
            continue;
        }
        Guest::apply_rsvp(&app_state.pool, wedding.id, entry)
            .await
            .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;
        saved += 1;
    }

    info!(wedding_id = %wedding.id, saved, "RSVP submission saved");
    Ok(web::Json(RsvpSubmissionResponse { saved }))
}

#[get("/settings/{wedding_id}")]
pub async fn get_settings(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<impl Responder, actix_web::Error> {
    let wedding_id = path.into_inner();
    Wedding::get_owned(&app_state.pool, wedding_id, &authenticated_user.user_id)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?
        .ok_or_else(|| actix_web::error::ErrorNotFound("Wedding not found"))?;

    let settings = RsvpSettings::create_defaults(&app_state.pool, wedding_id)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    Ok(web::Json(settings))
}

#[put("/settings/{wedding_id}")]
pub async fn update_settings(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<UpdateRsvpSettings>,
) -> Result<HttpResponse, actix_web::Error> {
    ensure_can_write(&app_state.pool, &authenticated_user.user_id).await?;
    let wedding_id = path.into_inner();
    Wedding::get_owned(&app_state.pool, wedding_id, &authenticated_user.user_id)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?
        .ok_or_else(|| actix_web::error::ErrorNotFound("Wedding not found"))?;

    RsvpSettings::create_defaults(&app_state.pool, wedding_id)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    let updated = RsvpSettings::update(&app_state.pool, wedding_id, body.into_inner())
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    match updated {
        Some(settings) => Ok(HttpResponse::Ok().json(settings)),
        None => Ok(HttpResponse::NotFound().finish()),
    }
}
