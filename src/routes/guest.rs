use std::collections::HashMap;
use std::sync::Arc;

use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::billing::ensure_can_write;
use crate::guest_import::{parse_guest_file, ImportResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::guest::{GuestSource, NewGuest, Side, UpdateGuest};
use crate::models::{Guest, Wedding};
use crate::AppState;

pub async fn owned_wedding(
    app_state: &AppState,
    wedding_id: Uuid,
    user_id: &str,
) -> Result<Wedding, actix_web::Error> {
    Wedding::get_owned(&app_state.pool, wedding_id, user_id)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?
        .ok_or_else(|| actix_web::error::ErrorNotFound("Wedding not found"))
}

#[get("/{wedding_id}")]
pub async fn list_guests(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<impl Responder, actix_web::Error> {
    let wedding = owned_wedding(&app_state, path.into_inner(), &authenticated_user.user_id).await?;

    let guests = Guest::list_for_wedding(&app_state.pool, wedding.id)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    Ok(web::Json(guests))
}

#[post("/{wedding_id}")]
pub async fn create_guest(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<NewGuest>,
) -> Result<impl Responder, actix_web::Error> {
    ensure_can_write(&app_state.pool, &authenticated_user.user_id).await?;
    let wedding = owned_wedding(&app_state, path.into_inner(), &authenticated_user.user_id).await?;

    let new_guest = body.into_inner();
    if new_guest.full_name.trim().is_empty() {
        return Err(actix_web::error::ErrorBadRequest("Name is required"));
    }

    let guest = Guest::create(&app_state.pool, wedding.id, new_guest, GuestSource::Manual)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    Ok(web::Json(guest))
}

#[put("/{wedding_id}/{guest_id}")]
pub async fn update_guest(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    path: web::Path<(Uuid, Uuid)>,
    body: web::Json<UpdateGuest>,
) -> Result<HttpResponse, actix_web::Error> {
    ensure_can_write(&app_state.pool, &authenticated_user.user_id).await?;
    let (wedding_id, guest_id) = path.into_inner();
    let wedding = owned_wedding(&app_state, wedding_id, &authenticated_user.user_id).await?;

    let updated = Guest::update(&app_state.pool, wedding.id, guest_id, body.into_inner())
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    match updated {
        Some(guest) => Ok(HttpResponse::Ok().json(guest)),
        None => Ok(HttpResponse::NotFound().finish()),
    }
}

#[delete("/{wedding_id}/{guest_id}")]
pub async fn delete_guest(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse, actix_web::Error> {
    ensure_can_write(&app_state.pool, &authenticated_user.user_id).await?;
    let (wedding_id, guest_id) = path.into_inner();
    let wedding = owned_wedding(&app_state, wedding_id, &authenticated_user.user_id).await?;

    let deleted = Guest::delete(&app_state.pool, wedding.id, guest_id)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    if deleted {
        Ok(HttpResponse::NoContent().finish())
    } else {
        Ok(HttpResponse::NotFound().finish())
    }
}

#[derive(Deserialize, ToSchema)]
pub struct ImportRequest {
    /// Raw text of the uploaded file.
    pub content: String,
    /// When false the request is a dry run: parse and report, write nothing.
    #[serde(default)]
    pub commit: bool,
    /// Resolution for labels the parser reported in `unique_sides`,
    /// e.g. {"Family": "bride"}.
    #[serde(default)]
    pub side_mapping: HashMap<String, Side>,
}

#[derive(Serialize)]
pub struct ImportResponse {
    #[serde(flatten)]
    pub result: ImportResult,
    pub imported: usize,
}

/// Parses an uploaded guest file against the template; with `commit` set,
/// rows without errors are written through the normal guest-create path.
#[post("/{wedding_id}/import")]
pub async fn import_guests(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<ImportRequest>,
) -> Result<impl Responder, actix_web::Error> {
    ensure_can_write(&app_state.pool, &authenticated_user.user_id).await?;
    let wedding = owned_wedding(&app_state, path.into_inner(), &authenticated_user.user_id).await?;

    let request = body.into_inner();
    let result = parse_guest_file(&request.content);

    let mut imported = 0;
    if result.success && request.commit {
        for parsed in result.guests.iter().filter(|g| g.is_importable()) {
            let side = parsed
                .raw_side
                .as_ref()
                .and_then(|raw| request.side_mapping.get(raw).copied())
                .unwrap_or(parsed.side);

            let new_guest = NewGuest {
                full_name: parsed.name.clone(),
                email: parsed.email.clone(),
                phone: parsed.phone.clone(),
                side,
                household_id: parsed.household_id.clone(),
                plus_one: false,
                plus_one_name: None,
                meal_choice: None,
                dietary_notes: None,
                notes: None,
            };

            match Guest::create(&app_state.pool, wedding.id, new_guest, GuestSource::Manual).await {
                Ok(_) => imported += 1,
                Err(e) => {
                    error!(wedding_id = %wedding.id, "Failed to import guest row: {:?}", e);
                    return Err(actix_web::error::ErrorInternalServerError(
                        "Import failed partway through; re-upload to retry",
                    ));
                }
            }
        }
        info!(wedding_id = %wedding.id, imported, "Guest import committed");
    }

    Ok(web::Json(ImportResponse { result, imported }))
}
