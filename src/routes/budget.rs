use std::sync::Arc;

use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use uuid::Uuid;

use crate::billing::ensure_can_write;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::budget_item::{NewBudgetItem, UpdateBudgetItem};
use crate::models::{BudgetItem, Wedding};
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
pub async fn list_items(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<impl Responder, actix_web::Error> {
    let wedding = owned_wedding(&app_state, path.into_inner(), &authenticated_user.user_id).await?;

    let items = BudgetItem::list_for_wedding(&app_state.pool, wedding.id)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    Ok(web::Json(items))
}

#[get("/{wedding_id}/summary")]
pub async fn summary(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<impl Responder, actix_web::Error> {
    let wedding = owned_wedding(&app_state, path.into_inner(), &authenticated_user.user_id).await?;

    let summary = BudgetItem::summary(&app_state.pool, wedding.id)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    Ok(web::Json(summary))
}

#[post("/{wedding_id}")]
pub async fn create_item(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<NewBudgetItem>,
) -> Result<impl Responder, actix_web::Error> {
    ensure_can_write(&app_state.pool, &authenticated_user.user_id).await?;
    let wedding = owned_wedding(&app_state, path.into_inner(), &authenticated_user.user_id).await?;

    let item = body.into_inner();
    if item.category.trim().is_empty() {
        return Err(actix_web::error::ErrorBadRequest("Category is required"));
    }

    let created = BudgetItem::create(&app_state.pool, wedding.id, item)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    Ok(web::Json(created))
}

#[put("/{wedding_id}/{item_id}")]
pub async fn update_item(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    path: web::Path<(Uuid, Uuid)>,
    body: web::Json<UpdateBudgetItem>,
) -> Result<HttpResponse, actix_web::Error> {
    ensure_can_write(&app_state.pool, &authenticated_user.user_id).await?;
    let (wedding_id, item_id) = path.into_inner();
    let wedding = owned_wedding(&app_state, wedding_id, &authenticated_user.user_id).await?;

    let updated = BudgetItem::update(&app_state.pool, wedding.id, item_id, body.into_inner())
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    match updated {
        Some(item) => Ok(HttpResponse::Ok().json(item)),
        None => Ok(HttpResponse::NotFound().finish()),
    }
}

#[delete("/{wedding_id}/{item_id}")]
pub async fn delete_item(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse, actix_web::Error> {
    ensure_can_write(&app_state.pool, &authenticated_user.user_id).await?;
    let (wedding_id, item_id) = path.into_inner();
    let wedding = owned_wedding(&app_state, wedding_id, &authenticated_user.user_id).await?;

    let deleted = BudgetItem::delete(&app_state.pool, wedding.id, item_id)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    if deleted {
        Ok(HttpResponse::NoContent().finish())
    } else {
        Ok(HttpResponse::NotFound().finish())
    }
}
