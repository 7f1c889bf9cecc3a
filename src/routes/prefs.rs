use std::sync::Arc;

use actix_web::{get, put, web, Responder};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::middleware::auth::AuthenticatedUser;
use crate::models::Preference;
use crate::AppState;

#[derive(Serialize, ToSchema)]
pub struct PreferenceResponse {
    pub key: String,
    pub value: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct SetPreferenceRequest {
    pub value: String,
}

/// One-time UI prompt flags ("trial modal shown") live here instead of in
/// process memory, so they survive deploys and reset cleanly in tests.
#[get("/{key}")]
pub async fn get_preference(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    path: web::Path<String>,
) -> Result<impl Responder, actix_web::Error> {
    let key = path.into_inner();
    let value = Preference::get(&app_state.pool, &authenticated_user.user_id, &key)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    Ok(web::Json(PreferenceResponse { key, value }))
}

#[put("/{key}")]
pub async fn set_preference(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    path: web::Path<String>,
    body: web::Json<SetPreferenceRequest>,
) -> Result<impl Responder, actix_web::Error> {
    let key = path.into_inner();
    let value = body.into_inner().value;

    Preference::set(&app_state.pool, &authenticated_user.user_id, &key, &value)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    Ok(web::Json(PreferenceResponse {
        key,
        value: Some(value),
    }))
}
