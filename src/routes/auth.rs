use std::sync::Arc;

use actix_web::{
    get,
    web::{self, Json},
    Error, Responder,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::middleware::auth::AuthenticatedUser;
use crate::models::{Attribution, User};
use crate::{AppConfig, AppState};

#[derive(Deserialize)]
struct AuthCallbackQuery {
    code: String,
}

#[derive(Serialize, Deserialize, Debug)]
struct WorkOSUser {
    id: String,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct WorkOSAuthRequest {
    client_id: String,
    client_secret: String,
    grant_type: String,
    code: String,
}

#[derive(Deserialize)]
struct WorkOSAuthResponse {
    user: WorkOSUser,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

#[get("/callback")]
pub async fn auth_callback(
    app_state: web::Data<Arc<AppState>>,
    app_config: web::Data<Arc<AppConfig>>,
    info: web::Query<AuthCallbackQuery>,
) -> Result<impl Responder, actix_web::Error> {
    let auth_response = exchange_code_for_user(&info.code, app_config.get_ref().clone())
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    let workos_user = auth_response.user;

    // The marketing site may have recorded where this email came from before
    // the account existed; pick it up so the promo cohort is tagged from the
    // first session.
    let attribution = Attribution::lookup(
        &app_state.pool,
        &app_state.attribution_cache,
        &workos_user.email,
    )
    .await
    .unwrap_or_else(|e| {
        error!("Attribution lookup failed during callback: {:?}", e);
        None
    });

    User::get_or_create(
        &app_state.pool,
        &workos_user.id,
        &workos_user.email,
        workos_user.first_name.as_deref().unwrap_or(""),
        workos_user.last_name.as_deref().unwrap_or(""),
        attribution.as_ref().map(|a| a.source.as_str()),
    )
    .await
    .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    let jwt = sign_jwt(&workos_user.id, app_config.get_ref())
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    let redirect_url = format!("{}/auth?token={}", app_config.app_url, jwt);
    info!(user_id = %workos_user.id, "Authenticated, redirecting to app");
    Ok(web::Redirect::to(redirect_url))
}

#[get("/user")]
pub async fn get_user(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
) -> Result<Json<User>, Error> {
    let user = User::get(&app_state.pool, &authenticated_user.user_id)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?
        .ok_or_else(|| actix_web::error::ErrorNotFound("User not found"))?;

    Ok(Json(user))
}

async fn exchange_code_for_user(
    code: &str,
    app_config: Arc<AppConfig>,
) -> Result<WorkOSAuthResponse, anyhow::Error> {
    let client = Client::new();
    let response = client
        .post("https://api.workos.com/user_management/authenticate")
        .json(&WorkOSAuthRequest {
            client_id: app_config.workos_client_id.clone(),
            client_secret: app_config.workos_api_key.clone(),
            grant_type: "authorization_code".to_string(),
            code: code.to_string(),
        })
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!(%status, "WorkOS code exchange failed: {}", body);
        anyhow::bail!("WorkOS code exchange failed with status {}", status);
    }

    Ok(response.json::<WorkOSAuthResponse>().await?)
}

pub fn sign_jwt(user_id: &str, app_config: &AppConfig) -> Result<String, anyhow::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp() as usize,
        exp: (now + Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(app_config.jwt_secret.as_ref()),
    )?;
    Ok(token)
}
