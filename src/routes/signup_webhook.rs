use actix_web::HttpResponse;
use actix_web::{post, web};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::models::{Attribution, User};
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Deserialize)]
pub struct WorkOSWebhookUser {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WorkOSUserCreatedPayload {
    pub event: String,
    pub data: WorkOSWebhookUser,
}

/// Signup webhook from WorkOS. This is where an account comes into being:
/// the user row is created with its trial started, attribution recorded by
/// the marketing site is applied, and the contact is registered with Loops.
#[post("/workos/user_created")]
pub async fn user_created(
    app_state: web::Data<Arc<AppState>>,
    app_config: web::Data<Arc<AppConfig>>,
    req: actix_web::HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, actix_web::Error> {
    let workos_signature = req
        .headers()
        .get("workos-signature")
        .ok_or_else(|| actix_web::error::ErrorUnauthorized("Missing signature"))?
        .to_str()
        .map_err(|_| actix_web::error::ErrorUnauthorized("Invalid signature format"))?;

    let body_str = std::str::from_utf8(&body)
        .map_err(|_| actix_web::error::ErrorBadRequest("Invalid body format"))?;

    verify_signature(workos_signature, body_str, &app_config.workos_webhook_secret)?;

    let payload: WorkOSUserCreatedPayload = serde_json::from_slice(&body)
        .map_err(|_| actix_web::error::ErrorBadRequest("Invalid JSON body"))?;

    if payload.event != "user.created" {
        info!(event = %payload.event, "Ignoring non-signup WorkOS event");
        return Ok(HttpResponse::Ok().finish());
    }

    let workos_user = payload.data;

    let attribution = Attribution::lookup(
        &app_state.pool,
        &app_state.attribution_cache,
        &workos_user.email,
    )
    .await
    .unwrap_or_else(|e| {
        error!("Attribution lookup failed in signup webhook: {:?}", e);
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
    .map_err(|err| {
        error!("Error creating user from webhook: {}", err);
        actix_web::error::ErrorInternalServerError("Error creating user from webhook")
    })?;

    // Register the contact out of band; signup must not wait on marketing.
    let email_client = app_state.email.clone();
    let contact_email = workos_user.email.clone();
    actix_web::rt::spawn(async move {
        let result = email_client.create_contact(&contact_email, "app_signup").await;
        if !result.success {
            warn!(email = %contact_email, "Loops contact registration failed");
        }
    });

    Ok(HttpResponse::Ok().finish())
}

/// WorkOS signs webhooks with `workos-signature: t=<millis>,v1=<hex hmac>`
/// over `"<millis>.<body>"`. Stale timestamps are rejected to block replays.
fn verify_signature(
    signature_header: &str,
    body: &str,
    secret: &str,
) -> Result<(), actix_web::Error> {
    let parts: Vec<&str> = signature_header.split(',').collect();
    if parts.len() != 2 {
        return Err(actix_web::error::ErrorUnauthorized(
            "Invalid signature format",
        ));
    }

    let issued_timestamp = match parts[0].split('=').collect::<Vec<&str>>().as_slice() {
        [_, timestamp] => *timestamp,
        _ => {
            return Err(actix_web::error::ErrorUnauthorized(
                "Invalid timestamp part",
            ))
        }
    };

    let signature_hash = match parts[1].split('=').collect::<Vec<&str>>().as_slice() {
        [_, signature] => *signature,
        _ => {
            return Err(actix_web::error::ErrorUnauthorized(
                "Invalid signature part",
            ))
        }
    };

    let issued_timestamp = issued_timestamp
        .parse::<u64>()
        .map_err(|_| actix_web::error::ErrorUnauthorized("Invalid timestamp"))?;
    let current_time = Utc::now().timestamp_millis() as u64;

    let max_allowed_delay = 300_000; // 5 minutes
    if issued_timestamp + max_allowed_delay < current_time {
        return Err(actix_web::error::ErrorUnauthorized("Timestamp is too old"));
    }

    let message = format!("{}.{}", issued_timestamp, body);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| actix_web::error::ErrorInternalServerError("HMAC initialization error"))?;
    mac.update(message.as_bytes());

    let expected_signature = hex::encode(mac.finalize().into_bytes());

    if expected_signature != signature_hash {
        return Err(actix_web::error::ErrorUnauthorized("Invalid signature"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(body: &str, secret: &str, timestamp: u64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.{}", timestamp, body).as_bytes());
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn accepts_a_fresh_valid_signature() {
        let body = r#"{"event":"user.created"}"#;
        let timestamp = Utc::now().timestamp_millis() as u64;
        let header = sign(body, "secret", timestamp);

        assert!(verify_signature(&header, body, "secret").is_ok());
    }

    #[test]
    fn rejects_a_wrong_secret() {
        let body = r#"{"event":"user.created"}"#;
        let timestamp = Utc::now().timestamp_millis() as u64;
        let header = sign(body, "other-secret", timestamp);

        assert!(verify_signature(&header, body, "secret").is_err());
    }

    #[test]
    fn rejects_a_tampered_body() {
        let timestamp = Utc::now().timestamp_millis() as u64;
        let header = sign(r#"{"event":"user.created"}"#, "secret", timestamp);

        assert!(verify_signature(&header, r#"{"event":"user.deleted"}"#, "secret").is_err());
    }

    #[test]
    fn rejects_a_stale_timestamp() {
        let body = r#"{"event":"user.created"}"#;
        let timestamp = Utc::now().timestamp_millis() as u64 - 600_000;
        let header = sign(body, "secret", timestamp);

        assert!(verify_signature(&header, body, "secret").is_err());
    }

    #[test]
    fn rejects_malformed_headers() {
        for header in ["", "t=123", "v1=abc", "t=abc,v1=def,extra=1"] {
            assert!(verify_signature(header, "{}", "secret").is_err());
        }
    }
}
