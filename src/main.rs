mod billing;
mod config;
mod email;
mod guest_import;
mod jobs;
mod middleware;
mod models;
mod prompts;
mod ratelimit;
mod routes;

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::web;
use async_openai::config::OpenAIConfig;
use chrono::Utc;
use moka::future::Cache;
use shuttle_actix_web::ShuttleActixWeb;
use shuttle_runtime::{CustomError, SecretStore};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::error;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use config::AppConfig;

use crate::email::LoopsClient;
use crate::models::Attribution;
use crate::ratelimit::RateLimiter;

pub struct AppState {
    pub pool: PgPool,
    pub stripe_client: stripe::Client,
    pub oai_client: async_openai::Client<OpenAIConfig>,
    pub email: LoopsClient,
    pub slug_cache: Cache<String, bool>,
    pub attribution_cache: Cache<String, Attribution>,
    pub rsvp_limiter: RateLimiter,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::wedding::check_slug,
        routes::rsvp::public_wedding,
        routes::rsvp::submit_rsvp,
    ),
    components(schemas(
        routes::wedding::SlugCheckResponse,
        routes::rsvp::PublicWeddingResponse,
        routes::rsvp::RsvpSubmission,
        routes::rsvp::RsvpSubmissionResponse,
        crate::models::guest::RsvpEntry,
        crate::models::guest::RsvpStatus,
    ))
)]
struct ApiDoc;

#[shuttle_runtime::main]
async fn main(
    #[shuttle_runtime::Secrets] secret_store: SecretStore,
) -> ShuttleActixWeb<impl FnOnce(&mut web::ServiceConfig) + Send + Clone + 'static> {
    let app_config = Arc::new(AppConfig::new(&secret_store)?);

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&app_config.database_url)
        .await
        .map_err(CustomError::new)?;

    sqlx::migrate!().run(&pool).await.map_err(CustomError::new)?;

    let app_state = Arc::new(AppState {
        pool: pool.clone(),
        stripe_client: stripe::Client::new(app_config.stripe_secret_key.clone()),
        oai_client: async_openai::Client::with_config(
            OpenAIConfig::new().with_api_key(app_config.openai_api_key.clone()),
        ),
        email: LoopsClient::new(app_config.loops_api_key.clone()),
        slug_cache: Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(300))
            .build(),
        attribution_cache: Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(3600))
            .build(),
        rsvp_limiter: RateLimiter::new(10, Duration::from_secs(60)),
    });

    // Daily trial-lifecycle sweep (reminders, expiry emails, trial→expired).
    let scheduler = JobScheduler::new().await.map_err(CustomError::new)?;
    {
        let pool = pool.clone();
        let email = LoopsClient::new(app_config.loops_api_key.clone());
        let config = app_config.clone();
        let job = Job::new_async("0 0 14 * * *", move |_uuid, _lock| {
            let pool = pool.clone();
            let email = email.clone();
            let config = config.clone();
            Box::pin(async move {
                if let Err(e) = jobs::run_trial_lifecycle(&pool, &email, &config, Utc::now()).await
                {
                    error!("Trial lifecycle job failed: {:?}", e);
                }
            })
        })
        .map_err(CustomError::new)?;
        scheduler.add(job).await.map_err(CustomError::new)?;
    }
    scheduler.start().await.map_err(CustomError::new)?;

    let config = move |cfg: &mut web::ServiceConfig| {
        let cors = Cors::default()
            .allowed_origin(&app_config.app_url)
            .allow_any_header()
            .allow_any_method()
            .supports_credentials()
            .max_age(3600);

        cfg.app_data(web::Data::new(app_state.clone()));
        cfg.app_data(web::Data::new(app_config.clone()));

        cfg.service(Scalar::with_url("/scalar", ApiDoc::openapi()));

        cfg.service(
            web::scope("")
                .wrap(cors)
                .wrap(middleware::auth::Authentication {
                    app_config: app_config.clone(),
                })
                .service(routes::wedding::check_slug)
                .service(
                    web::scope("/auth")
                        .service(routes::auth::auth_callback)
                        .service(routes::auth::get_user),
                )
                .service(web::scope("/webhooks").service(routes::signup_webhook::user_created))
                .service(web::scope("/stripe").service(routes::stripe_webhook::stripe_webhook))
                .service(
                    web::scope("/pay")
                        .service(routes::pay::invite)
                        .service(routes::pay::payment_success)
                        .service(routes::pay::checkout)
                        .service(routes::pay::portal),
                )
                .service(web::scope("/billing").service(routes::billing::status))
                .service(
                    web::scope("/weddings")
                        .service(routes::wedding::my_wedding)
                        .service(routes::wedding::create_wedding)
                        .service(routes::wedding::update_wedding),
                )
                .service(
                    web::scope("/guests")
                        .service(routes::guest::import_guests)
                        .service(routes::guest::list_guests)
                        .service(routes::guest::create_guest)
                        .service(routes::guest::update_guest)
                        .service(routes::guest::delete_guest),
                )
                .service(
                    web::scope("/budget")
                        .service(routes::budget::summary)
                        .service(routes::budget::list_items)
                        .service(routes::budget::create_item)
                        .service(routes::budget::update_item)
                        .service(routes::budget::delete_item),
                )
                .service(
                    web::scope("/vendors")
                        .service(routes::vendor::list_vendors)
                        .service(routes::vendor::create_vendor)
                        .service(routes::vendor::update_vendor)
                        .service(routes::vendor::delete_vendor),
                )
                .service(
                    web::scope("/rsvp")
                        .service(routes::rsvp::get_settings)
                        .service(routes::rsvp::update_settings)
                        .service(routes::rsvp::household)
                        .service(routes::rsvp::public_wedding)
                        .service(routes::rsvp::submit_rsvp),
                )
                .service(
                    web::scope("/prefs")
                        .service(routes::prefs::get_preference)
                        .service(routes::prefs::set_preference),
                )
                .service(web::scope("/vows").service(routes::vows::generate_vows)),
        );
    };

    Ok(config.into())
}
