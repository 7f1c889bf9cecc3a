use anyhow::anyhow;
use shuttle_runtime::SecretStore;

#[derive(Clone)]
pub struct AppConfig {
    pub app_url: String,
    pub database_url: String,
    pub workos_api_key: String,
    pub workos_client_id: String,
    pub workos_webhook_secret: String,
    pub jwt_secret: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_price_monthly: String,
    pub stripe_price_yearly: String,
    pub loops_api_key: String,
    pub loops_trial_reminder_id: String,
    pub loops_trial_expired_id: String,
    pub openai_api_key: String,
}

impl AppConfig {
    pub fn new(secret_store: &SecretStore) -> Result<Self, anyhow::Error> {
        let app_url = secret_store
            .get("APP_URL")
            .ok_or_else(|| anyhow!("APP_URL not found"))?;

        let database_url = secret_store
            .get("DATABASE_URL")
            .ok_or_else(|| anyhow!("DATABASE_URL not found"))?;

        let workos_api_key = secret_store
            .get("WORKOS_API_KEY")
            .ok_or_else(|| anyhow!("WORKOS_API_KEY not found"))?;

        let workos_client_id = secret_store
            .get("WORKOS_CLIENT_ID")
            .ok_or_else(|| anyhow!("WORKOS_CLIENT_ID not found"))?;

        let workos_webhook_secret = secret_store
            .get("WORKOS_WEBHOOK_SECRET")
            .ok_or_else(|| anyhow!("WORKOS_WEBHOOK_SECRET not found"))?;

        let jwt_secret = secret_store
            .get("JWT_SECRET")
            .ok_or_else(|| anyhow!("JWT_SECRET not found"))?;

        let stripe_secret_key = secret_store
            .get("STRIPE_SECRET_KEY")
            .ok_or_else(|| anyhow!("STRIPE_SECRET_KEY not found"))?;

        let stripe_webhook_secret = secret_store
            .get("STRIPE_WEBHOOK_SECRET")
            .ok_or_else(|| anyhow!("STRIPE_WEBHOOK_SECRET not found"))?;

        let stripe_price_monthly = secret_store
            .get("STRIPE_PRICE_MONTHLY")
            .ok_or_else(|| anyhow!("STRIPE_PRICE_MONTHLY not found"))?;

        let stripe_price_yearly = secret_store
            .get("STRIPE_PRICE_YEARLY")
            .ok_or_else(|| anyhow!("STRIPE_PRICE_YEARLY not found"))?;

        let loops_api_key = secret_store
            .get("LOOPS_API_KEY")
            .ok_or_else(|| anyhow!("LOOPS_API_KEY not found"))?;

        let loops_trial_reminder_id = secret_store
            .get("LOOPS_TRIAL_REMINDER_ID")
            .ok_or_else(|| anyhow!("LOOPS_TRIAL_REMINDER_ID not found"))?;

        let loops_trial_expired_id = secret_store
            .get("LOOPS_TRIAL_EXPIRED_ID")
            .ok_or_else(|| anyhow!("LOOPS_TRIAL_EXPIRED_ID not found"))?;

        let openai_api_key = secret_store
            .get("OPENAI_API_KEY")
            .ok_or_else(|| anyhow!("OPENAI_API_KEY not found"))?;

        Ok(AppConfig {
            app_url,
            database_url,
            workos_api_key,
            workos_client_id,
            workos_webhook_secret,
            jwt_secret,
            stripe_secret_key,
            stripe_webhook_secret,
            stripe_price_monthly,
            stripe_price_yearly,
            loops_api_key,
            loops_trial_reminder_id,
            loops_trial_expired_id,
            openai_api_key,
        })
    }
}
