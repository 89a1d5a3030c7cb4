use serde::Deserialize;

use crate::auth::session::SESSION_TTL_DAYS;

/// Stripe connection settings. Absent entirely when billing is disabled.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeConfig {
    pub secret_key: String,
    pub api_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub app_name: String,
    /// Public origin of the app, used for checkout/portal return URLs.
    pub host_url: String,
    pub session_ttl_days: i64,
    /// OAuth providers accepted for connection signups.
    pub auth_providers: Vec<String>,
    pub stripe: Option<StripeConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let app_name = std::env::var("APP_NAME").unwrap_or_else(|_| "Launchbase".into());
        let host_url =
            std::env::var("HOST_URL").unwrap_or_else(|_| "http://localhost:8080".into());
        let session_ttl_days = std::env::var("SESSION_TTL_DAYS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(SESSION_TTL_DAYS);
        let auth_providers = std::env::var("AUTH_PROVIDERS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| vec!["github".into(), "google".into()]);

        // Billing is an explicit capability: no secret key means every
        // billing-dependent code path stays disabled.
        let stripe = std::env::var("STRIPE_SECRET_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .map(|secret_key| StripeConfig {
                secret_key,
                api_url: std::env::var("STRIPE_API_URL")
                    .unwrap_or_else(|_| "https://api.stripe.com".into()),
            });

        Ok(Self {
            database_url,
            app_name,
            host_url,
            session_ttl_days,
            auth_providers,
            stripe,
        })
    }

    pub fn billing_enabled(&self) -> bool {
        self.stripe.is_some()
    }
}
