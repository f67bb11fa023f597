use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub webhook_url: String,
    pub webhook_secret: String,
    pub cancellation_cutoff_hours: f64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "washhub.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            webhook_url: env::var("WEBHOOK_URL").unwrap_or_default(),
            webhook_secret: env::var("WEBHOOK_SECRET").unwrap_or_default(),
            cancellation_cutoff_hours: env::var("CANCELLATION_CUTOFF_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(12.0),
        }
    }
}
