use std::sync::{Arc, Mutex};

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use washhub::config::AppConfig;
use washhub::db;
use washhub::handlers;
use washhub::services::notify::webhook::WebhookNotifier;
use washhub::services::notify::{NoopNotifier, TransitionNotifier};
use washhub::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let notifier: Box<dyn TransitionNotifier> = if config.webhook_url.is_empty() {
        tracing::info!("no webhook endpoint configured, transitions stay local");
        Box::new(NoopNotifier)
    } else {
        tracing::info!("delivering transition webhooks to {}", config.webhook_url);
        Box::new(WebhookNotifier::new(
            config.webhook_url.clone(),
            config.webhook_secret.clone(),
        ))
    };

    let (events_tx, _) = broadcast::channel(256);

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        notifier,
        events_tx,
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route("/api/bookings/:id", get(handlers::bookings::get_booking))
        .route(
            "/api/bookings/:id/cancel",
            post(handlers::bookings::cancel_booking),
        )
        .route(
            "/api/users/:user_id/bookings",
            get(handlers::bookings::user_bookings),
        )
        .route("/api/washer/claim", post(handlers::washer::claim))
        .route("/api/washer/verify-pin", post(handlers::washer::verify_pin))
        .route(
            "/api/washer/available",
            get(handlers::washer::available_bookings),
        )
        .route(
            "/api/washer/:worker_id/bookings",
            get(handlers::washer::assigned_bookings),
        )
        .route("/api/admin/status", get(handlers::admin::get_status))
        .route("/api/admin/bookings", get(handlers::admin::get_bookings))
        .route(
            "/api/admin/bookings/:id/cancel",
            post(handlers::admin::cancel_booking),
        )
        .route("/api/admin/activity", get(handlers::admin::get_activity))
        .route(
            "/api/admin/washers/suspended",
            get(handlers::admin::get_suspended_washers),
        )
        .route(
            "/api/admin/washers/suspend",
            post(handlers::admin::suspend_washer),
        )
        .route(
            "/api/admin/washers/reinstate",
            post(handlers::admin::reinstate_washer),
        )
        .route("/api/events", get(handlers::events::events_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
