use extuser::{
    config::{validate_production_config, SessionConfig, Settings},
    db,
    middleware::add_security_headers,
    routes::app_router,
    services::create_email_service,
    AppState,
};

use axum::middleware;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tower_sessions_sqlx_store::SqliteStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often expired password reset tokens are purged.
const TOKEN_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "extuser=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;
    validate_production_config(&settings)?;

    match &settings.site {
        Some(site) => tracing::info!("Serving site {} ({})", site.name, site.domain),
        None => tracing::warn!("SITE_DOMAIN not set; confirmation emails will not be sent"),
    }

    // Database connection
    let pool = db::create_pool(&settings.database_url).await?;

    // Run migrations
    db::run_migrations(&pool).await?;

    let email_service = Arc::from(create_email_service(settings.smtp.as_ref()));
    let app_state = AppState::new(pool.clone(), &settings, email_service);

    spawn_token_cleanup(app_state.clone());

    // Session store
    let session_store = SqliteStore::new(pool.clone()).with_table_name("sessions")?;
    session_store.migrate().await?;

    let session_layer = SessionConfig::for_settings(&settings).create_layer(session_store);

    let app = app_router(app_state)
        .nest_service("/static", ServeDir::new("static"))
        .layer(session_layer)
        .layer(middleware::from_fn_with_state(
            settings.is_production(),
            add_security_headers,
        ))
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from((settings.host.parse::<std::net::IpAddr>()?, settings.port));

    tracing::info!("Server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn spawn_token_cleanup(state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TOKEN_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            match state.password_reset_service.cleanup_expired_tokens().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!("Removed {} expired password reset tokens", removed),
                Err(e) => tracing::warn!("Password reset token cleanup failed: {}", e),
            }
        }
    });
}
