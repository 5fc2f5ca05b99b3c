//! # Vitrine API Server
//!
//! The HTTP surface for the vitrine credential core: registration, login,
//! email verification, password reset, profile self-service, and admin
//! user management.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p vitrine-api
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vitrine_api::{
    app::{build_router, AppState},
    config::Config,
};
use vitrine_core::auth::AuthService;
use vitrine_core::db::{create_pool, run_migrations};
use vitrine_core::email::SmtpEmailSender;
use vitrine_core::store::{PgSessionStore, PgTokenStore, PgUserStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "vitrine_api=debug,vitrine_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Vitrine API server v{} starting", vitrine_core::VERSION);

    let config = Config::from_env()?;

    let pool = create_pool(config.database.clone()).await?;
    run_migrations(&pool).await?;

    let users = Arc::new(PgUserStore::new(pool.clone()));
    let sessions = Arc::new(PgSessionStore::new(pool.clone()));
    let tokens = Arc::new(PgTokenStore::new(pool.clone()));
    let mailer = Arc::new(SmtpEmailSender::new(&config.smtp)?);

    let auth = Arc::new(AuthService::new(
        users.clone(),
        sessions,
        tokens,
        mailer,
        config.auth.clone(),
    ));

    // Periodic sweep for expired sessions and dead tokens; the lazy paths
    // only clean rows they happen to touch.
    let sweeper = auth.clone();
    let sweep_interval = Duration::from_secs(config.sweep_interval_seconds);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        // The first tick fires immediately; skip it so startup stays quick.
        interval.tick().await;
        loop {
            interval.tick().await;
            if let Err(e) = sweeper.purge_expired().await {
                tracing::warn!(error = %e, "expired credential sweep failed");
            }
        }
    });

    let state = AppState::new(auth, users, Some(pool));
    let app = build_router(state);

    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("server listening on http://{bind_address}");

    axum::serve(listener, app).await?;

    Ok(())
}
