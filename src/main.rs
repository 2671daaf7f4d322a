use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use inquiry_crm_api::config::Config;
use inquiry_crm_api::db::Database;
use inquiry_crm_api::handlers::{router, AppState};
use inquiry_crm_api::lead_store::PgLeadStore;

/// Starts the inquiry intake and lead CRM service.
///
/// Initializes tracing, loads configuration, connects to Postgres and applies
/// migrations, then serves the HTTP routes.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inquiry_crm_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");
    db.migrate().await?;

    let port = config.port;
    let app_state = Arc::new(AppState::new(PgLeadStore::new(db.pool.clone()), config));

    let app = router(app_state, true)?
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
