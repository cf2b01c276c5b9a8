use saas_api::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
    storage::{S3StorageClient, StorageService, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Pretty output locally, one JSON object per line in production.
fn init_tracing(env: &Env) {
    // RUST_LOG wins; otherwise debug for this crate so permission denials show up.
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "saas_api=debug,tower_http=info".into());

    let registry = tracing_subscriber::registry().with(env_filter);
    match env {
        Env::Local => registry.with(tracing_subscriber::fmt::layer().pretty()).init(),
        Env::Production => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

/// MinIO locally (bucket provisioned on boot), Cloudflare R2 in production.
async fn init_storage(config: &AppConfig) -> StorageState {
    let client = S3StorageClient::new(
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_key,
        &config.s3_secret,
        &config.s3_bucket,
        &config.bucket_public_url,
    )
    .await;

    if config.env == Env::Local {
        client.ensure_bucket_exists().await;
    }

    Arc::new(client) as StorageState
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {:?}", e);
    }
    tracing::info!("shutdown signal received, draining connections");
}

/// main
///
/// Configuration first (fail-fast), then logging, Postgres, object storage and the
/// HTTP server.
#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    init_tracing(&config.env);
    tracing::info!("Application starting in {:?} mode", config.env);

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;
    let storage = init_storage(&config).await;

    let addr = format!("0.0.0.0:{}", config.port);
    let app = create_router(AppState {
        repo,
        storage,
        config,
    });

    let listener = TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("FATAL: Failed to bind {addr}: {e}"));

    tracing::info!("Listening on {}", addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("HTTP server error: {:?}", e);
    }
}
