//! Entry point: load config, wire dependencies, and run the server.

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vidauth::auth::TokenService;
use vidauth::config::Config;
use vidauth::db::{self, PgUserStore};
use vidauth::upload::CloudinaryUploader;
use vidauth::{create_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("config: {}", e))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let db_pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    db::run_migrations(&db_pool).await?;
    let store = Arc::new(PgUserStore::new(db_pool));
    let tokens = TokenService::new(store.clone(), config.tokens.clone());
    let uploader = Arc::new(CloudinaryUploader::new(config.cloudinary.clone())?);

    let state = AppState::new(store, tokens, uploader, config.upload_dir.clone());

    let app = create_app(state)
        .layer(cors_layer(&config.cors_origin)?)
        .layer(TraceLayer::new_for_http());

    tracing::info!(addr = %config.server_addr, "listening");
    let listener = tokio::net::TcpListener::bind(config.server_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Cookies need credentialed CORS, which forbids a wildcard origin; `*` falls back
/// to an uncredentialed policy.
fn cors_layer(origin: &str) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    if origin == "*" {
        return Ok(layer.allow_origin(Any));
    }
    Ok(layer
        .allow_origin(HeaderValue::from_str(origin)?)
        .allow_credentials(true))
}
