mod config;

use std::sync::Arc;

use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use agora_api::auth::{AppState, AppStateInner};
use agora_api::router;
use agora_api::token::TokenService;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agora=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = agora_db::Database::open(&config.db_path, config.db_readers)?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        tokens: TokenService::new(
            &config.jwt_secret,
            chrono::Duration::minutes(config.token_ttl_minutes),
        ),
    });

    let app = router::build(state)
        .layer(cors_layer(&config.cors_origins)?)
        .layer(TraceLayer::new_for_http());

    let addr = config.addr()?;
    info!("agora listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    if origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }

    let origins = origins
        .iter()
        .map(|o| HeaderValue::from_str(o))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any))
}
