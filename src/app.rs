use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
};
use sqlx::SqlitePool;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{config::AppConfig, database, error::Result, routes, utils::jwt::JwtKeys};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub jwt: Arc<JwtKeys>,
}

pub async fn build(config: &AppConfig) -> Result<Router> {
    let pool = database::create_pool(&config.database).await?;
    build_with_pool(config, pool)
}

pub fn build_with_pool(config: &AppConfig, pool: SqlitePool) -> Result<Router> {
    let state = AppState {
        db: pool,
        jwt: Arc::new(JwtKeys::new(&config.auth)),
    };

    let app = routes::create_router(config, &state)
        .layer(DefaultBodyLimit::max(config.server.max_body_size))
        .layer(cors_layer(config)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

fn cors_layer(config: &AppConfig) -> Result<CorsLayer> {
    let origin = if config.cors.allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        let origins = config
            .cors
            .allowed_origins
            .iter()
            .map(|origin| {
                origin.parse::<HeaderValue>().map_err(|_| {
                    crate::error::AppError::ConfigError(format!("Invalid CORS origin: {}", origin))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_origin(origin))
}
