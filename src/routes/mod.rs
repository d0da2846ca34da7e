mod health;
mod login;
mod products;
mod provider_states;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::{AppState, config::AppConfig, error::AppError, middleware::auth_middleware};

pub fn create_router(config: &AppConfig, state: &AppState) -> Router<AppState> {
    let mut product_routes = Router::new()
        .route(
            "/api/products",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/api/products/{id}",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        );

    if config.auth.enabled {
        product_routes = product_routes.route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));
    }

    let mut router = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/api/login", post(login::login_user))
        .merge(product_routes)
        .fallback(fallback);

    if config.server.provider_states_enabled {
        tracing::warn!("Provider state endpoint enabled, do not use in production");
        router = router.route("/provider-states", post(provider_states::setup_state));
    }

    router
}

async fn fallback() -> AppError {
    AppError::NotFound("Resource not found".to_string())
}
