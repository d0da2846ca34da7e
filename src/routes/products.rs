use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};

use crate::{
    AppState,
    error::{AppError, Result},
    models::{Product, ProductRequest},
    queries::product_queries,
    utils::extractors::{AppJson, AppPath},
};

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Product {} not found", id))
}

pub async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    let products = product_queries::list(&state.db).await?;

    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<Product>> {
    let product = product_queries::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| not_found(id))?;

    Ok(Json(product))
}

pub async fn create_product(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ProductRequest>,
) -> Result<impl IntoResponse> {
    let new_product = payload.validate()?;
    let product = product_queries::create(&state.db, &new_product).await?;

    tracing::info!(id = product.id, "Created product");

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/api/products/{}", product.id))],
        Json(product),
    ))
}

pub async fn update_product(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(payload): AppJson<ProductRequest>,
) -> Result<Json<Product>> {
    let changes = payload.validate()?;
    let product = product_queries::update(&state.db, id, &changes)
        .await?
        .ok_or_else(|| not_found(id))?;

    tracing::info!(id, "Updated product");

    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode> {
    if !product_queries::delete(&state.db, id).await? {
        return Err(not_found(id));
    }

    tracing::info!(id, "Deleted product");

    Ok(StatusCode::NO_CONTENT)
}
