use axum::{Json, extract::State};

use crate::{
    AppState,
    error::Result,
    models::{AuthResponse, LoginRequest},
    services::auth_service,
    utils::extractors::AppJson,
};

pub async fn login_user(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let response = auth_service::login(&state.jwt, &payload)?;

    Ok(Json(response))
}
