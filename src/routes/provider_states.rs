use axum::{Json, extract::State};

use crate::{
    AppState, error::Result, models::ProviderStateRequest, services::fixture_service,
    utils::extractors::AppJson,
};

/// Seeds fixture data before the verifier replays an interaction.
pub async fn setup_state(
    State(state): State<AppState>,
    AppJson(request): AppJson<ProviderStateRequest>,
) -> Result<Json<String>> {
    tracing::info!(state = %request.state, action = ?request.action, "Provider state requested");

    fixture_service::apply(&state.db, &request).await?;

    Ok(Json(request.state))
}
