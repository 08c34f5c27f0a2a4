use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::instrument;

use super::dto::{AuthResponse, AuthResult, LoginRequest, RegisterRequest};
use crate::{error::AppResult, extract::ApiJson, state::AppState};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let req = payload.validate()?;
    let AuthResult { user, token } = state.auth.register(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User registered successfully",
            user,
            token,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let req = payload.validate()?;
    let AuthResult { user, token } = state.auth.login(req).await?;
    Ok(Json(AuthResponse {
        message: "Login successful",
        user,
        token,
    }))
}
