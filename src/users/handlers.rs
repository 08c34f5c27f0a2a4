use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{
    Pagination, SearchResponse, SearchUsersQuery, UpdateProfileRequest, UpdateProfileResponse,
};
use crate::{
    auth::extractors::AuthUser,
    error::AppResult,
    extract::{ApiJson, ApiQuery},
    state::AppState,
};

pub fn users_routes() -> Router<AppState> {
    Router::new()
        .route("/users/search", get(search_users))
        .route("/users/profile", put(update_profile))
}

#[instrument(skip(state))]
pub async fn search_users(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SearchUsersQuery>,
) -> AppResult<Json<SearchResponse>> {
    let criteria = query.validate()?;
    let result = state.accounts.search_users(&criteria).await?;
    let pagination = Pagination::new(criteria.page, criteria.limit, result.total);

    info!(
        total = result.total,
        page = pagination.page,
        total_pages = pagination.total_pages,
        "search completed"
    );

    Ok(Json(SearchResponse {
        users: result.accounts.into_iter().map(Into::into).collect(),
        pagination,
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> AppResult<Json<UpdateProfileResponse>> {
    let update = payload.validate()?;
    let account = state.accounts.update_profile(user_id, update).await?;
    Ok(Json(UpdateProfileResponse {
        message: "Profile updated successfully",
        user: account.into(),
    }))
}
