use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::auth::CurrentUser;
use super::{
    ApiError, ApiKeyResponse, ApiResponse, AppState, MessageResponse, SummaryQuery,
    UpdateEmailRequest,
};
use crate::access::Row;
use crate::gate::Role;
use crate::services::user_service::{CreateUserRequest, CreatedUser, UserSummary};

pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<Row>>>, ApiError> {
    let users = state.users().list_users().await?;
    Ok(Json(ApiResponse::success(users.as_ref().clone())))
}

/// `GET /users/summary?min_age=40`
pub async fn user_summary(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<ApiResponse<UserSummary>>, ApiError> {
    let min_age = match query.min_age {
        Some(age) => age,
        None => state.config().read().await.access.older_than_age,
    };

    let summary = state.users().summary(min_age).await?;
    Ok(Json(ApiResponse::success(summary)))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Row>>, ApiError> {
    let user = state.users().get_user(&id).await?;
    Ok(Json(ApiResponse::success(user)))
}

/// `PUT /users/{id}/email`, allowed for the account owner and admins.
pub async fn update_email(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateEmailRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    if current.0.id != id && !current.role().satisfies(Role::Admin) {
        return Err(ApiError::forbidden("You can only change your own email"));
    }

    state.users().update_email(&id, &payload.email).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Email updated",
    ))))
}

/// `DELETE /users/me`
pub async fn delete_me(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.messaging().delete_account(&user).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(format!(
        "Account '{}' deleted",
        user.username
    )))))
}

/// `POST /users/me/api-key`
///
/// Replaces the caller's API key; the old key stops working immediately.
pub async fn regenerate_api_key(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<ApiKeyResponse>>, ApiError> {
    let api_key = state
        .store()
        .users()
        .regenerate_api_key(&user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", &user.id))?;

    tracing::info!(user = %user.username, "API key regenerated");

    Ok(Json(ApiResponse::success(ApiKeyResponse { api_key })))
}

/// `POST /admin/users`
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedUser>>), ApiError> {
    let created = state.users().create_user(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// `DELETE /admin/users/{id}`
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let user = state
        .store()
        .users()
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", &id))?;

    state.messaging().delete_account(&user).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(format!(
        "Account '{}' deleted",
        user.username
    )))))
}
