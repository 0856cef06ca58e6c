use axum::{
    Json,
    extract::{Path, Query, State},
};
use std::sync::Arc;

use super::auth::CurrentUser;
use super::{ApiError, ApiResponse, AppState, MessageResponse, NotificationQuery};
use crate::services::messaging_service::NotificationView;

/// `GET /notifications?unread=true`
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<ApiResponse<Vec<NotificationView>>>, ApiError> {
    let notifications = state
        .messaging()
        .notifications(&user, query.unread)
        .await?;
    Ok(Json(ApiResponse::success(notifications)))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.messaging().mark_notification_read(&user, id).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Notification marked as read",
    ))))
}
