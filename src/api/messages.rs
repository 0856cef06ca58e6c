use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::auth::CurrentUser;
use super::{
    ApiError, ApiResponse, AppState, EditMessageRequest, MessageResponse, SendMessageRequest,
};
use crate::services::messaging_service::{
    HistoryEntry, MessageFilter, MessageView, Page, ThreadNode, UnreadMessage,
};

/// `GET /messages?conversation_id=&sender=&sent_after=&sent_before=&page=&page_size=`
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<MessageFilter>,
) -> Result<Json<ApiResponse<Page<MessageView>>>, ApiError> {
    let page = state.messaging().list_messages(&user, filter).await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MessageView>>), ApiError> {
    let message = state
        .messaging()
        .send_message(
            &user,
            &payload.conversation_id,
            &payload.body,
            payload.parent_message_id.as_deref(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(message))))
}

pub async fn unread_messages(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<Vec<UnreadMessage>>>, ApiError> {
    let unread = state.messaging().unread_for_user(&user).await?;
    Ok(Json(ApiResponse::success(unread)))
}

pub async fn get_message(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<MessageView>>, ApiError> {
    let message = state.messaging().get_message(&user, &id).await?;
    Ok(Json(ApiResponse::success(message)))
}

pub async fn edit_message(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<EditMessageRequest>,
) -> Result<Json<ApiResponse<MessageView>>, ApiError> {
    let message = state
        .messaging()
        .edit_message(&user, &id, &payload.body)
        .await?;
    Ok(Json(ApiResponse::success(message)))
}

pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.messaging().delete_message(&user, &id).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(format!(
        "Message {id} deleted"
    )))))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.messaging().mark_as_read(&user, &id).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Message marked as read",
    ))))
}

pub async fn message_history(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<HistoryEntry>>>, ApiError> {
    let history = state.messaging().message_history(&user, &id).await?;
    Ok(Json(ApiResponse::success(history)))
}

pub async fn message_thread(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ThreadNode>>, ApiError> {
    let thread = state.messaging().thread(&user, &id).await?;
    Ok(Json(ApiResponse::success(thread)))
}
