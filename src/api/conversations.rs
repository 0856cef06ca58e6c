use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::auth::CurrentUser;
use super::{ApiError, ApiResponse, AppState, CreateConversationRequest, ReplyRequest};
use crate::services::messaging_service::{
    ConversationDetail, ConversationSummary, MessageFilter, MessageView, Page,
};

pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<Vec<ConversationSummary>>>, ApiError> {
    let conversations = state.messaging().list_conversations(&user).await?;
    Ok(Json(ApiResponse::success(conversations)))
}

pub async fn create_conversation(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ConversationDetail>>), ApiError> {
    let conversation = state
        .messaging()
        .create_conversation(&user, payload.participant_ids)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(conversation))))
}

pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ConversationDetail>>, ApiError> {
    let conversation = state.messaging().get_conversation(&user, &id).await?;
    Ok(Json(ApiResponse::success(conversation)))
}

/// `GET /conversations/{id}/messages`
pub async fn list_conversation_messages(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Query(mut filter): Query<MessageFilter>,
) -> Result<Json<ApiResponse<Page<MessageView>>>, ApiError> {
    // Distinguish a missing conversation from one the caller cannot see.
    state.messaging().get_conversation(&user, &id).await?;

    filter.conversation_id = Some(id);
    let page = state.messaging().list_messages(&user, filter).await?;
    Ok(Json(ApiResponse::success(page)))
}

/// `POST /conversations/{id}/messages`
pub async fn send_to_conversation(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<ReplyRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MessageView>>), ApiError> {
    let message = state
        .messaging()
        .send_message(
            &user,
            &id,
            &payload.body,
            payload.parent_message_id.as_deref(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(message))))
}
