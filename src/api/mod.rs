use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::state::SharedState;

pub mod auth;
mod conversations;
mod error;
pub mod events;
pub mod gates;
mod messages;
mod notifications;
mod observability;
mod system;
pub mod types;
mod users;

pub use error::ApiError;
pub use types::*;

use tokio::sync::RwLock;

use crate::domain::MessagingEvent;
use crate::services::{MessagingService, UserService};
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn event_bus(&self) -> &tokio::sync::broadcast::Sender<MessagingEvent> {
        &self.shared.event_bus
    }

    #[must_use]
    pub fn messaging(&self) -> &Arc<dyn MessagingService> {
        &self.shared.messaging
    }

    #[must_use]
    pub fn users(&self) -> &Arc<dyn UserService> {
        &self.shared.users
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub async fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config().read().await.server.cors_allowed_origins.clone();

    let api_router = Router::new()
        .merge(create_protected_router(state.clone()))
        .route("/health", get(system::health))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            gates::rate_limit,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            observability::record_request,
        ))
        .layer(middleware::from_fn_with_state(state.clone(), auth::identify))
        .with_state(state);

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}

/// Routes that sit behind the chat access window.
fn create_chat_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/conversations",
            get(conversations::list_conversations).post(conversations::create_conversation),
        )
        .route("/conversations/{id}", get(conversations::get_conversation))
        .route(
            "/conversations/{id}/messages",
            get(conversations::list_conversation_messages)
                .post(conversations::send_to_conversation),
        )
        .route(
            "/messages",
            get(messages::list_messages).post(messages::send_message),
        )
        .route("/messages/unread", get(messages::unread_messages))
        .route(
            "/messages/{id}",
            get(messages::get_message)
                .patch(messages::edit_message)
                .delete(messages::delete_message),
        )
        .route("/messages/{id}/read", post(messages::mark_read))
        .route("/messages/{id}/history", get(messages::message_history))
        .route("/messages/{id}/thread", get(messages::message_thread))
        .route_layer(middleware::from_fn_with_state(state, gates::access_window))
}

fn create_admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/users", post(users::create_user))
        .route("/admin/users/{id}", delete(users::delete_user))
        .route_layer(middleware::from_fn(auth::require_admin))
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .merge(create_chat_router(state))
        .merge(create_admin_router())
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/{id}/read", post(notifications::mark_read))
        .route("/users", get(users::list_users))
        .route("/users/summary", get(users::user_summary))
        .route("/users/me", delete(users::delete_me))
        .route("/users/me/api-key", post(users::regenerate_api_key))
        .route("/users/{id}", get(users::get_user))
        .route("/users/{id}/email", put(users::update_email))
        .route("/system/status", get(system::get_status))
        .route("/metrics", get(observability::get_metrics))
        .merge(events::router())
        .route_layer(middleware::from_fn(auth::require_user))
}
