use std::sync::Arc;

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::Router;
use sqlx::PgPool;

use common_auth::{RevocationRegistry, TokenCodec};

use crate::auth_handlers::{login, logout, register};
use crate::config::ServiceConfig;
use crate::franchise_handlers::{
    create_franchise, create_store, delete_franchise, delete_store, list_franchises,
    user_franchises,
};
use crate::metrics::OrderingMetrics;
use crate::order_handlers::{add_menu_item, create_order, get_menu, list_orders};
use crate::user_handlers::{delete_user, get_me, list_users, update_user};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub codec: Arc<TokenCodec>,
    pub revocations: Arc<dyn RevocationRegistry>,
    pub config: Arc<ServiceConfig>,
    pub metrics: Arc<OrderingMetrics>,
}

impl FromRef<AppState> for Arc<TokenCodec> {
    fn from_ref(state: &AppState) -> Self {
        state.codec.clone()
    }
}

impl FromRef<AppState> for Arc<dyn RevocationRegistry> {
    fn from_ref(state: &AppState) -> Self {
        state.revocations.clone()
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(error = %err, "Unable to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Full API surface; tests drive this router directly.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/auth", post(register).put(login).delete(logout))
        .route("/api/user/me", get(get_me))
        .route("/api/user", get(list_users))
        .route("/api/user/:id", put(update_user).delete(delete_user))
        .route("/api/order/menu", get(get_menu).put(add_menu_item))
        .route("/api/order", post(create_order).get(list_orders))
        .route("/api/franchise", post(create_franchise).get(list_franchises))
        // :id is the target user for GET and the franchise for DELETE.
        .route(
            "/api/franchise/:id",
            get(user_franchises).delete(delete_franchise),
        )
        .route("/api/franchise/:id/store", post(create_store))
        .route("/api/franchise/:id/store/:store_id", delete(delete_store))
        .with_state(state)
}
