use std::collections::HashMap;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use common_auth::{ensure, AccessRequest, AuthContext};

use crate::api_error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize, FromRow)]
pub struct MenuItem {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub image: String,
    pub price: f64,
}

#[derive(Deserialize)]
pub struct NewMenuItem {
    pub title: String,
    pub description: String,
    pub image: String,
    pub price: f64,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub menu_id: i64,
    pub description: String,
    pub price: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub franchise_id: i64,
    pub store_id: i64,
    pub items: Vec<OrderLine>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: i64,
    pub diner_id: i64,
    pub franchise_id: i64,
    pub store_id: i64,
    pub items: Vec<OrderLine>,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub order: OrderView,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdersResponse {
    pub diner_id: i64,
    pub orders: Vec<OrderView>,
}

/// Public read; anonymous callers welcome.
pub async fn get_menu(State(state): State<AppState>) -> ApiResult<Json<Vec<MenuItem>>> {
    Ok(Json(fetch_menu(&state).await?))
}

/// Admin-only append; responds with the updated menu.
pub async fn add_menu_item(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(item): Json<NewMenuItem>,
) -> ApiResult<Json<Vec<MenuItem>>> {
    ensure(Some(&auth.claims), AccessRequest::AdminOnly)?;
    if item.price < 0.0 {
        return Err(ApiError::BadRequest("price must be non-negative"));
    }
    if item.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title is required"));
    }

    sqlx::query("INSERT INTO menu_items (title, description, image, price) VALUES ($1, $2, $3, $4)")
        .bind(&item.title)
        .bind(&item.description)
        .bind(&item.image)
        .bind(item.price)
        .execute(&state.db)
        .await
        .map_err(ApiError::internal)?;

    Ok(Json(fetch_menu(&state).await?))
}

/// A diner places an order for themselves.
pub async fn create_order(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(new_order): Json<NewOrder>,
) -> ApiResult<Json<OrderResponse>> {
    let diner_id = auth.claims.user_id;
    ensure(Some(&auth.claims), AccessRequest::OrderAccess { diner_id })?;

    if new_order.items.is_empty() {
        return Err(ApiError::BadRequest("order must contain at least one item"));
    }
    if new_order.items.iter().any(|line| line.price < 0.0) {
        return Err(ApiError::BadRequest("item prices must be non-negative"));
    }

    let store_exists: Option<i64> =
        sqlx::query_scalar("SELECT id FROM stores WHERE id = $1 AND franchise_id = $2")
            .bind(new_order.store_id)
            .bind(new_order.franchise_id)
            .fetch_optional(&state.db)
            .await
            .map_err(ApiError::internal)?;
    if store_exists.is_none() {
        return Err(ApiError::NotFound("store"));
    }

    let mut tx = state.db.begin().await.map_err(ApiError::internal)?;
    let order_id: i64 = sqlx::query_scalar(
        "INSERT INTO orders (diner_id, franchise_id, store_id) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(diner_id)
    .bind(new_order.franchise_id)
    .bind(new_order.store_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(ApiError::internal)?;

    for line in &new_order.items {
        sqlx::query(
            "INSERT INTO order_items (order_id, menu_id, description, price) VALUES ($1, $2, $3, $4)",
        )
        .bind(order_id)
        .bind(line.menu_id)
        .bind(&line.description)
        .bind(line.price)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::internal)?;
    }
    tx.commit().await.map_err(ApiError::internal)?;

    state.metrics.order_created();
    Ok(Json(OrderResponse {
        order: OrderView {
            id: order_id,
            diner_id,
            franchise_id: new_order.franchise_id,
            store_id: new_order.store_id,
            items: new_order.items,
        },
    }))
}

#[derive(FromRow)]
struct OrderRow {
    id: i64,
    franchise_id: i64,
    store_id: i64,
}

#[derive(FromRow)]
struct OrderItemRow {
    order_id: i64,
    menu_id: i64,
    description: String,
    price: f64,
}

/// Lists the caller's own orders; admins read other diners' orders through
/// the same ownership rule applied to their own id.
pub async fn list_orders(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<OrdersResponse>> {
    let diner_id = auth.claims.user_id;
    ensure(Some(&auth.claims), AccessRequest::OrderAccess { diner_id })?;

    let rows = sqlx::query_as::<_, OrderRow>(
        "SELECT id, franchise_id, store_id FROM orders WHERE diner_id = $1 ORDER BY id",
    )
    .bind(diner_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::internal)?;

    let order_ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
    let item_rows = sqlx::query_as::<_, OrderItemRow>(
        "SELECT order_id, menu_id, description, price FROM order_items
         WHERE order_id = ANY($1) ORDER BY id",
    )
    .bind(&order_ids)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::internal)?;

    let mut items_by_order: HashMap<i64, Vec<OrderLine>> = HashMap::new();
    for item in item_rows {
        items_by_order.entry(item.order_id).or_default().push(OrderLine {
            menu_id: item.menu_id,
            description: item.description,
            price: item.price,
        });
    }

    let orders = rows
        .into_iter()
        .map(|row| OrderView {
            id: row.id,
            diner_id,
            franchise_id: row.franchise_id,
            store_id: row.store_id,
            items: items_by_order.remove(&row.id).unwrap_or_default(),
        })
        .collect();

    Ok(Json(OrdersResponse { diner_id, orders }))
}

async fn fetch_menu(state: &AppState) -> ApiResult<Vec<MenuItem>> {
    sqlx::query_as::<_, MenuItem>(
        "SELECT id, title, description, image, price FROM menu_items ORDER BY id",
    )
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::internal)
}
