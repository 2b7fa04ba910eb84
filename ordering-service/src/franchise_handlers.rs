use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::info;

use common_auth::{ensure, AccessRequest, AuthContext, ROLE_FRANCHISEE};

use crate::api_error::{on_unique_violation, ApiError, ApiResult};
use crate::auth_handlers::MessageResponse;
use crate::AppState;

#[derive(Debug, Serialize, FromRow)]
pub struct FranchiseAdmin {
    pub id: i64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: i64,
    pub franchise_id: i64,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct Franchise {
    pub id: i64,
    pub name: String,
    pub admins: Vec<FranchiseAdmin>,
    pub stores: Vec<Store>,
}

/// Listing shape for the unscoped public search: no admin identities.
#[derive(Debug, Serialize)]
pub struct FranchiseListing {
    pub id: i64,
    pub name: String,
    pub stores: Vec<Store>,
}

#[derive(Serialize)]
pub struct FranchisesResponse {
    pub franchises: Vec<FranchiseListing>,
}

#[derive(Deserialize)]
pub struct NewFranchise {
    pub name: String,
    /// Each entry must resolve to a registered user.
    #[serde(default)]
    pub admins: Vec<AdminRef>,
}

#[derive(Deserialize)]
pub struct AdminRef {
    pub email: String,
}

#[derive(Deserialize)]
pub struct NewStore {
    pub name: String,
}

#[derive(Deserialize)]
pub struct FranchiseQuery {
    pub name: Option<String>,
}

pub async fn create_franchise(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<NewFranchise>,
) -> ApiResult<Json<Franchise>> {
    ensure(Some(&auth.claims), AccessRequest::AdminOnly)?;
    if body.name.trim().is_empty() {
        return Err(ApiError::BadRequest("franchise name is required"));
    }

    // Resolve every admin before writing anything; no silent partial create.
    let mut admins = Vec::with_capacity(body.admins.len());
    for admin_ref in &body.admins {
        let email = crate::auth_handlers::normalize_email(&admin_ref.email);
        let admin = sqlx::query_as::<_, FranchiseAdmin>(
            "SELECT id, name, email FROM users WHERE email = $1",
        )
        .bind(&email)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::UnknownUser(email))?;
        admins.push(admin);
    }

    let mut tx = state.db.begin().await.map_err(ApiError::internal)?;
    let franchise_id: i64 =
        sqlx::query_scalar("INSERT INTO franchises (name) VALUES ($1) RETURNING id")
            .bind(&body.name)
            .fetch_one(&mut *tx)
            .await
            .map_err(|err| on_unique_violation(err, ApiError::DuplicateFranchise))?;

    for admin in &admins {
        sqlx::query("INSERT INTO franchise_admins (franchise_id, user_id) VALUES ($1, $2)")
            .bind(franchise_id)
            .bind(admin.id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        // The admin gains a Franchisee grant scoped to this franchise.
        sqlx::query(
            "INSERT INTO user_roles (user_id, role, object_id) VALUES ($1, $2, $3)
             ON CONFLICT DO NOTHING",
        )
        .bind(admin.id)
        .bind(ROLE_FRANCHISEE)
        .bind(franchise_id)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::internal)?;
    }
    tx.commit().await.map_err(ApiError::internal)?;

    info!(franchise_id, name = %body.name, "franchise created");
    Ok(Json(Franchise {
        id: franchise_id,
        name: body.name,
        admins,
        stores: Vec::new(),
    }))
}

/// Unscoped search; open to anonymous callers.
pub async fn list_franchises(
    State(state): State<AppState>,
    Query(query): Query<FranchiseQuery>,
) -> ApiResult<Json<FranchisesResponse>> {
    let pattern = format!("%{}%", query.name.unwrap_or_default());

    #[derive(FromRow)]
    struct FranchiseRow {
        id: i64,
        name: String,
    }

    let rows = sqlx::query_as::<_, FranchiseRow>(
        "SELECT id, name FROM franchises WHERE name ILIKE $1 ORDER BY id",
    )
    .bind(&pattern)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::internal)?;

    let mut franchises = Vec::with_capacity(rows.len());
    for row in rows {
        let stores = fetch_stores(&state.db, row.id).await?;
        franchises.push(FranchiseListing {
            id: row.id,
            name: row.name,
            stores,
        });
    }

    Ok(Json(FranchisesResponse { franchises }))
}

/// Franchises a user administers; readable by that user or an admin.
pub async fn user_franchises(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<Vec<Franchise>>> {
    ensure(Some(&auth.claims), AccessRequest::UserRecord { user_id })?;

    #[derive(FromRow)]
    struct FranchiseRow {
        id: i64,
        name: String,
    }

    let rows = sqlx::query_as::<_, FranchiseRow>(
        "SELECT f.id, f.name FROM franchises f
         JOIN franchise_admins fa ON fa.franchise_id = f.id
         WHERE fa.user_id = $1 ORDER BY f.id",
    )
    .bind(user_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::internal)?;

    let mut franchises = Vec::with_capacity(rows.len());
    for row in rows {
        franchises.push(Franchise {
            admins: fetch_admins(&state.db, row.id).await?,
            stores: fetch_stores(&state.db, row.id).await?,
            id: row.id,
            name: row.name,
        });
    }

    Ok(Json(franchises))
}

pub async fn delete_franchise(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(franchise_id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    ensure(Some(&auth.claims), AccessRequest::AdminOnly)?;

    let mut tx = state.db.begin().await.map_err(ApiError::internal)?;
    // Scoped Franchisee grants die with the franchise.
    sqlx::query("DELETE FROM user_roles WHERE role = $1 AND object_id = $2")
        .bind(ROLE_FRANCHISEE)
        .bind(franchise_id)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

    let result = sqlx::query("DELETE FROM franchises WHERE id = $1")
        .bind(franchise_id)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::internal)?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("franchise"));
    }
    tx.commit().await.map_err(ApiError::internal)?;

    info!(franchise_id, deleted_by = auth.claims.user_id, "franchise deleted");
    Ok(Json(MessageResponse {
        message: "franchise deleted",
    }))
}

pub async fn create_store(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(franchise_id): Path<i64>,
    Json(body): Json<NewStore>,
) -> ApiResult<Json<Store>> {
    ensure(
        Some(&auth.claims),
        AccessRequest::FranchiseWrite { franchise_id },
    )?;

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM franchises WHERE id = $1")
        .bind(franchise_id)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::internal)?;
    if exists.is_none() {
        return Err(ApiError::NotFound("franchise"));
    }

    let store = sqlx::query_as::<_, Store>(
        "INSERT INTO stores (franchise_id, name) VALUES ($1, $2)
         RETURNING id, franchise_id, name",
    )
    .bind(franchise_id)
    .bind(&body.name)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::internal)?;

    Ok(Json(store))
}

pub async fn delete_store(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((franchise_id, store_id)): Path<(i64, i64)>,
) -> ApiResult<Json<MessageResponse>> {
    ensure(
        Some(&auth.claims),
        AccessRequest::FranchiseWrite { franchise_id },
    )?;

    let result = sqlx::query("DELETE FROM stores WHERE id = $1 AND franchise_id = $2")
        .bind(store_id)
        .bind(franchise_id)
        .execute(&state.db)
        .await
        .map_err(ApiError::internal)?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("store"));
    }

    Ok(Json(MessageResponse {
        message: "store deleted",
    }))
}

async fn fetch_stores(pool: &PgPool, franchise_id: i64) -> ApiResult<Vec<Store>> {
    sqlx::query_as::<_, Store>(
        "SELECT id, franchise_id, name FROM stores WHERE franchise_id = $1 ORDER BY id",
    )
    .bind(franchise_id)
    .fetch_all(pool)
    .await
    .map_err(ApiError::internal)
}

async fn fetch_admins(pool: &PgPool, franchise_id: i64) -> ApiResult<Vec<FranchiseAdmin>> {
    sqlx::query_as::<_, FranchiseAdmin>(
        "SELECT u.id, u.name, u.email FROM users u
         JOIN franchise_admins fa ON fa.user_id = u.id
         WHERE fa.franchise_id = $1 ORDER BY u.id",
    )
    .bind(franchise_id)
    .fetch_all(pool)
    .await
    .map_err(ApiError::internal)
}
