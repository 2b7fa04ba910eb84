use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use common_auth::{ensure, AccessRequest, AuthContext, Claims, RoleAssignment};

use crate::api_error::{on_unique_violation, ApiError, ApiResult};
use crate::auth_handlers::{
    hash_password, issue_token, load_role_assignments, normalize_email, AuthResponse,
    MessageResponse, UserRow,
};
use crate::AppState;

/// User identity as exposed over the API; never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub roles: Vec<RoleAssignment>,
}

impl From<Claims> for UserView {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.user_id,
            name: claims.name,
            email: claims.email,
            roles: claims.roles,
        }
    }
}

#[derive(Serialize)]
pub struct UsersResponse {
    pub users: Vec<UserView>,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    /// Role changes are admin-only and travel through this same operation.
    pub roles: Option<Vec<RoleAssignment>>,
}

/// Identity comes straight from the verified token; no store round trip on
/// this hot path, so claims are only as fresh as the last login or update.
pub async fn get_me(auth: AuthContext) -> Json<UserView> {
    Json(UserView::from(auth.into_claims()))
}

pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<UsersResponse>> {
    ensure(Some(&auth.claims), AccessRequest::AdminOnly)?;

    let rows = sqlx::query_as::<_, UserRow>(
        "SELECT id, name, email, password_hash FROM users ORDER BY id",
    )
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::internal)?;

    let mut users = Vec::with_capacity(rows.len());
    for row in rows {
        let roles = load_role_assignments(&state.db, row.id).await?;
        users.push(UserView {
            id: row.id,
            name: row.name,
            email: row.email,
            roles,
        });
    }

    Ok(Json(UsersResponse { users }))
}

/// Self-or-admin profile update. Changing email or password makes the old
/// token's claims stale, so a fresh token is issued and, when the caller
/// updated their own record, the presented token is revoked.
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<i64>,
    Json(body): Json<UpdateUserRequest>,
) -> ApiResult<Json<AuthResponse>> {
    ensure(Some(&auth.claims), AccessRequest::UserRecord { user_id })?;
    if body.roles.is_some() {
        ensure(Some(&auth.claims), AccessRequest::AdminOnly)?;
    }

    let target = sqlx::query_as::<_, UserRow>(
        "SELECT id, name, email, password_hash FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::internal)?
    .ok_or(ApiError::NotFound("user"))?;

    let name = body.name.unwrap_or(target.name);
    let email = body
        .email
        .map(|value| normalize_email(&value))
        .unwrap_or(target.email);
    let password_hash = match body.password {
        Some(password) if !password.is_empty() => {
            hash_password(&password).map_err(ApiError::internal)?
        }
        _ => target.password_hash,
    };

    let mut tx = state.db.begin().await.map_err(ApiError::internal)?;
    sqlx::query("UPDATE users SET name = $1, email = $2, password_hash = $3 WHERE id = $4")
        .bind(&name)
        .bind(&email)
        .bind(&password_hash)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|err| on_unique_violation(err, ApiError::DuplicateEmail))?;

    if let Some(roles) = &body.roles {
        // Every user keeps at least one role assignment.
        if roles.is_empty() {
            return Err(ApiError::BadRequest("at least one role is required"));
        }
        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        for grant in roles {
            sqlx::query(
                "INSERT INTO user_roles (user_id, role, object_id) VALUES ($1, $2, $3)
                 ON CONFLICT DO NOTHING",
            )
            .bind(user_id)
            .bind(grant.role.as_str())
            .bind(grant.object_id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        }
    }
    tx.commit().await.map_err(ApiError::internal)?;

    let roles = load_role_assignments(&state.db, user_id).await?;
    let issued = issue_token(&state, user_id, &name, &email, roles.clone())?;

    // Rotation: the stale identity in the presented token dies now. Tokens
    // held by other sessions of this user age out at natural expiry.
    if auth.claims.user_id == user_id {
        state
            .revocations
            .revoke(auth.claims.token_id, auth.claims.expires_at);
        state.metrics.token_revoked();
    }

    Ok(Json(AuthResponse {
        user: UserView {
            id: user_id,
            name,
            email,
            roles,
        },
        token: issued.token,
    }))
}

pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    ensure(Some(&auth.claims), AccessRequest::AdminOnly)?;

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&state.db)
        .await
        .map_err(ApiError::internal)?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("user"));
    }

    info!(user_id, deleted_by = auth.claims.user_id, "user deleted");
    Ok(Json(MessageResponse {
        message: "user deleted",
    }))
}
