use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::extract::State;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use axum::Json;
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::warn;

use common_auth::{
    bearer_token, ensure, AccessRequest, Claims, IssuedToken, Role, RoleAssignment, TokenSubject,
};

use crate::api_error::{on_unique_violation, ApiError, ApiResult};
use crate::user_handlers::UserView;
use crate::AppState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Only honored when the caller is an authenticated admin; public
    /// registration always gets the default Diner role.
    #[serde(default)]
    pub roles: Vec<RoleAssignment>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub user: UserView,
    pub token: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(FromRow)]
pub(crate) struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let RegisterRequest {
        name,
        email,
        password,
        roles,
    } = body;

    if name.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
        return Err(ApiError::BadRequest("name, email, and password are required"));
    }
    let email = normalize_email(&email);

    let roles = if roles.is_empty() {
        vec![RoleAssignment::unscoped(Role::Diner)]
    } else {
        // Privileged provisioning path: explicit roles require an admin.
        let caller = authenticate_optional(&state, &headers)?;
        ensure(caller.as_ref(), AccessRequest::AdminOnly)?;
        roles
    };

    let password_hash = hash_password(&password).map_err(ApiError::internal)?;

    let mut tx = state.db.begin().await.map_err(ApiError::internal)?;
    let user_id: i64 = sqlx::query_scalar(
        "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(&name)
    .bind(&email)
    .bind(&password_hash)
    .fetch_one(&mut *tx)
    .await
    .map_err(|err| on_unique_violation(err, ApiError::DuplicateEmail))?;

    for grant in &roles {
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
    tx.commit().await.map_err(ApiError::internal)?;

    let issued = issue_token(&state, user_id, &name, &email, roles.clone())?;
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

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let LoginRequest { email, password } = body;
    let email = normalize_email(&email);

    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, name, email, password_hash FROM users WHERE email = $1",
    )
    .bind(&email)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::internal)?;

    // Unknown email and bad password share one failure path.
    let Some(user) = row else {
        state.metrics.login_attempt("failure");
        return Err(ApiError::AuthFailed);
    };
    if !verify_password(&password, &user.password_hash) {
        state.metrics.login_attempt("failure");
        return Err(ApiError::AuthFailed);
    }

    // Roles come from durable state at login, never from a prior token.
    let roles = load_role_assignments(&state.db, user.id).await?;
    let issued = issue_token(&state, user.id, &user.name, &user.email, roles.clone())?;
    state.metrics.login_attempt("success");

    Ok(Json(AuthResponse {
        user: UserView {
            id: user.id,
            name: user.name,
            email: user.email,
            roles,
        },
        token: issued.token,
    }))
}

/// Revokes the presented token. Idempotent: repeating the call with an
/// already-revoked token returns the same acknowledgement, but a token that
/// fails signature or expiry checks is rejected outright.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<MessageResponse>> {
    let token = bearer_token(&headers)?;
    let claims = state.codec.verify(&token)?;

    state
        .revocations
        .revoke(claims.token_id, claims.expires_at);
    state.metrics.token_revoked();

    Ok(Json(MessageResponse {
        message: "logout successful",
    }))
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn hash_password(
    password: &str,
) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

/// Fails closed: a malformed digest verifies as false, never an error.
pub(crate) fn verify_password(password: &str, digest: &str) -> bool {
    match PasswordHash::new(digest) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[derive(FromRow)]
struct RoleRow {
    role: String,
    object_id: Option<i64>,
}

pub(crate) async fn load_role_assignments(
    pool: &PgPool,
    user_id: i64,
) -> ApiResult<Vec<RoleAssignment>> {
    let rows = sqlx::query_as::<_, RoleRow>(
        "SELECT role, object_id FROM user_roles WHERE user_id = $1 ORDER BY role, object_id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(ApiError::internal)?;

    let mut roles = Vec::with_capacity(rows.len());
    for row in rows {
        match Role::parse(&row.role) {
            Some(role) => roles.push(RoleAssignment {
                role,
                object_id: row.object_id,
            }),
            None => warn!(user_id, role = %row.role, "skipping unknown role assignment"),
        }
    }
    Ok(roles)
}

pub(crate) fn issue_token(
    state: &AppState,
    user_id: i64,
    name: &str,
    email: &str,
    roles: Vec<RoleAssignment>,
) -> ApiResult<IssuedToken> {
    let subject = TokenSubject {
        user_id,
        name: name.to_string(),
        email: email.to_string(),
        roles,
    };
    state.codec.issue(&subject).map_err(ApiError::Token)
}

/// Verifies a bearer token when one is present; absent header is not an
/// error. A present-but-invalid token still fails.
fn authenticate_optional(
    state: &AppState,
    headers: &HeaderMap,
) -> ApiResult<Option<Claims>> {
    if headers.get(AUTHORIZATION).is_none() {
        return Ok(None);
    }
    let token = bearer_token(headers)?;
    let claims = state.codec.verify(&token)?;
    if state.revocations.is_revoked(&claims.token_id) {
        return Err(common_auth::AuthError::Revoked.into());
    }
    Ok(Some(claims))
}
