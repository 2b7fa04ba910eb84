use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderMap};

use crate::claims::Claims;
use crate::codec::TokenCodec;
use crate::error::{AuthError, AuthResult};
use crate::revocation::RevocationRegistry;

/// Verified caller identity attached to protected requests.
///
/// Checks run in order: bearer parse, signature/expiry verification,
/// revocation lookup. No credential-store round trip happens here.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: Claims,
    pub token: String,
}

impl AuthContext {
    pub fn into_claims(self) -> Claims {
        self.claims
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<TokenCodec>: FromRef<S>,
    Arc<dyn RevocationRegistry>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let codec = Arc::<TokenCodec>::from_ref(state);
        let registry = Arc::<dyn RevocationRegistry>::from_ref(state);

        let token = bearer_token(&parts.headers)?;
        let claims = codec.verify(&token)?;

        if registry.is_revoked(&claims.token_id) {
            return Err(AuthError::Revoked);
        }

        Ok(Self { claims, token })
    }
}

/// Pulls the bearer token out of the Authorization header without
/// verifying it. Logout uses this so it can revoke idempotently.
pub fn bearer_token(headers: &HeaderMap) -> AuthResult<String> {
    let header_value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthorization)?;

    let raw = header_value
        .to_str()
        .map_err(|_| AuthError::InvalidAuthorization)?
        .trim();

    let token = raw
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthorization)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::InvalidAuthorization);
    }

    Ok(token.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn bearer_token_accepts_valid_header() {
        let token = bearer_token(&headers_with("Bearer abc.def.ghi")).expect("token");
        assert_eq!(token, "abc.def.ghi");
    }

    #[test]
    fn bearer_token_rejects_missing_header() {
        let err = bearer_token(&HeaderMap::new()).expect_err("should reject");
        assert!(matches!(err, AuthError::MissingAuthorization));
    }

    #[test]
    fn bearer_token_rejects_wrong_scheme() {
        let err = bearer_token(&headers_with("Basic credentials")).expect_err("should reject");
        assert!(matches!(err, AuthError::InvalidAuthorization));
    }

    #[test]
    fn bearer_token_rejects_empty_value() {
        let err = bearer_token(&headers_with("Bearer    ")).expect_err("should reject");
        assert!(matches!(err, AuthError::InvalidAuthorization));
    }

    mod full_extraction {
        use super::*;
        use crate::codec::{TokenConfig, TokenSubject};
        use crate::revocation::InMemoryRevocationRegistry;
        use crate::roles::{Role, RoleAssignment};
        use axum::http::Request;

        #[derive(Clone)]
        struct TestState {
            codec: Arc<TokenCodec>,
            revocations: Arc<dyn RevocationRegistry>,
        }

        impl FromRef<TestState> for Arc<TokenCodec> {
            fn from_ref(state: &TestState) -> Self {
                state.codec.clone()
            }
        }

        impl FromRef<TestState> for Arc<dyn RevocationRegistry> {
            fn from_ref(state: &TestState) -> Self {
                state.revocations.clone()
            }
        }

        fn test_state() -> TestState {
            TestState {
                codec: Arc::new(TokenCodec::new(TokenConfig::new("extractor secret"))),
                revocations: Arc::new(InMemoryRevocationRegistry::new()),
            }
        }

        fn subject() -> TokenSubject {
            TokenSubject {
                user_id: 11,
                name: "bill".to_string(),
                email: "a@jwt.com".to_string(),
                roles: vec![RoleAssignment::unscoped(Role::Admin)],
            }
        }

        async fn extract(state: &TestState, token: &str) -> Result<AuthContext, AuthError> {
            let request = Request::builder()
                .uri("/")
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .body(())
                .expect("request");
            let (mut parts, _) = request.into_parts();
            AuthContext::from_request_parts(&mut parts, state).await
        }

        #[tokio::test]
        async fn valid_token_yields_identity() {
            let state = test_state();
            let issued = state.codec.issue(&subject()).expect("issue");

            let ctx = extract(&state, &issued.token).await.expect("authenticated");
            assert_eq!(ctx.claims.user_id, 11);
            assert_eq!(ctx.claims.name, "bill");
        }

        #[tokio::test]
        async fn revoked_token_is_rejected() {
            let state = test_state();
            let issued = state.codec.issue(&subject()).expect("issue");
            state
                .revocations
                .revoke(issued.claims.token_id, issued.claims.expires_at);

            let err = extract(&state, &issued.token)
                .await
                .expect_err("should reject");
            assert!(matches!(err, AuthError::Revoked));
        }
    }
}
