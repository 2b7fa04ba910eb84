use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::roles::{Role, RoleAssignment};

/// Application-focused representation of verified token claims.
///
/// Claims are a snapshot of the user's identity at issuance time; they are
/// only refreshed at login or profile update.
#[derive(Debug, Clone, Serialize)]
pub struct Claims {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub roles: Vec<RoleAssignment>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub token_id: Uuid,
}

impl Claims {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.iter().any(|grant| grant.role == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// True when the identity holds a Franchisee grant scoped to the given
    /// franchise.
    pub fn is_franchisee_of(&self, franchise_id: i64) -> bool {
        self.roles.iter().any(|grant| {
            grant.role == Role::Franchisee && grant.object_id == Some(franchise_id)
        })
    }
}

/// Wire form of the claims payload (`sub`/`iat`/`exp`/`jti`).
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ClaimsRepr {
    pub sub: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<RoleAssignment>,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl TryFrom<ClaimsRepr> for Claims {
    type Error = AuthError;

    fn try_from(value: ClaimsRepr) -> AuthResult<Self> {
        let user_id = value
            .sub
            .parse::<i64>()
            .map_err(|_| AuthError::InvalidClaim("sub", value.sub.clone()))?;

        let token_id = Uuid::parse_str(&value.jti)
            .map_err(|_| AuthError::InvalidClaim("jti", value.jti.clone()))?;

        let issued_at = Utc
            .timestamp_opt(value.iat, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidClaim("iat", value.iat.to_string()))?;

        let expires_at = Utc
            .timestamp_opt(value.exp, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidClaim("exp", value.exp.to_string()))?;

        Ok(Self {
            user_id,
            name: value.name,
            email: value.email,
            roles: value.roles,
            issued_at,
            expires_at,
            token_id,
        })
    }
}

impl TryFrom<serde_json::Value> for Claims {
    type Error = AuthError;

    fn try_from(value: serde_json::Value) -> AuthResult<Self> {
        let repr: ClaimsRepr = serde_json::from_value(value)
            .map_err(|err| AuthError::InvalidJson(err.to_string()))?;
        Claims::try_from(repr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn claims_convert_from_wire_form() {
        let value = json!({
            "sub": "42",
            "name": "pizza diner",
            "email": "reg@test.com",
            "roles": [{"role": "diner"}, {"role": "franchisee", "objectId": 3}],
            "iat": 1_700_000_000,
            "exp": 1_700_086_400,
            "jti": Uuid::new_v4().to_string(),
        });

        let claims = Claims::try_from(value).expect("claims convert");
        assert_eq!(claims.user_id, 42);
        assert!(claims.has_role(Role::Diner));
        assert!(claims.is_franchisee_of(3));
        assert!(!claims.is_franchisee_of(4));
        assert!(!claims.is_admin());
    }

    #[test]
    fn claims_reject_non_numeric_subject() {
        let value = json!({
            "sub": "not-a-number",
            "name": "x",
            "email": "x@test.com",
            "roles": [],
            "iat": 0,
            "exp": 0,
            "jti": Uuid::new_v4().to_string(),
        });

        let err = Claims::try_from(value).expect_err("should reject");
        assert!(matches!(err, AuthError::InvalidClaim("sub", _)));
    }
}
