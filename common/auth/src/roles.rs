use serde::{Deserialize, Serialize};

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_FRANCHISEE: &str = "franchisee";
pub const ROLE_DINER: &str = "diner";

/// Partial order over roles: Admin > Franchisee > Diner.
pub const ROLE_HIERARCHY: &[&str] = &[ROLE_ADMIN, ROLE_FRANCHISEE, ROLE_DINER];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Franchisee,
    Diner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => ROLE_ADMIN,
            Role::Franchisee => ROLE_FRANCHISEE,
            Role::Diner => ROLE_DINER,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            ROLE_ADMIN => Some(Role::Admin),
            ROLE_FRANCHISEE => Some(Role::Franchisee),
            ROLE_DINER => Some(Role::Diner),
            _ => None,
        }
    }
}

/// A role grant, optionally scoped to a single franchise via `object_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignment {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<i64>,
}

impl RoleAssignment {
    pub fn unscoped(role: Role) -> Self {
        Self {
            role,
            object_id: None,
        }
    }

    pub fn franchisee(franchise_id: i64) -> Self {
        Self {
            role: Role::Franchisee,
            object_id: Some(franchise_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_normalises_case() {
        assert_eq!(Role::parse("Admin"), Some(Role::Admin));
        assert_eq!(Role::parse(" diner "), Some(Role::Diner));
        assert_eq!(Role::parse("owner"), None);
    }

    #[test]
    fn role_assignment_serializes_scope() {
        let scoped = RoleAssignment::franchisee(7);
        let json = serde_json::to_value(scoped).expect("serialize");
        assert_eq!(json["role"], "franchisee");
        assert_eq!(json["objectId"], 7);

        let unscoped = RoleAssignment::unscoped(Role::Diner);
        let json = serde_json::to_value(unscoped).expect("serialize");
        assert_eq!(json["role"], "diner");
        assert!(json.get("objectId").is_none());
    }
}
