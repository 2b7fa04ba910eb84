use crate::claims::Claims;

/// The kinds of access a handler can request on behalf of a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRequest {
    /// Mutations reserved for site admins (franchise create/delete, menu
    /// writes, user administration).
    AdminOnly,
    /// Writes scoped to one franchise (store create/delete).
    FranchiseWrite { franchise_id: i64 },
    /// Reading or creating an order owned by a diner.
    OrderAccess { diner_id: i64 },
    /// Reading or mutating a user record.
    UserRecord { user_id: i64 },
    /// Unscoped reads: menu, franchise listings.
    PublicRead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    InsufficientRole,
}

/// Role-lattice decision function, evaluated as an ordered rule list
/// (first match wins). Admin > Franchisee(scoped) > Diner.
pub fn authorize(identity: Option<&Claims>, request: AccessRequest) -> Decision {
    // Rule 1: Admin may do anything.
    if identity.is_some_and(Claims::is_admin) {
        return Decision::Allow;
    }

    // Rule 2: Franchisee scoped to the franchise being written.
    if let AccessRequest::FranchiseWrite { franchise_id } = request {
        if identity.is_some_and(|claims| claims.is_franchisee_of(franchise_id)) {
            return Decision::Allow;
        }
    }

    // Rule 3: a diner acting on their own orders.
    if let AccessRequest::OrderAccess { diner_id } = request {
        if identity.is_some_and(|claims| claims.user_id == diner_id) {
            return Decision::Allow;
        }
    }

    // Rule 4: a user acting on their own record.
    if let AccessRequest::UserRecord { user_id } = request {
        if identity.is_some_and(|claims| claims.user_id == user_id) {
            return Decision::Allow;
        }
    }

    // Rule 5: public reads are open to everyone, anonymous included.
    if request == AccessRequest::PublicRead {
        return Decision::Allow;
    }

    Decision::Deny(DenyReason::InsufficientRole)
}

/// A denied access request; the service maps this to a 403 without
/// detailing the reason to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardError {
    pub reason: DenyReason,
}

/// Convenience wrapper for handlers: deny becomes a 403-able error.
pub fn ensure(identity: Option<&Claims>, request: AccessRequest) -> Result<(), GuardError> {
    match authorize(identity, request) {
        Decision::Allow => Ok(()),
        Decision::Deny(reason) => Err(GuardError { reason }),
    }
}
