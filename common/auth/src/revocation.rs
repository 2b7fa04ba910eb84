use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Tracks tokens logged out before their natural expiry.
///
/// Injectable so tests can use the in-memory map and production can swap in
/// a shared store. A `revoke` must be visible to a concurrent `is_revoked`
/// on the same token id.
pub trait RevocationRegistry: Send + Sync {
    /// Records the token id until `expires_at`. Idempotent.
    fn revoke(&self, token_id: Uuid, expires_at: DateTime<Utc>);

    fn is_revoked(&self, token_id: &Uuid) -> bool;

    /// Drops entries whose expiry has passed. A pruned entry can never
    /// become valid again: the codec rejects expired tokens independently.
    fn prune(&self, now: DateTime<Utc>);
}

/// Registry backed by a single shared map; the lock gives read-after-write
/// consistency across concurrent requests.
#[derive(Clone, Default)]
pub struct InMemoryRevocationRegistry {
    inner: Arc<RwLock<HashMap<Uuid, DateTime<Utc>>>>,
}

impl InMemoryRevocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        let guard = self.inner.read().expect("rwlock poisoned");
        guard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RevocationRegistry for InMemoryRevocationRegistry {
    fn revoke(&self, token_id: Uuid, expires_at: DateTime<Utc>) {
        let now = Utc::now();
        let mut guard = self.inner.write().expect("rwlock poisoned");
        // Opportunistic prune; correctness never depends on its timing.
        guard.retain(|_, expiry| *expiry > now);
        guard.insert(token_id, expires_at);
    }

    fn is_revoked(&self, token_id: &Uuid) -> bool {
        let guard = self.inner.read().expect("rwlock poisoned");
        guard.contains_key(token_id)
    }

    fn prune(&self, now: DateTime<Utc>) {
        let mut guard = self.inner.write().expect("rwlock poisoned");
        guard.retain(|_, expiry| *expiry > now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn revoke_is_idempotent() {
        let registry = InMemoryRevocationRegistry::new();
        let jti = Uuid::new_v4();
        let expiry = Utc::now() + Duration::hours(1);

        registry.revoke(jti, expiry);
        registry.revoke(jti, expiry);

        assert!(registry.is_revoked(&jti));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_token_is_not_revoked() {
        let registry = InMemoryRevocationRegistry::new();
        assert!(!registry.is_revoked(&Uuid::new_v4()));
    }

    #[test]
    fn prune_drops_only_expired_entries() {
        let registry = InMemoryRevocationRegistry::new();
        let now = Utc::now();
        let live = Uuid::new_v4();
        let dead = Uuid::new_v4();

        registry.revoke(live, now + Duration::hours(1));
        registry.revoke(dead, now - Duration::seconds(1));
        registry.prune(now);

        assert!(registry.is_revoked(&live));
        assert!(!registry.is_revoked(&dead));
    }

    #[test]
    fn revoke_prunes_opportunistically() {
        let registry = InMemoryRevocationRegistry::new();
        let stale = Uuid::new_v4();
        registry.revoke(stale, Utc::now() - Duration::hours(1));

        registry.revoke(Uuid::new_v4(), Utc::now() + Duration::hours(1));
        assert!(!registry.is_revoked(&stale));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn revoke_is_visible_across_threads() {
        let registry = InMemoryRevocationRegistry::new();
        let jti = Uuid::new_v4();
        let expiry = Utc::now() + Duration::hours(1);

        let writer = registry.clone();
        let handle = std::thread::spawn(move || {
            writer.revoke(jti, expiry);
        });
        handle.join().expect("writer thread");

        assert!(registry.is_revoked(&jti));
    }
}
