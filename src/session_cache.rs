//! SessionGuid → XPlatformId cache with TTL (spec §3, §4.3, §5).
//!
//! Grounded on the rate limiter's `DashMap`-backed sharded state: fine-grained
//! per-entry locking with no single global lock on the hot read path.

use crate::security::SessionGuid;
use crate::xplatform::XPlatformId;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

struct Entry {
    user_id: XPlatformId,
    expires_at: Instant,
}

/// Maps login session guids to the user identity they authenticate, with a
/// configurable TTL that is shortened (not cleared) on disconnect so a quick
/// reconnect can reuse the same guid.
pub struct SessionCache {
    entries: DashMap<SessionGuid, Entry>,
    default_ttl: Duration,
    disconnected_ttl: Duration,
}

impl SessionCache {
    pub fn new(default_ttl: Duration, disconnected_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
            disconnected_ttl,
        }
    }

    /// Insert a fresh mapping with the full TTL, returning the guid for
    /// convenience at call sites that just generated it.
    pub fn insert(&self, guid: SessionGuid, user_id: XPlatformId) {
        self.entries.insert(
            guid,
            Entry {
                user_id,
                expires_at: Instant::now() + self.default_ttl,
            },
        );
    }

    /// Validate a session: present, unexpired, and mapped to `asserted_user`.
    pub fn validate(&self, guid: &SessionGuid, asserted_user: &XPlatformId) -> bool {
        match self.entries.get(guid) {
            Some(entry) if entry.expires_at > Instant::now() => &entry.user_id == asserted_user,
            _ => false,
        }
    }

    /// Shorten a still-live entry's TTL on peer disconnect rather than
    /// removing it outright, so a quick reconnect can still present it.
    pub fn shorten_on_disconnect(&self, guid: &SessionGuid) {
        if let Some(mut entry) = self.entries.get_mut(guid) {
            let shortened = Instant::now() + self.disconnected_ttl;
            if shortened < entry.expires_at {
                entry.expires_at = shortened;
            }
        }
    }

    /// Remove all expired entries. Intended to be called periodically.
    pub fn sweep_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    /// Drop every entry. Used on server shutdown (spec §5).
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xplatform::Platform;

    fn user(account: &str) -> XPlatformId {
        XPlatformId::new(Platform::Steam, account).unwrap()
    }

    #[test]
    fn validates_freshly_inserted_session() {
        let cache = SessionCache::new(Duration::from_secs(60), Duration::from_secs(5));
        let guid = SessionGuid::generate();
        let u = user("alice");
        cache.insert(guid, u.clone());
        assert!(cache.validate(&guid, &u));
    }

    #[test]
    fn rejects_mismatched_user() {
        let cache = SessionCache::new(Duration::from_secs(60), Duration::from_secs(5));
        let guid = SessionGuid::generate();
        cache.insert(guid, user("alice"));
        assert!(!cache.validate(&guid, &user("mallory")));
    }

    #[test]
    fn rejects_unknown_guid() {
        let cache = SessionCache::new(Duration::from_secs(60), Duration::from_secs(5));
        assert!(!cache.validate(&SessionGuid::generate(), &user("alice")));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_fails_validation() {
        let cache = SessionCache::new(Duration::from_millis(10), Duration::from_secs(5));
        let guid = SessionGuid::generate();
        let u = user("alice");
        cache.insert(guid, u.clone());

        tokio::time::advance(Duration::from_millis(20)).await;
        assert!(!cache.validate(&guid, &u));
    }

    #[tokio::test(start_paused = true)]
    async fn shortening_ttl_on_disconnect_expires_sooner() {
        let cache = SessionCache::new(Duration::from_secs(600), Duration::from_millis(10));
        let guid = SessionGuid::generate();
        let u = user("alice");
        cache.insert(guid, u.clone());
        cache.shorten_on_disconnect(&guid);

        assert!(cache.validate(&guid, &u));
        tokio::time::advance(Duration::from_millis(20)).await;
        assert!(!cache.validate(&guid, &u));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_expired_removes_stale_entries() {
        let cache = SessionCache::new(Duration::from_millis(10), Duration::from_secs(5));
        cache.insert(SessionGuid::generate(), user("alice"));
        tokio::time::advance(Duration::from_millis(20)).await;
        cache.sweep_expired();
        assert!(cache.is_empty());
    }
}
