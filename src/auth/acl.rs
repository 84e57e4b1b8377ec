//! Connection-time access control (spec §3, §4.7, §8 property 6).
//!
//! Loaded once at startup from the JSON file named by
//! `config.security.acl_path`, or empty (open) when unset.

use super::error::AuthError;
use crate::storage::resources::AccessControlList;
use crate::xplatform::XPlatformId;
use std::path::Path;
use std::sync::RwLock;

/// Guards connection admission against an [`AccessControlList`].
///
/// Held as shared state across the session server; reloadable so an
/// operator can update the deny list without a restart.
pub struct AclGuard {
    list: RwLock<AccessControlList>,
}

impl AclGuard {
    /// Build an open guard (empty allow/deny lists, everyone authorized).
    pub fn open() -> Self {
        Self {
            list: RwLock::new(AccessControlList::default()),
        }
    }

    /// Load from a JSON file. Returns an open guard when `path` is `None`.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let Some(path) = path.map(str::trim).filter(|p| !p.is_empty()) else {
            return Ok(Self::open());
        };
        let list = Self::read_file(Path::new(path))?;
        Ok(Self {
            list: RwLock::new(list),
        })
    }

    fn read_file(path: &Path) -> anyhow::Result<AccessControlList> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Reload the list from `path`, replacing the current one in place.
    pub fn reload(&self, path: &str) -> anyhow::Result<()> {
        let fresh = Self::read_file(Path::new(path))?;
        *self.list.write().unwrap_or_else(|e| e.into_inner()) = fresh;
        Ok(())
    }

    /// Check whether `id` may complete the login handshake. Returns
    /// [`AuthError::Forbidden`] when denied.
    pub fn authorize(&self, id: &XPlatformId) -> Result<(), AuthError> {
        let list = self.list.read().unwrap_or_else(|e| e.into_inner());
        if list.is_authorized(id) {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xplatform::Platform;

    fn id(account: &str) -> XPlatformId {
        XPlatformId::new(Platform::Steam, account).unwrap()
    }

    #[test]
    fn open_guard_authorizes_everyone() {
        let guard = AclGuard::open();
        assert!(guard.authorize(&id("anyone")).is_ok());
    }

    #[test]
    fn missing_path_yields_open_guard() {
        let guard = AclGuard::load(None).unwrap();
        assert!(guard.authorize(&id("anyone")).is_ok());
    }

    #[test]
    fn load_from_file_enforces_deny_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acl.json");
        std::fs::write(
            &path,
            serde_json::json!({"allow": [], "deny": [id("banned").render()]}).to_string(),
        )
        .unwrap();

        let guard = AclGuard::load(Some(path.to_str().unwrap())).unwrap();
        assert!(matches!(
            guard.authorize(&id("banned")),
            Err(AuthError::Forbidden)
        ));
        assert!(guard.authorize(&id("someone-else")).is_ok());
    }

    #[test]
    fn reload_replaces_list_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acl.json");
        std::fs::write(&path, serde_json::json!({"allow": [], "deny": []}).to_string()).unwrap();

        let guard = AclGuard::load(Some(path.to_str().unwrap())).unwrap();
        assert!(guard.authorize(&id("x")).is_ok());

        std::fs::write(
            &path,
            serde_json::json!({"allow": [], "deny": [id("x").render()]}).to_string(),
        )
        .unwrap();
        guard.reload(path.to_str().unwrap()).unwrap();

        assert!(matches!(guard.authorize(&id("x")), Err(AuthError::Forbidden)));
    }
}
